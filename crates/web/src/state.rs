use std::sync::Arc;

use storage::{
    Database,
    services::{DiscountService, ReconciliationOrchestrator},
};
use tokio_util::sync::CancellationToken;

/// Shared handles every request handler works with
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub orchestrator: Arc<ReconciliationOrchestrator>,
    pub discounts: Arc<DiscountService>,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}
