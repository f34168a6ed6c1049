use storage::{
    dto::registration::{ReconcileRequest, ReconcileResponse},
    error::Result,
};
use uuid::Uuid;

use crate::middleware::auth::CallerIdentity;
use crate::state::AppState;

/// Reconcile a family's team selections; aborted if the server shuts down mid-batch
pub async fn reconcile_selections(
    state: &AppState,
    job_id: Uuid,
    request: &ReconcileRequest,
    caller: &CallerIdentity,
) -> Result<ReconcileResponse> {
    let cancel = state.shutdown.child_token();
    state
        .orchestrator
        .reconcile(job_id, request, &caller.0, &cancel)
        .await
}
