use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Builds the registration-insurance offer shown beside the payment step.
///
/// The offer is opaque to the registration engine; it is only passed through to the client.
#[async_trait::async_trait]
pub trait InsuranceOfferService: Send + Sync {
    async fn build_offer(&self, job_id: Uuid, family_user_id: Uuid) -> Result<Option<Value>>;
}

/// For jobs that do not sell registration insurance
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInsuranceOffers;

#[async_trait::async_trait]
impl InsuranceOfferService for NoInsuranceOffers {
    async fn build_offer(&self, _job_id: Uuid, _family_user_id: Uuid) -> Result<Option<Value>> {
        Ok(None)
    }
}
