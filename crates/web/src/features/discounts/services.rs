use chrono::Utc;
use storage::{
    dto::discount::{ApplyDiscountRequest, ApplyDiscountResponse},
    error::Result,
};
use uuid::Uuid;

use crate::middleware::auth::CallerIdentity;
use crate::state::AppState;

/// Redeem a discount code for a family
pub async fn apply_discount(
    state: &AppState,
    job_id: Uuid,
    request: &ApplyDiscountRequest,
    caller: &CallerIdentity,
) -> Result<ApplyDiscountResponse> {
    state
        .discounts
        .apply_code(
            job_id,
            request.family_user_id,
            &request.code,
            &caller.0,
            Utc::now().naive_utc(),
        )
        .await
}
