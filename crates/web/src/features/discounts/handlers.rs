use axum::{
    Extension, Json,
    extract::{Path, State},
};
use storage::dto::discount::{ApplyDiscountRequest, ApplyDiscountResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebResult;
use crate::middleware::auth::CallerIdentity;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/jobs/{job_id}/discounts/apply",
    params(
        ("job_id" = Uuid, Path, description = "Job the code belongs to")
    ),
    request_body = ApplyDiscountRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Code applied to the family's eligible registrations", body = ApplyDiscountResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Code unknown, expired, or nothing eligible")
    ),
    tag = "discounts"
)]
pub async fn apply_discount(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<ApplyDiscountRequest>,
) -> WebResult<Json<ApplyDiscountResponse>> {
    req.validate()?;

    let response = services::apply_discount(&state, job_id, &req, &caller).await?;

    Ok(Json(response))
}
