use axum::{
    Extension, Json,
    extract::{Path, State},
};
use storage::dto::registration::{ReconcileRequest, ReconcileResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::WebResult;
use crate::middleware::auth::CallerIdentity;
use crate::state::AppState;

use super::services;

#[utoipa::path(
    post,
    path = "/api/jobs/{job_id}/registrations/reconcile",
    params(
        ("job_id" = Uuid, Path, description = "Job the registrations belong to")
    ),
    request_body = ReconcileRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Selections processed; `committed` tells whether the writes were saved", body = ReconcileResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "A registration was changed by a concurrent request"),
        (status = 503, description = "Server shutting down")
    ),
    tag = "registrations"
)]
pub async fn reconcile_selections(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<ReconcileRequest>,
) -> WebResult<Json<ReconcileResponse>> {
    req.validate()?;

    let response = services::reconcile_selections(&state, job_id, &req, &caller).await?;

    Ok(Json(response))
}
