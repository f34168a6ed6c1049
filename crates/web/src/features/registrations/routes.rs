use axum::{Router, middleware, routing::post};

use super::handlers::reconcile_selections;
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    Router::new()
        .route("/:job_id/registrations/reconcile", post(reconcile_selections))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth))
}
