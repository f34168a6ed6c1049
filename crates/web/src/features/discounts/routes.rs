use axum::{Router, middleware, routing::post};

use super::handlers::apply_discount;
use crate::middleware::auth::{ApiKeys, require_auth};
use crate::state::AppState;

pub fn routes(api_keys: ApiKeys) -> Router<AppState> {
    Router::new()
        .route("/:job_id/discounts/apply", post(apply_discount))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth))
}
