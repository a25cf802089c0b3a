pub mod api;
pub mod call;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Assemble every route with the shared state attached.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::create_api_router())
        .merge(call::create_call_router())
        .with_state(state)
}
