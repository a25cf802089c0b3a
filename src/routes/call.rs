//! Call route configuration
//!
//! Both halves of the Twilio integration share the `/call` path.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{call::voice_webhook, media_stream::media_stream_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the call router
///
/// # Endpoints
///
/// - `POST /call` - Twilio voice webhook, answered with stream-connect TwiML
/// - `GET /call` - WebSocket upgrade for the Twilio media stream
///
/// # Flow
///
/// ```text
/// Twilio --POST /call--> TwiML <Connect><Stream url="wss://{host}/call">
/// Twilio --GET /call (WebSocket)--> call session <--> OpenAI Realtime API
/// ```
pub fn create_call_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/call", get(media_stream_handler).post(voice_webhook))
        .layer(TraceLayer::new_for_http())
}
