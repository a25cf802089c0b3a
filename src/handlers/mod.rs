//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Health check endpoint
//! - `call` - Twilio voice webhook answering with stream-connect TwiML
//! - `media_stream` - Twilio media stream WebSocket bridged to a call session

pub mod api;
pub mod call;
pub mod media_stream;

// Re-export commonly used handlers for convenient access
pub use api::health_check;
pub use call::voice_webhook;
pub use media_stream::media_stream_handler;
