//! Mock provider servers
//!
//! - `realtime_mock`: OpenAI Realtime API over a local WebSocket
//! - `twilio_client`: a scripted Twilio media stream client

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

pub mod realtime_mock;
pub mod twilio_client;
