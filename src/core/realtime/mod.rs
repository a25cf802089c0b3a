//! Realtime conversational-AI dialogue module.
//!
//! This module provides the [`DialogueClient`] abstraction over a realtime
//! speech-to-speech service and its OpenAI Realtime API implementation.
//!
//! # Architecture
//!
//! - `DialogueClient` trait for provider abstraction
//! - A single callback receiving every [`DialogueEvent`]
//! - [`create_dialogue_client`] factory used by call sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_call_bridge::core::realtime::{create_dialogue_client, RealtimeConfig};
//! use std::sync::Arc;
//!
//! let mut client = create_dialogue_client(RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
//!     url: None,
//! })?;
//!
//! client.on_event(Arc::new(|event| Box::pin(async move {
//!     println!("{event:?}");
//! })))?;
//! client.connect().await?;
//! ```

mod base;
pub mod openai;

pub use base::{
    BoxedDialogueClient, ConnectionState, DialogueClient, DialogueEvent, DialogueEventCallback,
    Modality, RealtimeConfig, RealtimeError, RealtimeResult, SessionSettings, ToolDefinition,
    ToolInvocation, TurnDetectionConfig,
};
pub use openai::{
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};

/// Create the dialogue client used by call sessions.
pub fn create_dialogue_client(config: RealtimeConfig) -> RealtimeResult<BoxedDialogueClient> {
    Ok(Box::new(OpenAIRealtime::new(config)?))
}
