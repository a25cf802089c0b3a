//! Base traits and types for the conversational-AI dialogue connection.
//!
//! A dialogue client owns one persistent connection to a realtime
//! speech-to-speech service. Callers issue session-level intents
//! (configure, append audio, inject a message, request a response, close)
//! and receive every server event through a single [`DialogueEventCallback`]
//! as a [`DialogueEvent`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use super::openai::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The connection was closed and accepts no further intents
    #[error("Connection closed")]
    Closed,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Connection parameters for a dialogue client.
#[derive(Clone, Default)]
pub struct RealtimeConfig {
    /// API key for the provider
    pub api_key: String,

    /// Model to use (e.g., "gpt-4o-realtime-preview-2024-10-01")
    pub model: String,

    /// Endpoint override. Defaults to the provider's public endpoint.
    pub url: Option<String>,
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("url", &self.url)
            .finish()
    }
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetectionConfig {
    /// Server-side Voice Activity Detection
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

/// Tool definition for function calling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Function name
    pub name: String,
    /// Function description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// A function tool that takes no arguments.
    pub fn without_parameters(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }
}

/// Output modality requested from the dialogue service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

impl Modality {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }
}

/// Session-level settings sent with `configure_session`.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub instructions: String,
    pub voice: OpenAIRealtimeVoice,
    pub input_audio_format: OpenAIRealtimeAudioFormat,
    pub output_audio_format: OpenAIRealtimeAudioFormat,
    pub turn_detection: TurnDetectionConfig,
    pub modalities: Vec<Modality>,
    pub temperature: Option<f32>,
    pub tools: Vec<ToolDefinition>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            instructions: String::new(),
            voice: OpenAIRealtimeVoice::default(),
            input_audio_format: OpenAIRealtimeAudioFormat::default(),
            output_audio_format: OpenAIRealtimeAudioFormat::default(),
            turn_detection: TurnDetectionConfig::default(),
            modalities: vec![Modality::Text, Modality::Audio],
            temperature: Some(0.8),
            tools: Vec::new(),
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for a dialogue client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Connected and ready
    Connected,
    /// Closed by either side; terminal
    Closed,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Tools the assistant may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolInvocation {
    /// The assistant decided the call is over.
    EndCall,
}

impl ToolInvocation {
    pub const END_CALL: &'static str = "hang_up";

    /// Resolve a function name reported by the service.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            Self::END_CALL => Some(Self::EndCall),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EndCall => Self::END_CALL,
        }
    }
}

/// Events surfaced by a dialogue client.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueEvent {
    /// The connection handshake completed.
    Opened,
    /// A base64 audio fragment of the assistant's current turn.
    AudioDelta { payload: String },
    /// The assistant finished speaking the item.
    AudioDone { item_id: String },
    /// The assistant invoked a function tool.
    FunctionCallDone { name: String, call_id: String },
    /// Full text of a text-only turn.
    TextDone { text: String },
    /// The service reported an error.
    Error { message: String },
    /// The connection ended.
    Closed,
}

/// Callback receiving every [`DialogueEvent`].
pub type DialogueEventCallback =
    Arc<dyn Fn(DialogueEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Dialogue Client Trait
// =============================================================================

/// A connection to a realtime conversational-AI service.
///
/// Intents issued before the connection opens are queued and flushed in
/// order once it does, except audio appends which are dropped.
#[async_trait]
pub trait DialogueClient: Send + Sync {
    /// Start opening the connection. Returns once the handshake is underway;
    /// [`DialogueEvent::Opened`] reports completion.
    async fn connect(&mut self) -> RealtimeResult<()>;

    /// Whether the connection is open.
    fn is_open(&self) -> bool;

    fn connection_state(&self) -> ConnectionState;

    /// Send the session configuration.
    async fn configure_session(&mut self, settings: &SessionSettings) -> RealtimeResult<()>;

    /// Append base64 caller audio. Never waits: the fragment is dropped while
    /// the connection is not open or its outbound queue is full.
    async fn append_audio(&mut self, payload: &str) -> RealtimeResult<()>;

    /// Add a user text message to the conversation.
    async fn inject_user_message(&mut self, text: &str) -> RealtimeResult<()>;

    /// Ask the assistant to respond with the given modalities.
    async fn request_response(&mut self, modalities: &[Modality]) -> RealtimeResult<()>;

    /// Close the connection. Idempotent.
    async fn close(&mut self) -> RealtimeResult<()>;

    /// Register the event callback. Replaces any previous callback.
    ///
    /// The callback runs on the connection task, so it must not wait on the
    /// caller of this client.
    fn on_event(&mut self, callback: DialogueEventCallback) -> RealtimeResult<()>;
}

/// Boxed dialogue client for dynamic dispatch.
pub type BoxedDialogueClient = Box<dyn DialogueClient>;
