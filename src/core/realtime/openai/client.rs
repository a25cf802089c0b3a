//! OpenAI Realtime API client implementation.
//!
//! This module provides the OpenAI Realtime client that implements the
//! [`DialogueClient`] trait using OpenAI's WebSocket-based Realtime API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: base64 encoded, `g711_ulaw` or `pcm16`
//!
//! # Connection lifecycle
//!
//! `connect()` spawns the connection task and returns immediately. Intents
//! issued before the handshake completes wait in the outbound channel and are
//! written in order once the socket is open. Audio appends are the exception:
//! they are discarded until the connection is open.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

use super::config::{OPENAI_REALTIME_URL, OpenAIRealtimeModel};
use super::messages::{
    ClientEvent, ConversationItem, ResponseConfig, ServerEvent, SessionConfig, ToolDef,
    TurnDetection,
};
use crate::core::realtime::base::{
    ConnectionState, DialogueClient, DialogueEvent, DialogueEventCallback, Modality,
    RealtimeConfig, RealtimeError, RealtimeResult, SessionSettings, TurnDetectionConfig,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on queueing a control event behind a stalled connection.
const CONTROL_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages from the client handle to the connection task.
#[derive(Debug)]
enum Outbound {
    Event(ClientEvent),
    Close,
}

type SharedCallback = Arc<Mutex<Option<DialogueEventCallback>>>;

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client implementation.
///
/// The `open` flag is shared with the connection task for lock-free checks
/// on the audio path.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    model: OpenAIRealtimeModel,
    state: Arc<RwLock<ConnectionState>>,
    open: Arc<AtomicBool>,

    /// Outbound channel; `None` once closed.
    ws_sender: Option<mpsc::Sender<Outbound>>,
    /// Receiving half, handed to the connection task on `connect()`.
    ws_receiver: Option<mpsc::Receiver<Outbound>>,

    event_callback: SharedCallback,
    connection_handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl OpenAIRealtime {
    /// Create a new client. The API key is required.
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required for OpenAI Realtime".to_string(),
            ));
        }

        let model = OpenAIRealtimeModel::from_str_or_default(&config.model);
        let (tx, rx) = mpsc::channel(WS_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            model,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            open: Arc::new(AtomicBool::new(false)),
            ws_sender: Some(tx),
            ws_receiver: Some(rx),
            event_callback: Arc::new(Mutex::new(None)),
            connection_handle: None,
            closed: false,
        })
    }

    /// Get the configured model.
    pub fn model(&self) -> OpenAIRealtimeModel {
        self.model
    }

    /// Build the WebSocket URL with model parameter.
    fn build_ws_url(&self) -> RealtimeResult<String> {
        let base = self.config.url.as_deref().unwrap_or(OPENAI_REALTIME_URL);
        let mut url = Url::parse(base)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("{base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("model", self.model.as_str());
        Ok(url.to_string())
    }

    /// Build the `session.update` payload.
    fn build_session_config(settings: &SessionSettings) -> SessionConfig {
        let turn_detection = match &settings.turn_detection {
            TurnDetectionConfig::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            } => TurnDetection::ServerVad {
                threshold: *threshold,
                prefix_padding_ms: *prefix_padding_ms,
                silence_duration_ms: *silence_duration_ms,
            },
        };

        let tools: Vec<ToolDef> = settings
            .tools
            .iter()
            .map(|tool| ToolDef {
                tool_type: "function".to_string(),
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.parameters.clone()),
            })
            .collect();
        let tool_choice = (!tools.is_empty()).then(|| "auto".to_string());

        SessionConfig {
            modalities: Some(modality_names(&settings.modalities)),
            instructions: (!settings.instructions.is_empty())
                .then(|| settings.instructions.clone()),
            voice: Some(settings.voice.as_str().to_string()),
            input_audio_format: Some(settings.input_audio_format.as_str().to_string()),
            output_audio_format: Some(settings.output_audio_format.as_str().to_string()),
            turn_detection: Some(turn_detection),
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
            temperature: settings.temperature,
        }
    }

    /// Queue a control event for the connection task.
    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        let Some(sender) = self.ws_sender.as_ref() else {
            return Err(RealtimeError::Closed);
        };
        let event_type = event.event_type();
        tracing::trace!(event_type, "Queueing realtime event");
        sender
            .send_timeout(Outbound::Event(event), CONTROL_SEND_TIMEOUT)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    RealtimeError::Timeout(format!("queueing {event_type}"))
                }
                SendTimeoutError::Closed(_) => RealtimeError::Closed,
            })
    }

    /// Translate a server event into a dialogue event.
    ///
    /// `pending_function_calls` maps call_id to function name, populated by
    /// `response.output_item.added` for revisions where
    /// `response.function_call_arguments.done` omits the name.
    fn translate_server_event(
        event: ServerEvent,
        pending_function_calls: &mut HashMap<String, String>,
    ) -> Option<DialogueEvent> {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(session_id = %session.id, "OpenAI Realtime session created");
                None
            }
            ServerEvent::SessionUpdated { session } => {
                tracing::debug!(session_id = %session.id, "OpenAI Realtime session updated");
                None
            }
            ServerEvent::Error { error } => {
                tracing::error!(
                    "OpenAI Realtime error: {} - {}",
                    error.error_type,
                    error.message
                );
                Some(DialogueEvent::Error {
                    message: format!("{}: {}", error.error_type, error.message),
                })
            }
            ServerEvent::OutputItemAdded { item, .. } => {
                if item.item_type == "function_call"
                    && let (Some(call_id), Some(name)) = (item.call_id, item.name)
                {
                    pending_function_calls.insert(call_id, name);
                }
                None
            }
            ServerEvent::AudioDelta { delta, .. } => {
                Some(DialogueEvent::AudioDelta { payload: delta })
            }
            ServerEvent::AudioDone { item_id, .. } => Some(DialogueEvent::AudioDone { item_id }),
            ServerEvent::TextDone { text, .. } => Some(DialogueEvent::TextDone { text }),
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
                ..
            } => {
                let pending = pending_function_calls.remove(&call_id);
                match name.or(pending) {
                    Some(name) => {
                        tracing::debug!(%name, %call_id, %arguments, "Function call completed");
                        Some(DialogueEvent::FunctionCallDone { name, call_id })
                    }
                    None => {
                        tracing::warn!(%call_id, "Function call completed without a known name");
                        None
                    }
                }
            }
            ServerEvent::ResponseDone { response } => {
                tracing::debug!(response_id = %response.id, "Response done");
                None
            }
            ServerEvent::Unknown => {
                tracing::trace!("Ignoring unhandled OpenAI Realtime event");
                None
            }
        }
    }

    async fn emit(callback: &SharedCallback, event: DialogueEvent) {
        let cb = callback.lock().clone();
        if let Some(cb) = cb {
            cb(event).await;
        }
    }
}

fn modality_names(modalities: &[Modality]) -> Vec<String> {
    modalities.iter().map(|m| m.as_str().to_string()).collect()
}

#[async_trait]
impl DialogueClient for OpenAIRealtime {
    async fn connect(&mut self) -> RealtimeResult<()> {
        if self.closed {
            return Err(RealtimeError::Closed);
        }
        let Some(mut rx) = self.ws_receiver.take() else {
            // Already connecting or connected
            return Ok(());
        };

        let url = self.build_ws_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        *self.state.write() = ConnectionState::Connecting;

        let state = self.state.clone();
        let open = self.open.clone();
        let event_cb = self.event_callback.clone();
        let model = self.model;

        let handle = tokio::spawn(async move {
            let ws_stream =
                match tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
                    .await
                {
                    Ok(Ok((ws_stream, _response))) => ws_stream,
                    Ok(Err(e)) => {
                        tracing::error!("Failed to connect to OpenAI Realtime API: {}", e);
                        *state.write() = ConnectionState::Failed;
                        Self::emit(&event_cb, DialogueEvent::Error {
                            message: RealtimeError::ConnectionFailed(e.to_string()).to_string(),
                        })
                        .await;
                        Self::emit(&event_cb, DialogueEvent::Closed).await;
                        return;
                    }
                    Err(_) => {
                        tracing::error!(
                            "OpenAI Realtime handshake did not complete within {:?}",
                            CONNECT_TIMEOUT
                        );
                        *state.write() = ConnectionState::Failed;
                        Self::emit(&event_cb, DialogueEvent::Error {
                            message: RealtimeError::Timeout("handshake".to_string()).to_string(),
                        })
                        .await;
                        Self::emit(&event_cb, DialogueEvent::Closed).await;
                        return;
                    }
                };

            tracing::info!(%model, "Connected to OpenAI Realtime API");
            *state.write() = ConnectionState::Connected;
            open.store(true, Ordering::SeqCst);
            Self::emit(&event_cb, DialogueEvent::Opened).await;

            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let mut pending_function_calls = HashMap::new();

            loop {
                tokio::select! {
                    outbound = rx.recv() => match outbound {
                        Some(Outbound::Event(event)) => {
                            let json = match serde_json::to_string(&event) {
                                Ok(j) => j,
                                Err(e) => {
                                    tracing::error!("Failed to serialize event: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                tracing::error!("Failed to send WebSocket message: {}", e);
                                break;
                            }
                        }
                        Some(Outbound::Close) | None => {
                            tracing::debug!("Closing OpenAI Realtime connection");
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        }
                    },

                    incoming = ws_stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(&text) {
                                Ok(event) => {
                                    if let Some(dialogue_event) =
                                        Self::translate_server_event(event, &mut pending_function_calls)
                                    {
                                        Self::emit(&event_cb, dialogue_event).await;
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!("Failed to parse server event: {} - {}", e, text);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("WebSocket closed by server");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                tracing::error!("Failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error: {}", e);
                            break;
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            break;
                        }
                    },
                }
            }

            open.store(false, Ordering::SeqCst);
            *state.write() = ConnectionState::Closed;
            Self::emit(&event_cb, DialogueEvent::Closed).await;
        });

        self.connection_handle = Some(handle);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn configure_session(&mut self, settings: &SessionSettings) -> RealtimeResult<()> {
        let session = Self::build_session_config(settings);
        self.send_event(ClientEvent::SessionUpdate { session }).await
    }

    async fn append_audio(&mut self, payload: &str) -> RealtimeResult<()> {
        if !self.is_open() {
            tracing::trace!("Dropping caller audio, dialogue connection not open");
            return Ok(());
        }
        let Some(sender) = self.ws_sender.as_ref() else {
            return Err(RealtimeError::Closed);
        };

        // Never wait on the audio path: a full queue drops the fragment.
        match sender.try_send(Outbound::Event(ClientEvent::InputAudioBufferAppend {
            audio: payload.to_string(),
        })) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Outbound queue full, dropping caller audio");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(RealtimeError::Closed),
        }
    }

    async fn inject_user_message(&mut self, text: &str) -> RealtimeResult<()> {
        self.send_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
            previous_item_id: None,
        })
        .await
    }

    async fn request_response(&mut self, modalities: &[Modality]) -> RealtimeResult<()> {
        self.send_event(ClientEvent::ResponseCreate {
            response: Some(ResponseConfig {
                modalities: Some(modality_names(modalities)),
                instructions: None,
            }),
        })
        .await
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let was_open = self.open.swap(false, Ordering::SeqCst);
        let sender = self.ws_sender.take();
        self.ws_receiver = None;

        if let Some(handle) = self.connection_handle.take() {
            // An open connection writes the close frame and exits on its own,
            // unless its queue is backed up.
            let queued = was_open
                && sender
                    .as_ref()
                    .is_some_and(|sender| sender.try_send(Outbound::Close).is_ok());
            if !queued {
                handle.abort();
            }
        }

        *self.state.write() = ConnectionState::Closed;
        tracing::info!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    fn on_event(&mut self, callback: DialogueEventCallback) -> RealtimeResult<()> {
        *self.event_callback.lock() = Some(callback);
        Ok(())
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::base::ToolDefinition;
    use crate::core::realtime::openai::OpenAIRealtimeVoice;

    fn test_config() -> RealtimeConfig {
        RealtimeConfig {
            api_key: "test_key".to_string(),
            model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
            url: None,
        }
    }

    #[test]
    fn test_api_key_required() {
        let result = OpenAIRealtime::new(RealtimeConfig::default());
        match result {
            Err(RealtimeError::InvalidConfiguration(_)) => {}
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    #[test]
    fn test_build_ws_url() {
        let realtime = OpenAIRealtime::new(test_config()).unwrap();
        assert_eq!(
            realtime.build_ws_url().unwrap(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01"
        );

        let mut config = test_config();
        config.url = Some("ws://127.0.0.1:9000/v1/realtime".to_string());
        let realtime = OpenAIRealtime::new(config).unwrap();
        assert_eq!(
            realtime.build_ws_url().unwrap(),
            "ws://127.0.0.1:9000/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut config = test_config();
        config.url = Some("not a url".to_string());
        let realtime = OpenAIRealtime::new(config).unwrap();
        assert!(matches!(
            realtime.build_ws_url(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_build_session_config() {
        let settings = SessionSettings {
            instructions: "Be brief".to_string(),
            voice: OpenAIRealtimeVoice::Coral,
            tools: vec![ToolDefinition::without_parameters("hang_up", "End the call")],
            ..Default::default()
        };
        let session = OpenAIRealtime::build_session_config(&settings);
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["instructions"], "Be brief");
        assert_eq!(json["voice"], "coral");
        assert_eq!(json["modalities"], serde_json::json!(["text", "audio"]));
        assert_eq!(json["input_audio_format"], "g711_ulaw");
        assert_eq!(json["output_audio_format"], "g711_ulaw");
        assert_eq!(json["turn_detection"]["type"], "server_vad");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["name"], "hang_up");
        assert_eq!(json["tool_choice"], "auto");
        assert!((json["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_session_config_without_tools() {
        let session = OpenAIRealtime::build_session_config(&SessionSettings::default());
        assert!(session.tools.is_none());
        assert!(session.tool_choice.is_none());
        assert!(session.instructions.is_none());
    }

    #[test]
    fn test_translate_audio_events() {
        let mut pending = HashMap::new();
        let delta = ServerEvent::AudioDelta {
            response_id: "r".to_string(),
            item_id: "i".to_string(),
            delta: "AAAA".to_string(),
        };
        assert_eq!(
            OpenAIRealtime::translate_server_event(delta, &mut pending),
            Some(DialogueEvent::AudioDelta {
                payload: "AAAA".to_string()
            })
        );

        let done = ServerEvent::AudioDone {
            response_id: "r".to_string(),
            item_id: "item_7".to_string(),
        };
        assert_eq!(
            OpenAIRealtime::translate_server_event(done, &mut pending),
            Some(DialogueEvent::AudioDone {
                item_id: "item_7".to_string()
            })
        );
    }

    #[test]
    fn test_function_name_resolved_from_output_item() {
        let mut pending = HashMap::new();
        let added = ServerEvent::OutputItemAdded {
            response_id: "r".to_string(),
            item: ConversationItem {
                item_type: "function_call".to_string(),
                call_id: Some("call_1".to_string()),
                name: Some("hang_up".to_string()),
                ..Default::default()
            },
        };
        assert!(OpenAIRealtime::translate_server_event(added, &mut pending).is_none());
        assert_eq!(pending.get("call_1").map(String::as_str), Some("hang_up"));

        let done = ServerEvent::FunctionCallArgumentsDone {
            item_id: "i".to_string(),
            call_id: "call_1".to_string(),
            name: None,
            arguments: "{}".to_string(),
        };
        assert_eq!(
            OpenAIRealtime::translate_server_event(done, &mut pending),
            Some(DialogueEvent::FunctionCallDone {
                name: "hang_up".to_string(),
                call_id: "call_1".to_string()
            })
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn test_function_call_without_name_is_dropped() {
        let mut pending = HashMap::new();
        let done = ServerEvent::FunctionCallArgumentsDone {
            item_id: "i".to_string(),
            call_id: "call_x".to_string(),
            name: None,
            arguments: "{}".to_string(),
        };
        assert!(OpenAIRealtime::translate_server_event(done, &mut pending).is_none());
    }

    #[test]
    fn test_unknown_event_produces_nothing() {
        let mut pending = HashMap::new();
        assert!(OpenAIRealtime::translate_server_event(ServerEvent::Unknown, &mut pending).is_none());
    }

    #[tokio::test]
    async fn test_append_audio_before_open_is_a_noop() {
        let mut realtime = OpenAIRealtime::new(test_config()).unwrap();
        assert!(!realtime.is_open());
        assert!(realtime.append_audio("AAAA").await.is_ok());

        // Nothing was queued for the connection task.
        let rx = realtime.ws_receiver.as_mut().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_append_audio_drops_when_queue_full() {
        let mut realtime = OpenAIRealtime::new(test_config()).unwrap();
        realtime.open.store(true, Ordering::SeqCst);

        // Twice the capacity, with nobody draining: must neither fail nor wait
        for _ in 0..WS_CHANNEL_CAPACITY * 2 {
            assert!(realtime.append_audio("AAAA").await.is_ok());
        }

        let rx = realtime.ws_receiver.as_mut().unwrap();
        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, WS_CHANNEL_CAPACITY);
    }

    #[tokio::test]
    async fn test_intents_before_open_are_queued_in_order() {
        let mut realtime = OpenAIRealtime::new(test_config()).unwrap();
        realtime
            .configure_session(&SessionSettings::default())
            .await
            .unwrap();
        realtime.inject_user_message("hello").await.unwrap();
        realtime.request_response(&[Modality::Text]).await.unwrap();

        let rx = realtime.ws_receiver.as_mut().unwrap();
        let mut types = Vec::new();
        while let Ok(Outbound::Event(event)) = rx.try_recv() {
            types.push(event.event_type());
        }
        assert_eq!(
            types,
            vec!["session.update", "conversation.item.create", "response.create"]
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut realtime = OpenAIRealtime::new(test_config()).unwrap();
        assert!(realtime.close().await.is_ok());
        assert!(realtime.close().await.is_ok());
        assert_eq!(realtime.connection_state(), ConnectionState::Closed);
        assert!(matches!(
            realtime.inject_user_message("late").await,
            Err(RealtimeError::Closed)
        ));
        assert!(matches!(realtime.connect().await, Err(RealtimeError::Closed)));
    }
}
