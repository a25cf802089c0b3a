//! WebSocket mock of the OpenAI Realtime API
//!
//! Accepts a single connection, records every client event and lets the test
//! push server events or close the socket.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

/// How long helpers wait for a client event before giving up
pub const EVENT_WAIT: Duration = Duration::from_secs(5);

/// What the client sent during the upgrade
#[derive(Debug, Clone, Default)]
pub struct HandshakeInfo {
    pub uri: String,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
}

enum ServerCommand {
    Event(Value),
    Close,
}

pub struct MockRealtimeServer {
    url: String,
    received: mpsc::UnboundedReceiver<Value>,
    commands: mpsc::UnboundedSender<ServerCommand>,
    handshake: Arc<Mutex<Option<HandshakeInfo>>>,
}

impl MockRealtimeServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (received_tx, received) = mpsc::unbounded_channel();
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let handshake = Arc::new(Mutex::new(None));
        let handshake_slot = handshake.clone();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };

            let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                let header = |name: &str| {
                    request
                        .headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string)
                };
                *handshake_slot.lock().unwrap() = Some(HandshakeInfo {
                    uri: request.uri().to_string(),
                    authorization: header("authorization"),
                    openai_beta: header("openai-beta"),
                });
                Ok(response)
            };

            let Ok(ws_stream) = accept_hdr_async(stream, callback).await else {
                return;
            };
            let (mut write, mut read) = ws_stream.split();

            let created = json!({
                "type": "session.created",
                "event_id": "event_mock_0",
                "session": { "id": "sess_mock", "model": "gpt-4o-realtime-preview-2024-10-01" }
            });
            let _ = write.send(Message::Text(created.to_string().into())).await;

            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                let _ = received_tx.send(value);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    command = command_rx.recv() => match command {
                        Some(ServerCommand::Event(event)) => {
                            if write.send(Message::Text(event.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Close) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                }
            }
            // Dropping `received_tx` tells the test the connection is gone
        });

        Self {
            url: format!("ws://{addr}/v1/realtime"),
            received,
            commands,
            handshake,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn handshake(&self) -> Option<HandshakeInfo> {
        self.handshake.lock().unwrap().clone()
    }

    /// Next client event, or `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Option<Value> {
        tokio::time::timeout(EVENT_WAIT, self.received.recv())
            .await
            .expect("timed out waiting for a client event")
    }

    /// Next client event that is not an audio append.
    pub async fn next_control_event(&mut self) -> Option<Value> {
        loop {
            let event = self.next_event().await?;
            if event["type"] != "input_audio_buffer.append" {
                return Some(event);
            }
        }
    }

    /// Wait for the next control event and check its type.
    pub async fn expect_event(&mut self, event_type: &str) -> Value {
        let event = self
            .next_control_event()
            .await
            .unwrap_or_else(|| panic!("connection closed while waiting for {event_type}"));
        assert_eq!(event["type"], event_type, "unexpected event: {event}");
        event
    }

    /// Wait until the client closes the connection, returning what it sent meanwhile.
    pub async fn wait_closed(&mut self) -> Vec<Value> {
        let mut rest = Vec::new();
        while let Some(event) = self.next_event().await {
            rest.push(event);
        }
        rest
    }

    pub fn send(&self, event: Value) {
        let _ = self.commands.send(ServerCommand::Event(event));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    // -------------------------------------------------------------------------
    // Server events
    // -------------------------------------------------------------------------

    pub fn send_audio_delta(&self, item_id: &str, delta: &str) {
        self.send(json!({
            "type": "response.audio.delta",
            "response_id": "resp_1",
            "item_id": item_id,
            "output_index": 0,
            "content_index": 0,
            "delta": delta
        }));
    }

    pub fn send_audio_done(&self, item_id: &str) {
        self.send(json!({
            "type": "response.audio.done",
            "response_id": "resp_1",
            "item_id": item_id,
            "output_index": 0,
            "content_index": 0
        }));
    }

    /// Function call announced by `output_item.added` and completed without a name,
    /// the way the 2024-10-01 protocol reports it.
    pub fn send_function_call(&self, name: &str, call_id: &str) {
        self.send(json!({
            "type": "response.output_item.added",
            "response_id": "resp_2",
            "output_index": 0,
            "item": {
                "id": "item_fn",
                "type": "function_call",
                "call_id": call_id,
                "name": name
            }
        }));
        self.send(json!({
            "type": "response.function_call_arguments.done",
            "response_id": "resp_2",
            "item_id": "item_fn",
            "call_id": call_id,
            "arguments": "{}"
        }));
    }

    pub fn send_text_done(&self, text: &str) {
        self.send(json!({
            "type": "response.text.done",
            "response_id": "resp_3",
            "item_id": "item_text",
            "output_index": 0,
            "content_index": 0,
            "text": text
        }));
    }

    pub fn send_error(&self, message: &str) {
        self.send(json!({
            "type": "error",
            "event_id": "event_err",
            "error": { "type": "server_error", "code": null, "message": message }
        }));
    }
}
