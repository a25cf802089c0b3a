//! Twilio media stream WebSocket handler
//!
//! Each accepted socket becomes one call session. Inbound text frames are
//! parsed into [`InboundFrame`]s and fed to the session; the session writes
//! back through a [`TelephonyRoute`] channel drained by a sender task.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::realtime::create_dialogue_client;
use crate::core::session::{CallSession, SessionInput, TelephonyRoute};
use crate::core::telephony::parse_frame;
use crate::errors::AppError;
use crate::state::AppState;

/// Optimized channel buffer size for audio workloads
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// `GET /call`
///
/// Upgrades the connection Twilio opens after receiving the stream-connect TwiML.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_stream(socket, state))
}

async fn handle_media_stream(socket: WebSocket, app_state: Arc<AppState>) {
    info!("Media stream WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<TelephonyRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames. It also closes the socket once the
    // session is gone, in case the session's own close was not queued.
    let sender_task = tokio::spawn(async move {
        let mut closed = false;
        while let Some(route) = route_rx.recv().await {
            let should_close = matches!(route, TelephonyRoute::Close);

            let result = match route {
                TelephonyRoute::Outgoing(frame) => sender.send(Message::Text(frame.into())).await,
                TelephonyRoute::Close => {
                    info!("Closing media stream WebSocket connection");
                    sender.send(Message::Close(None)).await
                }
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                closed = true;
                break;
            }

            if should_close {
                closed = true;
                break;
            }
        }

        if !closed {
            debug!("Call session ended, closing media stream WebSocket");
            let _ = sender.send(Message::Close(None)).await;
        }
    });

    let dialogue = match app_state
        .config
        .realtime_config()
        .map_err(AppError::Config)
        .and_then(|config| create_dialogue_client(config).map_err(AppError::from))
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create dialogue client: {}", e);
            let _ = route_tx.send(TelephonyRoute::Close).await;
            let _ = sender_task.await;
            return;
        }
    };

    let session = CallSession::new(
        dialogue,
        route_tx,
        app_state.notifier.clone(),
        app_state.config.session_options(),
    );
    let handle = session.spawn();
    let inputs = handle.inputs();

    while let Some(msg_result) = receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Media stream WebSocket error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => match parse_frame(text.as_str()) {
                Ok(Some(frame)) => {
                    if inputs.send(SessionInput::Telephony(frame)).is_err() {
                        debug!("Call session finished, ignoring further frames");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring malformed media stream frame: {}", e),
            },
            Message::Close(_) => {
                info!("Media stream WebSocket closed by Twilio");
                break;
            }
            _ => {}
        }
    }

    let _ = inputs.send(SessionInput::TelephonyClosed);
    drop(inputs);

    match handle.join().await {
        Ok(outcome) => info!(
            stream_sid = outcome
                .metadata
                .as_ref()
                .map(|m| m.stream_sid.as_str())
                .unwrap_or("-"),
            summary = outcome.summary.is_some(),
            faults = outcome.faults,
            "Call finished"
        ),
        Err(e) => error!("Call session task failed: {}", e),
    }

    sender_task.abort();
}
