//! Scripted Twilio media stream client
//!
//! Connects to the bridge's `/call` WebSocket and speaks the Twilio Media
//! Streams protocol.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::realtime_mock::EVENT_WAIT;

pub struct TwilioClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    stream_sid: String,
    sequence: u64,
}

impl TwilioClient {
    pub async fn connect(url: &str, stream_sid: &str) -> Self {
        let (ws, _) = connect_async(url).await.unwrap();
        let mut client = Self {
            ws,
            stream_sid: stream_sid.to_string(),
            sequence: 0,
        };
        client
            .send(json!({ "event": "connected", "protocol": "Call", "version": "1.0.0" }))
            .await;
        client
    }

    fn next_sequence(&mut self) -> String {
        self.sequence += 1;
        self.sequence.to_string()
    }

    pub async fn send(&mut self, frame: Value) {
        self.ws
            .send(Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_start(&mut self, call_sid: &str, caller: &str, called: &str) {
        let sequence = self.next_sequence();
        let frame = json!({
            "event": "start",
            "sequenceNumber": sequence,
            "streamSid": self.stream_sid,
            "start": {
                "streamSid": self.stream_sid,
                "accountSid": "AC_test",
                "callSid": call_sid,
                "tracks": ["inbound"],
                "customParameters": { "caller": caller, "called": called },
                "mediaFormat": { "encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1 }
            }
        });
        self.send(frame).await;
    }

    pub async fn send_media(&mut self, payload: &str) {
        let sequence = self.next_sequence();
        let frame = json!({
            "event": "media",
            "sequenceNumber": sequence,
            "streamSid": self.stream_sid,
            "media": { "track": "inbound", "chunk": sequence, "timestamp": "5", "payload": payload }
        });
        self.send(frame).await;
    }

    pub async fn send_mark(&mut self, name: &str) {
        let sequence = self.next_sequence();
        let frame = json!({
            "event": "mark",
            "sequenceNumber": sequence,
            "streamSid": self.stream_sid,
            "mark": { "name": name }
        });
        self.send(frame).await;
    }

    pub async fn send_stop(&mut self) {
        let sequence = self.next_sequence();
        let frame = json!({
            "event": "stop",
            "sequenceNumber": sequence,
            "streamSid": self.stream_sid,
            "stop": { "accountSid": "AC_test", "callSid": "CA_test" }
        });
        self.send(frame).await;
    }

    /// Next frame from the bridge, or `None` once it closes the socket.
    pub async fn next_frame(&mut self) -> Option<Value> {
        loop {
            let msg = tokio::time::timeout(EVENT_WAIT, self.ws.next())
                .await
                .expect("timed out waiting for a bridge frame");
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(&text).unwrap());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
