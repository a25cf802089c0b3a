//! Twilio voice webhook.
//!
//! Twilio posts here when a call comes in. The response tells it to open a
//! bidirectional media stream back to this server's `/call` WebSocket, with
//! the caller and called numbers attached as custom parameters.

use axum::{
    Form,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Fields of the Twilio voice webhook this server uses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoiceWebhookForm {
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "Called")]
    pub called: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

/// `POST /call`
pub async fn voice_webhook(
    headers: HeaderMap,
    Form(form): Form<VoiceWebhookForm>,
) -> AppResult<Response> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing Host header".to_string()))?;

    info!(
        call_sid = form.call_sid.as_deref().unwrap_or("-"),
        from = form.from.as_deref().unwrap_or("-"),
        "Incoming call"
    );

    let twiml = stream_connect_twiml(
        host,
        form.from.as_deref().unwrap_or_default(),
        form.called.as_deref().unwrap_or_default(),
    );

    Ok(([(header::CONTENT_TYPE, "text/xml")], twiml).into_response())
}

/// Build the `<Connect><Stream>` document pointing Twilio at `wss://{host}/call`.
pub fn stream_connect_twiml(host: &str, caller: &str, called: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="wss://{host}/call">
      <Parameter name="caller" value="{caller}" />
      <Parameter name="called" value="{called}" />
    </Stream>
  </Connect>
</Response>"#,
        host = xml_escape(host),
        caller = xml_escape(caller),
        called = xml_escape(called),
    )
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
