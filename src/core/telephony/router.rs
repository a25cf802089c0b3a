//! Telephony frame router.
//!
//! Turns Twilio wire frames into [`InboundFrame`]s for the call session and
//! serializes [`OutboundFrame`]s back into wire frames. Frames the session
//! does not act on (`connected`, unrecognized events) map to `None`.

use thiserror::Error;

use super::messages::{MarkPayload, OutboundMedia, TwilioInbound, TwilioOutbound};

/// Errors from telephony frame handling.
#[derive(Debug, Error)]
pub enum TelephonyError {
    /// The frame was not valid JSON or did not match the expected shape
    #[error("Malformed telephony frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// An outbound frame was produced before the stream identifier was known
    #[error("Stream identifier not yet known")]
    MissingStreamSid,
}

/// Identity of the call, taken from the `start` frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallMetadata {
    pub stream_sid: String,
    pub call_sid: String,
    /// Caller's number from the `caller` custom parameter
    pub caller: Option<String>,
    /// Dialled number from the `called` custom parameter
    pub callee: Option<String>,
}

/// Telephony input relevant to the call session.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Start(CallMetadata),
    /// Base64 caller audio
    Media { payload: String },
    Mark { name: String },
    Stop,
}

/// Telephony output produced by the call session.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Base64 assistant audio
    Media { payload: String },
    Mark { name: String },
}

/// Parse one text frame from the media stream socket.
///
/// Returns `Ok(None)` for frames that carry nothing for the session.
pub fn parse_frame(text: &str) -> Result<Option<InboundFrame>, TelephonyError> {
    let frame = serde_json::from_str::<TwilioInbound>(text)?;

    Ok(match frame {
        TwilioInbound::Connected { protocol, .. } => {
            tracing::debug!(?protocol, "Media stream connected");
            None
        }
        TwilioInbound::Start { stream_sid, start } => {
            let mut custom_parameters = start.custom_parameters;
            let stream_sid = if start.stream_sid.is_empty() {
                stream_sid.unwrap_or_default()
            } else {
                start.stream_sid
            };
            Some(InboundFrame::Start(CallMetadata {
                stream_sid,
                call_sid: start.call_sid,
                caller: custom_parameters.remove("caller").filter(|s| !s.is_empty()),
                callee: custom_parameters.remove("called").filter(|s| !s.is_empty()),
            }))
        }
        TwilioInbound::Media { media, .. } => Some(InboundFrame::Media {
            payload: media.payload,
        }),
        TwilioInbound::Mark { mark, .. } => Some(InboundFrame::Mark { name: mark.name }),
        TwilioInbound::Stop { .. } => Some(InboundFrame::Stop),
        TwilioInbound::Unknown => {
            tracing::debug!("Ignoring unrecognized media stream event");
            None
        }
    })
}

/// Serialize an outbound frame for the given stream.
pub fn encode_frame(
    stream_sid: Option<&str>,
    frame: OutboundFrame,
) -> Result<String, TelephonyError> {
    let stream_sid = stream_sid
        .filter(|sid| !sid.is_empty())
        .ok_or(TelephonyError::MissingStreamSid)?
        .to_string();

    let wire = match frame {
        OutboundFrame::Media { payload } => TwilioOutbound::Media {
            stream_sid,
            media: OutboundMedia { payload },
        },
        OutboundFrame::Mark { name } => TwilioOutbound::Mark {
            stream_sid,
            mark: MarkPayload { name },
        },
    };

    Ok(serde_json::to_string(&wire)?)
}
