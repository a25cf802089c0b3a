//! Twilio Media Streams support.
//!
//! [`parse_frame`] and [`encode_frame`] translate between the Twilio media
//! stream protocol and the call session's [`InboundFrame`] /
//! [`OutboundFrame`] types.

mod messages;
mod router;

pub use messages::{
    InboundMedia, MarkPayload, MediaFormat, OutboundMedia, StreamStart, TwilioInbound,
    TwilioOutbound,
};
pub use router::{
    CallMetadata, InboundFrame, OutboundFrame, TelephonyError, encode_frame, parse_frame,
};
