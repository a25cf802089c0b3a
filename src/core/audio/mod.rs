//! Audio helpers for the recording artifact.
//!
//! - [`AudioAccumulator`] buffers the assistant's audio deltas in arrival order
//!   and serializes them to a WAV file.
//! - [`g711`] expands µ-law telephony audio to linear PCM.

pub mod g711;
mod wav;

pub use g711::{ulaw_expand, ulaw_to_pcm16};
pub use wav::{AudioAccumulator, WAV_HEADER_SIZE, create_header};
