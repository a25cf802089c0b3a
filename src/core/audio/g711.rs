//! G.711 µ-law expansion.
//!
//! Twilio media streams carry 8kHz µ-law audio. When the dialogue service is
//! configured for `g711_ulaw`, the assistant's output deltas are µ-law too and
//! must be expanded to linear PCM before they can be stored in a WAV file.

/// Expand a single µ-law byte to a linear 16-bit sample (ITU-T G.711).
#[inline]
pub fn ulaw_expand(compressed: u8) -> i16 {
    let sign: i16 = if compressed < 0x80 { -1 } else { 1 };
    let inverted = !compressed as i16;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0F;
    let step = 4 << (exponent + 1);

    sign * ((0x80 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

/// Expand µ-law bytes to 16-bit little-endian PCM bytes.
pub fn ulaw_to_pcm16(encoded: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(encoded.len() * 2);
    for &byte in encoded {
        pcm.extend_from_slice(&ulaw_expand(byte).to_le_bytes());
    }
    pcm
}
