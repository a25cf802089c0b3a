//! WAV container serialization for accumulated PCM fragments.
//!
//! The dialogue service streams the assistant's speech as a sequence of small
//! audio deltas. [`AudioAccumulator`] keeps them in arrival order and packages
//! them into a canonical 44-byte-header WAV file when the call ends.

use bytes::Bytes;

/// Size of the canonical PCM WAV header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Create a WAV file header for PCM audio.
///
/// # Arguments
/// * `data_size` - Size of the audio data in bytes
/// * `channels` - Number of channels (1 for mono, 2 for stereo)
/// * `sample_rate` - Sample rate in Hz (e.g., 24000)
/// * `bits_per_sample` - Bits per sample (typically 16)
///
/// # Returns
/// A 44-byte WAV header
pub fn create_header(
    data_size: u32,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
    let block_align = channels * bits_per_sample / 8;
    let riff_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // linear PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Ordered collection of raw audio fragments.
///
/// Fragments are never reordered. Finalizing consumes the accumulator, so a
/// recording is serialized exactly once.
#[derive(Debug, Default)]
pub struct AudioAccumulator {
    fragments: Vec<Bytes>,
    total_len: usize,
}

impl AudioAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the end of the sequence.
    pub fn append(&mut self, fragment: impl Into<Bytes>) {
        let fragment = fragment.into();
        self.total_len += fragment.len();
        self.fragments.push(fragment);
    }

    /// Total number of audio bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Serialize the accumulated fragments without consuming them.
    pub fn to_wav(&self, channels: u16, sample_rate: u32, bits_per_sample: u16) -> Vec<u8> {
        let header = create_header(
            self.total_len as u32,
            channels,
            sample_rate,
            bits_per_sample,
        );

        let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + self.total_len);
        wav.extend_from_slice(&header);
        for fragment in &self.fragments {
            wav.extend_from_slice(fragment);
        }
        wav
    }

    /// Consume the accumulator and produce the final WAV file.
    pub fn finalize(self, channels: u16, sample_rate: u32, bits_per_sample: u16) -> Bytes {
        Bytes::from(self.to_wav(channels, sample_rate, bits_per_sample))
    }
}
