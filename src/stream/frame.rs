//! Frame types for the streaming session.
//!
//! An [`AudioFrame`] is one unit of audio flowing from the capture domain to
//! the duplex channel: either a block of real samples or the single terminal
//! sentinel that marks end of capture.

/// Audio frame produced by the frame processor.
///
/// Invariants, enforced by the constructors:
/// - a non-final frame always carries at least one sample;
/// - the sentinel frame carries no samples and is the only frame with
///   `is_last_chunk() == true`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    is_last_chunk: bool,
}

impl AudioFrame {
    /// Creates a frame carrying one block of mono f32 samples.
    ///
    /// Returns `None` for an empty block: only the sentinel may have zero
    /// length, and it is created via [`AudioFrame::sentinel`].
    pub fn from_samples(samples: Vec<f32>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        Some(Self {
            samples,
            is_last_chunk: false,
        })
    }

    /// Creates the terminal sentinel frame (zero samples, last-chunk flag set).
    pub fn sentinel() -> Self {
        Self {
            samples: Vec::new(),
            is_last_chunk: true,
        }
    }

    /// The samples carried by this frame. Empty only for the sentinel.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples in this frame.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True only for the sentinel frame.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns true if this is the terminal sentinel.
    pub fn is_last_chunk(&self) -> bool {
        self.is_last_chunk
    }

    /// Encodes the samples as raw little-endian f32 PCM for the wire.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * 4);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

/// Decodes raw little-endian f32 PCM back into samples.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn samples_from_wire_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_rejects_empty_block() {
        assert!(AudioFrame::from_samples(Vec::new()).is_none());
    }

    #[test]
    fn test_from_samples_is_not_last_chunk() {
        let frame = AudioFrame::from_samples(vec![0.1, -0.2, 0.3]).unwrap();
        assert!(!frame.is_last_chunk());
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_sentinel_has_zero_length() {
        let sentinel = AudioFrame::sentinel();
        assert!(sentinel.is_last_chunk());
        assert_eq!(sentinel.len(), 0);
        assert!(sentinel.is_empty());
    }

    #[test]
    fn test_wire_encoding_is_little_endian() {
        let frame = AudioFrame::from_samples(vec![1.0f32]).unwrap();
        assert_eq!(frame.to_wire_bytes(), 1.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_wire_encoding_length() {
        let frame = AudioFrame::from_samples(vec![0.5; 128]).unwrap();
        assert_eq!(frame.to_wire_bytes().len(), 128 * 4);
    }

    #[test]
    fn test_wire_round_trip() {
        let samples = vec![0.0, 0.25, -0.25, 1.0, -1.0];
        let frame = AudioFrame::from_samples(samples.clone()).unwrap();
        assert_eq!(samples_from_wire_bytes(&frame.to_wire_bytes()), samples);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut bytes = 0.5f32.to_le_bytes().to_vec();
        bytes.push(0xFF);
        assert_eq!(samples_from_wire_bytes(&bytes), vec![0.5]);
    }
}
