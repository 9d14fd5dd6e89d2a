//! Frame codec parameters
//!
//! [`FrameCodec`] carries the two parameters both ends of a transport must agree
//! on: the maximum payload length and the checksum kind. Encoding lives in
//! [`crate::encoder`], decoding in [`crate::decoder`].

use crate::constants::{ChecksumKind, DEFAULT_CHUNK_SIZE, HEADER_SIZE, MAX_PAYLOAD_LIMIT};
use crate::error::FrameError;

/// Stateless frame encoder/decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_payload: usize,
    checksum: ChecksumKind,
}

impl FrameCodec {
    /// Create a codec with a CRC32C trailer
    pub fn new(max_payload: usize) -> Result<Self, FrameError> {
        Self::with_checksum(max_payload, ChecksumKind::Crc32c)
    }

    /// Create a codec with an explicit checksum kind
    pub fn with_checksum(max_payload: usize, checksum: ChecksumKind) -> Result<Self, FrameError> {
        if max_payload == 0 || max_payload > MAX_PAYLOAD_LIMIT {
            return Err(FrameError::InvalidConfig(format!(
                "max payload must be in 1..={}, got {}",
                MAX_PAYLOAD_LIMIT, max_payload
            )));
        }

        Ok(Self {
            max_payload,
            checksum,
        })
    }

    /// Maximum payload length accepted by this codec
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Checksum kind used in the trailer
    pub fn checksum(&self) -> ChecksumKind {
        self.checksum
    }

    /// Header length (magic included)
    pub const fn header_len(&self) -> usize {
        HEADER_SIZE
    }

    /// Trailer length
    pub const fn checksum_len(&self) -> usize {
        self.checksum.size()
    }

    /// Total wire size of a frame carrying `payload_len` bytes
    pub const fn encoded_len(&self, payload_len: usize) -> usize {
        HEADER_SIZE + payload_len + self.checksum.size()
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_CHUNK_SIZE,
            checksum: ChecksumKind::Crc32c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_len() {
        let codec = FrameCodec::new(4).unwrap();
        assert_eq!(codec.encoded_len(4), 9 + 4 + 4);

        let wide = FrameCodec::with_checksum(4, ChecksumKind::Blake3).unwrap();
        assert_eq!(wide.encoded_len(4), 9 + 4 + 8);
    }

    #[test]
    fn test_rejects_bad_max_payload() {
        assert!(FrameCodec::new(0).is_err());
        assert!(FrameCodec::new(70_000).is_err());
        assert!(FrameCodec::new(65_535).is_ok());
    }
}
