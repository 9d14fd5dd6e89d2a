//! Core types for diode frames

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Frame header as carried on the wire after the magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Sub-channel this frame was sent on
    pub channel_id: u8,

    /// Per-channel sequence number, starting at 0
    pub sequence: u32,

    /// Length of the payload in bytes
    pub length: u16,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(channel_id: u8, sequence: u32, length: u16) -> Self {
        Self {
            channel_id,
            sequence,
            length,
        }
    }

    /// Serialize the checksummed header fields (everything after the magic)
    pub fn to_bytes(&self) -> [u8; 7] {
        let mut out = [0u8; 7];
        out[0] = self.channel_id;
        out[1..5].copy_from_slice(&self.sequence.to_be_bytes());
        out[5..7].copy_from_slice(&self.length.to_be_bytes());
        out
    }
}

/// Complete decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Frame payload (a contiguous slice of the original stream)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(header: FrameHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get the channel id
    pub fn channel_id(&self) -> u8 {
        self.header.channel_id
    }

    /// Get the sequence number
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    /// An empty frame marks the end of its channel's stream
    pub fn is_end(&self) -> bool {
        self.header.length == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let header = FrameHeader::new(3, 0x0102_0304, 0x0506);
        assert_eq!(header.to_bytes(), [3, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_end_frame() {
        let frame = Frame::new(FrameHeader::new(0, 7, 0), Bytes::new());
        assert!(frame.is_end());
        assert_eq!(frame.sequence(), 7);
    }
}
