//! Constants and limits for the diode frame format

use serde::{Deserialize, Serialize};

/// Frame marker - 2 bytes for synchronization
pub const FRAME_MAGIC: &[u8; 2] = b"\xCA\xDE";

/// Header size: magic (2) + channel_id (1) + sequence (4) + length (2) = 9 bytes
pub const HEADER_SIZE: usize = 9;

/// Offset of the length field inside the header
pub const LENGTH_OFFSET: usize = 7;

/// Hard ceiling on the payload length, bounded by the 16-bit length field
pub const MAX_PAYLOAD_LIMIT: usize = u16::MAX as usize;

/// Highest number of sub-channels addressable by the 8-bit channel id
pub const MAX_CHANNELS: usize = 256;

/// Byte terminating the zero-filled lead-in written before a channel's first frame
pub const LEAD_IN_END: u8 = 0xFF;

/// Default payload chunk size per frame
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default number of zero bytes written before the first frame of a channel
pub const DEFAULT_LEAD_IN: usize = 64;

/// Default number of zero bytes written after the end-of-stream frame of a channel
pub const DEFAULT_LEAD_OUT: usize = 128;

/// Default scan window, in full frames
pub const DEFAULT_SCAN_WINDOW_FRAMES: usize = 4;

/// Default lag (in sequence numbers) after which a missing frame is declared lost
pub const DEFAULT_MAX_LAG: u32 = 16;

/// Default number of sub-channels (one per stereo audio channel)
pub const DEFAULT_CHANNELS: usize = 2;

/// Default depth of the bounded queues between channel workers and the mux/demux
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default width of one PCM sample in bytes (32-bit float)
pub const DEFAULT_SAMPLE_WIDTH: usize = 4;

/// Default time without input after which a blocking slot is given up
pub const DEFAULT_STALL_TIMEOUT_MS: u64 = 10_000;

/// Modem profile used when a channel has none configured
pub const DEFAULT_PROFILE: &str = "audible-7k-channel-0";

/// Size of the CRC32C checksum in bytes
pub const CRC32C_SIZE: usize = 4;

/// Number of BLAKE3 output bytes kept as the frame checksum
pub const BLAKE3_CHECKSUM_SIZE: usize = 8;

/// Checksum carried in the frame trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    /// CRC32C checksum (4 bytes)
    #[default]
    Crc32c,
    /// BLAKE3 hash truncated to 8 bytes
    Blake3,
}

impl ChecksumKind {
    /// Returns the size of the checksum in bytes
    pub const fn size(&self) -> usize {
        match self {
            ChecksumKind::Crc32c => CRC32C_SIZE,
            ChecksumKind::Blake3 => BLAKE3_CHECKSUM_SIZE,
        }
    }

    /// Width of the checksum in bits
    pub const fn bits(&self) -> u32 {
        (self.size() * 8) as u32
    }

    /// Compute the checksum of `data`, widened to `u64`
    pub fn compute(&self, data: &[u8]) -> u64 {
        match self {
            ChecksumKind::Crc32c => u64::from(crc32c::crc32c(data)),
            ChecksumKind::Blake3 => {
                let hash = blake3::hash(data);
                let mut head = [0u8; BLAKE3_CHECKSUM_SIZE];
                head.copy_from_slice(&hash.as_bytes()[..BLAKE3_CHECKSUM_SIZE]);
                u64::from_be_bytes(head)
            }
        }
    }

    /// Read a stored checksum of this kind from the front of `data`
    pub(crate) fn read(&self, data: &[u8]) -> u64 {
        match self {
            ChecksumKind::Crc32c => {
                u64::from(u32::from_be_bytes([data[0], data[1], data[2], data[3]]))
            }
            ChecksumKind::Blake3 => {
                let mut raw = [0u8; BLAKE3_CHECKSUM_SIZE];
                raw.copy_from_slice(&data[..BLAKE3_CHECKSUM_SIZE]);
                u64::from_be_bytes(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_sizes() {
        assert_eq!(ChecksumKind::Crc32c.size(), 4);
        assert_eq!(ChecksumKind::Blake3.size(), 8);
        assert_eq!(ChecksumKind::Blake3.bits(), 64);
    }

    #[test]
    fn test_crc32c_known_value() {
        // Standard CRC-32C check value
        assert_eq!(ChecksumKind::Crc32c.compute(b"123456789"), 0xE306_9283);
    }
}
