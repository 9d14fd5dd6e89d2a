//! Error types for diode operations

/// Reasons a frame could not be decoded at a given offset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer does not start with the frame magic
    #[error("Magic mismatch: expected CADE, got {0:02x?}")]
    MagicMismatch(Vec<u8>),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:x}, got {actual:x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame
        expected: u64,
        /// Checksum computed over the received bytes
        actual: u64,
    },

    /// Not enough bytes buffered to hold the frame
    #[error("Truncated buffer: expected {expected} bytes, got {actual}")]
    TruncatedBuffer {
        /// Bytes needed for the frame (or the part of it parsed so far)
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Length field exceeds the configured maximum payload
    #[error("Length {length} exceeds maximum payload {max}")]
    LengthOutOfRange {
        /// Length read from the header
        length: usize,
        /// Configured maximum
        max: usize,
    },
}

impl DecodeError {
    /// True when waiting for more input may turn this into a valid frame
    pub fn needs_more_input(&self) -> bool {
        matches!(self, DecodeError::TruncatedBuffer { .. })
    }

    /// True when the bytes at this offset are definitely not a valid frame
    pub fn is_corruption(&self) -> bool {
        !self.needs_more_input()
    }
}

/// Errors that can occur while framing, reassembling or transporting a stream
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// A frame failed to decode
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Payload size exceeds maximum allowed
    #[error("Payload size {0} exceeds maximum {1}")]
    PayloadTooLarge(usize, usize),

    /// A channel desynchronized permanently and the loss policy forbids gaps
    #[error("Channel {channel} lost at sequence {sequence}")]
    ChannelLost {
        /// Channel that was lost
        channel: u8,
        /// First sequence that could not be delivered
        sequence: u32,
    },

    /// A missing frame could not be recovered and the loss policy forbids gaps
    #[error("Unresolvable gap on channel {channel} at sequence {sequence}")]
    SequenceGapUnresolvable {
        /// Channel the frame belonged to
        channel: u8,
        /// Sequence of the missing frame
        sequence: u32,
    },

    /// Invalid transport configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Modem profile not present in the profile table
    #[error("Unknown modem profile: {0}")]
    UnknownProfile(String),

    /// IO error during read/write
    #[error("IO error: {0}")]
    Io(String),

    /// The transfer was cancelled
    #[error("Transfer cancelled")]
    Cancelled,
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err.to_string())
    }
}
