//! Frame decoding (strict mode)

use crate::codec::FrameCodec;
use crate::constants::{FRAME_MAGIC, HEADER_SIZE, LENGTH_OFFSET};
use crate::error::DecodeError;
use crate::types::{Frame, FrameHeader};
use bytes::Bytes;

impl FrameCodec {
    /// Decode a frame starting at offset 0 of `buf`
    ///
    /// This function performs strict validation:
    /// - Validates magic
    /// - Validates length against the configured maximum
    /// - Validates the checksum
    ///
    /// Trailing bytes after the frame are ignored; use [`FrameCodec::encoded_len`]
    /// on the payload length to know how far to advance.
    pub fn decode(&self, buf: &[u8]) -> Result<Frame, DecodeError> {
        self.check_magic(buf)?;

        if buf.len() < HEADER_SIZE {
            return Err(DecodeError::TruncatedBuffer {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let channel_id = buf[2];
        let sequence = u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]);
        let length = u16::from_be_bytes([buf[LENGTH_OFFSET], buf[LENGTH_OFFSET + 1]]);

        if length as usize > self.max_payload() {
            return Err(DecodeError::LengthOutOfRange {
                length: length as usize,
                max: self.max_payload(),
            });
        }

        let payload_end = HEADER_SIZE + length as usize;
        let total_size = self.encoded_len(length as usize);
        if buf.len() < total_size {
            return Err(DecodeError::TruncatedBuffer {
                expected: total_size,
                actual: buf.len(),
            });
        }

        // Checksum covers channel_id, sequence, length and payload
        let expected = self.checksum().read(&buf[payload_end..total_size]);
        let actual = self.checksum().compute(&buf[2..payload_end]);
        if actual != expected {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        Ok(Frame::new(
            FrameHeader::new(channel_id, sequence, length),
            Bytes::copy_from_slice(&buf[HEADER_SIZE..payload_end]),
        ))
    }

    /// Decode a frame and report how many bytes it occupied
    pub fn try_decode(&self, buf: &[u8]) -> Result<(Frame, usize), DecodeError> {
        let frame = self.decode(buf)?;
        let size = self.encoded_len(frame.payload.len());
        Ok((frame, size))
    }

    /// Check the magic on as many bytes as are available
    fn check_magic(&self, buf: &[u8]) -> Result<(), DecodeError> {
        let available = buf.len().min(FRAME_MAGIC.len());
        if buf[..available] != FRAME_MAGIC[..available] {
            return Err(DecodeError::MagicMismatch(buf[..available].to_vec()));
        }
        if available < FRAME_MAGIC.len() {
            return Err(DecodeError::TruncatedBuffer {
                expected: FRAME_MAGIC.len(),
                actual: available,
            });
        }
        Ok(())
    }
}
