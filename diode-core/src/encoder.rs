//! Frame encoding

use crate::codec::FrameCodec;
use crate::constants::{ChecksumKind, FRAME_MAGIC};
use crate::error::FrameError;
use crate::types::{Frame, FrameHeader};
use bytes::{BufMut, Bytes, BytesMut};

impl FrameCodec {
    /// Encode a frame into bytes
    ///
    /// The frame is encoded with the following layout:
    /// 1. Magic (2 bytes): 0xCA 0xDE
    /// 2. Header:
    ///    - Channel id (1 byte)
    ///    - Sequence (4 bytes, big-endian)
    ///    - Payload length (2 bytes, big-endian)
    /// 3. Payload (variable length)
    /// 4. Checksum over header fields + payload (CRC32C or truncated BLAKE3)
    pub fn encode(&self, channel_id: u8, sequence: u32, payload: &[u8]) -> Result<Bytes, FrameError> {
        if payload.len() > self.max_payload() {
            return Err(FrameError::PayloadTooLarge(payload.len(), self.max_payload()));
        }

        let mut buf = BytesMut::with_capacity(self.encoded_len(payload.len()));
        self.encode_into(channel_id, sequence, payload, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode a frame, appending it to `buf`
    pub fn encode_into(
        &self,
        channel_id: u8,
        sequence: u32,
        payload: &[u8],
        buf: &mut BytesMut,
    ) -> Result<(), FrameError> {
        if payload.len() > self.max_payload() {
            return Err(FrameError::PayloadTooLarge(payload.len(), self.max_payload()));
        }

        buf.reserve(self.encoded_len(payload.len()));

        // Write magic
        buf.put_slice(FRAME_MAGIC);

        // Write header
        let header = FrameHeader::new(channel_id, sequence, payload.len() as u16);
        let checked_start = buf.len();
        buf.put_slice(&header.to_bytes());

        // Write payload
        buf.put_slice(payload);

        // Write checksum over everything after the magic
        let checksum = self.checksum().compute(&buf[checked_start..]);
        match self.checksum() {
            ChecksumKind::Crc32c => buf.put_u32(checksum as u32),
            ChecksumKind::Blake3 => buf.put_u64(checksum),
        }

        Ok(())
    }

    /// Encode the end-of-stream frame of a channel
    ///
    /// `sequence` must be the number of data frames the channel carried.
    pub fn encode_end(&self, channel_id: u8, sequence: u32) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len(0));
        // An empty payload never exceeds the maximum
        let _ = self.encode_into(channel_id, sequence, &[], &mut buf);
        buf.freeze()
    }

    /// Encode a complete Frame struct
    pub fn encode_frame(&self, frame: &Frame) -> Result<Bytes, FrameError> {
        self.encode(frame.header.channel_id, frame.header.sequence, &frame.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HEADER_SIZE;

    #[test]
    fn test_encode_simple_frame() {
        let codec = FrameCodec::new(64).unwrap();
        let encoded = codec.encode(1, 5, b"ABCD").unwrap();

        // Check magic
        assert_eq!(&encoded[0..2], &[0xCA, 0xDE]);

        // Check channel id
        assert_eq!(encoded[2], 1);

        // Check sequence (big-endian)
        assert_eq!(&encoded[3..7], &5u32.to_be_bytes());

        // Check length
        assert_eq!(&encoded[7..9], &4u16.to_be_bytes());
        assert_eq!(&encoded[9..13], b"ABCD");
        assert_eq!(encoded.len(), HEADER_SIZE + 4 + 4);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = FrameCodec::new(64).unwrap();
        assert_eq!(
            codec.encode(0, 9, b"same").unwrap(),
            codec.encode(0, 9, b"same").unwrap()
        );
    }

    #[test]
    fn test_encode_payload_too_large() {
        let codec = FrameCodec::new(4).unwrap();
        let result = codec.encode(0, 0, b"ABCDE");
        assert_eq!(result, Err(FrameError::PayloadTooLarge(5, 4)));
    }

    #[test]
    fn test_encode_with_blake3() {
        let codec = FrameCodec::with_checksum(16, ChecksumKind::Blake3).unwrap();
        let encoded = codec.encode(0, 0, b"test").unwrap();

        // Should include the 8-byte truncated BLAKE3 hash at the end
        assert_eq!(encoded.len(), HEADER_SIZE + 4 + 8);
        let hash = blake3::hash(&encoded[2..HEADER_SIZE + 4]);
        let expected = &hash.as_bytes()[..8];
        assert_eq!(&encoded[HEADER_SIZE + 4..], expected);
    }

    #[test]
    fn test_encode_end() {
        let codec = FrameCodec::new(16).unwrap();
        let end = codec.encode_end(2, 11);
        assert_eq!(end.len(), codec.encoded_len(0));
        assert_eq!(&end[7..9], &[0, 0]);
    }
}
