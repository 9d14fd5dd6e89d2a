//! Splitting one byte stream across N framed sub-channels.
//!
//! The stream is cut into fixed-size chunks which are dealt round-robin over
//! the channels: chunk `k` goes to channel `k % N` as sequence `k / N`. Read
//! back in the same round-robin order, the payloads concatenate to the
//! original stream. Each channel's frames are independent once emitted; no
//! coordination between channels is needed downstream.

use crate::codec::FrameCodec;
use crate::constants::MAX_CHANNELS;
use crate::error::FrameError;
use bytes::{Buf, Bytes, BytesMut};

#[cfg(feature = "logging")]
use tracing::debug;

/// One encoded frame ready for a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Channel index
    pub channel: usize,
    /// Sequence assigned to the frame
    pub sequence: u32,
    /// Encoded frame bytes
    pub bytes: Bytes,
}

/// Streaming demultiplexer
#[derive(Debug)]
pub struct ChannelDemux {
    codec: FrameCodec,
    channels: usize,
    chunk_size: usize,
    next_sequence: Vec<u32>,
    next_channel: usize,
    pending: BytesMut,
    finished: bool,
}

impl ChannelDemux {
    /// Create a demultiplexer over `channels` sub-channels
    pub fn new(codec: FrameCodec, channels: usize, chunk_size: usize) -> Result<Self, FrameError> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(FrameError::InvalidConfig(format!(
                "channel count must be in 1..={}, got {}",
                MAX_CHANNELS, channels
            )));
        }
        if chunk_size == 0 || chunk_size > codec.max_payload() {
            return Err(FrameError::InvalidConfig(format!(
                "chunk size must be in 1..={}, got {}",
                codec.max_payload(),
                chunk_size
            )));
        }

        Ok(Self {
            codec,
            channels,
            chunk_size,
            next_sequence: vec![0; channels],
            next_channel: 0,
            pending: BytesMut::with_capacity(chunk_size),
            finished: false,
        })
    }

    /// Number of sub-channels
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Payload bytes per frame
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Feed stream bytes, returning every frame that became complete
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Outgoing>, FrameError> {
        if self.finished {
            return Err(FrameError::InvalidConfig(
                "push after finish".to_string(),
            ));
        }

        self.pending.extend_from_slice(data);
        let mut out = Vec::with_capacity(self.pending.len() / self.chunk_size);
        while self.pending.len() >= self.chunk_size {
            let chunk = self.pending.split_to(self.chunk_size);
            out.push(self.emit(&chunk)?);
        }
        Ok(out)
    }

    /// Flush the trailing short chunk and emit one end-of-stream frame per channel
    pub fn finish(&mut self) -> Result<Vec<Outgoing>, FrameError> {
        if self.finished {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(self.channels + 1);
        if self.pending.has_remaining() {
            let chunk = self.pending.split();
            out.push(self.emit(&chunk)?);
        }

        for channel in 0..self.channels {
            let sequence = self.next_sequence[channel];
            out.push(Outgoing {
                channel,
                sequence,
                bytes: self.codec.encode_end(channel as u8, sequence),
            });
        }

        self.finished = true;

        #[cfg(feature = "logging")]
        debug!(
            "Demux finished: {:?} data frames per channel",
            self.next_sequence
        );

        Ok(out)
    }

    /// Frames emitted so far on each channel
    pub fn frames_per_channel(&self) -> &[u32] {
        &self.next_sequence
    }

    fn emit(&mut self, chunk: &[u8]) -> Result<Outgoing, FrameError> {
        let channel = self.next_channel;
        let sequence = self.next_sequence[channel];
        let bytes = self.codec.encode(channel as u8, sequence, chunk)?;

        self.next_sequence[channel] += 1;
        self.next_channel = (channel + 1) % self.channels;

        Ok(Outgoing {
            channel,
            sequence,
            bytes,
        })
    }
}

/// Split a complete buffer into `channels` wire streams, end-of-stream frames included
pub fn split_stream(
    data: &[u8],
    codec: FrameCodec,
    channels: usize,
    chunk_size: usize,
) -> Result<Vec<Bytes>, FrameError> {
    let mut demux = ChannelDemux::new(codec, channels, chunk_size)?;
    let mut lanes: Vec<BytesMut> = (0..channels).map(|_| BytesMut::new()).collect();

    let mut frames = demux.push(data)?;
    frames.extend(demux.finish()?);
    for frame in frames {
        lanes[frame.channel].extend_from_slice(&frame.bytes);
    }

    Ok(lanes.into_iter().map(|b| b.freeze()).collect())
}
