//! Interleaving of per-channel modem sample streams
//!
//! Each modem instance produces a mono stream of fixed-width samples. The
//! carrier takes one N-channel stream where frame `i` holds sample `i` of every
//! channel in channel order.

use crate::error::FrameError;
use bytes::{BufMut, Bytes, BytesMut};

fn check(channels: usize, sample_width: usize) -> Result<(), FrameError> {
    if channels == 0 {
        return Err(FrameError::InvalidConfig("PCM needs at least one channel".to_string()));
    }
    if sample_width == 0 {
        return Err(FrameError::InvalidConfig("sample width must be positive".to_string()));
    }
    Ok(())
}

/// Send side: merges N mono sample streams
#[derive(Debug)]
pub struct PcmInterleaver {
    sample_width: usize,
    buffers: Vec<BytesMut>,
    closed: Vec<bool>,
}

impl PcmInterleaver {
    /// Create an interleaver over `channels` streams of `sample_width`-byte samples
    pub fn new(channels: usize, sample_width: usize) -> Result<Self, FrameError> {
        check(channels, sample_width)?;
        Ok(Self {
            sample_width,
            buffers: (0..channels).map(|_| BytesMut::new()).collect(),
            closed: vec![false; channels],
        })
    }

    /// Buffer samples of one channel
    pub fn push(&mut self, channel: usize, data: &[u8]) {
        self.buffers[channel].extend_from_slice(data);
    }

    /// Bytes buffered for one channel
    pub fn buffered(&self, channel: usize) -> usize {
        self.buffers[channel].len()
    }

    /// Mark the end of one channel's samples
    pub fn close(&mut self, channel: usize) {
        self.closed[channel] = true;
    }

    /// The open channel with the fewest buffered bytes, which output is waiting on
    pub fn next_wanted(&self) -> Option<usize> {
        self.buffers
            .iter()
            .enumerate()
            .filter(|(c, _)| !self.closed[*c])
            .min_by_key(|(_, b)| b.len())
            .map(|(c, _)| c)
    }

    /// Interleave every sample available on all channels
    pub fn pop_ready(&mut self) -> Option<Bytes> {
        let samples = self
            .buffers
            .iter()
            .map(|b| b.len() / self.sample_width)
            .min()
            .unwrap_or(0);
        if samples == 0 {
            return None;
        }
        Some(self.interleave(samples))
    }

    /// Interleave what is left, padding short channels with silence
    pub fn finish(&mut self) -> Bytes {
        let samples = self
            .buffers
            .iter()
            .map(|b| b.len().div_ceil(self.sample_width))
            .max()
            .unwrap_or(0);
        for buf in &mut self.buffers {
            buf.resize(samples * self.sample_width, 0);
        }
        self.interleave(samples)
    }

    fn interleave(&mut self, samples: usize) -> Bytes {
        let w = self.sample_width;
        let taken: Vec<BytesMut> = self
            .buffers
            .iter_mut()
            .map(|b| b.split_to(samples * w))
            .collect();

        let mut out = BytesMut::with_capacity(samples * w * taken.len());
        for i in 0..samples {
            for chan in &taken {
                out.put_slice(&chan[i * w..(i + 1) * w]);
            }
        }
        out.freeze()
    }
}

/// Receive side: splits an N-channel sample stream back into mono streams
#[derive(Debug)]
pub struct PcmSplitter {
    channels: usize,
    sample_width: usize,
    rem: BytesMut,
}

impl PcmSplitter {
    /// Create a splitter for `channels` interleaved streams
    pub fn new(channels: usize, sample_width: usize) -> Result<Self, FrameError> {
        check(channels, sample_width)?;
        Ok(Self {
            channels,
            sample_width,
            rem: BytesMut::new(),
        })
    }

    /// Split the complete sample frames of `data`; a partial frame is carried over
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.rem.extend_from_slice(data);
        let frame = self.channels * self.sample_width;
        let frames = self.rem.len() / frame;
        let whole = self.rem.split_to(frames * frame);

        let w = self.sample_width;
        let mut outs: Vec<BytesMut> = (0..self.channels)
            .map(|_| BytesMut::with_capacity(frames * w))
            .collect();
        for sample in whole.chunks_exact(frame) {
            for (c, out) in outs.iter_mut().enumerate() {
                out.put_slice(&sample[c * w..(c + 1) * w]);
            }
        }
        outs.into_iter().map(BytesMut::freeze).collect()
    }

    /// Bytes of an incomplete sample frame held back
    pub fn pending(&self) -> usize {
        self.rem.len()
    }
}
