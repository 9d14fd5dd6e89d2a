//! Reassembly of N framed sub-channels into the original byte stream
//!
//! Output is released in strict round-robin slot order: slot `k` is frame
//! `k / N` of channel `k % N`. Each channel's frames are buffered by its
//! [`ChannelReader`] until the slot comes up. A slot whose frame can no longer
//! arrive is resolved by the [`LossPolicy`]; a slot whose channel is merely
//! behind is held according to the [`WaitPolicy`].

use crate::channel::{ChannelReader, SyncState};
use crate::codec::FrameCodec;
use crate::constants::{DEFAULT_MAX_LAG, DEFAULT_SCAN_WINDOW_FRAMES, MAX_CHANNELS};
use crate::error::FrameError;
use crate::report::{LossEntry, LossReport};
use crate::scanner::ResyncScanner;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// What to do when a frame is declared permanently lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossPolicy {
    /// Write a `chunk_size` gap marker and keep going
    #[default]
    GapMarker,
    /// Stop the transfer
    Abort,
}

/// How long a missing frame on a live channel may hold back output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitPolicy {
    /// Wait until the frame arrives or its channel ends
    Unbounded,
    /// Give up once any channel is this many sequences ahead of the missing frame
    MaxLag(u32),
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::MaxLag(DEFAULT_MAX_LAG)
    }
}

/// Parameters of a [`ChannelMux`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// Frame codec shared with the sender
    pub codec: FrameCodec,
    /// Number of sub-channels
    pub channels: usize,
    /// Fixed payload size per frame
    pub chunk_size: usize,
    /// Bytes a channel may skip while resynchronizing before it is lost
    pub scan_window: usize,
    /// Loss policy
    pub loss_policy: LossPolicy,
    /// Wait policy
    pub wait: WaitPolicy,
    /// Byte used to fill gap markers
    pub gap_fill: u8,
    /// Strip a zero lead-in before each channel's first frame
    pub expect_lead_in: bool,
}

impl MuxConfig {
    /// Defaults for everything but the stream geometry
    pub fn new(codec: FrameCodec, channels: usize, chunk_size: usize) -> Self {
        Self {
            codec,
            channels,
            chunk_size,
            scan_window: DEFAULT_SCAN_WINDOW_FRAMES * codec.encoded_len(chunk_size),
            loss_policy: LossPolicy::default(),
            wait: WaitPolicy::default(),
            gap_fill: 0,
            expect_lead_in: false,
        }
    }
}

/// One unit of output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Released {
    /// Payload of a delivered frame
    Data {
        /// Channel
        channel: u8,
        /// Sequence
        sequence: u32,
        /// Payload bytes
        payload: Bytes,
    },
    /// Gap marker for a lost frame
    Gap(LossEntry),
}

impl Released {
    /// Bytes this unit occupies in the output
    pub fn len(&self) -> usize {
        match self {
            Released::Data { payload, .. } => payload.len(),
            Released::Gap(entry) => entry.lost_bytes,
        }
    }

    /// True for an empty unit
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-writer reassembler
#[derive(Debug)]
pub struct ChannelMux {
    config: MuxConfig,
    readers: Vec<ChannelReader>,
    next_slot: u64,
    finished: bool,
    report: LossReport,
}

impl ChannelMux {
    /// Create a mux with one reader per channel
    pub fn new(config: MuxConfig) -> Result<Self, FrameError> {
        if config.channels == 0 || config.channels > MAX_CHANNELS {
            return Err(FrameError::InvalidConfig(format!(
                "channel count must be in 1..={}, got {}",
                MAX_CHANNELS, config.channels
            )));
        }
        if config.chunk_size == 0 || config.chunk_size > config.codec.max_payload() {
            return Err(FrameError::InvalidConfig(format!(
                "chunk size must be in 1..={}, got {}",
                config.codec.max_payload(),
                config.chunk_size
            )));
        }

        let scanner = ResyncScanner::new(config.codec, config.scan_window);
        let readers = (0..config.channels)
            .map(|id| {
                ChannelReader::new(
                    id as u8,
                    config.codec,
                    scanner,
                    config.chunk_size,
                    config.expect_lead_in,
                )
            })
            .collect();

        Ok(Self {
            config,
            readers,
            next_slot: 0,
            finished: false,
            report: LossReport::default(),
        })
    }

    /// Mux parameters
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.readers.len()
    }

    /// Reader state of one channel
    pub fn reader(&self, channel: usize) -> &ChannelReader {
        &self.readers[channel]
    }

    /// Feed decoded bytes of one channel
    pub fn push(&mut self, channel: usize, data: &[u8]) {
        let reader = &mut self.readers[channel];
        reader.push(data);
        self.report.resyncs.extend(reader.take_resyncs());
    }

    /// Mark end of input on one channel
    pub fn close(&mut self, channel: usize) {
        self.readers[channel].close();
    }

    /// Mark end of input on every channel
    pub fn close_all(&mut self) {
        for reader in &mut self.readers {
            reader.close();
        }
    }

    /// Channel and sequence of the next slot to be released
    pub fn next_slot(&self) -> (usize, u32) {
        self.slot_position(self.next_slot)
    }

    /// True once the end of the stream has been released
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Record that the transfer was cancelled
    pub fn mark_cancelled(&mut self) {
        self.report.cancelled = true;
    }

    /// Release the next unit of output, if it can be decided now
    pub fn pop_ready(&mut self) -> Result<Option<Released>, FrameError> {
        if self.finished {
            return Ok(None);
        }

        let slot = self.next_slot;
        if self.end_upper().is_some_and(|end| slot >= end) {
            self.finish(true);
            return Ok(None);
        }

        let (channel, sequence) = self.slot_position(slot);
        let reader = &mut self.readers[channel];

        // Frames whose slot was already given up
        while reader.front_sequence().is_some_and(|front| front < sequence) {
            reader.pop_frame();
            self.report.late_frames += 1;
        }

        match reader.front_sequence() {
            Some(front) if front == sequence => {
                if let Some(frame) = reader.pop_frame() {
                    self.next_slot += 1;
                    self.report.frames_out += 1;
                    self.report.bytes_out += frame.payload.len() as u64;
                    return Ok(Some(Released::Data {
                        channel: channel as u8,
                        sequence,
                        payload: frame.payload,
                    }));
                }
                Ok(None)
            }
            // The channel already moved past this sequence
            Some(_) => self.declare_lost(channel, sequence),
            None if reader.is_exhausted() => {
                if slot < self.known_extent() {
                    return self.declare_lost(channel, sequence);
                }
                if self.readers.iter().all(ChannelReader::is_exhausted) {
                    self.finish(false);
                }
                Ok(None)
            }
            None => match self.config.wait {
                WaitPolicy::MaxLag(lag) if self.max_lead(sequence) >= u64::from(lag) => {
                    self.declare_lost(channel, sequence)
                }
                _ => Ok(None),
            },
        }
    }

    /// Give up on the slot currently holding back output
    ///
    /// Used when input has stalled. Slots known to lie inside the stream are
    /// given up as lost. Past the last known slot the stream is finished
    /// without a confirmed end, unless nothing has arrived at all yet.
    pub fn release_stalled(&mut self) -> Result<Option<Released>, FrameError> {
        if let Some(released) = self.pop_ready()? {
            return Ok(Some(released));
        }
        if self.finished {
            return Ok(None);
        }
        let extent = self.known_extent();
        if self.next_slot >= extent {
            if extent > 0 || self.end_upper().is_some() {
                #[cfg(feature = "logging")]
                warn!(
                    "Input stalled after slot {}; ending stream unconfirmed",
                    self.next_slot
                );

                self.finish(false);
            }
            return Ok(None);
        }

        let (channel, sequence) = self.slot_position(self.next_slot);

        #[cfg(feature = "logging")]
        warn!("ch{}: seq {} stalled; giving up on it", channel, sequence);

        self.declare_lost(channel, sequence)
    }

    /// Write every unit that can be released now, returning the bytes written
    pub fn drain_to<W: Write>(&mut self, out: &mut W) -> Result<usize, FrameError> {
        let mut written = 0;
        while let Some(released) = self.pop_ready()? {
            written += self.write_released(&released, out)?;
        }
        Ok(written)
    }

    /// Write one released unit
    pub fn write_released<W: Write>(&self, released: &Released, out: &mut W) -> Result<usize, FrameError> {
        match released {
            Released::Data { payload, .. } => out.write_all(payload)?,
            Released::Gap(entry) => out.write_all(&vec![self.config.gap_fill; entry.lost_bytes])?,
        }
        Ok(released.len())
    }

    /// Snapshot of the loss report
    pub fn report(&self) -> LossReport {
        let mut report = self.report.clone();
        report.lost_channels = self
            .readers
            .iter()
            .filter(|r| r.state() == SyncState::Lost)
            .map(ChannelReader::id)
            .collect();
        report.channels = self.readers.iter().map(|r| r.stats().clone()).collect();
        report
    }

    /// Consume the mux, returning the loss report
    pub fn into_report(self) -> LossReport {
        self.report()
    }

    fn slot_position(&self, slot: u64) -> (usize, u32) {
        let n = self.readers.len() as u64;
        ((slot % n) as usize, (slot / n) as u32)
    }

    fn slot_of(&self, channel: usize, sequence: u32) -> u64 {
        u64::from(sequence) * self.readers.len() as u64 + channel as u64
    }

    /// Tightest upper bound on the slot count, from end-of-stream frames
    fn end_upper(&self) -> Option<u64> {
        self.readers
            .iter()
            .enumerate()
            .filter_map(|(c, r)| r.end_sequence().map(|e| self.slot_of(c, e)))
            .min()
    }

    /// Slots known to exist: one past the highest data slot seen or implied
    fn known_extent(&self) -> u64 {
        self.readers
            .iter()
            .enumerate()
            .filter_map(|(c, r)| {
                let seen = r.last_sequence().map(|s| self.slot_of(c, s) + 1);
                let implied = r
                    .end_sequence()
                    .filter(|&e| e > 0)
                    .map(|e| self.slot_of(c, e - 1) + 1);
                seen.max(implied)
            })
            .max()
            .unwrap_or(0)
    }

    /// How far the most advanced channel is beyond `sequence`
    fn max_lead(&self, sequence: u32) -> u64 {
        self.readers
            .iter()
            .filter_map(ChannelReader::last_sequence)
            .map(|s| u64::from(s).saturating_sub(u64::from(sequence)))
            .max()
            .unwrap_or(0)
    }

    fn declare_lost(&mut self, channel: usize, sequence: u32) -> Result<Option<Released>, FrameError> {
        let channel_id = channel as u8;
        let channel_lost = self.readers[channel].state() == SyncState::Lost;

        match self.config.loss_policy {
            LossPolicy::Abort => {
                #[cfg(feature = "logging")]
                warn!("ch{}: seq {} lost; aborting", channel, sequence);

                if channel_lost {
                    Err(FrameError::ChannelLost {
                        channel: channel_id,
                        sequence,
                    })
                } else {
                    Err(FrameError::SequenceGapUnresolvable {
                        channel: channel_id,
                        sequence,
                    })
                }
            }
            LossPolicy::GapMarker => {
                #[cfg(feature = "logging")]
                debug!(
                    "ch{}: seq {} lost; writing {}-byte gap marker",
                    channel, sequence, self.config.chunk_size
                );

                let entry = LossEntry {
                    sequence,
                    channel_id,
                    lost_bytes: self.config.chunk_size,
                };
                self.report.gaps.push(entry);
                self.report.gap_markers += 1;
                self.report.bytes_out += entry.lost_bytes as u64;
                self.next_slot += 1;
                Ok(Some(Released::Gap(entry)))
            }
        }
    }

    fn finish(&mut self, end_confirmed: bool) {
        #[cfg(feature = "logging")]
        debug!(
            "Mux finished after {} slots (end confirmed: {})",
            self.next_slot, end_confirmed
        );

        self.finished = true;
        self.report.end_confirmed = end_confirmed;
    }
}
