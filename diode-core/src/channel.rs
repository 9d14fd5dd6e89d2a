//! Per-channel receive state machine
//!
//! A [`ChannelReader`] turns the raw decoded byte stream of one sub-channel
//! into an ordered queue of frames. Its states:
//!
//! ```text
//! SYNCED --(decode failure)--> SCANNING --(valid frame found)--> SYNCED
//!                              SCANNING --(scan window exhausted)--> LOST
//! ```
//!
//! `LOST` is terminal: the channel contributes no further frames and later
//! bytes are counted and dropped.

use crate::codec::FrameCodec;
use crate::constants::LEAD_IN_END;
use crate::scanner::{estimate_loss, ResyncScanner, ScanResult};
use crate::types::Frame;
use bytes::{Buf, BytesMut};
use serde::Serialize;
use std::collections::VecDeque;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// Receive-side synchronization state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Frames decode at the expected offsets
    Synced,
    /// Searching for the next valid frame
    Scanning,
    /// Desynchronized for good
    Lost,
}

/// One completed resynchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResyncEvent {
    /// Channel that lost alignment
    pub channel: u8,
    /// Channel byte offset where decoding failed
    pub offset: u64,
    /// Bytes skipped before the next valid frame
    pub skipped: usize,
    /// Estimated bytes dropped by the modem stage at this point
    pub estimated_lost: usize,
    /// Sequence that was expected at the failure point
    pub expected_sequence: u32,
    /// Sequence of the frame decoding resumed at
    pub resumed_sequence: u32,
}

/// Counters for one channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Raw bytes received
    pub bytes_in: u64,
    /// Frames decoded and queued (end-of-stream frame excluded)
    pub frames_decoded: u64,
    /// Bytes skipped while scanning
    pub bytes_skipped: u64,
    /// Bytes dropped after the channel ended or was lost
    pub bytes_dropped: u64,
    /// Lead-in bytes stripped
    pub lead_in_bytes: u64,
    /// Frames dropped because their sequence was not new
    pub duplicate_frames: u64,
    /// Frames dropped because they carried another channel's id
    pub foreign_frames: u64,
}

/// Receive-side state of one sub-channel
#[derive(Debug)]
pub struct ChannelReader {
    id: u8,
    codec: FrameCodec,
    scanner: ResyncScanner,
    full_frame_len: usize,
    buf: BytesMut,
    consumed: u64,
    state: SyncState,
    awaiting_lead_in: bool,
    scan_from: usize,
    scan_skipped: usize,
    scan_started_at: u64,
    expected_sequence: u32,
    last_sequence: Option<u32>,
    end_sequence: Option<u32>,
    closed: bool,
    frames: VecDeque<Frame>,
    resyncs: Vec<ResyncEvent>,
    stats: ChannelStats,
}

impl ChannelReader {
    /// Create a reader for channel `id`
    ///
    /// `chunk_size` is the transport's fixed payload size, used to size the
    /// frames missed during a resync. With `expect_lead_in`, leading zero
    /// bytes and one `0xFF` are stripped before the first frame.
    pub fn new(id: u8, codec: FrameCodec, scanner: ResyncScanner, chunk_size: usize, expect_lead_in: bool) -> Self {
        Self {
            id,
            codec,
            scanner,
            full_frame_len: codec.encoded_len(chunk_size),
            buf: BytesMut::new(),
            consumed: 0,
            state: SyncState::Synced,
            awaiting_lead_in: expect_lead_in,
            scan_from: 0,
            scan_skipped: 0,
            scan_started_at: 0,
            expected_sequence: 0,
            last_sequence: None,
            end_sequence: None,
            closed: false,
            frames: VecDeque::new(),
            resyncs: Vec::new(),
            stats: ChannelStats::default(),
        }
    }

    /// Channel id
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Current synchronization state
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Feed raw decoded bytes from the modem stage
    pub fn push(&mut self, data: &[u8]) {
        self.stats.bytes_in += data.len() as u64;
        if self.closed {
            self.stats.bytes_dropped += data.len() as u64;
            return;
        }
        self.buf.extend_from_slice(data);
        self.process();
    }

    /// Mark end of input; buffered bytes that never formed a frame are dropped
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.buf.is_empty() {
            #[cfg(feature = "logging")]
            debug!(
                "ch{}: dropping {} trailing bytes at close ({:?})",
                self.id,
                self.buf.len(),
                self.state
            );

            self.stats.bytes_dropped += self.buf.len() as u64;
            self.advance(self.buf.len());
        }
    }

    /// Sequence of the next queued frame
    pub fn front_sequence(&self) -> Option<u32> {
        self.frames.front().map(Frame::sequence)
    }

    /// Take the next queued frame
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Number of frames waiting in the queue
    pub fn queued(&self) -> usize {
        self.frames.len()
    }

    /// Highest data sequence decoded so far
    pub fn last_sequence(&self) -> Option<u32> {
        self.last_sequence
    }

    /// Sequence carried by the end-of-stream frame, once seen
    pub fn end_sequence(&self) -> Option<u32> {
        self.end_sequence
    }

    /// True once input has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True when no frame beyond those already queued can arrive
    pub fn is_exhausted(&self) -> bool {
        self.closed || self.state == SyncState::Lost || self.end_sequence.is_some()
    }

    /// Drain the resync events recorded since the last call
    pub fn take_resyncs(&mut self) -> Vec<ResyncEvent> {
        std::mem::take(&mut self.resyncs)
    }

    /// Channel counters
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    fn advance(&mut self, n: usize) {
        self.buf.advance(n);
        self.consumed += n as u64;
    }

    fn process(&mut self) {
        loop {
            if self.end_sequence.is_some() || self.state == SyncState::Lost {
                // Lead-out padding or bytes of a dead channel
                self.stats.bytes_dropped += self.buf.len() as u64;
                self.advance(self.buf.len());
                return;
            }

            if self.awaiting_lead_in && !self.strip_lead_in() {
                return;
            }

            match self.state {
                SyncState::Synced => match self.codec.try_decode(&self.buf) {
                    Ok((frame, size)) => {
                        self.advance(size);
                        self.accept(frame);
                    }
                    Err(e) if e.needs_more_input() => return,
                    Err(_e) => {
                        #[cfg(feature = "logging")]
                        debug!(
                            "ch{}: decode failed at offset {} expecting seq {}: {}",
                            self.id, self.consumed, self.expected_sequence, _e
                        );

                        self.state = SyncState::Scanning;
                        self.scan_from = 1;
                        self.scan_skipped = 0;
                        self.scan_started_at = self.consumed;
                    }
                },
                SyncState::Scanning => {
                    match self.scanner.scan(&self.buf, self.scan_from, self.scan_skipped) {
                        ScanResult::Found {
                            offset,
                            frame,
                            size,
                        } => {
                            self.skip(offset);
                            self.record_resync(frame.sequence());
                            self.state = SyncState::Synced;
                            self.advance(size);
                            self.accept(frame);
                        }
                        ScanResult::Pending { discard } => {
                            self.skip(discard);
                            self.scan_from = 0;
                            return;
                        }
                        ScanResult::Exhausted { discard } => {
                            self.skip(discard);

                            #[cfg(feature = "logging")]
                            warn!(
                                "ch{}: no valid frame within {} bytes of offset {}; channel lost",
                                self.id,
                                self.scanner.window(),
                                self.scan_started_at
                            );

                            self.state = SyncState::Lost;
                        }
                    }
                }
                SyncState::Lost => return,
            }
        }
    }

    /// Strip zero lead-in bytes and the terminating 0xFF; false if more input is needed
    fn strip_lead_in(&mut self) -> bool {
        let zeros = self.buf.iter().take_while(|&&b| b == 0).count();
        self.stats.lead_in_bytes += zeros as u64;
        self.advance(zeros);

        if self.buf.is_empty() {
            return false;
        }
        if self.buf[0] == LEAD_IN_END {
            self.stats.lead_in_bytes += 1;
            self.advance(1);
        }
        self.awaiting_lead_in = false;
        true
    }

    fn skip(&mut self, n: usize) {
        self.scan_skipped += n;
        self.stats.bytes_skipped += n as u64;
        self.advance(n);
    }

    fn record_resync(&mut self, resumed_sequence: u32) {
        let estimated_lost = estimate_loss(
            self.expected_sequence,
            resumed_sequence,
            self.scan_skipped,
            self.full_frame_len,
        );

        #[cfg(feature = "logging")]
        debug!(
            "ch{}: resynced at seq {} after skipping {} bytes (~{} bytes lost)",
            self.id, resumed_sequence, self.scan_skipped, estimated_lost
        );

        self.resyncs.push(ResyncEvent {
            channel: self.id,
            offset: self.scan_started_at,
            skipped: self.scan_skipped,
            estimated_lost,
            expected_sequence: self.expected_sequence,
            resumed_sequence,
        });
    }

    fn accept(&mut self, frame: Frame) {
        if frame.channel_id() != self.id {
            #[cfg(feature = "logging")]
            warn!(
                "ch{}: dropping frame carrying channel id {}",
                self.id,
                frame.channel_id()
            );

            self.stats.foreign_frames += 1;
            return;
        }

        if self.last_sequence.is_some_and(|last| frame.sequence() <= last) {
            self.stats.duplicate_frames += 1;
            return;
        }

        if frame.is_end() {
            #[cfg(feature = "logging")]
            debug!("ch{}: end of stream at seq {}", self.id, frame.sequence());

            self.end_sequence = Some(frame.sequence());
            return;
        }

        self.last_sequence = Some(frame.sequence());
        self.expected_sequence = frame.sequence().saturating_add(1);
        self.stats.frames_decoded += 1;
        self.frames.push_back(frame);
    }
}
