//! Out-of-band loss report produced by the receiver

use crate::channel::{ChannelStats, ResyncEvent};
use serde::Serialize;
use std::fmt;

/// A frame declared permanently lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LossEntry {
    /// Sequence of the lost frame on its channel
    pub sequence: u32,
    /// Channel the frame belonged to
    pub channel_id: u8,
    /// Bytes of gap marker written in its place
    pub lost_bytes: usize,
}

/// Everything the receiver could not recover, plus transfer totals
#[derive(Debug, Clone, Default, Serialize)]
pub struct LossReport {
    /// Frames replaced by gap markers, in output order
    pub gaps: Vec<LossEntry>,
    /// Resynchronizations, per channel in stream order
    pub resyncs: Vec<ResyncEvent>,
    /// Channels that ended in the LOST state
    pub lost_channels: Vec<u8>,
    /// Frames dropped because their slot had already been given up
    pub late_frames: u64,
    /// Payload bytes written to the output (gap markers included)
    pub bytes_out: u64,
    /// Frames whose payload was written
    pub frames_out: u64,
    /// Gap markers written
    pub gap_markers: u64,
    /// An end-of-stream frame bounded the output
    pub end_confirmed: bool,
    /// The transfer was cancelled before completion
    pub cancelled: bool,
    /// Per-channel counters
    pub channels: Vec<ChannelStats>,
}

/// Consecutive lost sequences on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossRun {
    /// Channel
    pub channel_id: u8,
    /// First lost sequence
    pub first_sequence: u32,
    /// Number of frames in the run
    pub frames: u32,
    /// Total gap bytes
    pub lost_bytes: usize,
}

impl fmt::Display for LossRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} lost {} bytes at sequence {}",
            self.channel_id, self.lost_bytes, self.first_sequence
        )?;
        if self.frames > 1 {
            write!(f, " ({} frames)", self.frames)?;
        }
        Ok(())
    }
}

impl LossReport {
    /// True when every frame was delivered
    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty() && self.lost_channels.is_empty()
    }

    /// Total bytes replaced by gap markers
    pub fn lost_bytes(&self) -> usize {
        self.gaps.iter().map(|g| g.lost_bytes).sum()
    }

    /// Merge consecutive lost sequences of the same channel
    pub fn runs(&self) -> Vec<LossRun> {
        let mut per_channel: Vec<LossEntry> = self.gaps.clone();
        per_channel.sort_by_key(|g| (g.channel_id, g.sequence));

        let mut runs: Vec<LossRun> = Vec::new();
        for gap in per_channel {
            match runs.last_mut() {
                Some(run)
                    if run.channel_id == gap.channel_id
                        && run.first_sequence as u64 + run.frames as u64 == gap.sequence as u64 =>
                {
                    run.frames += 1;
                    run.lost_bytes += gap.lost_bytes;
                }
                _ => runs.push(LossRun {
                    channel_id: gap.channel_id,
                    first_sequence: gap.sequence,
                    frames: 1,
                    lost_bytes: gap.lost_bytes,
                }),
            }
        }
        runs
    }
}
