//! Resynchronization scanning for damaged or shifted channel streams

use crate::codec::FrameCodec;
use crate::constants::FRAME_MAGIC;
use crate::types::Frame;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// A frame found at a specific offset in the stream
#[derive(Debug, Clone)]
pub struct LocatedFrame {
    /// Byte offset where the frame magic was found
    pub offset: usize,

    /// The decoded frame
    pub frame: Frame,

    /// Total size of the frame in bytes
    pub size: usize,
}

/// Outcome of one resync attempt over the buffered bytes of a channel
#[derive(Debug, Clone)]
pub enum ScanResult {
    /// A validated frame starts at `offset`; everything before it is skipped
    Found {
        /// Bytes skipped before the frame
        offset: usize,
        /// The frame found there
        frame: Frame,
        /// Wire size of the frame
        size: usize,
    },

    /// No validated frame yet; the first `discard` bytes can never start one
    Pending {
        /// Bytes ruled out
        discard: usize,
    },

    /// The scan window was exceeded without finding a validated frame
    Exhausted {
        /// Bytes ruled out
        discard: usize,
    },
}

/// Searches a channel buffer for the next frame that passes its checksum
///
/// A magic match alone is never trusted: the candidate must decode with a valid
/// checksum. A candidate that is merely truncated is kept until more bytes
/// arrive, unless a later candidate validates first.
#[derive(Debug, Clone, Copy)]
pub struct ResyncScanner {
    codec: FrameCodec,
    window: usize,
}

impl ResyncScanner {
    /// Create a scanner that gives up after skipping `window` bytes
    pub fn new(codec: FrameCodec, window: usize) -> Self {
        Self { codec, window }
    }

    /// Scan window in bytes
    pub fn window(&self) -> usize {
        self.window
    }

    /// Scan `buf` for a validated frame starting at or after `from`
    ///
    /// `already_skipped` is the number of bytes discarded earlier in the same
    /// scanning episode; it counts against the window.
    pub fn scan(&self, buf: &[u8], from: usize, already_skipped: usize) -> ScanResult {
        let mut pos = from.min(buf.len());
        let mut first_truncated: Option<usize> = None;

        while let Some(rel) = find_magic(&buf[pos..]) {
            let candidate = pos + rel;
            if already_skipped + candidate > self.window {
                break;
            }

            match self.codec.try_decode(&buf[candidate..]) {
                Ok((frame, size)) => {
                    #[cfg(feature = "logging")]
                    debug!(
                        "Resync: frame ch{} seq {} validated after skipping {} bytes",
                        frame.channel_id(),
                        frame.sequence(),
                        already_skipped + candidate
                    );

                    return ScanResult::Found {
                        offset: candidate,
                        frame,
                        size,
                    };
                }
                Err(e) if e.needs_more_input() => {
                    #[cfg(feature = "logging")]
                    trace!("Resync: candidate at {} is truncated", candidate);

                    first_truncated.get_or_insert(candidate);
                }
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    trace!("Resync: rejected candidate at {}: {}", candidate, _e);
                }
            }

            pos = candidate + 1;
        }

        // Keep a trailing partial magic (or the earliest truncated candidate)
        let tail_keep = FRAME_MAGIC.len() - 1;
        let discard = match first_truncated {
            Some(at) => at,
            None => buf.len().saturating_sub(tail_keep).max(from).min(buf.len()),
        };

        if already_skipped + discard > self.window {
            ScanResult::Exhausted { discard }
        } else {
            ScanResult::Pending { discard }
        }
    }
}

/// Estimate how many bytes a channel lost between an expected frame and the frame
/// that was found after skipping `skipped` bytes
///
/// Assumes every missed frame had the full size `frame_len`.
pub fn estimate_loss(expected_sequence: u32, found_sequence: u32, skipped: usize, frame_len: usize) -> usize {
    let missed = found_sequence.saturating_sub(expected_sequence) as usize;
    (missed * frame_len).saturating_sub(skipped)
}

/// Find the next occurrence of the frame magic
fn find_magic(data: &[u8]) -> Option<usize> {
    if data.len() < FRAME_MAGIC.len() {
        return None;
    }
    memchr::memmem::find(data, FRAME_MAGIC)
}

/// Scan a whole capture for valid frames, even if it is damaged
///
/// This function:
/// 1. Searches for the frame magic
/// 2. Attempts to decode a frame at each potential position
/// 3. Collects successfully validated frames and jumps past them
pub fn scan_capture(codec: &FrameCodec, data: &[u8]) -> Vec<LocatedFrame> {
    scan_capture_with_stats(codec, data).0
}

/// Scan statistics
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Total bytes scanned
    pub bytes_scanned: usize,

    /// Number of valid frames found
    pub frames_found: usize,

    /// Number of potential magics found
    pub markers_found: usize,

    /// Number of decode failures
    pub decode_failures: usize,

    /// Total bytes recovered (sum of all valid frame sizes)
    pub bytes_recovered: usize,
}

impl ScanStats {
    /// Calculate recovery rate as a percentage
    pub fn recovery_rate(&self) -> f64 {
        if self.bytes_scanned == 0 {
            0.0
        } else {
            (self.bytes_recovered as f64 / self.bytes_scanned as f64) * 100.0
        }
    }
}

/// Scan a capture with statistics
pub fn scan_capture_with_stats(codec: &FrameCodec, data: &[u8]) -> (Vec<LocatedFrame>, ScanStats) {
    let mut stats = ScanStats {
        bytes_scanned: data.len(),
        ..Default::default()
    };

    #[cfg(feature = "logging")]
    debug!("Starting capture scan of {} bytes", data.len());

    let mut results = Vec::new();
    let mut pos = 0;

    while let Some(rel) = find_magic(&data[pos..]) {
        let at = pos + rel;
        stats.markers_found += 1;

        match codec.try_decode(&data[at..]) {
            Ok((frame, size)) => {
                stats.bytes_recovered += size;
                pos = at + size;
                results.push(LocatedFrame {
                    offset: at,
                    frame,
                    size,
                });
            }
            Err(_) => {
                stats.decode_failures += 1;
                pos = at + 1;
            }
        }
    }

    stats.frames_found = results.len();

    #[cfg(feature = "logging")]
    debug!(
        "Scan complete: found {} valid frames out of {} bytes scanned",
        stats.frames_found, stats.bytes_scanned
    );

    (results, stats)
}
