//! Threaded transmit and receive drivers
//!
//! Transmit: the calling thread reads the input and runs the [`ChannelDemux`];
//! one writer thread per channel drains a bounded queue into that channel's
//! sink. Receive: one reader thread per channel forwards raw chunks through a
//! bounded queue to the calling thread, which owns the [`ChannelMux`] and is
//! the only writer of the output.

use crate::config::TransportConfig;
use crate::constants::LEAD_IN_END;
use crate::demux::{ChannelDemux, Outgoing};
use crate::error::FrameError;
use crate::mux::ChannelMux;
use crate::report::LossReport;
use bytes::Bytes;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::Serialize;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "logging")]
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 4096;
const TICK: Duration = Duration::from_millis(20);

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    /// A flag that is not set
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sender-side totals
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransmitStats {
    /// Input bytes read
    pub bytes_in: u64,
    /// Data frames produced on each channel
    pub frames_per_channel: Vec<u32>,
    /// Bytes written to each channel, lead-in and lead-out included
    pub bytes_out: Vec<u64>,
    /// Input was not read to the end
    pub cancelled: bool,
}

fn spawn_writer<W: Write + Send + 'static>(
    channel: usize,
    mut sink: W,
    lead_in: usize,
    lead_out: usize,
    depth: usize,
) -> Result<(Sender<Bytes>, thread::JoinHandle<io::Result<(W, u64)>>), FrameError> {
    let (tx, rx) = bounded::<Bytes>(depth);
    let handle = thread::Builder::new()
        .name(format!("diode-tx-{}", channel))
        .spawn(move || {
            let mut written = 0u64;
            if lead_in > 0 {
                let mut preamble = vec![0u8; lead_in];
                preamble.push(LEAD_IN_END);
                sink.write_all(&preamble)?;
                written += preamble.len() as u64;
            }
            for frame in rx {
                sink.write_all(&frame)?;
                written += frame.len() as u64;
            }
            sink.write_all(&vec![0u8; lead_out])?;
            written += lead_out as u64;
            sink.flush()?;
            Ok((sink, written))
        })?;
    Ok((tx, handle))
}

/// Split `input` over the channel sinks, returning the sinks once every frame is written
///
/// `sinks` must hold one writer per configured channel. On cancellation the
/// channels are closed without end-of-stream frames.
pub fn transmit<R, W>(
    mut input: R,
    config: &TransportConfig,
    sinks: Vec<W>,
    cancel: &Cancel,
) -> Result<(TransmitStats, Vec<W>), FrameError>
where
    R: Read,
    W: Write + Send + 'static,
{
    if sinks.len() != config.channels {
        return Err(FrameError::InvalidConfig(format!(
            "{} sinks for {} channels",
            sinks.len(),
            config.channels
        )));
    }

    let mut demux = config.demux()?;
    let mut senders = Vec::with_capacity(config.channels);
    let mut handles = Vec::with_capacity(config.channels);
    for (channel, sink) in sinks.into_iter().enumerate() {
        let (tx, handle) = spawn_writer(
            channel,
            sink,
            config.lead_in,
            config.lead_out,
            config.queue_depth,
        )?;
        senders.push(tx);
        handles.push(handle);
    }

    #[cfg(feature = "logging")]
    info!(
        "Transmitting over {} channels ({}-byte chunks)",
        config.channels, config.chunk_size
    );

    let mut stats = TransmitStats::default();
    let fed = feed_demux(&mut input, &mut demux, &senders, cancel, &mut stats);

    // Closing the queues lets the writers emit their lead-out and exit
    drop(senders);

    let mut sinks = Vec::with_capacity(handles.len());
    let mut write_error = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok((sink, written))) => {
                stats.bytes_out.push(written);
                sinks.push(sink);
            }
            Ok(Err(e)) => {
                write_error.get_or_insert(FrameError::from(e));
            }
            Err(_) => {
                write_error.get_or_insert(FrameError::Io("channel writer panicked".to_string()));
            }
        }
    }

    // A failed writer also makes the feed fail; report the writer's error
    if let Some(e) = write_error {
        return Err(e);
    }
    fed?;

    stats.frames_per_channel = demux.frames_per_channel().to_vec();

    #[cfg(feature = "logging")]
    debug!("Transmit complete: {:?}", stats);

    Ok((stats, sinks))
}

fn feed_demux<R: Read>(
    input: &mut R,
    demux: &mut ChannelDemux,
    senders: &[Sender<Bytes>],
    cancel: &Cancel,
    stats: &mut TransmitStats,
) -> Result<(), FrameError> {
    let send = |frames: Vec<Outgoing>| -> Result<(), FrameError> {
        for out in frames {
            senders[out.channel].send(out.bytes).map_err(|_| {
                FrameError::Io(format!("channel {} writer stopped", out.channel))
            })?;
        }
        Ok(())
    };

    let mut buf = vec![0u8; demux.chunk_size() * demux.channels()];
    loop {
        if cancel.is_cancelled() {
            #[cfg(feature = "logging")]
            warn!("Transmit cancelled after {} input bytes", stats.bytes_in);

            stats.cancelled = true;
            return Ok(());
        }

        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        stats.bytes_in += n as u64;
        send(demux.push(&buf[..n])?)?;
    }

    send(demux.finish()?)
}

enum ChannelEvent {
    Data(usize, Bytes),
    Closed(usize),
    Failed(usize, io::Error),
}

/// Readers are detached: each exits at end of input or once the mux hangs up
fn spawn_reader<R: Read + Send + 'static>(
    channel: usize,
    mut source: R,
    tx: Sender<ChannelEvent>,
) -> Result<(), FrameError> {
    thread::Builder::new()
        .name(format!("diode-rx-{}", channel))
        .spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let event = match source.read(&mut buf) {
                    Ok(0) => ChannelEvent::Closed(channel),
                    Ok(n) => ChannelEvent::Data(channel, Bytes::copy_from_slice(&buf[..n])),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => ChannelEvent::Failed(channel, e),
                };
                let last = !matches!(event, ChannelEvent::Data(..));
                if tx.send(event).is_err() || last {
                    return;
                }
            }
        })?;
    Ok(())
}

/// Reassemble the channel sources into `output`
///
/// Returns the loss report. Under the abort loss policy the error is returned
/// instead; output written up to that point is flushed and kept either way.
pub fn receive<R, W>(
    sources: Vec<R>,
    config: &TransportConfig,
    output: &mut W,
    cancel: &Cancel,
) -> Result<LossReport, FrameError>
where
    R: Read + Send + 'static,
    W: Write,
{
    if sources.len() != config.channels {
        return Err(FrameError::InvalidConfig(format!(
            "{} sources for {} channels",
            sources.len(),
            config.channels
        )));
    }

    let mut mux = ChannelMux::new(config.mux_config()?)?;
    let (tx, rx) = bounded::<ChannelEvent>(config.queue_depth * config.channels);
    for (channel, source) in sources.into_iter().enumerate() {
        spawn_reader(channel, source, tx.clone())?;
    }
    drop(tx);

    #[cfg(feature = "logging")]
    info!("Receiving on {} channels", config.channels);

    let mut last_input = Instant::now();
    let mut disconnected = false;
    let result = loop {
        if cancel.is_cancelled() {
            #[cfg(feature = "logging")]
            warn!("Receive cancelled; keeping {} bytes already written", mux.report().bytes_out);

            mux.mark_cancelled();
            break Ok(());
        }

        match rx.recv_timeout(TICK) {
            Ok(ChannelEvent::Data(channel, bytes)) => {
                mux.push(channel, &bytes);
                last_input = Instant::now();
            }
            Ok(ChannelEvent::Closed(channel)) => {
                #[cfg(feature = "logging")]
                debug!("ch{}: input closed", channel);

                mux.close(channel);
            }
            Ok(ChannelEvent::Failed(channel, _e)) => {
                #[cfg(feature = "logging")]
                warn!("ch{}: read failed: {}", channel, _e);

                mux.close(channel);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                mux.close_all();
                disconnected = true;
            }
        }

        if let Err(e) = mux.drain_to(output) {
            break Err(e);
        }
        if mux.is_finished() || disconnected {
            break Ok(());
        }

        if let Some(limit) = config.stall_timeout {
            if last_input.elapsed() >= limit {
                if let Err(e) = release_stalled(&mut mux, output) {
                    break Err(e);
                }
                last_input = Instant::now();
            }
        }
    };

    output.flush()?;
    result?;

    let report = mux.into_report();

    #[cfg(feature = "logging")]
    info!(
        "Receive complete: {} bytes out, {} gap markers, {} resyncs",
        report.bytes_out,
        report.gap_markers,
        report.resyncs.len()
    );

    Ok(report)
}

fn release_stalled<W: Write>(mux: &mut ChannelMux, output: &mut W) -> Result<(), FrameError> {
    while let Some(released) = mux.release_stalled()? {
        mux.write_released(&released, output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::{LossPolicy, WaitPolicy};
    use std::io::Cursor;

    fn config(channels: usize, chunk_size: usize) -> TransportConfig {
        TransportConfig {
            channels,
            chunk_size,
            max_payload: chunk_size,
            lead_in: 8,
            lead_out: 16,
            queue_depth: 4,
            // Threads deliver whole lanes at arbitrary relative speeds
            wait: WaitPolicy::Unbounded,
            ..TransportConfig::default()
        }
    }

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    fn send(input: &[u8], cfg: &TransportConfig) -> Vec<Vec<u8>> {
        let sinks = vec![Vec::new(); cfg.channels];
        let (stats, lanes) = transmit(input, cfg, sinks, &Cancel::new()).unwrap();
        assert_eq!(stats.bytes_in, input.len() as u64);
        lanes
    }

    fn recv(lanes: Vec<Vec<u8>>, cfg: &TransportConfig) -> (Vec<u8>, Result<LossReport, FrameError>) {
        let sources: Vec<_> = lanes.into_iter().map(Cursor::new).collect();
        let mut out = Vec::new();
        let result = receive(sources, cfg, &mut out, &Cancel::new());
        (out, result)
    }

    #[test]
    fn test_round_trip() {
        let cfg = config(3, 64);
        let input = data(10_000);
        let lanes = send(&input, &cfg);

        // Lead-in on every channel
        for lane in &lanes {
            assert_eq!(&lane[..9], &[0, 0, 0, 0, 0, 0, 0, 0, 0xFF]);
        }

        let (out, report) = recv(lanes, &cfg);
        let report = report.unwrap();
        assert_eq!(out, input);
        assert!(report.is_clean());
        assert!(report.end_confirmed);
    }

    #[test]
    fn test_round_trip_empty_input() {
        let cfg = config(2, 16);
        let lanes = send(&[], &cfg);
        let (out, report) = recv(lanes, &cfg);
        assert!(out.is_empty());
        assert!(report.unwrap().end_confirmed);
    }

    #[test]
    fn test_damaged_channel_yields_gap() {
        let cfg = config(2, 32);
        let frame_len = cfg.codec().unwrap().encoded_len(32);
        let input = data(32 * 20);
        let mut lanes = send(&input, &cfg);

        // Corrupt the payload of frame 3 on channel 1
        let at = 9 + 3 * frame_len + 12;
        lanes[1][at] ^= 0x40;

        let (out, report) = recv(lanes, &cfg);
        let report = report.unwrap();

        let mut expected = input.clone();
        let slot = 3 * 2 + 1;
        expected[slot * 32..(slot + 1) * 32].fill(0);
        assert_eq!(out, expected);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].sequence, 3);
        assert_eq!(report.gaps[0].channel_id, 1);
        assert_eq!(report.resyncs.len(), 1);
    }

    #[test]
    fn test_abort_keeps_partial_output() {
        let mut cfg = config(2, 32);
        cfg.loss_policy = LossPolicy::Abort;
        let frame_len = cfg.codec().unwrap().encoded_len(32);
        let input = data(32 * 8);
        let mut lanes = send(&input, &cfg);
        lanes[0].drain(9 + frame_len..9 + 2 * frame_len);

        let (out, result) = recv(lanes, &cfg);
        assert_eq!(
            result.unwrap_err(),
            FrameError::SequenceGapUnresolvable {
                channel: 0,
                sequence: 1
            }
        );
        assert_eq!(out, &input[..64]);
    }

    #[test]
    fn test_cancelled_receive() {
        let cfg = config(2, 16);
        let lanes = send(&data(256), &cfg);
        let cancel = Cancel::new();
        cancel.cancel();

        let sources: Vec<_> = lanes.into_iter().map(Cursor::new).collect();
        let mut out = Vec::new();
        let report = receive(sources, &cfg, &mut out, &cancel).unwrap();
        assert!(report.cancelled);
    }

    #[test]
    fn test_cancelled_transmit_has_no_end_frames() {
        let cfg = config(2, 16);
        let cancel = Cancel::new();
        cancel.cancel();

        let (stats, lanes) = transmit(&data(256)[..], &cfg, vec![Vec::<u8>::new(); 2], &cancel).unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.bytes_in, 0);
        for lane in &lanes {
            assert_eq!(lane.len(), 9 + 16);
        }
    }

    #[test]
    fn test_channel_count_mismatch() {
        let cfg = config(3, 16);
        let err = transmit(&b"abc"[..], &cfg, vec![Vec::<u8>::new(); 2], &Cancel::new()).unwrap_err();
        assert!(matches!(err, FrameError::InvalidConfig(_)));
    }

    /// Yields its bytes, then blocks like a decoder listening to silence
    struct LiveSource {
        data: Cursor<Vec<u8>>,
        hold: crossbeam_channel::Receiver<()>,
    }

    impl Read for LiveSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                // Released only when the test drops the sender
                let _ = self.hold.recv();
            }
            Ok(n)
        }
    }

    #[test]
    fn test_stall_ends_stream_with_lost_tail_end_frame() {
        let mut cfg = config(2, 16);
        cfg.wait = WaitPolicy::MaxLag(16);
        cfg.stall_timeout = Some(Duration::from_millis(200));
        let end_len = cfg.codec().unwrap().encoded_len(0);
        let input = data(16 * 20);
        let mut lanes = send(&input, &cfg);

        // Slot 20 would belong to channel 0, whose end frame never arrives
        let keep = lanes[0].len() - cfg.lead_out - end_len;
        lanes[0].truncate(keep);

        let (hold_tx, hold_rx) = bounded::<()>(0);
        let sources: Vec<_> = lanes
            .into_iter()
            .map(|lane| LiveSource {
                data: Cursor::new(lane),
                hold: hold_rx.clone(),
            })
            .collect();

        let (done_tx, done_rx) = bounded(1);
        let recv_cfg = cfg.clone();
        thread::spawn(move || {
            let mut out = Vec::new();
            let result = receive(sources, &recv_cfg, &mut out, &Cancel::new());
            let _ = done_tx.send((out, result));
        });

        let (out, result) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("receive did not end after the stall timeout");
        drop(hold_tx);

        let report = result.unwrap();
        assert_eq!(out, input);
        assert!(report.is_clean());
        assert!(!report.end_confirmed);
    }
}
