use super::modem::{ModemProcess, Role};
use super::{create_output, load_config, open_input, spinner, Overrides, ProgressReader};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use diode_core::pcm::PcmInterleaver;
use diode_core::{transmit, Cancel, FrameError};
use std::io::{ErrorKind, Read, Write};
use std::process::ChildStdout;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

const READ_CHUNK: usize = 16 * 1024;

/// Frame `input`, drive one encoder per channel and write the interleaved samples to `output`
pub fn execute(input: &str, output: &str, config: Option<&str>, cancel: &Cancel) -> Result<()> {
    let config = load_config(config, Overrides::default())?;
    info!(
        "Sending over {} channels with {} (sample width {})",
        config.channels, config.modem.encoder, config.sample_width
    );

    let mut modems = ModemProcess::spawn_all(&config, Role::Encoder)?;
    let mut stdins = Vec::with_capacity(modems.len());
    let mut stdouts = Vec::with_capacity(modems.len());
    for modem in &mut modems {
        stdins.push(modem.take_stdin()?);
        stdouts.push(modem.take_stdout()?);
    }

    let emitter = spawn_emitter(
        stdouts,
        create_output(output)?,
        config.sample_width,
        config.queue_depth,
    )?;

    let bar = spinner("sending");
    let reader = ProgressReader::new(open_input(input)?, bar.clone());
    // The returned sinks are dropped right away, closing every encoder's input
    let sent = transmit(reader, &config, stdins, cancel).map(|(stats, _)| stats);
    bar.finish_and_clear();

    let emitted = emitter
        .join()
        .map_err(|_| anyhow!("sample writer panicked"))?;
    for modem in &mut modems {
        modem.wait()?;
    }

    let stats = sent?;
    let samples_out = emitted?;
    if stats.cancelled {
        return Err(FrameError::Cancelled.into());
    }

    info!(
        "Sent {} bytes as {:?} frames per channel, {} bytes of samples",
        stats.bytes_in, stats.frames_per_channel, samples_out
    );
    Ok(())
}

fn spawn_emitter(
    stdouts: Vec<ChildStdout>,
    out: Box<dyn Write + Send>,
    sample_width: usize,
    depth: usize,
) -> Result<JoinHandle<Result<u64>>> {
    let mut receivers = Vec::with_capacity(stdouts.len());
    for (channel, stdout) in stdouts.into_iter().enumerate() {
        let (tx, rx) = bounded::<Bytes>(depth);
        thread::Builder::new()
            .name(format!("diode-pcm-{}", channel))
            .spawn(move || pump(channel, stdout, tx))?;
        receivers.push(rx);
    }

    let handle = thread::Builder::new()
        .name("diode-pcm-out".to_string())
        .spawn(move || interleave(receivers, out, sample_width))?;
    Ok(handle)
}

fn pump<R: Read>(channel: usize, mut source: R, tx: Sender<Bytes>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match source.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("ch{}: reading encoder output failed: {}", channel, e);
                return;
            }
        }
    }
}

/// Output advances at the pace of the open channel with the least buffered samples
fn interleave(
    receivers: Vec<Receiver<Bytes>>,
    mut out: Box<dyn Write + Send>,
    sample_width: usize,
) -> Result<u64> {
    let mut pcm = PcmInterleaver::new(receivers.len(), sample_width)?;
    let mut written = 0u64;

    while let Some(channel) = pcm.next_wanted() {
        match receivers[channel].recv() {
            Ok(samples) => pcm.push(channel, &samples),
            Err(_) => pcm.close(channel),
        }
        if let Some(mixed) = pcm.pop_ready() {
            out.write_all(&mixed)?;
            written += mixed.len() as u64;
        }
    }

    let tail = pcm.finish();
    out.write_all(&tail)?;
    out.flush()?;
    Ok(written + tail.len() as u64)
}
