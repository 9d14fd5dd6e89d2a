use super::modem::{ModemProcess, Role};
use super::{create_output, load_config, open_input, print_report, write_report, Overrides};
use anyhow::{Context, Result};
use diode_core::pcm::PcmSplitter;
use diode_core::{receive, Cancel, FrameError};
use std::io::{ErrorKind, Read, Write};
use std::process::ChildStdin;
use std::thread;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 16 * 1024;

/// Split captured samples over one decoder per channel and reassemble their output
pub fn execute(
    input: &str,
    output: &str,
    config: Option<&str>,
    report: Option<&str>,
    cancel: &Cancel,
) -> Result<()> {
    let config = load_config(config, Overrides::default())?;
    info!(
        "Receiving {} channels with {} (sample width {})",
        config.channels, config.modem.decoder, config.sample_width
    );

    let mut modems = ModemProcess::spawn_all(&config, Role::Decoder)?;
    let mut stdins = Vec::with_capacity(modems.len());
    let mut stdouts = Vec::with_capacity(modems.len());
    for modem in &mut modems {
        stdins.push(modem.take_stdin()?);
        stdouts.push(modem.take_stdout()?);
    }

    let splitter = PcmSplitter::new(config.channels, config.sample_width)?;
    spawn_splitter(open_input(input)?, stdins, splitter)?;

    let mut out = create_output(output)?;
    let result = receive(stdouts, &config, &mut out, cancel);

    // Decoders may still be listening once every end frame has arrived
    drop(modems);

    let loss = result.context("Receive aborted")?;
    print_report(&loss);
    if let Some(path) = report {
        write_report(&loss, path)?;
        info!("Loss report written to: {}", path);
    }
    if loss.cancelled {
        return Err(FrameError::Cancelled.into());
    }
    Ok(())
}

/// Detached: the capture may block on a read long after the transfer is over
fn spawn_splitter(
    mut input: Box<dyn Read + Send>,
    sinks: Vec<ChildStdin>,
    mut splitter: PcmSplitter,
) -> Result<()> {
    let mut sinks: Vec<Option<ChildStdin>> = sinks.into_iter().map(Some).collect();
    thread::Builder::new()
        .name("diode-pcm-split".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Reading samples failed: {}", e);
                        break;
                    }
                };
                for (channel, samples) in splitter.push(&buf[..n]).iter().enumerate() {
                    let Some(sink) = sinks[channel].as_mut() else {
                        continue;
                    };
                    if let Err(e) = sink.write_all(samples) {
                        debug!("ch{}: decoder input closed: {}", channel, e);
                        sinks[channel] = None;
                    }
                }
                if sinks.iter().all(Option::is_none) {
                    break;
                }
            }
            if splitter.pending() > 0 {
                debug!("Dropping {} bytes of a partial sample frame", splitter.pending());
            }
        })?;
    Ok(())
}
