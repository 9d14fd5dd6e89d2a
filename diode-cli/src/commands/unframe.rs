use super::frame::channel_path;
use super::{create_output, load_config, print_report, write_report, Overrides};
use anyhow::{Context, Result};
use diode_core::{receive, Cancel, FrameError, WaitPolicy};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

/// Reassemble the per-channel files `<tag>0` .. `<tag>N-1` into `output`
pub fn execute(
    tag: &str,
    output: &str,
    overrides: Overrides,
    config: Option<&str>,
    report: Option<&str>,
    cancel: &Cancel,
) -> Result<()> {
    let mut config = load_config(config, overrides)?;
    // Files are complete up front; a lagging channel only means a slower reader thread
    config.wait = WaitPolicy::Unbounded;
    config.stall_timeout = None;

    let mut sources = Vec::with_capacity(config.channels);
    for channel in 0..config.channels {
        let path = channel_path(tag, channel);
        let file = File::open(&path).with_context(|| format!("Failed to open channel file: {}", path))?;
        sources.push(BufReader::new(file));
    }
    info!("Reassembling {} channels into {}", config.channels, output);

    let mut out = create_output(output)?;
    let loss = receive(sources, &config, &mut out, cancel).context("Reassembly aborted")?;

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
