use super::{load_config, open_input, spinner, Overrides, ProgressReader};
use anyhow::{Context, Result};
use diode_core::{transmit, Cancel, FrameError};
use std::fs::File;
use std::io::BufWriter;
use tracing::info;

/// Path of the framed stream for one channel
pub fn channel_path(tag: &str, channel: usize) -> String {
    format!("{}{}", tag, channel)
}

/// Split `input` into per-channel framed files `<tag>0` .. `<tag>N-1`, skipping the modems
pub fn execute(
    input: &str,
    tag: &str,
    overrides: Overrides,
    config: Option<&str>,
    cancel: &Cancel,
) -> Result<()> {
    let config = load_config(config, overrides)?;
    info!(
        "Framing {} into {} channels of {}-byte chunks",
        input, config.channels, config.chunk_size
    );

    let mut sinks = Vec::with_capacity(config.channels);
    for channel in 0..config.channels {
        let path = channel_path(tag, channel);
        let file =
            File::create(&path).with_context(|| format!("Failed to create output file: {}", path))?;
        sinks.push(BufWriter::new(file));
    }

    let bar = spinner("framing");
    let reader = ProgressReader::new(open_input(input)?, bar.clone());
    let (stats, _) = transmit(reader, &config, sinks, cancel)?;
    bar.finish_and_clear();

    if stats.cancelled {
        return Err(FrameError::Cancelled.into());
    }

    println!("\n=== Framing Results ===");
    println!("Bytes in:          {} bytes", stats.bytes_in);
    for (channel, (frames, bytes)) in stats
        .frames_per_channel
        .iter()
        .zip(&stats.bytes_out)
        .enumerate()
    {
        println!(
            "  {}: {} frames, {} bytes",
            channel_path(tag, channel),
            frames,
            bytes
        );
    }
    Ok(())
}
