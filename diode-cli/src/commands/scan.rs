use super::{load_config, open_input, Overrides};
use anyhow::{Context, Result};
use diode_core::scanner::scan_capture_with_stats;
use serde::Serialize;
use std::io::Read;
use tracing::info;

const PREVIEW_BYTES: usize = 16;

#[derive(Serialize)]
struct FoundFrame {
    offset: usize,
    channel_id: u8,
    sequence: u32,
    length: u16,
    size: usize,
    end: bool,
    preview: String,
}

/// Inspect a raw channel capture: list every frame with a valid checksum
pub fn execute(input: &str, config: Option<&str>, json: bool, stats_only: bool) -> Result<()> {
    info!("Scanning capture: {}", input);

    let config = load_config(config, Overrides::default())?;
    let codec = config.codec()?;

    let mut data = Vec::new();
    open_input(input)?
        .read_to_end(&mut data)
        .with_context(|| format!("Failed to read input file: {}", input))?;

    let (located, stats) = scan_capture_with_stats(&codec, &data);

    let found: Vec<FoundFrame> = located
        .iter()
        .map(|lf| FoundFrame {
            offset: lf.offset,
            channel_id: lf.frame.channel_id(),
            sequence: lf.frame.sequence(),
            length: lf.frame.header.length,
            size: lf.size,
            end: lf.frame.is_end(),
            preview: hex::encode(&lf.frame.payload[..lf.frame.payload.len().min(PREVIEW_BYTES)]),
        })
        .collect();

    if json {
        let frames = if stats_only { Vec::new() } else { found };
        let doc = serde_json::json!({
            "bytes_scanned": stats.bytes_scanned,
            "markers_found": stats.markers_found,
            "frames_found": stats.frames_found,
            "decode_failures": stats.decode_failures,
            "bytes_recovered": stats.bytes_recovered,
            "frames": frames,
        });
        let text = serde_json::to_string_pretty(&doc).context("Failed to serialize scan results")?;
        println!("{}", text);
        return Ok(());
    }

    println!("\n=== Scan Results ===");
    println!("Bytes scanned:     {} bytes", stats.bytes_scanned);
    println!("Markers found:     {}", stats.markers_found);
    println!("Valid frames:      {}", stats.frames_found);
    println!("Decode failures:   {}", stats.decode_failures);
    println!("Bytes recovered:   {} bytes", stats.bytes_recovered);
    println!("Recovery rate:     {:.2}%", stats.recovery_rate());
    println!();

    if stats_only {
        return Ok(());
    }

    println!("=== Frames ===");
    for frame in &found {
        if frame.end {
            println!(
                "ch{} end after {} frames @ offset {}",
                frame.channel_id, frame.sequence, frame.offset
            );
        } else {
            println!(
                "ch{} seq {} @ offset {}: {} bytes  {}",
                frame.channel_id, frame.sequence, frame.offset, frame.length, frame.preview
            );
        }
    }
    Ok(())
}
