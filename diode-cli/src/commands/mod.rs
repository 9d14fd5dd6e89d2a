//! Subcommand implementations and the plumbing they share

pub mod frame;
pub mod modem;
pub mod profiles;
pub mod recv;
pub mod scan;
pub mod send;
pub mod unframe;

use anyhow::{Context, Result};
use colored::*;
use diode_core::config::TransportConfigInput;
use diode_core::{LossReport, ResyncEvent, TransportConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::time::Duration;

/// Command-line settings that take precedence over the config file
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub channels: Option<usize>,
    pub chunk_size: Option<usize>,
}

/// Load and validate the transport configuration; no path means defaults
pub fn load_config(path: Option<&str>, overrides: Overrides) -> Result<TransportConfig> {
    let mut input = match path {
        Some(path) => TransportConfigInput::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path))?,
        None => TransportConfigInput::default(),
    };
    if let Some(channels) = overrides.channels {
        input.channels = Some(channels);
    }
    if let Some(chunk_size) = overrides.chunk_size {
        input.chunk_size = Some(chunk_size);
    }
    input.resolve().context("Invalid transport configuration")
}

/// Open a file for reading, `-` meaning stdin
pub fn open_input(path: &str) -> Result<Box<dyn Read + Send>> {
    if path == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Create a file for writing, `-` meaning stdout
pub fn create_output(path: &str) -> Result<Box<dyn Write + Send>> {
    if path == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create output file: {}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Spinner on stderr; hidden when stderr is not a terminal
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {bytes} ({bytes_per_sec})") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Counts bytes read into a progress bar
pub struct ProgressReader<R> {
    inner: R,
    bar: ProgressBar,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, bar: ProgressBar) -> Self {
        Self { inner, bar }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bar.inc(n as u64);
        Ok(n)
    }
}

/// Print a loss report to stderr, which stays free of transferred data
pub fn print_report(report: &LossReport) {
    eprintln!("\n=== Transfer Report ===");
    eprintln!("Bytes written:     {} bytes", report.bytes_out);
    eprintln!("Frames delivered:  {}", report.frames_out);
    if report.gap_markers > 0 {
        eprintln!("Gap markers:       {}", report.gap_markers.to_string().red());
    } else {
        eprintln!("Gap markers:       {}", report.gap_markers);
    }
    eprintln!("Resyncs:           {}", report.resyncs.len());
    eprintln!("Late frames:       {}", report.late_frames);
    if !report.lost_channels.is_empty() {
        eprintln!("Lost channels:     {:?}", report.lost_channels);
    }

    if report.end_confirmed {
        eprintln!("{} End of stream confirmed", "✓".green());
    } else if report.cancelled {
        eprintln!("{} Transfer cancelled", "✗".red());
    } else {
        eprintln!("{} End of stream not confirmed", "✗".yellow());
    }

    let runs = report.runs();
    if !runs.is_empty() {
        eprintln!("\n=== Loss ===");
        for run in runs {
            eprintln!("  {}", run);
        }
    }
    for resync in &report.resyncs {
        eprintln!("  {}", resync_line(resync));
    }
}

fn resync_line(resync: &ResyncEvent) -> String {
    format!(
        "ch{} resynced at sequence {} ({} bytes skipped, ~{} bytes lost)",
        resync.channel, resync.resumed_sequence, resync.skipped, resync.estimated_lost
    )
}

/// Write the loss report as JSON
pub fn write_report(report: &LossReport, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize loss report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report file: {}", path))?;
    Ok(())
}
