use anyhow::Result;
use clap::{Parser, Subcommand};
use diode_cli::commands::{self, Overrides};
use diode_core::Cancel;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "diode")]
#[command(about = "Diode - Multi-channel framing for one-way audio transfers", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Transport configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Frame input, modulate each channel and write interleaved samples
    Send {
        /// Input file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Output sample stream, or - for stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },

    /// Demodulate an interleaved sample capture and reassemble the stream
    Recv {
        /// Sample capture, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Output file, or - for stdout
        #[arg(short, long, default_value = "-")]
        output: String,

        /// Write the loss report as JSON
        #[arg(long)]
        report: Option<String>,
    },

    /// Split input into per-channel framed files without modems
    Frame {
        /// Input file, or - for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Output prefix; channel c is written to <TAG>c
        #[arg(short, long)]
        tag: String,

        /// Number of channels
        #[arg(short = 'n', long)]
        channels: Option<usize>,

        /// Payload bytes per frame
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Reassemble per-channel framed files
    Unframe {
        /// Input prefix; channel c is read from <TAG>c
        #[arg(short, long)]
        tag: String,

        /// Output file, or - for stdout
        #[arg(short, long, default_value = "-")]
        output: String,

        /// Number of channels
        #[arg(short = 'n', long)]
        channels: Option<usize>,

        /// Payload bytes per frame
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Write the loss report as JSON
        #[arg(long)]
        report: Option<String>,
    },

    /// List the frames found in a raw channel capture
    Scan {
        /// Input file to scan, or - for stdin
        #[arg(short, long)]
        input: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Show statistics only
        #[arg(long)]
        stats_only: bool,
    },

    /// List available modem profiles
    Profiles {
        /// Print the profile table as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout may carry data
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cancel = Cancel::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, stopping");
        on_signal.cancel();
    })?;

    let config = cli.config.as_deref();

    // Execute command
    match cli.command {
        Commands::Send { input, output } => commands::send::execute(&input, &output, config, &cancel),

        Commands::Recv {
            input,
            output,
            report,
        } => commands::recv::execute(&input, &output, config, report.as_deref(), &cancel),

        Commands::Frame {
            input,
            tag,
            channels,
            chunk_size,
        } => commands::frame::execute(
            &input,
            &tag,
            Overrides {
                channels,
                chunk_size,
            },
            config,
            &cancel,
        ),

        Commands::Unframe {
            tag,
            output,
            channels,
            chunk_size,
            report,
        } => commands::unframe::execute(
            &tag,
            &output,
            Overrides {
                channels,
                chunk_size,
            },
            config,
            report.as_deref(),
            &cancel,
        ),

        Commands::Scan {
            input,
            json,
            stats_only,
        } => commands::scan::execute(&input, config, json, stats_only),

        Commands::Profiles { json } => commands::profiles::execute(config, json),
    }
}
