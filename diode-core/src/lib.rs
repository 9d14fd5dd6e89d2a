//! # Diode Core
//!
//! Multi-channel framing, interleaving and resynchronization for one-way, lossy transfers.
//!
//! A byte stream is cut into chunks and dealt round-robin over N independent
//! sub-channels, each carrying self-delimiting, checksummed frames. The receiver
//! decodes every channel on its own, resynchronizes after byte loss, and
//! reassembles the stream in order, marking whatever could not be recovered.
//!
//! ## Modules
//!
//! - `constants`: Frame format constants, limits and defaults
//! - `types`: Core types (Frame, FrameHeader)
//! - `error`: Decode and transport errors
//! - `codec`, `encoder`, `decoder`: Frame serialization
//! - `scanner`: Resynchronization scanning and capture inspection
//! - `demux`: Splitting a stream across channels
//! - `channel`: Per-channel receive state machine
//! - `mux`: Ordered reassembly with wait and loss policies
//! - `report`: Loss report
//! - `config`, `profile`: Transport configuration and modem presets
//! - `pcm`: Sample interleaving for the modem stage
//! - `pipeline`: Threaded transmit and receive drivers

#![warn(missing_docs)]

pub mod channel;
pub mod codec;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod demux;
pub mod encoder;
pub mod error;
pub mod mux;
pub mod pcm;
pub mod pipeline;
pub mod profile;
pub mod report;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use channel::{ChannelReader, ResyncEvent, SyncState};
pub use codec::FrameCodec;
pub use config::TransportConfig;
pub use constants::ChecksumKind;
pub use demux::{split_stream, ChannelDemux};
pub use error::{DecodeError, FrameError};
pub use mux::{ChannelMux, LossPolicy, MuxConfig, Released, WaitPolicy};
pub use pipeline::{receive, transmit, Cancel};
pub use report::{LossEntry, LossReport};
pub use scanner::{scan_capture, ResyncScanner, ScanResult};
pub use types::{Frame, FrameHeader};

/// Result type alias for diode operations
pub type Result<T> = core::result::Result<T, FrameError>;
