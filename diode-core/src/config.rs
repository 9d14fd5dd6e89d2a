//! Transport configuration
//!
//! Parsed from TOML into [`TransportConfigInput`], where every key is optional,
//! then resolved into a validated [`TransportConfig`].

use crate::codec::FrameCodec;
use crate::constants::{
    ChecksumKind, DEFAULT_CHANNELS, DEFAULT_CHUNK_SIZE, DEFAULT_LEAD_IN, DEFAULT_LEAD_OUT,
    DEFAULT_PROFILE, DEFAULT_QUEUE_DEPTH, DEFAULT_SAMPLE_WIDTH, DEFAULT_SCAN_WINDOW_FRAMES,
    DEFAULT_STALL_TIMEOUT_MS, MAX_CHANNELS, MAX_PAYLOAD_LIMIT,
};
use crate::demux::ChannelDemux;
use crate::error::FrameError;
use crate::mux::{LossPolicy, MuxConfig, WaitPolicy};
use crate::profile::{ModemProfile, ProfileTable};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Placeholder replaced by the channel's profile name in modem arguments
pub const PROFILE_PLACEHOLDER: &str = "{profile}";

/// Raw config file contents; keys mirror [`TransportConfig`]
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfigInput {
    pub channels: Option<usize>,
    pub chunk_size: Option<usize>,
    pub max_payload: Option<usize>,
    pub checksum: Option<ChecksumKind>,
    pub scan_window: Option<usize>,
    pub loss_policy: Option<LossPolicy>,
    pub gap_fill: Option<u8>,
    pub wait: Option<WaitPolicy>,
    pub stall_timeout_ms: Option<u64>,
    pub lead_in: Option<usize>,
    pub lead_out: Option<usize>,
    pub queue_depth: Option<usize>,
    pub sample_width: Option<usize>,
    pub channel_profiles: Vec<String>,
    pub modem: ModemConfigInput,
    pub profiles: BTreeMap<String, ModemProfile>,
}

/// Raw `[modem]` table
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModemConfigInput {
    pub encoder: Option<String>,
    pub encoder_args: Option<Vec<String>>,
    pub decoder: Option<String>,
    pub decoder_args: Option<Vec<String>>,
}

/// External modem programs, one instance per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemConfig {
    /// Encoder program (bytes on stdin, samples on stdout)
    pub encoder: String,
    /// Encoder arguments
    pub encoder_args: Vec<String>,
    /// Decoder program (samples on stdin, bytes on stdout)
    pub decoder: String,
    /// Decoder arguments
    pub decoder_args: Vec<String>,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            encoder: "quiet-encode".to_string(),
            encoder_args: vec![PROFILE_PLACEHOLDER.to_string()],
            decoder: "quiet-decode".to_string(),
            decoder_args: vec![PROFILE_PLACEHOLDER.to_string(), "/dev/stdin".to_string()],
        }
    }
}

impl ModemConfig {
    /// Encoder arguments for a channel running `profile`
    pub fn encoder_args_for(&self, profile: &str) -> Vec<String> {
        substitute(&self.encoder_args, profile)
    }

    /// Decoder arguments for a channel running `profile`
    pub fn decoder_args_for(&self, profile: &str) -> Vec<String> {
        substitute(&self.decoder_args, profile)
    }
}

fn substitute(args: &[String], profile: &str) -> Vec<String> {
    args.iter()
        .map(|arg| arg.replace(PROFILE_PLACEHOLDER, profile))
        .collect()
}

/// Validated transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Number of sub-channels
    pub channels: usize,
    /// Payload bytes per frame
    pub chunk_size: usize,
    /// Largest payload the codec accepts
    pub max_payload: usize,
    /// Frame checksum
    pub checksum: ChecksumKind,
    /// Bytes a channel may skip while resynchronizing
    pub scan_window: usize,
    /// Loss policy
    pub loss_policy: LossPolicy,
    /// Gap marker fill byte
    pub gap_fill: u8,
    /// Wait policy
    pub wait: WaitPolicy,
    /// `None` disables the wall-clock stall release
    pub stall_timeout: Option<Duration>,
    /// Zero bytes written before a channel's first frame
    pub lead_in: usize,
    /// Zero bytes written after a channel's end-of-stream frame
    pub lead_out: usize,
    /// Depth of the per-channel queues
    pub queue_depth: usize,
    /// Bytes per PCM sample
    pub sample_width: usize,
    /// Profile name of each channel
    pub channel_profiles: Vec<String>,
    /// Modem programs
    pub modem: ModemConfig,
    /// Known modem profiles
    pub profiles: ProfileTable,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let codec = FrameCodec::default();
        Self {
            channels: DEFAULT_CHANNELS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_payload: DEFAULT_CHUNK_SIZE,
            checksum: ChecksumKind::default(),
            scan_window: DEFAULT_SCAN_WINDOW_FRAMES * codec.encoded_len(DEFAULT_CHUNK_SIZE),
            loss_policy: LossPolicy::default(),
            gap_fill: 0,
            wait: WaitPolicy::default(),
            stall_timeout: Some(Duration::from_millis(DEFAULT_STALL_TIMEOUT_MS)),
            lead_in: DEFAULT_LEAD_IN,
            lead_out: DEFAULT_LEAD_OUT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            sample_width: DEFAULT_SAMPLE_WIDTH,
            channel_profiles: vec![DEFAULT_PROFILE.to_string(); DEFAULT_CHANNELS],
            modem: ModemConfig::default(),
            profiles: ProfileTable::builtin(),
        }
    }
}

fn invalid(msg: String) -> FrameError {
    FrameError::InvalidConfig(msg)
}

impl TransportConfigInput {
    /// Parse a TOML document without validating it
    pub fn from_toml_str(input: &str) -> Result<Self, FrameError> {
        toml::from_str(input).map_err(|e| invalid(format!("Invalid config TOML: {}", e)))
    }

    /// Read a TOML file without validating it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply defaults and validate
    pub fn resolve(self) -> Result<TransportConfig, FrameError> {
        let channels = self.channels.unwrap_or(DEFAULT_CHANNELS);
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(invalid(format!(
                "channels must be in 1..={}, got {}",
                MAX_CHANNELS, channels
            )));
        }

        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(invalid("chunk_size must be positive".to_string()));
        }

        let max_payload = self.max_payload.unwrap_or(chunk_size);
        if max_payload > MAX_PAYLOAD_LIMIT {
            return Err(invalid(format!(
                "max_payload {} exceeds {}",
                max_payload, MAX_PAYLOAD_LIMIT
            )));
        }
        if chunk_size > max_payload {
            return Err(invalid(format!(
                "chunk_size {} exceeds max_payload {}",
                chunk_size, max_payload
            )));
        }

        let checksum = self.checksum.unwrap_or_default();
        let codec = FrameCodec::with_checksum(max_payload, checksum)?;

        let sample_width = self.sample_width.unwrap_or(DEFAULT_SAMPLE_WIDTH);
        if sample_width == 0 {
            return Err(invalid("sample_width must be positive".to_string()));
        }

        let mut profiles = ProfileTable::builtin();
        for (name, profile) in self.profiles {
            profiles.insert(name, profile);
        }

        let channel_profiles = match self.channel_profiles.len() {
            0 => vec![DEFAULT_PROFILE.to_string(); channels],
            1 => vec![self.channel_profiles[0].clone(); channels],
            n if n == channels => self.channel_profiles,
            n => {
                return Err(invalid(format!(
                    "channel_profiles lists {} profiles for {} channels",
                    n, channels
                )))
            }
        };
        for name in &channel_profiles {
            profiles.get(name)?;
        }

        let defaults = ModemConfig::default();
        let modem = ModemConfig {
            encoder: self.modem.encoder.unwrap_or(defaults.encoder),
            encoder_args: self.modem.encoder_args.unwrap_or(defaults.encoder_args),
            decoder: self.modem.decoder.unwrap_or(defaults.decoder),
            decoder_args: self.modem.decoder_args.unwrap_or(defaults.decoder_args),
        };

        Ok(TransportConfig {
            channels,
            chunk_size,
            max_payload,
            checksum,
            scan_window: self
                .scan_window
                .unwrap_or(DEFAULT_SCAN_WINDOW_FRAMES * codec.encoded_len(chunk_size)),
            loss_policy: self.loss_policy.unwrap_or_default(),
            gap_fill: self.gap_fill.unwrap_or(0),
            wait: self.wait.unwrap_or_default(),
            stall_timeout: match self.stall_timeout_ms.unwrap_or(DEFAULT_STALL_TIMEOUT_MS) {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            lead_in: self.lead_in.unwrap_or(DEFAULT_LEAD_IN),
            lead_out: self.lead_out.unwrap_or(DEFAULT_LEAD_OUT),
            queue_depth: self.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH).max(1),
            sample_width,
            channel_profiles,
            modem,
            profiles,
        })
    }
}

impl TransportConfig {
    /// Parse a TOML document; an empty document yields the defaults
    pub fn from_toml_str(input: &str) -> Result<Self, FrameError> {
        if input.trim().is_empty() {
            return Ok(TransportConfig::default());
        }
        TransportConfigInput::from_toml_str(input)?.resolve()
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Frame codec for this transport
    pub fn codec(&self) -> Result<FrameCodec, FrameError> {
        FrameCodec::with_checksum(self.max_payload, self.checksum)
    }

    /// Sender-side demultiplexer
    pub fn demux(&self) -> Result<ChannelDemux, FrameError> {
        ChannelDemux::new(self.codec()?, self.channels, self.chunk_size)
    }

    /// Receiver-side mux parameters
    pub fn mux_config(&self) -> Result<MuxConfig, FrameError> {
        Ok(MuxConfig {
            codec: self.codec()?,
            channels: self.channels,
            chunk_size: self.chunk_size,
            scan_window: self.scan_window,
            loss_policy: self.loss_policy,
            wait: self.wait,
            gap_fill: self.gap_fill,
            expect_lead_in: self.lead_in > 0,
        })
    }

    /// Profile name and parameters of one channel
    pub fn channel_profile(&self, channel: usize) -> Result<(&str, &ModemProfile), FrameError> {
        let name = self
            .channel_profiles
            .get(channel)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PROFILE);
        Ok((name, self.profiles.get(name)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let cfg = TransportConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.channels, 2);
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.wait, WaitPolicy::MaxLag(16));
        assert_eq!(cfg.stall_timeout, Some(Duration::from_secs(10)));
        assert_eq!(cfg.scan_window, 4 * (9 + 1024 + 4));
        assert_eq!(cfg.channel_profiles, vec![DEFAULT_PROFILE; 2]);
    }

    #[test]
    fn parse_toml_config_full() {
        let toml = r#"
            channels = 4
            chunk_size = 512
            max_payload = 2048
            checksum = "blake3"
            loss_policy = "abort"
            gap_fill = 255
            wait = "unbounded"
            stall_timeout_ms = 0
            lead_in = 0
            channel_profiles = ["audible", "audible", "custom", "audible"]

            [modem]
            encoder = "/opt/modem/enc"
            encoder_args = ["--profile", "{profile}"]

            [profiles.custom]
            modulation = "bpsk"
            checksum = "crc32"
            inner_fec = "v27"
            outer_fec = "none"
            frame_length = 256
            sample_rate = 48000
        "#;

        let cfg = TransportConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.channels, 4);
        assert_eq!(cfg.max_payload, 2048);
        assert_eq!(cfg.checksum, ChecksumKind::Blake3);
        assert_eq!(cfg.loss_policy, LossPolicy::Abort);
        assert_eq!(cfg.gap_fill, 0xFF);
        assert_eq!(cfg.wait, WaitPolicy::Unbounded);
        assert!(cfg.stall_timeout.is_none());
        assert_eq!(cfg.modem.encoder_args_for("custom"), vec!["--profile", "custom"]);
        assert_eq!(cfg.modem.decoder, "quiet-decode");
        assert_eq!(cfg.channel_profile(2).unwrap().1.sample_rate, 48000);
        assert!(!cfg.mux_config().unwrap().expect_lead_in);
        assert_eq!(cfg.codec().unwrap().checksum_len(), 8);
    }

    #[test]
    fn parse_max_lag() {
        let cfg = TransportConfig::from_toml_str("wait = { max-lag = 3 }").unwrap();
        assert_eq!(cfg.wait, WaitPolicy::MaxLag(3));
    }

    #[test]
    fn single_profile_applies_to_all_channels() {
        let cfg = TransportConfig::from_toml_str("channels = 3\nchannel_profiles = [\"audible\"]").unwrap();
        assert_eq!(cfg.channel_profiles, vec!["audible"; 3]);
    }

    #[test]
    fn rejects_invalid_values() {
        for bad in [
            "channels = 0",
            "channels = 257",
            "chunk_size = 0",
            "chunk_size = 100\nmax_payload = 50",
            "max_payload = 70000",
            "sample_width = 0",
            "channels = 3\nchannel_profiles = [\"audible\", \"audible\"]",
            "unknown_key = 1",
        ] {
            assert!(
                matches!(
                    TransportConfig::from_toml_str(bad),
                    Err(FrameError::InvalidConfig(_))
                ),
                "accepted: {}",
                bad
            );
        }
    }

    #[test]
    fn rejects_unknown_profile() {
        let err = TransportConfig::from_toml_str("channel_profiles = [\"nope\"]").unwrap_err();
        assert_eq!(err, FrameError::UnknownProfile("nope".to_string()));
    }
}
