//! Named modem presets
//!
//! The modem stage is an external program; a profile only names the parameter
//! set it should run with. Built-in presets can be extended or overridden by
//! the `[profiles.<name>]` tables of a config file.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of one modem preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemProfile {
    /// Modulation scheme
    pub modulation: String,
    /// Modem-level checksum scheme
    pub checksum: String,
    /// Inner forward error correction
    pub inner_fec: String,
    /// Outer forward error correction
    pub outer_fec: String,
    /// Modem frame length in bytes
    pub frame_length: usize,
    /// OFDM subcarrier count, if the profile uses OFDM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcarriers: Option<u32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl ModemProfile {
    fn preset(
        modulation: &str,
        inner_fec: &str,
        outer_fec: &str,
        frame_length: usize,
        subcarriers: Option<u32>,
    ) -> Self {
        Self {
            modulation: modulation.to_string(),
            checksum: "crc32".to_string(),
            inner_fec: inner_fec.to_string(),
            outer_fec: outer_fec.to_string(),
            frame_length,
            subcarriers,
            sample_rate: 44_100,
        }
    }
}

/// Lookup table of profiles by name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ProfileTable {
    profiles: BTreeMap<String, ModemProfile>,
}

impl ProfileTable {
    /// Built-in presets
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "audible".to_string(),
            ModemProfile::preset("gmsk", "v29", "rs8", 100, None),
        );
        profiles.insert(
            "audible-7k-channel-0".to_string(),
            ModemProfile::preset("arb16opt", "v29", "rs8", 600, Some(48)),
        );
        profiles.insert(
            "audible-7k-channel-1".to_string(),
            ModemProfile::preset("arb16opt", "v29", "rs8", 600, Some(48)),
        );
        profiles.insert(
            "ultrasonic".to_string(),
            ModemProfile::preset("gmsk", "v29", "rs8", 75, None),
        );
        profiles.insert(
            "cable-64k".to_string(),
            ModemProfile::preset("qam1024", "v27p23", "rs8", 7500, Some(128)),
        );
        Self { profiles }
    }

    /// Add or replace a profile
    pub fn insert(&mut self, name: impl Into<String>, profile: ModemProfile) {
        self.profiles.insert(name.into(), profile);
    }

    /// Look up a profile by name
    pub fn get(&self, name: &str) -> Result<&ModemProfile, FrameError> {
        self.profiles
            .get(name)
            .ok_or_else(|| FrameError::UnknownProfile(name.to_string()))
    }

    /// True if a profile of that name exists
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Profiles in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModemProfile)> {
        self.profiles.iter().map(|(name, p)| (name.as_str(), p))
    }

    /// Number of profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True if the table is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
