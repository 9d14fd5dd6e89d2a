use super::{load_config, Overrides};
use anyhow::{Context, Result};
use colored::*;

/// List the modem profiles known to the configuration, built-ins included
pub fn execute(config: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config, Overrides::default())?;

    if json {
        let text = serde_json::to_string_pretty(&config.profiles)
            .context("Failed to serialize profile table")?;
        println!("{}", text);
        return Ok(());
    }

    println!("\n=== Modem Profiles ===");
    for (name, profile) in config.profiles.iter() {
        let in_use = config.channel_profiles.iter().any(|p| p == name);
        let marker = if in_use { "*".green() } else { " ".normal() };
        let ofdm = profile
            .subcarriers
            .map(|n| format!(", {} subcarriers", n))
            .unwrap_or_default();
        println!(
            "{} {:<22} {} {}/{} {}-byte frames @ {} Hz{}",
            marker,
            name.bold(),
            profile.modulation,
            profile.inner_fec,
            profile.outer_fec,
            profile.frame_length,
            profile.sample_rate,
            ofdm
        );
    }
    Ok(())
}
