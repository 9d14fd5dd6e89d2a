//! External modem processes, one per channel

use anyhow::{anyhow, Context, Result};
use diode_core::TransportConfig;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Which half of the modem to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Bytes in, samples out
    Encoder,
    /// Samples in, bytes out
    Decoder,
}

/// A running modem child with piped stdin and stdout
///
/// The child is killed if it is still running when this is dropped.
pub struct ModemProcess {
    channel: usize,
    child: Child,
}

impl ModemProcess {
    /// Start the configured encoder or decoder for `channel`
    pub fn spawn(config: &TransportConfig, role: Role, channel: usize) -> Result<Self> {
        let (profile, _) = config.channel_profile(channel)?;
        let (program, args) = match role {
            Role::Encoder => (&config.modem.encoder, config.modem.encoder_args_for(profile)),
            Role::Decoder => (&config.modem.decoder, config.modem.decoder_args_for(profile)),
        };
        debug!("ch{}: starting {} {:?}", channel, program, args);

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start modem for channel {}: {}", channel, program))?;
        Ok(Self { channel, child })
    }

    /// Start one process per configured channel
    pub fn spawn_all(config: &TransportConfig, role: Role) -> Result<Vec<Self>> {
        (0..config.channels)
            .map(|channel| Self::spawn(config, role, channel))
            .collect()
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("modem stdin for channel {} already taken", self.channel))
    }

    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("modem stdout for channel {} already taken", self.channel))
    }

    /// Wait for the child to exit; its stdin should be closed first
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .wait()
            .with_context(|| format!("Failed to wait for modem on channel {}", self.channel))?;
        if !status.success() {
            warn!("ch{}: modem exited with {}", self.channel, status);
        }
        Ok(status)
    }
}

impl Drop for ModemProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
