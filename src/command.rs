//! Commands pushed by the server over the stream socket.
//!
//! Two JSON shapes are accepted:
//! - an array of `{"red", "green", "blue"}` objects repaints the LED panel;
//! - an object with `energy_threshold` and/or `zcr_threshold` retunes the
//!   classifier on the fly.
//!
//! The listener runs on its own thread and only touches the shared
//! [`Thresholds`] atomics and the [`LedPanel`] mutex.

use crate::audio::Thresholds;
use crate::indicator::{LedPanel, Rgb};
use crate::log_debug;
use serde::Deserialize;
use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

const LISTENER_POLL: Duration = Duration::from_millis(200);
const MAX_COMMAND_BYTES: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ServerCommand {
    Leds(Vec<Rgb>),
    Thresholds(ThresholdUpdate),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub energy_threshold: Option<i64>,
    #[serde(default)]
    pub zcr_threshold: Option<i64>,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty command datagram")]
    Empty,

    #[error("invalid command payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse one datagram. Trailing NULs and whitespace are tolerated since
/// some senders pad their buffers.
pub fn parse_command(payload: &[u8]) -> Result<ServerCommand, CommandError> {
    let end = payload
        .iter()
        .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let trimmed = &payload[..end];
    if trimmed.is_empty() {
        return Err(CommandError::Empty);
    }
    Ok(serde_json::from_slice(trimmed)?)
}

/// Applies parsed commands to the shared state.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    thresholds: Thresholds,
    leds: LedPanel,
}

impl CommandHandler {
    pub fn new(thresholds: Thresholds, leds: LedPanel) -> Self {
        Self { thresholds, leds }
    }

    pub fn apply(&self, command: &ServerCommand) {
        match command {
            ServerCommand::Leds(colors) => self.leds.show(colors),
            ServerCommand::Thresholds(update) => {
                if let Some(energy) = update.energy_threshold {
                    self.thresholds.set_energy_threshold(energy);
                }
                if let Some(zcr) = update.zcr_threshold {
                    self.thresholds.set_zcr_threshold(zcr);
                }
                tracing::info!(
                    energy_threshold = self.thresholds.energy(),
                    zcr_threshold = self.thresholds.zcr(),
                    "thresholds_updated"
                );
            }
        }
    }

    pub fn handle_datagram(&self, payload: &[u8]) -> Result<ServerCommand, CommandError> {
        let command = parse_command(payload)?;
        self.apply(&command);
        Ok(command)
    }
}

/// Receive commands on `socket` until `stop` is set.
pub fn spawn_command_listener(
    socket: UdpSocket,
    handler: CommandHandler,
    stop: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    socket.set_read_timeout(Some(LISTENER_POLL))?;
    thread::Builder::new()
        .name("voxstream-commands".to_string())
        .spawn(move || {
            let mut buf = [0u8; MAX_COMMAND_BYTES];
            while !stop.load(Ordering::Relaxed) {
                match socket.recv(&mut buf) {
                    Ok(len) => match handler.handle_datagram(&buf[..len]) {
                        Ok(command) => log_debug(&format!("server command applied: {command:?}")),
                        Err(err) => {
                            log_debug(&format!("server command ignored: {err}"));
                            tracing::warn!(error = %err, "command_rejected");
                        }
                    },
                    Err(err)
                        if matches!(
                            err.kind(),
                            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                        ) => {}
                    Err(err) => {
                        // Connected UDP sockets surface ICMP errors here; keep listening.
                        log_debug(&format!("command socket error: {err}"));
                        thread::sleep(LISTENER_POLL);
                    }
                }
            }
        })
}
