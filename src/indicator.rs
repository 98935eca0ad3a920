//! Observable outputs: the streaming activity indicator and the LED panel
//! driven by server commands. Neither feeds back into the stream loop.

use crate::{lock_or_recover, log_debug};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Number of addressable LEDs on the panel.
pub const LED_COUNT: usize = 5;

/// Boolean "currently streaming" output.
pub trait ActivityIndicator {
    fn set_active(&mut self, active: bool);
}

impl<I: ActivityIndicator + ?Sized> ActivityIndicator for Box<I> {
    fn set_active(&mut self, active: bool) {
        (**self).set_active(active)
    }
}

/// Indicator that records transitions in the debug and trace logs.
#[derive(Debug, Default)]
pub struct LogIndicator {
    active: bool,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl ActivityIndicator for LogIndicator {
    fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        let state = if active { "on" } else { "off" };
        log_debug(&format!("activity indicator {state}"));
        tracing::info!(active, "activity_indicator");
    }
}

/// One LED colour. Missing channels in a command default to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    #[serde(default)]
    pub red: u8,
    #[serde(default)]
    pub green: u8,
    #[serde(default)]
    pub blue: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        red: 0,
        green: 0,
        blue: 0,
    };

    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Shared LED panel state; clones refer to the same panel.
#[derive(Debug, Clone, Default)]
pub struct LedPanel {
    colors: Arc<Mutex<[Rgb; LED_COUNT]>>,
}

impl LedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole panel. Entries beyond `LED_COUNT` are ignored and
    /// LEDs without an entry go dark.
    pub fn show(&self, colors: &[Rgb]) {
        let mut next = [Rgb::BLACK; LED_COUNT];
        for (slot, color) in next.iter_mut().zip(colors.iter()) {
            *slot = *color;
        }
        *lock_or_recover(&self.colors, "LedPanel::show") = next;
        log_debug(&format!("led panel updated: {next:?}"));
    }

    pub fn snapshot(&self) -> [Rgb; LED_COUNT] {
        *lock_or_recover(&self.colors, "LedPanel::snapshot")
    }
}
