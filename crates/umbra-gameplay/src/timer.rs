//! Countdown timers driving every ability and attack cooldown.
//!
//! A [`Cooldown`] is pure timing arithmetic: it never errors, only reports
//! state. Owners gate re-entry with [`Cooldown::is_ready`] before calling
//! [`Cooldown::start`] again.

use serde::{Deserialize, Serialize};

/// A one-shot countdown with progress reporting.
///
/// `is_ready` is false exactly while a countdown is in flight and flips back
/// to true exactly once, on the tick that completes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cooldown {
    /// Duration of the current (or last) countdown in seconds.
    duration: f32,
    /// Time elapsed since `start`.
    elapsed: f32,
    /// Whether a countdown is in flight.
    running: bool,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new()
    }
}

impl Cooldown {
    /// Creates an idle, ready cooldown.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            duration: 0.0,
            elapsed: 0.0,
            running: false,
        }
    }

    /// Creates a cooldown already counting down, for state restored
    /// mid-flight.
    #[must_use]
    pub const fn started(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
            running: true,
        }
    }

    /// Begins a countdown. Returns false (and changes nothing) when a
    /// countdown is already in flight.
    pub fn start(&mut self, duration: f32) -> bool {
        if self.running {
            return false;
        }
        self.duration = duration;
        self.elapsed = 0.0;
        self.running = true;
        true
    }

    /// Advances the countdown. Returns true exactly once, on the tick the
    /// countdown completes.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            self.elapsed = self.duration;
            self.running = false;
            return true;
        }
        false
    }

    /// Stops the countdown immediately without reporting completion.
    pub fn cancel(&mut self) {
        self.running = false;
        self.elapsed = 0.0;
    }

    /// Whether the owner may start a new countdown.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        !self.running
    }

    /// Progress through the countdown in `[0, 1]`. Reads 1.0 while idle so
    /// a bound UI fill renders full when the ability is available.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if !self.running {
            return 1.0;
        }
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Seconds left on the countdown; zero while idle.
    #[must_use]
    pub fn remaining(&self) -> f32 {
        if self.running {
            (self.duration - self.elapsed).max(0.0)
        } else {
            0.0
        }
    }
}
