//! Deterministic time system
//!
//! Fixed tick rate; behaviors receive the tick length as their delta.

use std::time::Duration;

/// Default simulation tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;

/// Simulation time tracker
pub struct SimulationTime {
    tick_rate_hz: u32,
    tick_count: u64,
    accumulated_seconds: f64,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self::with_tick_rate(TICK_RATE_HZ)
    }

    /// A tick rate of zero is clamped to 1 Hz.
    pub fn with_tick_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz: tick_rate_hz.max(1),
            tick_count: 0,
            accumulated_seconds: 0.0,
        }
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    /// Length of one tick in seconds.
    pub fn delta_seconds(&self) -> f32 {
        1.0 / self.tick_rate_hz as f32
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Advance one tick and return the elapsed seconds to hand to update hooks.
    pub fn advance_tick(&mut self) -> f32 {
        let dt = self.delta_seconds();
        self.tick_count += 1;
        self.accumulated_seconds += dt as f64;
        dt
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_secs_f64(self.accumulated_seconds)
    }
}

impl Default for SimulationTime {
    fn default() -> Self {
        Self::new()
    }
}
