//! Built-in stand-in for the race simulation.
//!
//! [`CountdownSimulation`] only runs the race clock down. It carries the
//! participant list and track mode in each frame so clients can render a
//! minimal scoreboard while the real simulation is plugged in elsewhere.

use serde_json::json;

use crate::runner::{Simulation, SimulationError, TickFrame};
use crate::session::SessionState;

/// Simulation that decrements the race clock by the elapsed interval.
#[derive(Debug, Default)]
pub struct CountdownSimulation {
    races: u64,
}

impl CountdownSimulation {
    /// Create a simulation that has not been reset yet.
    pub const fn new() -> Self {
        Self { races: 0 }
    }

    /// Number of resets seen so far.
    pub const fn races(&self) -> u64 {
        self.races
    }
}

impl Simulation for CountdownSimulation {
    fn reset(&mut self, _session: &SessionState) {
        self.races = self.races.saturating_add(1);
    }

    fn step(
        &mut self,
        tick: u64,
        elapsed: f64,
        session: &SessionState,
    ) -> Result<TickFrame, SimulationError> {
        let time_left = (session.time_left - elapsed).max(0.0);
        Ok(TickFrame {
            tick,
            time_left,
            payload: json!({
                "race": self.races,
                "drivers": session.participants,
                "track_type": session.track_mode,
                "finished": time_left <= 0.0,
            }),
        })
    }
}
