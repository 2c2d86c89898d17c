//! Driver loop that turns session state into ticks.
//!
//! [`run_driver`] reads the [`SharedSession`] once per iteration and:
//!
//! - **Reset**: when the reset flag is set, reinitializes the simulation,
//!   restores `time_left` to the race duration and clears the flag
//! - **Pause**: when not running (or out of time), sleeps until the next
//!   admin update instead of spinning
//! - **Tick**: otherwise steps the simulation by the wall-clock time since
//!   the previous tick, records `time_left`, publishes the frame through a
//!   [`TickSink`] and sleeps `rate` seconds (never less than
//!   [`MIN_TICK_INTERVAL_SECONDS`])
//!
//! The simulation algorithm itself sits behind the [`Simulation`] trait.
//! Publishing must not block: a sink that fans out to connections is
//! expected to skip slow ones rather than wait for them.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::session::{SessionState, SharedSession};

/// Tick interval used when the session has no usable rate.
pub const DEFAULT_RATE_SECONDS: f64 = 1.0;

/// Shortest sleep between two ticks, whatever the configured rate.
pub const MIN_TICK_INTERVAL_SECONDS: f64 = 0.001;

/// One tick's worth of output, serialized and pushed to every client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickFrame {
    /// Tick number since the last reset, starting at 1.
    pub tick: u64,
    /// Seconds remaining after this tick.
    #[serde(rename = "timeleft")]
    pub time_left: f64,
    /// Simulation-specific payload.
    pub payload: serde_json::Value,
}

/// Failure inside the simulation step. Fatal for the driver.
#[derive(Debug, thiserror::Error)]
#[error("simulation fault: {message}")]
pub struct SimulationError {
    /// What went wrong.
    pub message: String,
}

/// Errors that end the driver loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A simulation step failed.
    #[error("driver fault at tick {tick}: {source}")]
    Simulation {
        /// The tick that was being computed.
        tick: u64,
        /// The underlying failure.
        source: SimulationError,
    },
}

/// The race simulation advanced by the driver loop.
pub trait Simulation: Send {
    /// Reinitialize for a new race with the given session state.
    fn reset(&mut self, session: &SessionState);

    /// Advance by `elapsed` seconds and produce the frame for tick `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] when the step cannot be computed.
    fn step(
        &mut self,
        tick: u64,
        elapsed: f64,
        session: &SessionState,
    ) -> Result<TickFrame, SimulationError>;
}

/// Destination for tick frames.
pub trait TickSink: Send + Sync {
    /// Deliver a frame. Must return without waiting on any single client.
    fn publish(&self, frame: &TickFrame);
}

/// Driver loop settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    /// Seconds in one race; `time_left` is restored to this on reset.
    pub game_duration_seconds: f64,
}

/// Run the driver loop. Only returns on a simulation fault.
///
/// # Errors
///
/// Returns [`RunnerError::Simulation`] if a step fails.
pub async fn run_driver(
    session: &SharedSession,
    simulation: &mut dyn Simulation,
    sink: &dyn TickSink,
    config: DriverConfig,
) -> Result<(), RunnerError> {
    let mut tick: u64 = 0;
    // Only set while ticks run back to back.
    let mut last_tick: Option<Instant> = None;

    info!(
        game_duration_seconds = config.game_duration_seconds,
        "Driver loop starting"
    );

    loop {
        let (state, revision) = session.snapshot_with_revision().await;

        if state.reset == Some(true) {
            simulation.reset(&state);
            tick = 0;
            last_tick = None;
            if session
                .complete_reset(revision, config.game_duration_seconds)
                .await
            {
                info!(participants = state.participants.len(), "Session reset");
            } else {
                debug!("Reset superseded by a newer admin update, resetting again");
            }
            continue;
        }

        if state.running != Some(true) || state.time_left <= 0.0 {
            debug!(
                running = ?state.running,
                time_left = state.time_left,
                "Driver idle, waiting for admin update"
            );
            last_tick = None;
            session.changed().await;
            continue;
        }

        let interval = tick_interval(&state);
        let now = Instant::now();
        // The first tick after a pause or reset has no predecessor to measure.
        let elapsed = last_tick.map_or(interval, |prev| {
            now.saturating_duration_since(prev).as_secs_f64()
        });
        last_tick = Some(now);

        let next = tick.saturating_add(1);
        let frame = simulation
            .step(next, elapsed, &state)
            .map_err(|source| RunnerError::Simulation { tick: next, source })?;
        tick = next;

        session.set_time_left(frame.time_left).await;
        sink.publish(&frame);

        let pause = Duration::try_from_secs_f64(interval).unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(pause).await;
    }
}

/// The interval to sleep after a tick, falling back to
/// [`DEFAULT_RATE_SECONDS`] for a missing or unusable rate and clamped to
/// at least [`MIN_TICK_INTERVAL_SECONDS`].
pub fn tick_interval(state: &SessionState) -> f64 {
    state
        .rate
        .filter(|rate| rate.is_finite() && *rate > 0.0)
        .unwrap_or(DEFAULT_RATE_SECONDS)
        .max(MIN_TICK_INTERVAL_SECONDS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::countdown::CountdownSimulation;
    use crate::session::{SessionUpdate, TrackMode};

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<TickFrame>>,
    }

    impl RecordingSink {
        fn frames(&self) -> Vec<TickFrame> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl TickSink for RecordingSink {
        fn publish(&self, frame: &TickFrame) {
            self.frames.lock().unwrap().push(frame.clone());
        }
    }

    struct FailingSimulation;

    impl Simulation for FailingSimulation {
        fn reset(&mut self, _session: &SessionState) {}

        fn step(
            &mut self,
            _tick: u64,
            _elapsed: f64,
            _session: &SessionState,
        ) -> Result<TickFrame, SimulationError> {
            Err(SimulationError {
                message: String::from("boom"),
            })
        }
    }

    fn state(running: bool, time_left: f64) -> SessionState {
        SessionState {
            rate: Some(0.01),
            running: Some(running),
            reset: Some(false),
            participants: vec![String::from("a")],
            time_left,
            track_mode: TrackMode::Same,
        }
    }

    const CONFIG: DriverConfig = DriverConfig {
        game_duration_seconds: 1.0,
    };

    fn spawn_driver(
        session: &Arc<SharedSession>,
        sink: &Arc<RecordingSink>,
    ) -> tokio::task::JoinHandle<Result<(), RunnerError>> {
        let session = Arc::clone(session);
        let sink = Arc::clone(sink);
        tokio::spawn(async move {
            let mut simulation = CountdownSimulation::new();
            run_driver(&session, &mut simulation, sink.as_ref(), CONFIG).await
        })
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn falls_back_to_default_interval() {
        let mut s = state(true, 1.0);
        s.rate = None;
        assert!((tick_interval(&s) - DEFAULT_RATE_SECONDS).abs() < f64::EPSILON);
        s.rate = Some(0.2);
        assert!((tick_interval(&s) - 0.2).abs() < f64::EPSILON);
        s.rate = Some(1e-300);
        assert!((tick_interval(&s) - MIN_TICK_INTERVAL_SECONDS).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn tiny_rate_still_runs_the_clock_down() {
        let mut tiny = state(true, 1.0);
        tiny.rate = Some(1e-300);
        let session = Arc::new(SharedSession::new(tiny));
        let sink = Arc::new(RecordingSink::default());
        let driver = spawn_driver(&session, &sink);

        tokio::time::sleep(Duration::from_millis(200)).await;
        driver.abort();

        let frames = sink.frames();
        assert!(frames.len() >= 2);
        // At most one tick per millisecond, plus slack for scheduling.
        assert!(frames.len() <= 250, "{} frames in 200ms", frames.len());
        let last = frames.last().unwrap();
        assert!(last.time_left < 0.9, "clock stuck at {}", last.time_left);
    }

    #[tokio::test]
    async fn running_session_publishes_frames_and_counts_down() {
        let session = Arc::new(SharedSession::new(state(true, 1.0)));
        let sink = Arc::new(RecordingSink::default());
        let driver = spawn_driver(&session, &sink);

        wait_for(|| sink.frames().len() >= 3).await;
        driver.abort();

        let frames = sink.frames();
        assert_eq!(frames[0].tick, 1);
        assert_eq!(frames[1].tick, 2);
        assert!(frames[1].time_left < frames[0].time_left);
        assert!(session.snapshot().await.time_left < 1.0);
    }

    #[tokio::test]
    async fn paused_session_publishes_nothing_until_resumed() {
        let session = Arc::new(SharedSession::new(state(false, 1.0)));
        let sink = Arc::new(RecordingSink::default());
        let driver = spawn_driver(&session, &sink);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.frames().is_empty());

        let resume = SessionUpdate {
            running: Some(true),
            ..SessionUpdate::default()
        };
        session.apply(&resume).await;
        wait_for(|| !sink.frames().is_empty()).await;
        driver.abort();
    }

    #[tokio::test]
    async fn reset_restores_time_and_clears_flag() {
        let session = Arc::new(SharedSession::new(state(false, 0.0)));
        let sink = Arc::new(RecordingSink::default());
        let driver = spawn_driver(&session, &sink);

        let new_field = SessionUpdate {
            participants: Some(vec![String::from("b"), String::from("c")]),
            ..SessionUpdate::default()
        };
        session.apply(&new_field).await;

        for _ in 0..200 {
            if session.snapshot().await.reset == Some(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        driver.abort();

        let after = session.snapshot().await;
        assert_eq!(after.reset, Some(false));
        assert_eq!(after.running, Some(false));
        assert!((after.time_left - CONFIG.game_duration_seconds).abs() < f64::EPSILON);
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn out_of_time_session_stays_idle() {
        let session = Arc::new(SharedSession::new(state(true, 0.0)));
        let sink = Arc::new(RecordingSink::default());
        let driver = spawn_driver(&session, &sink);

        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.abort();
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn simulation_fault_ends_the_loop() {
        let session = SharedSession::new(state(true, 1.0));
        let sink = RecordingSink::default();
        let mut simulation = FailingSimulation;

        let err = run_driver(&session, &mut simulation, &sink, CONFIG)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Simulation { tick: 1, .. }));
        assert!(sink.frames().is_empty());
    }
}
