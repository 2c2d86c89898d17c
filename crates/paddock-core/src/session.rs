//! Shared session state for the race control plane.
//!
//! [`SharedSession`] is the single mutable record of session configuration
//! and status. The admin endpoint writes it, the driver loop and any status
//! inspector read it.
//!
//! # Consistency
//!
//! Every admin call is turned into one [`SessionUpdate`] and applied by
//! [`SessionUpdate::apply_to`], a plain synchronous function executed while
//! the write lock is held. The update therefore lands as one unit: no reader
//! can observe some but not all of its fields. Concurrent admin calls are
//! last-writer-wins on overlapping fields.
//!
//! `time_left` belongs to the driver loop. Admin updates never touch it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use tokio::sync::{Notify, RwLock};

/// How the track is chosen for each race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackMode {
    /// A freshly generated track for every race.
    #[default]
    Random,
    /// The same track for every race.
    Same,
}

impl TrackMode {
    /// Wire name of the mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Same => "same",
        }
    }
}

impl fmt::Display for TrackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known [`TrackMode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown track mode '{0}' (expected 'random' or 'same')")]
pub struct UnknownTrackMode(pub String);

impl FromStr for TrackMode {
    type Err = UnknownTrackMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "random" => Ok(Self::Random),
            "same" => Ok(Self::Same),
            other => Err(UnknownTrackMode(other.to_owned())),
        }
    }
}

/// A field of the session that an admin call can set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    /// Tick interval in seconds.
    Rate,
    /// Run flag.
    Running,
    /// One-shot reset request.
    Reset,
    /// Participant endpoint list.
    Participants,
}

impl SessionField {
    /// Name of the field as it appears in admin query strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rate => "rate",
            Self::Running => "running",
            Self::Reset => "reset",
            Self::Participants => "participants",
        }
    }
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating an admin call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A supplied parameter could not be parsed.
    #[error("Invalid {0} provided")]
    InvalidField(SessionField),
}

impl SessionError {
    /// The field that failed validation.
    pub const fn field(&self) -> SessionField {
        match self {
            Self::InvalidField(field) => *field,
        }
    }
}

/// The session record shared by the admin endpoint, the gateway and the
/// driver loop.
///
/// Serializes to the admin response body:
/// `{rate, running, reset, drivers, timeleft, track_type}` with the two
/// flags rendered as `0`/`1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// Tick interval in seconds.
    pub rate: Option<f64>,
    /// Whether the driver loop advances ticks.
    #[serde(serialize_with = "serialize_flag")]
    pub running: Option<bool>,
    /// Pending request to reinitialize the simulation.
    #[serde(serialize_with = "serialize_flag")]
    pub reset: Option<bool>,
    /// Ordered participant endpoint addresses.
    #[serde(rename = "drivers")]
    pub participants: Vec<String>,
    /// Seconds remaining in the current race. Written by the driver only.
    #[serde(rename = "timeleft")]
    pub time_left: f64,
    /// Track selection mode, fixed at startup.
    #[serde(rename = "track_type")]
    pub track_mode: TrackMode,
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn serialize_flag<S: Serializer>(flag: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match flag {
        Some(value) => serializer.serialize_u8(u8::from(*value)),
        None => serializer.serialize_none(),
    }
}

/// A validated set of field changes produced by one admin call.
///
/// Fields left as `None` are not touched when the update is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    /// New tick interval.
    pub rate: Option<f64>,
    /// New run flag.
    pub running: Option<bool>,
    /// New reset flag.
    pub reset: Option<bool>,
    /// New participant list. Forces `running = false, reset = true`.
    pub participants: Option<Vec<String>>,
}

impl SessionUpdate {
    /// Whether the update changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.rate.is_none()
            && self.running.is_none()
            && self.reset.is_none()
            && self.participants.is_none()
    }

    /// Write the update into `state`.
    ///
    /// Synchronous on purpose: it runs under the session write lock and
    /// must never contain a suspension point. Replacing the participant
    /// list always pauses the race and requests a reset, overriding any
    /// explicit `running`/`reset` in the same update.
    pub fn apply_to(&self, state: &mut SessionState) {
        if let Some(rate) = self.rate {
            state.rate = Some(rate);
        }
        if let Some(running) = self.running {
            state.running = Some(running);
        }
        if let Some(reset) = self.reset {
            state.reset = Some(reset);
        }
        if let Some(participants) = &self.participants {
            state.participants.clone_from(participants);
            state.running = Some(false);
            state.reset = Some(true);
        }
    }
}

/// Raw admin parameters as they arrive in the query string.
///
/// `drivers` is accepted as an alias of `participants`. An empty value is
/// treated as if the parameter were absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateParams {
    /// Tick interval, a positive float.
    pub rate: Option<String>,
    /// Run flag, an integer (`0` is false).
    pub running: Option<String>,
    /// Reset flag, an integer (`0` is false).
    pub reset: Option<String>,
    /// Comma-separated participant addresses.
    pub participants: Option<String>,
}

/// An admin call that failed validation part way through.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedUpdate {
    /// Fields that parsed before the failing one.
    pub accepted: SessionUpdate,
    /// The validation failure.
    pub error: SessionError,
}

impl UpdateParams {
    /// Collect parameters from decoded query pairs.
    ///
    /// The first occurrence of a key wins and later repeats are ignored.
    /// `participants` takes precedence over `drivers` regardless of order.
    /// Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        let mut drivers = None;
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "rate" => &mut params.rate,
                "running" => &mut params.running,
                "reset" => &mut params.reset,
                "participants" => &mut params.participants,
                "drivers" => &mut drivers,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        if params.participants.is_none() {
            params.participants = drivers;
        }
        params
    }

    /// Parse the parameters in the order rate, running, reset, participants.
    ///
    /// Parsing stops at the first invalid parameter. The fields parsed
    /// before it are returned in [`RejectedUpdate::accepted`] so the caller
    /// can still apply them; later parameters are never looked at.
    pub fn parse(&self) -> Result<SessionUpdate, RejectedUpdate> {
        let mut update = SessionUpdate::default();

        if let Some(raw) = present(self.rate.as_deref()) {
            match parse_rate(raw) {
                Some(rate) => update.rate = Some(rate),
                None => return Err(reject(update, SessionField::Rate)),
            }
        }
        if let Some(raw) = present(self.running.as_deref()) {
            match parse_flag(raw) {
                Some(flag) => update.running = Some(flag),
                None => return Err(reject(update, SessionField::Running)),
            }
        }
        if let Some(raw) = present(self.reset.as_deref()) {
            match parse_flag(raw) {
                Some(flag) => update.reset = Some(flag),
                None => return Err(reject(update, SessionField::Reset)),
            }
        }
        if let Some(raw) = present(self.participants.as_deref()) {
            match parse_participants(raw) {
                Some(list) => update.participants = Some(list),
                None => return Err(reject(update, SessionField::Participants)),
            }
        }

        Ok(update)
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.filter(|value| !value.is_empty())
}

const fn reject(accepted: SessionUpdate, field: SessionField) -> RejectedUpdate {
    RejectedUpdate {
        accepted,
        error: SessionError::InvalidField(field),
    }
}

/// Parse a tick interval. Must be finite and strictly positive.
pub fn parse_rate(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

/// Parse an integer flag; any non-zero integer is `true`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    raw.trim().parse::<i64>().ok().map(|value| value != 0)
}

/// Split a comma-separated participant list. Every entry must be non-empty
/// after trimming.
pub fn parse_participants(raw: &str) -> Option<Vec<String>> {
    raw.split(',')
        .map(str::trim)
        .map(|entry| (!entry.is_empty()).then(|| entry.to_owned()))
        .collect()
}

#[derive(Debug)]
struct Versioned {
    state: SessionState,
    revision: u64,
}

/// Lock-guarded owner of the [`SessionState`].
///
/// Shared as `Arc<SharedSession>` between the gateway handlers and the
/// driver loop. Every admin update bumps a revision counter so the driver
/// can tell whether an update landed between two of its own reads.
#[derive(Debug)]
pub struct SharedSession {
    inner: RwLock<Versioned>,
    changed: Notify,
}

impl SharedSession {
    /// Wrap the startup state.
    pub fn new(initial: SessionState) -> Self {
        Self {
            inner: RwLock::new(Versioned {
                state: initial,
                revision: 0,
            }),
            changed: Notify::new(),
        }
    }

    /// Clone the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.inner.read().await.state.clone()
    }

    /// Clone the current state together with its revision.
    pub async fn snapshot_with_revision(&self) -> (SessionState, u64) {
        let guard = self.inner.read().await;
        (guard.state.clone(), guard.revision)
    }

    /// Current revision. Starts at 0 and grows by one per admin update.
    pub async fn revision(&self) -> u64 {
        self.inner.read().await.revision
    }

    /// Apply an admin update as one unit and return the resulting state.
    ///
    /// The returned snapshot is taken under the same write lock, so it
    /// contains this update and nothing that landed after it.
    pub async fn apply(&self, update: &SessionUpdate) -> SessionState {
        let snapshot = {
            let mut guard = self.inner.write().await;
            update.apply_to(&mut guard.state);
            guard.revision = guard.revision.saturating_add(1);
            guard.state.clone()
        };
        self.changed.notify_one();
        snapshot
    }

    /// Record the seconds remaining in the race. Driver only.
    pub async fn set_time_left(&self, seconds: f64) {
        self.inner.write().await.state.time_left = seconds;
    }

    /// Finish a reset the driver started at `observed_revision`.
    ///
    /// Restores `time_left` and clears the reset flag. If an admin update
    /// landed since the driver read the state, the flag is left set so the
    /// driver resets again with the newer state. Returns whether the flag
    /// was cleared.
    pub async fn complete_reset(&self, observed_revision: u64, time_left: f64) -> bool {
        let mut guard = self.inner.write().await;
        guard.state.time_left = time_left;
        if guard.revision == observed_revision {
            guard.state.reset = Some(false);
            true
        } else {
            false
        }
    }

    /// Wait until the next admin update lands.
    ///
    /// An update that landed while nobody was waiting wakes the next
    /// waiter immediately, so a check-then-wait sequence cannot miss it.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}
