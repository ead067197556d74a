use std::fmt;
use std::time::Duration;

/// Unique identifier for one worker connection.
///
/// Wrapper around a UUID string; lives in the dispatcher's session registry
/// from accept until the session task winds down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generates a new random UUID v4-based SessionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side timing tunables.
///
/// None of these are protocol invariants; the liveness window just has to
/// stay comfortably above the workers' heartbeat cadence (the default is
/// three times the 2s cadence workers default to).
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// How often idle sessions and the accept loop re-check the stop signal
    /// and liveness deadlines.
    pub poll_interval: Duration,
    /// Silence longer than this counts as a dead worker.
    pub liveness_window: Duration,
    /// How long the dispatcher waits for live sessions to notice the stop
    /// signal before returning.
    pub grace_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            liveness_window: Duration::from_secs(6),
            grace_period: Duration::from_secs(3),
        }
    }
}

/// Terminal result of a whole search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A worker reported this candidate and it was the first accepted report.
    Found(u64),
    /// The queue drained with no worker reporting a match.
    Exhausted,
}
