use std::sync::Arc;
use std::time::Duration;

/// Type alias for a thread-safe candidate check.
///
/// Takes a candidate value and decides whether it is the one being searched
/// for. The closure is the only thing the search side knows about the digest;
/// it must be cheap to clone (it crosses into every search lane).
pub type CandidateTest = Arc<dyn Fn(u64) -> bool + Send + Sync>;

/// Builds a [`CandidateTest`] from the target digest the server announces at
/// handshake time. Keeps the worker core generic over the hash function.
pub type TestFactory = Arc<dyn Fn(&str) -> CandidateTest + Send + Sync>;

/// Terminal status of one worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// This worker found the candidate and reported it.
    Found(u64),
    /// The server broadcast that another worker already won.
    Stopped,
    /// The server had no more work to hand out.
    Exhausted,
    /// The handshake did not produce a target digest.
    NoTarget,
    /// The connection died or the server broke protocol.
    ConnectionLost,
}

/// Worker-side tunables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrency budget declared at handshake; also the number of local
    /// search lanes. Defaults to the machine's available parallelism.
    pub capacity: u32,
    /// Heartbeat cadence; must stay strictly below the server's liveness
    /// window (the server defaults to three times this).
    pub heartbeat_interval: Duration,
    /// Connection attempts before giving up on the server.
    pub connect_attempts: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let capacity = std::thread::available_parallelism()
            .map(|lanes| lanes.get() as u32)
            .unwrap_or(1);
        Self {
            capacity,
            heartbeat_interval: Duration::from_secs(2),
            connect_attempts: 3,
        }
    }
}
