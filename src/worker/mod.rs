//! Worker Module
//!
//! The client side of the system: one process that connects to the
//! coordinator, declares its concurrency budget, and searches whatever
//! ranges it is assigned until somebody wins or the work runs out.
//!
//! ## Architecture Overview
//! Three activities run concurrently per worker process:
//! 1. **Protocol loop** (`agent`): handshake, then request-range /
//!    search / report cycles.
//! 2. **Heartbeat sidecar**: pings the server at a fixed cadence strictly
//!    below the server's liveness window, for the lifetime of the connection.
//! 3. **Search lanes** (`search`): the assigned range split across blocking
//!    tasks, all watching one shared cancellation flag.
//!
//! The activities communicate through shared, synchronized state (the cancel
//! flag, a frame channel), never by calling into each other, so a stop notice
//! arriving mid-search is observed without blocking either side.
//!
//! ## Submodules
//! - **`types`**: Outcomes, tunables, and the opaque candidate-test closures.
//! - **`search`**: The parallel range executor with cooperative cancellation.
//! - **`agent`**: The connection-level state machine.

pub mod agent;
pub mod search;
pub mod types;

pub use agent::WorkerAgent;
pub use search::{CancelFlag, SearchExecutor};
pub use types::{CandidateTest, TestFactory, WorkerConfig, WorkerOutcome};

#[cfg(test)]
mod tests;
