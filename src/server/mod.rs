//! Coordination Server Module
//!
//! The server side of the system: accepts worker connections, partitions the
//! search among them, and stops the whole fleet as soon as one worker reports
//! a match.
//!
//! ## Architecture Overview
//! 1. **Accept**: the `Dispatcher` owns the listening socket and accepts in a
//!    bounded poll loop so the fleet-wide stop signal is observed even when no
//!    connections arrive.
//! 2. **Sessions**: every accepted connection gets its own `Session` task
//!    running the per-connection state machine (handshake → allocate/heartbeat
//!    loop → terminated). Sessions never interact with each other directly,
//!    only through the shared `WorkQueue` and the `StopSignal`.
//! 3. **Liveness**: a session that stays silent past the liveness window is
//!    treated exactly like a disconnect: its unreturned chunks go back to the
//!    queue and the socket is dropped.
//! 4. **Termination**: the first accepted `FN` report wins the write-once
//!    answer slot and flips the stop flag; every other session notices within
//!    one poll interval, broadcasts a stop notice, and winds down.
//!
//! ## Submodules
//! - **`types`**: Session ids, tunables, and the final search outcome.
//! - **`signal`**: The fleet-wide stop flag and write-once answer slot.
//! - **`session`**: The per-connection protocol state machine.
//! - **`dispatcher`**: The accept loop and session registry.

pub mod dispatcher;
pub mod session;
pub mod signal;
pub mod types;

pub use dispatcher::Dispatcher;
pub use signal::StopSignal;
pub use types::{SearchOutcome, ServerConfig, SessionId};
