//! Distributed Brute-Force Digest Search Library
//!
//! This library crate defines the core modules that make up the distributed system.
//! It serves as the foundation for the binary executable (`main.rs`), which can run
//! either side of the wire: the coordinating server or a worker process.
//!
//! ## Architecture Modules
//! The system is composed of five loosely coupled subsystems:
//!
//! - **`protocol`**: The wire layer. Frames and parses the length-prefixed binary
//!   messages (`HS`/`ND`/`AL`/`HB`/`FN`) exchanged over TCP between the coordinator
//!   and its workers.
//! - **`queue`**: The work-partitioning layer. Splits the search domain into ordered,
//!   disjoint ranges and hands them out under a single lock, with ordered reclaim
//!   when a worker dies mid-assignment.
//! - **`server`**: The coordination layer. Accepts worker connections, runs one
//!   session state machine per connection, detects dead workers, and terminates the
//!   whole fleet as soon as one worker reports a match.
//! - **`worker`**: The search side. Runs the connection-level state machine
//!   (handshake, allocate, report) and fans each assigned range out across local
//!   concurrent search lanes with cooperative cancellation.
//! - **`digest`**: The concrete test predicate. Computes the MD5 digest candidates
//!   are checked against; everything else treats the check as an opaque closure.

pub mod digest;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod worker;
