//! Wire Protocol Module
//!
//! Implements the binary frame format spoken between the coordinator and its
//! workers, and the I/O discipline around it.
//!
//! ## Frame Layout
//! ```text
//! [4 bytes: frame length, big-endian] [2 bytes: ASCII operation tag] [payload]
//! ```
//! The length field counts the *entire* frame (length field + tag + payload).
//! Integers carried inside payloads are fixed 4-byte big-endian fields, packed
//! adjacently with no delimiters.
//!
//! ## Submodules
//! - **`types`**: Operation tags and the decoded `Frame` shape.
//! - **`codec`**: Encoding, the fully-drained async decode loop, and the
//!   reader-sidecar task that forwards inbound frames over a channel.

pub mod codec;
pub mod types;

pub use codec::{
    decode_range, decode_u32, encode_frame, encode_range, encode_u32, read_frame,
    spawn_frame_reader, write_frame,
};
pub use types::{Frame, OpCode};

#[cfg(test)]
mod tests;
