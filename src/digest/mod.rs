//! Candidate Digest
//!
//! The one module that knows which hash the fleet is inverting: MD5 over the
//! decimal string form of a candidate, compared as lowercase hex. Everything
//! else handles the check as an opaque [`CandidateTest`] closure.

use std::sync::Arc;

use crate::worker::types::CandidateTest;

/// Hex MD5 digest of the candidate's decimal string form.
pub fn digest_hex(candidate: u64) -> String {
    format!("{:x}", md5::compute(candidate.to_string()))
}

/// Builds the candidate check for a target digest.
///
/// The target is normalized (trimmed, lowercased) once here, so the per-
/// candidate comparison inside the search lanes stays a plain string match.
pub fn matcher_for(target: &str) -> CandidateTest {
    let target = target.trim().to_ascii_lowercase();
    Arc::new(move |candidate| digest_hex(candidate) == target)
}
