//! Monotonic sequence ids stamped into outbound command payloads.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref COUNTER: AtomicU32 = AtomicU32::new(1);
}

/// A per-process monotonic command sequence id.
///
/// The printer echoes this back in replies. This layer does not correlate
/// on it - every operation owns a private session - it exists to satisfy
/// the wire format and to make packet captures greppable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(String);

impl SequenceId {
    /// Allocate the next sequence id.
    pub fn next() -> Self {
        if cfg!(test) {
            // Deterministic for serialization assertions.
            Self("1".to_string())
        } else {
            Self(COUNTER.fetch_add(1, Ordering::Relaxed).to_string())
        }
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::next()
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
