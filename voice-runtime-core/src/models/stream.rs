use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier attached to every stream object for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First group is enough to tell streams apart in logs.
        let text = self.0.to_string();
        f.write_str(&text[..8])
    }
}

/// Outcome of one capture drain tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The source cursor has not moved, or the source is not recording yet.
    NoData,
    Delivered {
        chunks: usize,
        samples: usize,
        /// Unread samples smaller than the smallest chunk, left for the next tick.
        carried_over: usize,
    },
}

impl DrainOutcome {
    pub fn delivered_samples(&self) -> usize {
        match self {
            Self::NoData => 0,
            Self::Delivered { samples, .. } => *samples,
        }
    }
}
