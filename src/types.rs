// =============================================================================
// Shared types used across the chart-data service
// =============================================================================

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Which cache tier satisfied a dataset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Fresh in-process entry.
    Memory,
    /// Fresh entry promoted from the Parquet snapshot.
    Durable,
    /// Recomputed from the OHLC store on this request.
    Rebuilt,
    /// Past its freshness window, served because a rebuild failed or was
    /// already in flight.
    Stale,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Durable => write!(f, "durable"),
            Self::Rebuilt => write!(f, "rebuilt"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// Current wall-clock time as epoch seconds.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}
