// =============================================================================
// Error taxonomy
// =============================================================================
//
// Every error here is recoverable.  Source failures fall through the fallback
// chain, persistence failures degrade to "tier absent", and the cache manager
// only ever surfaces `NoDataAvailable`.
// =============================================================================

use thiserror::Error;

/// A data source (OHLC or quote) could not deliver.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network error, timeout, non-2xx status, or missing credential.
    #[error("{source_name} unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    /// The response arrived but could not be interpreted.
    #[error("{source_name} returned a malformed payload: {reason}")]
    Malformed {
        source_name: &'static str,
        reason: String,
    },

    /// A full historical fetch produced no candles.
    #[error("{source_name} returned no candles")]
    Empty { source_name: &'static str },
}

impl SourceError {
    pub fn unavailable(source_name: &'static str, reason: impl ToString) -> Self {
        Self::Unavailable {
            source_name,
            reason: reason.to_string(),
        }
    }

    pub fn malformed(source_name: &'static str, reason: impl ToString) -> Self {
        Self::Malformed {
            source_name,
            reason: reason.to_string(),
        }
    }
}

/// The dataset builder refused its input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },
}

/// Reading or writing the durable Parquet tier failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The file exists but does not have the expected layout.
    #[error("schema: {0}")]
    Schema(String),
}

/// The only failure the tiered cache reports to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("no data available")]
    NoDataAvailable,
}
