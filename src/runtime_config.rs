// =============================================================================
// Runtime Configuration — service settings with atomic save
// =============================================================================
//
// Every tunable lives here: instrument identifiers per source, bar size and
// history window, freshness/TTL windows, HTTP timeouts, cache location and
// the listen address.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// Secrets never touch the file: the Polygon key comes from the environment
// only and is skipped by serde.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "BTC/USD".to_string()
}

fn default_timeframe() -> String {
    "1D".to_string()
}

fn default_polygon_ticker() -> String {
    "X:BTCUSD".to_string()
}

fn default_kraken_pair() -> String {
    "XBTUSD".to_string()
}

fn default_coingecko_id() -> String {
    "bitcoin".to_string()
}

fn default_bar_seconds() -> i64 {
    86_400
}

fn default_lookback_days() -> u32 {
    365
}

fn default_freshness_secs() -> u64 {
    300
}

fn default_quote_ttl_secs() -> u64 {
    30
}

fn default_source_timeout_secs() -> u64 {
    15
}

fn default_quote_timeout_secs() -> u64 {
    10
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_ohlc_response_limit() -> usize {
    90
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level service configuration.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Instrument ----------------------------------------------------------

    /// Display symbol echoed in response metadata.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Display timeframe echoed in response metadata.
    #[serde(default = "default_timeframe")]
    pub timeframe: String,

    #[serde(default = "default_polygon_ticker")]
    pub polygon_ticker: String,

    /// Kraken REST pair, used for both OHLC and the ticker.
    #[serde(default = "default_kraken_pair")]
    pub kraken_pair: String,

    #[serde(default = "default_coingecko_id")]
    pub coingecko_id: String,

    // --- History -------------------------------------------------------------

    /// Bar size in seconds.  The incremental fetch starts one bar after the
    /// newest stored candle.
    #[serde(default = "default_bar_seconds")]
    pub bar_seconds: i64,

    /// History window requested on a full fetch.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    // --- Freshness -----------------------------------------------------------

    /// Age after which the cached dataset (and candle snapshot) is rebuilt.
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,

    #[serde(default = "default_quote_ttl_secs")]
    pub quote_ttl_secs: u64,

    // --- HTTP ----------------------------------------------------------------

    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    #[serde(default = "default_quote_timeout_secs")]
    pub quote_timeout_secs: u64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Trailing candles returned by the OHLC route.
    #[serde(default = "default_ohlc_response_limit")]
    pub ohlc_response_limit: usize,

    // --- Durable tier --------------------------------------------------------

    /// Directory holding the Parquet snapshots.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Disable the durable tier entirely (memory only).
    #[serde(default)]
    pub serverless: bool,

    // --- Secrets (environment only) -----------------------------------------

    #[serde(skip)]
    pub polygon_api_key: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            timeframe: default_timeframe(),
            polygon_ticker: default_polygon_ticker(),
            kraken_pair: default_kraken_pair(),
            coingecko_id: default_coingecko_id(),
            bar_seconds: default_bar_seconds(),
            lookback_days: default_lookback_days(),
            freshness_secs: default_freshness_secs(),
            quote_ttl_secs: default_quote_ttl_secs(),
            source_timeout_secs: default_source_timeout_secs(),
            quote_timeout_secs: default_quote_timeout_secs(),
            bind_addr: default_bind_addr(),
            ohlc_response_limit: default_ohlc_response_limit(),
            cache_dir: default_cache_dir(),
            serverless: false,
            polygon_api_key: None,
        }
    }
}

/// Truthy environment flag values.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            bar_seconds = config.bar_seconds,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply environment overrides.  `lookup` is `std::env::var(..).ok()` in
    /// production and a map in tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SERVERLESS") {
            self.serverless = is_truthy(&v);
        }
        if let Some(dir) = lookup("LUMEN_CACHE_DIR").filter(|d| !d.trim().is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("LUMEN_BIND_ADDR").filter(|a| !a.trim().is_empty()) {
            self.bind_addr = addr;
        }
        self.polygon_api_key = lookup("POLYGON_API_KEY").filter(|k| !k.trim().is_empty());
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }

    /// Directory for the durable tier, `None` in serverless mode.
    pub fn durable_dir(&self) -> Option<&Path> {
        (!self.serverless).then_some(self.cache_dir.as_path())
    }
}
