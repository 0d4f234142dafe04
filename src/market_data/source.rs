// =============================================================================
// Data source contracts
// =============================================================================
//
// The core never talks to a vendor directly.  It consumes two capabilities:
//
//   OhlcSource   full historical fetch + incremental "candles after t" fetch
//   QuoteSource  current price snapshot
//
// Each has (at least) two independent HTTP implementations so the fallback
// chains have somewhere to fall back to.  Timeouts are enforced per request
// and surface as `SourceError::Unavailable` like any other failure.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::market_data::CandleSeries;

/// Historical OHLC capability.
pub trait OhlcSource: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetch roughly `lookback_days` of history ending now.
    fn fetch_full(
        &self,
        lookback_days: u32,
    ) -> impl Future<Output = Result<CandleSeries, SourceError>> + Send;

    /// Fetch only candles strictly newer than `after` (epoch seconds).  An
    /// empty series means "already current".
    fn fetch_since(
        &self,
        after: i64,
    ) -> impl Future<Output = Result<CandleSeries, SourceError>> + Send;
}

/// Current price snapshot for the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    /// Percent change over the trailing 24h.
    pub change_24h: f64,
    /// 24h traded volume in quote currency.
    pub volume_24h: f64,
}

/// Spot quote capability.
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_quote(&self) -> impl Future<Output = Result<Quote, SourceError>> + Send;
}

/// Bar size expressed the way aggregate-style APIs want it:
/// `(multiplier, timespan)`, e.g. `(1, "day")`, `(4, "hour")`.
pub fn bar_timespan(bar_seconds: i64) -> (i64, &'static str) {
    if bar_seconds >= 86_400 && bar_seconds % 86_400 == 0 {
        (bar_seconds / 86_400, "day")
    } else if bar_seconds >= 3_600 && bar_seconds % 3_600 == 0 {
        (bar_seconds / 3_600, "hour")
    } else {
        ((bar_seconds / 60).max(1), "minute")
    }
}

/// GET `url` and decode the JSON body.  Any transport error, timeout,
/// non-2xx status, or decode failure maps to a `SourceError`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    source_name: &'static str,
) -> Result<T, SourceError> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| SourceError::unavailable(source_name, e))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::unavailable(
            source_name,
            format!("HTTP {status}"),
        ));
    }

    resp.json::<T>()
        .await
        .map_err(|e| SourceError::malformed(source_name, e))
}
