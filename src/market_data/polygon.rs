// =============================================================================
// Polygon.io aggregates — primary OHLC source
// =============================================================================
//
// GET /v2/aggs/ticker/{ticker}/range/{mult}/{timespan}/{from}/{to}
//
// Date-granular `from`/`to` bounds, millisecond bar timestamps.  The
// incremental fetch starts one bar after the newest cached candle and drops
// anything not strictly newer than it.
// =============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::market_data::source::{bar_timespan, get_json, OhlcSource};
use crate::market_data::{Candle, CandleSeries};

const SOURCE: &str = "polygon";
const BASE_URL: &str = "https://api.polygon.io";

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
}

#[derive(Debug, Deserialize)]
struct AggregateBar {
    /// Bar open, epoch milliseconds.
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

impl From<AggregateBar> for Candle {
    fn from(bar: AggregateBar) -> Self {
        Candle {
            time: bar.t / 1000,
            open: bar.o,
            high: bar.h,
            low: bar.l,
            close: bar.c,
            volume: bar.v,
        }
    }
}

/// Polygon aggregates client.
#[derive(Clone)]
pub struct PolygonSource {
    client: reqwest::Client,
    api_key: Option<String>,
    ticker: String,
    bar_seconds: i64,
    timeout: Duration,
    base_url: String,
}

impl PolygonSource {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        ticker: impl Into<String>,
        bar_seconds: i64,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            ticker: ticker.into(),
            bar_seconds,
            timeout,
            base_url: BASE_URL.to_string(),
        }
    }

    fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::unavailable(SOURCE, "POLYGON_API_KEY not configured"))
    }

    fn range_url(&self, from: &str, to: &str, api_key: &str) -> String {
        let (mult, timespan) = bar_timespan(self.bar_seconds);
        format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}?adjusted=true&sort=asc&limit=50000&apiKey={}",
            self.base_url, self.ticker, mult, timespan, from, to, api_key
        )
    }

    async fn fetch_range(&self, from: &str, to: &str) -> Result<Vec<Candle>, SourceError> {
        let api_key = self.api_key()?;
        let url = self.range_url(from, to, api_key);
        let body: AggregatesResponse = get_json(&self.client, &url, self.timeout, SOURCE).await?;
        Ok(parse_aggregates(body))
    }
}

fn parse_aggregates(body: AggregatesResponse) -> Vec<Candle> {
    body.results.into_iter().map(Candle::from).collect()
}

fn date_string(epoch_secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

impl OhlcSource for PolygonSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    #[instrument(skip(self), name = "polygon::fetch_full")]
    async fn fetch_full(&self, lookback_days: u32) -> Result<CandleSeries, SourceError> {
        let now = Utc::now();
        let start = now - chrono::Duration::days(i64::from(lookback_days));
        let from = start.format("%Y-%m-%d").to_string();
        let to = now.format("%Y-%m-%d").to_string();

        let candles = self.fetch_range(&from, &to).await?;
        if candles.is_empty() {
            return Err(SourceError::Empty { source_name: SOURCE });
        }
        debug!(count = candles.len(), "polygon full history fetched");
        Ok(CandleSeries::from_candles(candles))
    }

    #[instrument(skip(self), name = "polygon::fetch_since")]
    async fn fetch_since(&self, after: i64) -> Result<CandleSeries, SourceError> {
        let now = Utc::now();
        let from = date_string(after + self.bar_seconds)
            .ok_or_else(|| SourceError::malformed(SOURCE, format!("bad timestamp {after}")))?;
        let to = now.format("%Y-%m-%d").to_string();

        // Date strings in ISO form compare chronologically.
        if from >= to && self.bar_seconds >= 86_400 {
            debug!(%from, "already up to date");
            return Ok(CandleSeries::empty());
        }

        let candles: Vec<Candle> = self
            .fetch_range(&from, &to)
            .await?
            .into_iter()
            .filter(|c| c.time > after)
            .collect();
        debug!(count = candles.len(), "polygon incremental candles fetched");
        Ok(CandleSeries::from_candles(candles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(bar_seconds: i64) -> PolygonSource {
        PolygonSource::new(
            reqwest::Client::new(),
            Some("k".into()),
            "X:BTCUSD",
            bar_seconds,
            Duration::from_secs(1),
        )
    }

    #[test]
    fn parse_aggregates_converts_ms_to_seconds() {
        let body: AggregatesResponse = serde_json::from_value(serde_json::json!({
            "results": [
                {"t": 1_700_000_000_000i64, "o": 1.0, "h": 2.0, "l": 0.5, "c": 1.5, "v": 10.0},
                {"t": 1_700_086_400_000i64, "o": 1.5, "h": 2.5, "l": 1.0, "c": 2.0}
            ]
        }))
        .unwrap();
        let candles = parse_aggregates(body);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_700_000_000);
        assert_eq!(candles[1].volume, 0.0);
    }

    #[test]
    fn parse_aggregates_missing_results_is_empty() {
        let body: AggregatesResponse =
            serde_json::from_value(serde_json::json!({"status": "OK"})).unwrap();
        assert!(parse_aggregates(body).is_empty());
    }

    #[test]
    fn range_url_uses_bar_size() {
        let url = source(86_400).range_url("2024-01-01", "2024-02-01", "k");
        assert!(url.contains("/range/1/day/2024-01-01/2024-02-01"));
        let url = source(3_600).range_url("2024-01-01", "2024-01-02", "k");
        assert!(url.contains("/range/1/hour/"));
    }

    #[test]
    fn date_string_formats_utc() {
        assert_eq!(date_string(0).as_deref(), Some("1970-01-01"));
        assert_eq!(date_string(1_700_000_000).as_deref(), Some("2023-11-14"));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let src = PolygonSource::new(
            reqwest::Client::new(),
            Some("   ".into()),
            "X:BTCUSD",
            86_400,
            Duration::from_secs(1),
        );
        let err = src.fetch_full(30).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn incremental_up_to_date_skips_request() {
        // Newest candle is today's bar: the next bar starts tomorrow.
        let today = Utc::now().timestamp() / 86_400 * 86_400;
        let out = source(86_400).fetch_since(today).await.unwrap();
        assert!(out.is_empty());
    }
}
