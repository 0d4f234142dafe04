// =============================================================================
// Kraken public REST — secondary OHLC source and primary quote source
// =============================================================================
//
// OHLC:   GET /0/public/OHLC?pair=XBTUSD&interval=1440&since=<epoch>
//   result: { "<pair>": [[time, open, high, low, close, vwap, volume, count], ...],
//             "last": <epoch> }
//   Prices and volume arrive as strings; time as an integer.
//
// Ticker: GET /0/public/Ticker?pair=XBTUSD
//   result: { "<pair>": { "c": [last, lot], "o": open, "v": [today, 24h], ... } }
//
// Kraken keys results by its own pair name (XXBTZUSD for XBTUSD), so the
// parser looks for the expected key first and falls back to the first entry.
// =============================================================================

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::market_data::source::{get_json, OhlcSource, Quote, QuoteSource};
use crate::market_data::{Candle, CandleSeries};

const SOURCE: &str = "kraken";
const TICKER_SOURCE: &str = "kraken_ticker";
const BASE_URL: &str = "https://api.kraken.com";

/// Kraken's canonical result key for a REST pair name.
fn result_key(pair: &str) -> String {
    match pair {
        "XBTUSD" => "XXBTZUSD".to_string(),
        "ETHUSD" => "XETHZUSD".to_string(),
        other => other.to_string(),
    }
}

/// Pull `result.<pair>` out of a Kraken envelope, surfacing the API's own
/// `error` array when it is non-empty.
fn pair_result<'a>(
    body: &'a Value,
    pair: &str,
    source_name: &'static str,
) -> Result<&'a Value, SourceError> {
    if let Some(errors) = body.get("error").and_then(Value::as_array) {
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(SourceError::unavailable(source_name, joined));
        }
    }

    let result = body
        .get("result")
        .and_then(Value::as_object)
        .ok_or_else(|| SourceError::malformed(source_name, "missing result object"))?;

    let key = result_key(pair);
    result
        .get(&key)
        .or_else(|| result.get(pair))
        .or_else(|| result.iter().find(|(k, _)| k.as_str() != "last").map(|(_, v)| v))
        .ok_or_else(|| SourceError::malformed(source_name, format!("no data for {pair}")))
}

/// Numbers come as strings ("42000.1") or bare JSON numbers.
fn num(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn parse_ohlc_row(row: &Value) -> Option<Candle> {
    let fields = row.as_array()?;
    if fields.len() < 7 {
        return None;
    }
    Some(Candle {
        time: fields[0].as_i64().or_else(|| num(&fields[0]).map(|t| t as i64))?,
        open: num(&fields[1])?,
        high: num(&fields[2])?,
        low: num(&fields[3])?,
        close: num(&fields[4])?,
        volume: num(&fields[6])?,
    })
}

fn parse_ohlc(body: &Value, pair: &str) -> Result<Vec<Candle>, SourceError> {
    let rows = pair_result(body, pair, SOURCE)?
        .as_array()
        .ok_or_else(|| SourceError::malformed(SOURCE, "OHLC result is not an array"))?;
    // Rows that fail to parse are skipped rather than failing the batch.
    Ok(rows.iter().filter_map(parse_ohlc_row).collect())
}

fn parse_ticker(body: &Value, pair: &str) -> Result<Quote, SourceError> {
    let ticker = pair_result(body, pair, TICKER_SOURCE)?;

    let price = ticker
        .get("c")
        .and_then(|c| c.get(0))
        .and_then(num)
        .ok_or_else(|| SourceError::malformed(TICKER_SOURCE, "missing last trade price"))?;
    let open = ticker.get("o").and_then(num).unwrap_or(0.0);
    let base_volume = ticker
        .get("v")
        .and_then(|v| v.get(1))
        .and_then(num)
        .unwrap_or(0.0);

    let change_24h = if open > 0.0 {
        (price - open) / open * 100.0
    } else {
        0.0
    };

    Ok(Quote {
        price,
        change_24h,
        volume_24h: base_volume * price,
    })
}

// =============================================================================
// OHLC source
// =============================================================================

#[derive(Clone)]
pub struct KrakenSource {
    client: reqwest::Client,
    pair: String,
    bar_seconds: i64,
    timeout: Duration,
}

impl KrakenSource {
    pub fn new(
        client: reqwest::Client,
        pair: impl Into<String>,
        bar_seconds: i64,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            pair: pair.into(),
            bar_seconds,
            timeout,
        }
    }

    /// Kraken interval in minutes.
    fn interval(&self) -> i64 {
        (self.bar_seconds / 60).max(1)
    }

    fn ohlc_url(&self, since: i64) -> String {
        format!(
            "{}/0/public/OHLC?pair={}&interval={}&since={}",
            BASE_URL,
            self.pair,
            self.interval(),
            since
        )
    }

    async fn fetch_after(&self, since: i64) -> Result<Vec<Candle>, SourceError> {
        let url = self.ohlc_url(since);
        let body: Value = get_json(&self.client, &url, self.timeout, SOURCE).await?;
        parse_ohlc(&body, &self.pair)
    }
}

impl OhlcSource for KrakenSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    #[instrument(skip(self), name = "kraken::fetch_full")]
    async fn fetch_full(&self, lookback_days: u32) -> Result<CandleSeries, SourceError> {
        let since = Utc::now().timestamp() - i64::from(lookback_days) * 86_400;
        let candles = self.fetch_after(since).await?;
        if candles.is_empty() {
            return Err(SourceError::Empty { source_name: SOURCE });
        }
        debug!(count = candles.len(), "kraken full history fetched");
        Ok(CandleSeries::from_candles(candles))
    }

    #[instrument(skip(self), name = "kraken::fetch_since")]
    async fn fetch_since(&self, after: i64) -> Result<CandleSeries, SourceError> {
        let candles: Vec<Candle> = self
            .fetch_after(after)
            .await?
            .into_iter()
            .filter(|c| c.time > after)
            .collect();
        debug!(count = candles.len(), "kraken incremental candles fetched");
        Ok(CandleSeries::from_candles(candles))
    }
}

// =============================================================================
// Quote source
// =============================================================================

#[derive(Clone)]
pub struct KrakenTicker {
    client: reqwest::Client,
    pair: String,
    timeout: Duration,
}

impl KrakenTicker {
    pub fn new(client: reqwest::Client, pair: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            pair: pair.into(),
            timeout,
        }
    }
}

impl QuoteSource for KrakenTicker {
    fn name(&self) -> &'static str {
        TICKER_SOURCE
    }

    #[instrument(skip(self), name = "kraken::fetch_quote")]
    async fn fetch_quote(&self) -> Result<Quote, SourceError> {
        let url = format!("{}/0/public/Ticker?pair={}", BASE_URL, self.pair);
        let body: Value = get_json(&self.client, &url, self.timeout, TICKER_SOURCE).await?;
        parse_ticker(&body, &self.pair)
    }
}
