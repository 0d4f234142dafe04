// =============================================================================
// CoinGecko simple price — fallback quote source
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::instrument;

use crate::error::SourceError;
use crate::market_data::source::{get_json, Quote, QuoteSource};

const SOURCE: &str = "coingecko";
const BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
    #[serde(default)]
    usd_24h_vol: Option<f64>,
}

#[derive(Clone)]
pub struct CoinGeckoSource {
    client: reqwest::Client,
    coin_id: String,
    timeout: Duration,
}

impl CoinGeckoSource {
    pub fn new(client: reqwest::Client, coin_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            coin_id: coin_id.into(),
            timeout,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true&include_market_cap=true",
            BASE_URL, self.coin_id
        )
    }
}

fn parse_simple_price(
    mut body: HashMap<String, SimplePrice>,
    coin_id: &str,
) -> Result<Quote, SourceError> {
    let entry = body
        .remove(coin_id)
        .ok_or_else(|| SourceError::malformed(SOURCE, format!("no entry for {coin_id}")))?;
    let price = entry
        .usd
        .ok_or_else(|| SourceError::malformed(SOURCE, "missing usd price"))?;
    Ok(Quote {
        price,
        change_24h: entry.usd_24h_change.unwrap_or(0.0),
        volume_24h: entry.usd_24h_vol.unwrap_or(0.0),
    })
}

impl QuoteSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    #[instrument(skip(self), name = "coingecko::fetch_quote")]
    async fn fetch_quote(&self) -> Result<Quote, SourceError> {
        let body: HashMap<String, SimplePrice> =
            get_json(&self.client, &self.url(), self.timeout, SOURCE).await?;
        parse_simple_price(body, &self.coin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: serde_json::Value) -> HashMap<String, SimplePrice> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn parses_full_entry() {
        let body = decode(json!({
            "bitcoin": {"usd": 65000.0, "usd_24h_change": -1.25, "usd_24h_vol": 3.2e10, "usd_market_cap": 1.0e12}
        }));
        let q = parse_simple_price(body, "bitcoin").unwrap();
        assert_eq!(q.price, 65000.0);
        assert_eq!(q.change_24h, -1.25);
        assert_eq!(q.volume_24h, 3.2e10);
    }

    #[test]
    fn missing_optional_fields_default_to_zero() {
        let q = parse_simple_price(decode(json!({"bitcoin": {"usd": 1.0}})), "bitcoin").unwrap();
        assert_eq!(q.change_24h, 0.0);
        assert_eq!(q.volume_24h, 0.0);
    }

    #[test]
    fn missing_coin_is_malformed() {
        let err = parse_simple_price(decode(json!({})), "bitcoin").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
