// =============================================================================
// Central Application State
// =============================================================================
//
// Owns the tiered cache and the quote service and is handed to every request
// handler as `Arc<AppState<_>>`.  Nothing here is ambient: the cache's tiers
// and its rebuild lock are fields of the cache object, which is a field of
// this struct.
//
// The concrete data sources are chosen through the `Sources` bundle so tests
// can swap in-process mocks for the HTTP clients.
// =============================================================================

use std::time::Instant;

use crate::cache::TieredCache;
use crate::market_data::{
    CoinGeckoSource, KrakenSource, KrakenTicker, OhlcSource, PolygonSource, QuoteService,
    QuoteSource,
};
use crate::runtime_config::RuntimeConfig;
use crate::store::{OhlcStore, OhlcStoreConfig, ParquetStore};

/// The four collaborators the service is built from.
pub trait Sources: Send + Sync + 'static {
    type Ohlc: OhlcSource + 'static;
    type OhlcFallback: OhlcSource + 'static;
    type Quote: QuoteSource + 'static;
    type QuoteFallback: QuoteSource + 'static;
}

/// Production wiring: Polygon → Kraken for candles, Kraken → CoinGecko for
/// quotes.
pub struct LiveSources;

impl Sources for LiveSources {
    type Ohlc = PolygonSource;
    type OhlcFallback = KrakenSource;
    type Quote = KrakenTicker;
    type QuoteFallback = CoinGeckoSource;
}

/// Shared state for the HTTP layer.
pub struct AppState<X: Sources> {
    pub config: RuntimeConfig,
    pub cache: TieredCache<X::Ohlc, X::OhlcFallback>,
    pub quotes: QuoteService<X::Quote, X::QuoteFallback>,
    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl<X: Sources> AppState<X> {
    /// Wire the cache, OHLC store and quote service from their sources.
    pub fn new(
        config: RuntimeConfig,
        ohlc: X::Ohlc,
        ohlc_fallback: X::OhlcFallback,
        quote: X::Quote,
        quote_fallback: X::QuoteFallback,
    ) -> Self {
        let store = match config.durable_dir() {
            Some(dir) => ParquetStore::new(dir),
            None => ParquetStore::disabled(),
        };
        let freshness_secs = i64::try_from(config.freshness().as_secs()).unwrap_or(i64::MAX);

        let ohlc_store = OhlcStore::new(
            ohlc,
            ohlc_fallback,
            store.clone(),
            OhlcStoreConfig {
                lookback_days: config.lookback_days,
                bar_seconds: config.bar_seconds,
                freshness_secs,
            },
        );
        let cache = TieredCache::new(ohlc_store, store, freshness_secs);
        let quotes = QuoteService::new(quote, quote_fallback, config.quote_ttl());

        Self {
            config,
            cache,
            quotes,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppState<LiveSources> {
    /// Build the production state around one shared HTTP client.
    pub fn live(config: RuntimeConfig, client: reqwest::Client) -> Self {
        let polygon = PolygonSource::new(
            client.clone(),
            config.polygon_api_key.clone(),
            config.polygon_ticker.clone(),
            config.bar_seconds,
            config.source_timeout(),
        );
        let kraken = KrakenSource::new(
            client.clone(),
            config.kraken_pair.clone(),
            config.bar_seconds,
            config.source_timeout(),
        );
        let ticker = KrakenTicker::new(
            client.clone(),
            config.kraken_pair.clone(),
            config.quote_timeout(),
        );
        let coingecko =
            CoinGeckoSource::new(client, config.coingecko_id.clone(), config.quote_timeout());

        Self::new(config, polygon, kraken, ticker, coingecko)
    }
}
