pub mod candle;
pub mod coingecko;
pub mod kraken;
pub mod polygon;
pub mod quote;
pub mod source;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::{Candle, CandleSeries};
pub use coingecko::CoinGeckoSource;
pub use kraken::{KrakenSource, KrakenTicker};
pub use polygon::PolygonSource;
pub use quote::{QuoteService, QuoteSnapshot};
pub use source::{OhlcSource, Quote, QuoteSource};
