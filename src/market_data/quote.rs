// =============================================================================
// Quote service — TTL-cached spot price with a two-source fallback
// =============================================================================
//
// Order of preference on every call:
//   1. cached quote younger than the TTL
//   2. primary source
//   3. fallback source
//   4. last known quote, however old
//
// With nothing at all to serve, a zeroed quote flagged `stale` comes back.
// =============================================================================

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::market_data::source::{Quote, QuoteSource};

/// A quote plus where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuoteSnapshot {
    #[serde(flatten)]
    pub quote: Quote,
    pub source: &'static str,
    /// True when served from the last-known value after every source failed.
    pub stale: bool,
}

struct CachedQuote {
    quote: Quote,
    source: &'static str,
    fetched_at: Instant,
}

pub struct QuoteService<P, S> {
    primary: P,
    fallback: S,
    ttl: Duration,
    cached: RwLock<Option<CachedQuote>>,
}

impl<P: QuoteSource, S: QuoteSource> QuoteService<P, S> {
    pub fn new(primary: P, fallback: S, ttl: Duration) -> Self {
        Self {
            primary,
            fallback,
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> QuoteSnapshot {
        if let Some(hit) = self.fresh() {
            debug!(source = hit.source, "quote served from cache");
            return hit;
        }

        let fetched = match self.primary.fetch_quote().await {
            Ok(q) => Some((q, self.primary.name())),
            Err(e) => {
                warn!(error = %e, "primary quote source failed");
                match self.fallback.fetch_quote().await {
                    Ok(q) => Some((q, self.fallback.name())),
                    Err(e) => {
                        warn!(error = %e, "fallback quote source failed");
                        None
                    }
                }
            }
        };

        match fetched {
            Some((quote, source)) => {
                *self.cached.write() = Some(CachedQuote {
                    quote,
                    source,
                    fetched_at: Instant::now(),
                });
                QuoteSnapshot {
                    quote,
                    source,
                    stale: false,
                }
            }
            None => match self.cached.read().as_ref() {
                Some(c) => QuoteSnapshot {
                    quote: c.quote,
                    source: c.source,
                    stale: true,
                },
                None => QuoteSnapshot {
                    quote: Quote::default(),
                    source: "none",
                    stale: true,
                },
            },
        }
    }

    /// Name the primary source stamps on its snapshots.
    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    fn fresh(&self) -> Option<QuoteSnapshot> {
        let guard = self.cached.read();
        let cached = guard.as_ref()?;
        (cached.fetched_at.elapsed() < self.ttl).then(|| QuoteSnapshot {
            quote: cached.quote,
            source: cached.source,
            stale: false,
        })
    }
}
