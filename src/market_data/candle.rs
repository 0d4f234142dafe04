// =============================================================================
// Candle Series — ordered, de-duplicated daily OHLCV history
// =============================================================================
//
// A `CandleSeries` is always sorted ascending by `time` with no duplicate
// timestamps.  It is never edited element-by-element: every change goes
// through `merge`, which builds a fresh series and the caller swaps it in.
//
// Merge rule: key by `time`, the incoming batch overwrites existing entries
// at the same key, then re-emit in ascending order.  Merging the same batch
// twice yields the same series.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single OHLCV bar.  `time` is the bar open in epoch seconds.
///
/// OHLC consistency (`high >= low` etc.) is not enforced; upstream garbage is
/// carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Ascending, duplicate-free sequence of candles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from arbitrary candles.  Input may be unsorted and may
    /// contain duplicate timestamps; the later occurrence wins.
    pub fn from_candles(candles: Vec<Candle>) -> Self {
        Self::empty().merge(&candles)
    }

    pub fn empty() -> Self {
        Self {
            candles: Vec::new(),
        }
    }

    /// Merge `batch` into this series and return the result.
    ///
    /// Entries in `batch` replace entries with the same `time`.  The length of
    /// the result is `len(self) + |new timestamps in batch|`.
    pub fn merge(&self, batch: &[Candle]) -> Self {
        if batch.is_empty() {
            return self.clone();
        }

        let mut by_time: BTreeMap<i64, Candle> =
            self.candles.iter().map(|c| (c.time, *c)).collect();
        for candle in batch {
            by_time.insert(candle.time, *candle);
        }

        Self {
            candles: by_time.into_values().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Timestamp of the newest candle, if any.
    pub fn newest_time(&self) -> Option<i64> {
        self.candles.last().map(|c| c.time)
    }

    /// The trailing `count` candles (all of them when shorter).
    pub fn tail(&self, count: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(count);
        &self.candles[start..]
    }

    pub fn times(&self) -> Vec<i64> {
        self.candles.iter().map(|c| c.time).collect()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}
