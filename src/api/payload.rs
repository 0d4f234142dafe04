// =============================================================================
// Serialization boundary
// =============================================================================
//
// Internal series use `Option<f64>` for "undefined", and intermediate math is
// free to produce NaN or ±Inf.  Nothing non-finite crosses this line: every
// value leaving the service is either a finite number or JSON `null`.
// =============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::CacheHit;
use crate::dataset::{DerivedDataset, Levels};
use crate::indicators::Series;
use crate::market_data::Candle;
use crate::types::CacheTier;

/// Columns grouped under `indicators.ichimoku` rather than emitted flat.
const ICHIMOKU_COLUMNS: [&str; 5] = [
    "tenkan_sen",
    "kijun_sen",
    "senkou_a",
    "senkou_b",
    "chikou_span",
];

/// A finite value or `None`.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Series with every non-finite entry replaced by `None`.
pub fn sanitize_series(series: &Series) -> Series {
    series.iter().map(|v| v.and_then(finite)).collect()
}

#[derive(Debug, Serialize)]
pub struct OhlcRow {
    pub time: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Option<f64>>,
}

impl OhlcRow {
    pub fn with_volume(c: &Candle) -> Self {
        Self {
            volume: Some(finite(c.volume)),
            ..Self::without_volume(c)
        }
    }

    pub fn without_volume(c: &Candle) -> Self {
        Self {
            time: c.time,
            open: finite(c.open),
            high: finite(c.high),
            low: finite(c.low),
            close: finite(c.close),
            volume: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LevelsPayload {
    pub pivot_points: Option<Map<String, Value>>,
    pub fibonacci: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct MetaPayload {
    pub symbol: String,
    pub timeframe: String,
    pub candles: usize,
    pub last_update: i64,
    pub cache_tier: CacheTier,
}

#[derive(Debug, Serialize)]
pub struct ChartPayload {
    pub ohlc: Vec<OhlcRow>,
    pub indicators: Map<String, Value>,
    pub levels: LevelsPayload,
    pub meta: MetaPayload,
}

/// Body returned when no dataset has ever been built.
pub fn no_data_body() -> Value {
    serde_json::json!({
        "error": "No data available",
        "ohlc": [],
        "indicators": {},
    })
}

fn series_value(series: &Series) -> Value {
    Value::Array(
        sanitize_series(series)
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
    )
}

/// Serialize a level struct, mapping non-finite fields to `null`.
fn level_map<T: Serialize>(levels: &T) -> Option<Map<String, Value>> {
    // Non-finite f64 serialize as `null` in serde_json, which is what the
    // boundary wants.
    match serde_json::to_value(levels) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub fn indicators_payload(dataset: &DerivedDataset) -> Map<String, Value> {
    let mut flat = Map::new();
    let mut ichimoku = Map::new();
    for (name, series) in dataset.indicators().columns() {
        let value = series_value(series);
        if ICHIMOKU_COLUMNS.contains(&name) {
            ichimoku.insert(name.to_string(), value);
        } else {
            flat.insert(name.to_string(), value);
        }
    }
    flat.insert("ichimoku".to_string(), Value::Object(ichimoku));
    flat
}

fn levels_payload(levels: &Levels) -> LevelsPayload {
    LevelsPayload {
        pivot_points: level_map(&levels.pivot_points),
        fibonacci: levels.fibonacci.as_ref().and_then(level_map),
    }
}

impl ChartPayload {
    pub fn from_hit(hit: &CacheHit, symbol: &str, timeframe: &str) -> Self {
        let dataset = &hit.entry.dataset;
        Self {
            ohlc: dataset
                .candles()
                .as_slice()
                .iter()
                .map(OhlcRow::with_volume)
                .collect(),
            indicators: indicators_payload(dataset),
            levels: levels_payload(dataset.levels()),
            meta: MetaPayload {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
                candles: dataset.len(),
                last_update: hit.entry.built_at.timestamp(),
                cache_tier: hit.tier,
            },
        }
    }
}
