// =============================================================================
// Derived Dataset — candles plus every indicator, index-aligned
// =============================================================================
//
// `build` runs the indicator engine once per indicator over a candle series
// and packs the outputs into one immutable struct.  Every column has exactly
// `candles.len()` entries.  The dataset is never patched: a refresh builds a
// new one and the cache swaps it in.
//
// Levels are single values, not series:
//   - pivot points from the most recent candle
//   - Fibonacci retracement over the trailing 90-candle high/low, only when
//     at least 90 candles exist
// =============================================================================

use serde::Serialize;

use crate::error::BuildError;
use crate::indicators::levels::{
    calculate_fibonacci_retracement, calculate_pivot_points, FibonacciLevels, PivotPoints,
};
use crate::indicators::{
    adx, atr, bollinger, cci, ema, ichimoku, macd, mfi, obv, rsi, sma, stochastic, vwap,
    williams_r, Series,
};
use crate::market_data::CandleSeries;

/// Smallest series the builder accepts.
pub const MIN_CANDLES: usize = 50;

/// Trailing window used for the Fibonacci range.
pub const FIB_WINDOW: usize = 90;

/// Declares `IndicatorColumns` with one `Series` field per named column, plus
/// name-based access used by persistence and the serialization boundary.
macro_rules! indicator_columns {
    ($($name:ident),+ $(,)?) => {
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub struct IndicatorColumns {
            $(pub $name: Series,)+
        }

        impl IndicatorColumns {
            /// Column names in declaration order.
            pub const NAMES: &'static [&'static str] = &[$(stringify!($name)),+];

            /// `(name, series)` pairs in declaration order.
            pub fn columns(&self) -> Vec<(&'static str, &Series)> {
                vec![$((stringify!($name), &self.$name)),+]
            }

            /// Reassemble from named columns.  Every column must be present and
            /// have length `len`.
            pub fn from_columns(
                mut columns: std::collections::HashMap<String, Series>,
                len: usize,
            ) -> Result<Self, String> {
                Ok(Self {
                    $($name: {
                        let series = columns
                            .remove(stringify!($name))
                            .ok_or_else(|| format!("missing column {}", stringify!($name)))?;
                        if series.len() != len {
                            return Err(format!(
                                "column {} has {} rows, expected {}",
                                stringify!($name),
                                series.len(),
                                len
                            ));
                        }
                        series
                    },)+
                })
            }
        }
    };
}

indicator_columns!(
    sma_20,
    sma_50,
    sma_200,
    ema_12,
    ema_26,
    rsi,
    macd,
    macd_signal,
    macd_histogram,
    bb_upper,
    bb_middle,
    bb_lower,
    atr,
    stoch_k,
    stoch_d,
    obv,
    mfi,
    cci,
    williams_r,
    adx,
    plus_di,
    minus_di,
    vwap,
    tenkan_sen,
    kijun_sen,
    senkou_a,
    senkou_b,
    chikou_span,
);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Levels {
    pub pivot_points: PivotPoints,
    pub fibonacci: Option<FibonacciLevels>,
}

/// Candles plus every derived series.  Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedDataset {
    candles: CandleSeries,
    indicators: IndicatorColumns,
    levels: Levels,
}

impl DerivedDataset {
    /// Reassemble a dataset from previously computed columns.  Levels are a
    /// pure function of the candles and are recomputed here.
    pub fn from_parts(
        candles: CandleSeries,
        indicators: IndicatorColumns,
    ) -> Result<Self, BuildError> {
        let levels = levels_for(&candles)?;
        Ok(Self {
            candles,
            indicators,
            levels,
        })
    }

    pub fn candles(&self) -> &CandleSeries {
        &self.candles
    }

    pub fn indicators(&self) -> &IndicatorColumns {
        &self.indicators
    }

    pub fn levels(&self) -> &Levels {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Pivot points from the newest candle; Fibonacci over the trailing window
/// when the series is long enough.
pub fn levels_for(series: &CandleSeries) -> Result<Levels, BuildError> {
    let last = series.last().ok_or(BuildError::InsufficientData {
        required: MIN_CANDLES,
        available: 0,
    })?;
    let pivot_points = calculate_pivot_points(last.high, last.low, last.close);

    let fibonacci = (series.len() >= FIB_WINDOW).then(|| {
        let window = series.tail(FIB_WINDOW);
        let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        calculate_fibonacci_retracement(high, low)
    });

    Ok(Levels {
        pivot_points,
        fibonacci,
    })
}

/// Build the full dataset from a candle series.
pub fn build(series: &CandleSeries) -> Result<DerivedDataset, BuildError> {
    let n = series.len();
    if n < MIN_CANDLES {
        return Err(BuildError::InsufficientData {
            required: MIN_CANDLES,
            available: n,
        });
    }

    let highs = series.highs();
    let lows = series.lows();
    let closes = series.closes();
    let volumes = series.volumes();

    let macd = macd::calculate(&closes);
    let bands = bollinger::calculate_bollinger(&closes, 20, 2.0);
    let stoch = stochastic::calculate_stochastic(&highs, &lows, &closes, 14, 3);
    let dmi = adx::calculate_adx(&highs, &lows, &closes, 14);
    let cloud = ichimoku::calculate(&highs, &lows, &closes);

    let indicators = IndicatorColumns {
        sma_20: sma::calculate_sma(&closes, 20),
        sma_50: sma::calculate_sma(&closes, 50),
        sma_200: sma::calculate_sma(&closes, 200),
        ema_12: ema::calculate_ema(&closes, 12),
        ema_26: ema::calculate_ema(&closes, 26),
        rsi: rsi::calculate_rsi(&closes, 14),
        macd: macd.macd,
        macd_signal: macd.signal,
        macd_histogram: macd.histogram,
        bb_upper: bands.upper,
        bb_middle: bands.middle,
        bb_lower: bands.lower,
        atr: atr::calculate_atr(&highs, &lows, &closes, 14),
        stoch_k: stoch.k,
        stoch_d: stoch.d,
        obv: obv::calculate_obv(&closes, &volumes),
        mfi: mfi::calculate_mfi(&highs, &lows, &closes, &volumes, 14),
        cci: cci::calculate_cci(&highs, &lows, &closes, 20),
        williams_r: williams_r::calculate_williams_r(&highs, &lows, &closes, 14),
        adx: dmi.adx,
        plus_di: dmi.plus_di,
        minus_di: dmi.minus_di,
        vwap: vwap::calculate_vwap(&highs, &lows, &closes, &volumes),
        tenkan_sen: cloud.tenkan_sen,
        kijun_sen: cloud.kijun_sen,
        senkou_a: cloud.senkou_a,
        senkou_b: cloud.senkou_b,
        chikou_span: cloud.chikou_span,
    };

    DerivedDataset::from_parts(series.clone(), indicators)
}
