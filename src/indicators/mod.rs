// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free series transforms.  Every function takes input
// slices (oldest first) and returns a `Series` of exactly the input length,
// holding `None` wherever the look-back window is not yet satisfied.  Input
// shorter than the minimum look-back yields an all-`None` series; nothing
// here panics or shortens its output.
//
// `None` is the only "no value" marker inside the engine.  NaN/Inf that
// arise from garbage input are carried as `Some(..)` and scrubbed at the
// serialization boundary (`api::payload`).

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod ichimoku;
pub mod levels;
pub mod macd;
pub mod mfi;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod volume_analysis;
pub mod vwap;
pub mod williams_r;

/// One indicator value per candle; `None` = undefined at that position.
pub type Series = Vec<Option<f64>>;

/// An all-undefined series of length `n`.
pub fn undefined(n: usize) -> Series {
    vec![None; n]
}

/// Typical price `(high + low + close) / 3` per bar.
pub fn typical_prices(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    highs
        .iter()
        .zip(lows)
        .zip(closes)
        .map(|((h, l), c)| (h + l + c) / 3.0)
        .collect()
}

/// Highest value of `values[end + 1 - period ..= end]`.
///
/// Caller guarantees `end + 1 >= period` and `period > 0`.
pub(crate) fn window_max(values: &[f64], end: usize, period: usize) -> f64 {
    values[end + 1 - period..=end]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Lowest value of `values[end + 1 - period ..= end]`.
pub(crate) fn window_min(values: &[f64], end: usize, period: usize) -> f64 {
    values[end + 1 - period..=end]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Number of bars shared by every input slice.
pub(crate) fn common_len(slices: &[&[f64]]) -> usize {
    slices.iter().map(|s| s.len()).min().unwrap_or(0)
}
