// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the simple mean of the
//          first `period` gains / losses.
// Step 3 — Apply Wilder's smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// RSI is exactly 100 whenever the average loss is 0, including a perfectly
// flat market.
// =============================================================================

use super::{undefined, Series};

/// Compute the RSI series for `closes`.
///
/// Output index `i` holds the RSI after the delta ending at close `i`.  The
/// first defined value is at index `period`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `closes.len() < period + 1` => all `None` (need `period` deltas)
pub fn calculate_rsi(closes: &[f64], period: usize) -> Series {
    let n = closes.len();
    if period == 0 || n < period + 1 {
        return undefined(n);
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |d: f64| if d > 0.0 { d } else { 0.0 };
    let loss = |d: f64| if d < 0.0 { -d } else { 0.0 };

    let period_f = period as f64;
    let mut avg_gain = deltas[..period].iter().map(|&d| gain(d)).sum::<f64>() / period_f;
    let mut avg_loss = deltas[..period].iter().map(|&d| loss(d)).sum::<f64>() / period_f;

    let mut result = undefined(period);
    result.reserve(n - period);
    result.push(Some(rsi_from_averages(avg_gain, avg_loss)));

    for &delta in &deltas[period..] {
        avg_gain = (avg_gain * (period_f - 1.0) + gain(delta)) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss(delta)) / period_f;
        result.push(Some(rsi_from_averages(avg_gain, avg_loss)));
    }

    result
}

/// Convert average gain / average loss into an RSI value.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
