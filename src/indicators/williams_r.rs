// =============================================================================
// Williams %R
// =============================================================================
//
//   %R = -100 * (highest_high - close) / (highest_high - lowest_low)
//
// Range is [-100, 0]; a zero-range window yields -50.

use super::{common_len, undefined, window_max, window_min, Series};

pub fn calculate_williams_r(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Series {
    let n = common_len(&[highs, lows, closes]);
    if period == 0 || n < period {
        return undefined(n);
    }

    let mut result = undefined(period - 1);
    result.reserve(n - period + 1);
    for i in period - 1..n {
        let highest = window_max(highs, i, period);
        let lowest = window_min(lows, i, period);
        let range = highest - lowest;
        if range == 0.0 {
            result.push(Some(-50.0));
        } else {
            result.push(Some(-100.0 * (highest - closes[i]) / range));
        }
    }

    result
}
