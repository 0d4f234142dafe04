// =============================================================================
// Commodity Channel Index (CCI)
// =============================================================================
//
//   CCI = (tp - SMA(tp)) / (0.015 * mean_abs_deviation)
//
// CCI is 0 when the window's mean deviation is 0.

use super::{common_len, typical_prices, undefined, Series};

/// Lambert's constant; scales CCI so ~70-80% of values fall within ±100.
const CCI_CONSTANT: f64 = 0.015;

pub fn calculate_cci(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Series {
    let n = common_len(&[highs, lows, closes]);
    if period == 0 || n < period {
        return undefined(n);
    }

    let tp = typical_prices(&highs[..n], &lows[..n], &closes[..n]);
    let period_f = period as f64;

    let mut result = undefined(period - 1);
    result.reserve(n - period + 1);
    for i in period - 1..n {
        let window = &tp[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period_f;
        let mean_dev = window.iter().map(|p| (p - mean).abs()).sum::<f64>() / period_f;
        if mean_dev == 0.0 {
            result.push(Some(0.0));
        } else {
            result.push(Some((tp[i] - mean) / (CCI_CONSTANT * mean_dev)));
        }
    }

    result
}
