// =============================================================================
// Stochastic Oscillator (%K / %D)
// =============================================================================
//
//   %K = 100 * (close - lowest_low) / (highest_high - lowest_low)
//   %D = SMA(%K, d)
//
// A zero-range window (highest_high == lowest_low) yields %K = 50.
// Defaults: k 14, d 3.
// =============================================================================

use serde::Serialize;

use super::sma::calculate_sma_of_series;
use super::{common_len, undefined, window_max, window_min, Series};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StochasticSeries {
    pub k: Series,
    pub d: Series,
}

pub fn calculate_stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> StochasticSeries {
    let n = common_len(&[highs, lows, closes]);
    if k_period == 0 || n < k_period {
        return StochasticSeries {
            k: undefined(n),
            d: undefined(n),
        };
    }

    let mut k = undefined(k_period - 1);
    k.reserve(n - k_period + 1);
    for i in k_period - 1..n {
        let highest = window_max(highs, i, k_period);
        let lowest = window_min(lows, i, k_period);
        let range = highest - lowest;
        if range == 0.0 {
            k.push(Some(50.0));
        } else {
            k.push(Some(100.0 * (closes[i] - lowest) / range));
        }
    }

    let d = calculate_sma_of_series(&k, d_period);
    StochasticSeries { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::approx;

    #[test]
    fn stochastic_short_input() {
        let out = calculate_stochastic(&[1.0; 5], &[1.0; 5], &[1.0; 5], 14, 3);
        assert_eq!(out.k.len(), 5);
        assert!(out.k.iter().chain(&out.d).all(Option::is_none));
    }

    #[test]
    fn stochastic_flat_window_is_50() {
        let out = calculate_stochastic(&[100.0; 20], &[100.0; 20], &[100.0; 20], 14, 3);
        for v in out.k.iter().flatten() {
            assert_eq!(*v, 50.0);
        }
        for v in out.d.iter().flatten() {
            assert_eq!(*v, 50.0);
        }
    }

    #[test]
    fn stochastic_close_at_extremes() {
        let highs = [10.0, 11.0, 12.0];
        let lows = [8.0, 9.0, 10.0];
        // last close at the window high => 100; at the window low => 0
        let top = calculate_stochastic(&highs, &lows, &[9.0, 10.0, 12.0], 3, 1);
        assert!(approx(top.k[2].unwrap(), 100.0));
        let bottom = calculate_stochastic(&highs, &lows, &[9.0, 10.0, 8.0], 3, 1);
        assert!(approx(bottom.k[2].unwrap(), 0.0));
    }

    #[test]
    fn stochastic_d_starts_after_k_plus_d() {
        let n = 30;
        let highs: Vec<f64> = (0..n).map(|i| 10.0 + (i % 5) as f64).collect();
        let lows: Vec<f64> = highs.iter().map(|h| h - 3.0).collect();
        let closes: Vec<f64> = highs.iter().map(|h| h - 1.0).collect();
        let out = calculate_stochastic(&highs, &lows, &closes, 14, 3);
        assert!(out.k[..13].iter().all(Option::is_none));
        assert!(out.k[13].is_some());
        assert!(out.d[..15].iter().all(Option::is_none));
        assert!(out.d[15].is_some());
    }
}
