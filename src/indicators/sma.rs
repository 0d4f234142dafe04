// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_t = mean(x_{t-period+1} ..= x_t)
//
// Computed with a running window sum, O(n) regardless of `period`.
// =============================================================================

use super::{undefined, Series};

/// SMA of `values` over `period`.
///
/// Positions `0..period-1` are `None`.  `period == 0` or
/// `values.len() < period` yields an all-`None` series.
pub fn calculate_sma(values: &[f64], period: usize) -> Series {
    let n = values.len();
    if period == 0 || n < period {
        return undefined(n);
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(n);
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            result.push(Some(sum / period_f));
        } else {
            result.push(None);
        }
    }

    result
}

/// SMA over a series that may itself contain undefined positions.
///
/// A window produces a value only when all `period` members are defined.
/// Used for %D (SMA of %K).
pub fn calculate_sma_of_series(values: &[Option<f64>], period: usize) -> Series {
    let n = values.len();
    if period == 0 || n < period {
        return undefined(n);
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(n);
    let mut sum = 0.0;
    let mut missing = 0usize;

    for i in 0..n {
        match values[i] {
            Some(v) => sum += v,
            None => missing += 1,
        }
        if i >= period {
            match values[i - period] {
                Some(v) => sum -= v,
                None => missing -= 1,
            }
        }
        if i + 1 >= period && missing == 0 {
            result.push(Some(sum / period_f));
        } else {
            result.push(None);
        }
    }

    result
}
