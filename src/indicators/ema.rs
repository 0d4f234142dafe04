// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = (x_t - EMA_{t-1}) * multiplier + EMA_{t-1}
//
// The first EMA value sits at index `period - 1` and is seeded with the SMA
// of the first `period` values.
// =============================================================================

use super::{undefined, Series};

/// Compute the EMA series for `values` and look-back `period`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - `values.len() < period` => all `None`
/// - Positions before `period - 1` are `None`
pub fn calculate_ema(values: &[f64], period: usize) -> Series {
    let n = values.len();
    if period == 0 || n < period {
        return undefined(n);
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = undefined(period - 1);
    result.reserve(n - period + 1);
    result.push(Some(seed));

    let mut prev = seed;
    for &value in &values[period..] {
        let ema = (value - prev) * multiplier + prev;
        result.push(Some(ema));
        prev = ema;
    }

    result
}

/// EMA of the contiguous defined run that starts at the first `Some` in
/// `series`, placed back at its original offsets.
///
/// Used for the MACD signal line, whose input is only defined from the slow
/// EMA's seed index onward.  A `None` after the run starts ends the run.
pub fn calculate_ema_of_defined(series: &[Option<f64>], period: usize) -> Series {
    let n = series.len();
    let Some(start) = series.iter().position(Option::is_some) else {
        return undefined(n);
    };

    let run: Vec<f64> = series[start..].iter().map_while(|v| *v).collect();
    let ema = calculate_ema(&run, period);

    let mut result = undefined(n);
    for (offset, value) in ema.into_iter().enumerate() {
        result[start + offset] = value;
    }
    result
}
