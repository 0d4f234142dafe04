// =============================================================================
// MACD — Moving Average Convergence / Divergence
// =============================================================================
//
//   macd      = EMA(fast) - EMA(slow)          (where both are defined)
//   signal    = EMA(macd, signal)              (over the defined macd run)
//   histogram = macd - signal
//
// Defaults: fast 12, slow 26, signal 9.
// =============================================================================

use serde::Serialize;

use super::ema::{calculate_ema, calculate_ema_of_defined};
use super::{undefined, Series};

/// The three index-aligned MACD outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSeries {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

impl MacdSeries {
    fn undefined(n: usize) -> Self {
        Self {
            macd: undefined(n),
            signal: undefined(n),
            histogram: undefined(n),
        }
    }
}

/// Compute MACD with explicit periods.
///
/// All outputs are `None` when `closes.len() < slow`.  The signal line (and
/// histogram) stay `None` when fewer than `signal` MACD values exist.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let n = closes.len();
    if n < slow {
        return MacdSeries::undefined(n);
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let macd: Series = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let defined = macd.iter().filter(|v| v.is_some()).count();
    if signal == 0 || defined < signal {
        return MacdSeries {
            macd,
            signal: undefined(n),
            histogram: undefined(n),
        };
    }

    let signal_line = calculate_ema_of_defined(&macd, signal);
    let histogram = macd
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    }
}

/// MACD with the standard 12 / 26 / 9 periods.
pub fn calculate(closes: &[f64]) -> MacdSeries {
    calculate_macd(closes, 12, 26, 9)
}
