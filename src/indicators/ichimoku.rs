// =============================================================================
// Ichimoku Kinko Hyo
// =============================================================================
//
//   tenkan-sen   = midpoint of the trailing `tenkan` high/low window
//   kijun-sen    = midpoint of the trailing `kijun` high/low window
//   senkou A     = (tenkan + kijun) / 2, plotted `kijun` bars ahead
//   senkou B     = midpoint of the trailing `senkou_b` window, `kijun` ahead
//   chikou span  = close plotted `kijun` bars behind
//
// The forward-shifted spans are truncated to the series length: values that
// would land beyond the last candle are dropped.  Defaults: 9 / 26 / 52.
// =============================================================================

use serde::Serialize;

use super::{common_len, undefined, window_max, window_min, Series};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IchimokuSeries {
    pub tenkan_sen: Series,
    pub kijun_sen: Series,
    pub senkou_a: Series,
    pub senkou_b: Series,
    pub chikou_span: Series,
}

impl IchimokuSeries {
    fn undefined(n: usize) -> Self {
        Self {
            tenkan_sen: undefined(n),
            kijun_sen: undefined(n),
            senkou_a: undefined(n),
            senkou_b: undefined(n),
            chikou_span: undefined(n),
        }
    }
}

/// Midpoint of the trailing high/low window ending at each bar.
fn midpoint_series(highs: &[f64], lows: &[f64], n: usize, period: usize) -> Series {
    (0..n)
        .map(|i| {
            if period == 0 || i + 1 < period {
                None
            } else {
                Some((window_max(highs, i, period) + window_min(lows, i, period)) / 2.0)
            }
        })
        .collect()
}

/// Compute the five Ichimoku lines.
///
/// Requires `len >= senkou_b`; shorter input yields all-`None` outputs.
pub fn calculate_ichimoku(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    tenkan: usize,
    kijun: usize,
    senkou_b: usize,
) -> IchimokuSeries {
    let n = common_len(&[highs, lows, closes]);
    if n < senkou_b || senkou_b == 0 {
        return IchimokuSeries::undefined(n);
    }

    let tenkan_sen = midpoint_series(highs, lows, n, tenkan);
    let kijun_sen = midpoint_series(highs, lows, n, kijun);
    let long_mid = midpoint_series(highs, lows, n, senkou_b);

    let mut senkou_a = undefined(n);
    let mut senkou_b_line = undefined(n);
    for i in 0..n.saturating_sub(kijun) {
        if let (Some(t), Some(k)) = (tenkan_sen[i], kijun_sen[i]) {
            senkou_a[i + kijun] = Some((t + k) / 2.0);
        }
        senkou_b_line[i + kijun] = long_mid[i];
    }

    let chikou_span = (0..n)
        .map(|i| if i + kijun < n { Some(closes[i + kijun]) } else { None })
        .collect();

    IchimokuSeries {
        tenkan_sen,
        kijun_sen,
        senkou_a,
        senkou_b: senkou_b_line,
        chikou_span,
    }
}

/// Ichimoku with the standard 9 / 26 / 52 periods.
pub fn calculate(highs: &[f64], lows: &[f64], closes: &[f64]) -> IchimokuSeries {
    calculate_ichimoku(highs, lows, closes, 9, 26, 52)
}
