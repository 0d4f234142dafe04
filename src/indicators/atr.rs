// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR_0 = H_0 - L_0
//   TR_t = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_{period-1} = mean(TR_0 ..= TR_{period-1})
//   ATR_t          = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// Default period: 14
// =============================================================================

use super::{common_len, undefined, Series};

/// True range per bar.  The first bar has no previous close, so its TR is
/// simply `high - low`.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = common_len(&[highs, lows, closes]);
    let mut tr = Vec::with_capacity(n);
    for i in 0..n {
        let hl = highs[i] - lows[i];
        if i == 0 {
            tr.push(hl);
            continue;
        }
        let prev_close = closes[i - 1];
        let hc = (highs[i] - prev_close).abs();
        let lc = (lows[i] - prev_close).abs();
        tr.push(hl.max(hc).max(lc));
    }
    tr
}

/// Compute the ATR series.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - fewer than `period + 1` bars => all `None`
/// - Positions before `period - 1` are `None`
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Series {
    let n = common_len(&[highs, lows, closes]);
    if period == 0 || n < period + 1 {
        return undefined(n);
    }

    let tr = true_range(highs, lows, closes);
    let period_f = period as f64;

    let mut atr = tr[..period].iter().sum::<f64>() / period_f;
    let mut result = undefined(period - 1);
    result.reserve(n - period + 1);
    result.push(Some(atr));

    for &value in &tr[period..] {
        atr = (atr * (period_f - 1.0) + value) / period_f;
        result.push(Some(atr));
    }

    result
}
