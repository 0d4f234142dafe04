// =============================================================================
// Volume Weighted Average Price (VWAP)
// =============================================================================
//
//   VWAP_t = Σ(tp_i * volume_i) / Σ volume_i   for i in 0..=t
//
// Anchored at the first candle of the series.  Undefined only while the
// cumulative volume is still zero.

use super::{common_len, typical_prices, Series};

pub fn calculate_vwap(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64]) -> Series {
    let n = common_len(&[highs, lows, closes, volumes]);
    let tp = typical_prices(&highs[..n], &lows[..n], &closes[..n]);

    let mut cumulative_tpv = 0.0;
    let mut cumulative_volume = 0.0;
    tp.iter()
        .zip(volumes)
        .map(|(price, volume)| {
            cumulative_tpv += price * volume;
            cumulative_volume += volume;
            if cumulative_volume != 0.0 {
                Some(cumulative_tpv / cumulative_volume)
            } else {
                None
            }
        })
        .collect()
}
