// =============================================================================
// Money Flow Index (MFI) — volume-weighted RSI
// =============================================================================
//
//   tp_t          = (H + L + C) / 3
//   raw_flow_t    = tp_t * volume_t
//   positive flow = Σ raw_flow_j over the window where tp_j > tp_{j-1}
//   negative flow = Σ raw_flow_j over the window where tp_j < tp_{j-1}
//   MFI           = 100 - 100 / (1 + positive / negative)
//
// MFI is 100 when the window has no negative flow.
// =============================================================================

use super::{common_len, typical_prices, undefined, Series};

/// Compute MFI.  The first defined value is at index `period`.
pub fn calculate_mfi(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
    period: usize,
) -> Series {
    let n = common_len(&[highs, lows, closes, volumes]);
    if period == 0 || n < period + 1 {
        return undefined(n);
    }

    let tp = typical_prices(&highs[..n], &lows[..n], &closes[..n]);
    let raw_flow: Vec<f64> = tp.iter().zip(volumes).map(|(p, v)| p * v).collect();

    let mut result = undefined(period);
    result.reserve(n - period);
    for i in period..n {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for j in i + 1 - period..=i {
            if tp[j] > tp[j - 1] {
                positive += raw_flow[j];
            } else if tp[j] < tp[j - 1] {
                negative += raw_flow[j];
            }
        }

        if negative == 0.0 {
            result.push(Some(100.0));
        } else {
            let ratio = positive / negative;
            result.push(Some(100.0 - 100.0 / (1.0 + ratio)));
        }
    }

    result
}
