// =============================================================================
// On-Balance Volume (OBV)
// =============================================================================
//
// Running volume total seeded with the first bar's volume: add the bar's
// volume on an up-close, subtract it on a down-close, carry on a flat close.
// OBV has no look-back, so every position is defined.

use super::{common_len, Series};

pub fn calculate_obv(closes: &[f64], volumes: &[f64]) -> Series {
    let n = common_len(&[closes, volumes]);
    let mut result = Vec::with_capacity(n);
    if n == 0 {
        return result;
    }

    let mut obv = volumes[0];
    result.push(Some(obv));
    for i in 1..n {
        if closes[i] > closes[i - 1] {
            obv += volumes[i];
        } else if closes[i] < closes[i - 1] {
            obv -= volumes[i];
        }
        result.push(Some(obv));
    }

    result
}
