// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.  The
//      larger of the two moves wins; the other is zeroed (Wilder's rule).
//   2. Compute True Range (TR) per bar.
//   3. Smooth +DM, -DM, and TR with EMA(period).
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100      (0 when both DI are 0)
//   6. ADX = EMA(period) of DX, undefined DX counted as 0.
//
// Interpretation:
//   ADX > 25  => trending market
//   ADX < 20  => ranging / choppy market
// =============================================================================

use serde::Serialize;

use super::atr::true_range;
use super::ema::calculate_ema;
use super::{common_len, undefined, Series};

/// ADX with its two directional indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdxSeries {
    pub adx: Series,
    pub plus_di: Series,
    pub minus_di: Series,
}

/// Compute ADX, +DI, and -DI.
///
/// Requires at least `2 * period` bars; shorter input (or `period == 0`)
/// yields all-`None` outputs.
pub fn calculate_adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> AdxSeries {
    let n = common_len(&[highs, lows, closes]);
    if period == 0 || n < period * 2 {
        return AdxSeries {
            adx: undefined(n),
            plus_di: undefined(n),
            minus_di: undefined(n),
        };
    }

    // ------------------------------------------------------------------
    // Step 1 & 2: Raw +DM, -DM, and True Range
    // ------------------------------------------------------------------
    let mut plus_dm = Vec::with_capacity(n);
    let mut minus_dm = Vec::with_capacity(n);
    plus_dm.push(0.0);
    minus_dm.push(0.0);

    for i in 1..n {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }
    let tr = true_range(&highs[..n], &lows[..n], &closes[..n]);

    // ------------------------------------------------------------------
    // Step 3: Smoothing
    // ------------------------------------------------------------------
    let smooth_tr = calculate_ema(&tr, period);
    let smooth_plus = calculate_ema(&plus_dm, period);
    let smooth_minus = calculate_ema(&minus_dm, period);

    // ------------------------------------------------------------------
    // Step 4 & 5: DI and DX
    // ------------------------------------------------------------------
    let mut plus_di = Vec::with_capacity(n);
    let mut minus_di = Vec::with_capacity(n);
    let mut dx = Vec::with_capacity(n);

    for i in 0..n {
        match smooth_tr[i] {
            Some(atr) if atr != 0.0 => {
                let pdi = 100.0 * smooth_plus[i].unwrap_or(0.0) / atr;
                let mdi = 100.0 * smooth_minus[i].unwrap_or(0.0) / atr;
                plus_di.push(Some(pdi));
                minus_di.push(Some(mdi));
                dx.push(Some(compute_dx(pdi, mdi)));
            }
            _ => {
                plus_di.push(None);
                minus_di.push(None);
                dx.push(None);
            }
        }
    }

    // ------------------------------------------------------------------
    // Step 6: ADX
    // ------------------------------------------------------------------
    let dx_filled: Vec<f64> = dx.iter().map(|v| v.unwrap_or(0.0)).collect();
    let adx = calculate_ema(&dx_filled, period);

    AdxSeries {
        adx,
        plus_di,
        minus_di,
    }
}

/// DX from the two directional indicators; 0 when both are 0.
fn compute_dx(plus_di: f64, minus_di: f64) -> f64 {
    let sum = plus_di + minus_di;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / sum
    }
}
