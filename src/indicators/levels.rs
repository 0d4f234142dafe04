// =============================================================================
// Price Levels — Pivot Points & Fibonacci Retracement
// =============================================================================
//
// Single-bar levels rather than series.
//
// Standard pivot points from one (high, low, close):
//   P  = (H + L + C) / 3
//   R1 = 2P - L        S1 = 2P - H
//   R2 = P + (H - L)   S2 = P - (H - L)
//   R3 = H + 2(P - L)  S3 = L - 2(H - P)
//
// Fibonacci retracement places the fixed ratios 0, .236, .382, .5, .618,
// .786, 1 across a (high, low) range, measured up from the low.
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub level_0: f64,
    pub level_236: f64,
    pub level_382: f64,
    pub level_500: f64,
    pub level_618: f64,
    pub level_786: f64,
    pub level_100: f64,
}

pub fn calculate_pivot_points(high: f64, low: f64, close: f64) -> PivotPoints {
    let pivot = (high + low + close) / 3.0;
    PivotPoints {
        pivot,
        r1: 2.0 * pivot - low,
        r2: pivot + (high - low),
        r3: high + 2.0 * (pivot - low),
        s1: 2.0 * pivot - high,
        s2: pivot - (high - low),
        s3: low - 2.0 * (high - pivot),
    }
}

pub fn calculate_fibonacci_retracement(high: f64, low: f64) -> FibonacciLevels {
    let diff = high - low;
    FibonacciLevels {
        level_0: low,
        level_236: low + 0.236 * diff,
        level_382: low + 0.382 * diff,
        level_500: low + 0.5 * diff,
        level_618: low + 0.618 * diff,
        level_786: low + 0.786 * diff,
        level_100: high,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::approx;

    #[test]
    fn pivot_points_known_values() {
        // H 110, L 90, C 100 => P 100
        let p = calculate_pivot_points(110.0, 90.0, 100.0);
        assert!(approx(p.pivot, 100.0));
        assert!(approx(p.r1, 110.0));
        assert!(approx(p.s1, 90.0));
        assert!(approx(p.r2, 120.0));
        assert!(approx(p.s2, 80.0));
        assert!(approx(p.r3, 130.0));
        assert!(approx(p.s3, 70.0));
    }

    #[test]
    fn fibonacci_spans_range() {
        let f = calculate_fibonacci_retracement(200.0, 100.0);
        assert_eq!(f.level_0, 100.0);
        assert_eq!(f.level_100, 200.0);
        assert!(approx(f.level_236, 123.6));
        assert!(approx(f.level_500, 150.0));
        assert!(approx(f.level_618, 161.8));
        assert!(approx(f.level_786, 178.6));
    }
}
