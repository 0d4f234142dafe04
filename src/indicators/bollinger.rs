// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the population standard deviation
// of the trailing `period` window.

use serde::Serialize;

use super::sma::calculate_sma;
use super::{undefined, Series};

/// Index-aligned upper / middle / lower bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Calculate Bollinger Bands for the given closing prices.
///
/// All three bands are `None` before index `period - 1`, and everywhere when
/// `closes.len() < period`.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> BollingerBands {
    let n = closes.len();
    if period == 0 || n < period {
        return BollingerBands {
            upper: undefined(n),
            middle: undefined(n),
            lower: undefined(n),
        };
    }

    let middle = calculate_sma(closes, period);
    let mut upper = Vec::with_capacity(n);
    let mut lower = Vec::with_capacity(n);

    for (i, mid) in middle.iter().enumerate() {
        match mid {
            Some(mean) => {
                let window = &closes[i + 1 - period..=i];
                let variance =
                    window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
                let std_dev = variance.sqrt();
                upper.push(Some(mean + num_std * std_dev));
                lower.push(Some(mean - num_std * std_dev));
            }
            None => {
                upper.push(None);
                lower.push(None);
            }
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::{approx, random_walk};

    #[test]
    fn bollinger_insufficient_data() {
        let bb = calculate_bollinger(&[1.0; 10], 20, 2.0);
        assert_eq!(bb.upper.len(), 10);
        assert!(bb.upper.iter().chain(&bb.middle).chain(&bb.lower).all(Option::is_none));
    }

    #[test]
    fn bollinger_flat_market_collapses() {
        let bb = calculate_bollinger(&[100.0; 25], 20, 2.0);
        for i in 19..25 {
            assert!(approx(bb.upper[i].unwrap(), 100.0));
            assert!(approx(bb.lower[i].unwrap(), 100.0));
        }
    }

    #[test]
    fn bollinger_population_stddev() {
        // window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population σ = 2
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bb = calculate_bollinger(&closes, 8, 2.0);
        assert!(approx(bb.middle[7].unwrap(), 5.0));
        assert!(approx(bb.upper[7].unwrap(), 9.0));
        assert!(approx(bb.lower[7].unwrap(), 1.0));
    }

    #[test]
    fn bollinger_bands_bracket_middle() {
        let closes = random_walk(100, 9);
        let bb = calculate_bollinger(&closes, 20, 2.0);
        for i in 19..100 {
            let (u, m, l) = (bb.upper[i].unwrap(), bb.middle[i].unwrap(), bb.lower[i].unwrap());
            assert!(u >= m && m >= l);
        }
    }
}
