// =============================================================================
// Volume Analysis — spike statistics and real-time volume signals
// =============================================================================
//
// Works on USD volume (`volume * close`) over the trailing `HISTORY` candles.
//
// Spike: today's volume against a baseline of the previous `lookback` days
// (today excluded).  z-score uses the population standard deviation and is 0
// when the baseline is flat; the ratio to the mean is 1 when the mean is 0.
//
// Signals:
//   velocity     today vs yesterday, percent
//   divergence   volume and price moving in opposite directions
//   pressure     where the close sits in the day's high/low range
//   breakout     today vs the highest volume in the lookback window
//   trend        least-squares slope of the window, relative to the mean
//
// A live 24h volume (and price) may replace the last candle's reading for the
// spike statistics, velocity and breakout; divergence and pressure always use
// the closed candles.

use serde::Serialize;

use crate::error::BuildError;
use crate::market_data::Candle;

/// Candles considered at all.
pub const HISTORY: usize = 60;
/// Fewer candles than this and nothing is computed.
pub const MIN_CANDLES: usize = 20;
pub const MIN_LOOKBACK: usize = 7;
pub const MAX_LOOKBACK: usize = 30;
pub const DEFAULT_LOOKBACK: usize = 14;

/// z-score at or above which a day counts as a spike.
const SPIKE_Z: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeLevel {
    Extreme,
    High,
    Elevated,
    AboveAverage,
    Normal,
    BelowAverage,
    VeryLow,
}

impl SpikeLevel {
    pub fn from_z(z: f64) -> Self {
        if z >= 3.0 {
            Self::Extreme
        } else if z >= 2.0 {
            Self::High
        } else if z >= 1.5 {
            Self::Elevated
        } else if z >= 1.0 {
            Self::AboveAverage
        } else if z <= -1.5 {
            Self::VeryLow
        } else if z <= -1.0 {
            Self::BelowAverage
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceType {
    Bullish,
    Bearish,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pressure {
    StrongBuying,
    SlightBuying,
    Neutral,
    SlightSelling,
    StrongSelling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// A live reading that supersedes the newest candle's volume and close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveVolume {
    pub volume_usd: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub volume: f64,
    pub price: f64,
    pub z_score: f64,
    pub is_spike: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSpike {
    pub current_volume: f64,
    pub current_price: f64,
    pub avg_volume: f64,
    pub median_volume: f64,
    pub std_volume: f64,
    pub z_score: f64,
    pub percentile: f64,
    pub volume_ratio: f64,
    pub spike_level: SpikeLevel,
    pub is_spike: bool,
    /// Baseline days oldest first, then the current reading.
    pub volume_history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Velocity {
    pub value: f64,
    pub direction: Direction,
    /// Moved 50% or more day over day.
    pub alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divergence {
    #[serde(rename = "type")]
    pub kind: DivergenceType,
    pub strength: Strength,
    pub price_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyPressure {
    pub ratio: f64,
    pub label: Pressure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakout {
    pub is_breakout: bool,
    pub days_since_high: usize,
    pub lookback_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub direction: VolumeTrend,
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSignals {
    pub volume_velocity: Velocity,
    pub price_volume_divergence: Divergence,
    pub buy_pressure: BuyPressure,
    pub volume_breakout: Breakout,
    pub volume_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeAnalysis {
    pub spike: VolumeSpike,
    pub realtime_signals: VolumeSignals,
    pub lookback_days: usize,
}

/// Clamp a requested lookback into `[MIN_LOOKBACK, MAX_LOOKBACK]`.
pub fn clamp_lookback(requested: Option<i64>) -> usize {
    let requested = requested.unwrap_or(DEFAULT_LOOKBACK as i64);
    requested.clamp(MIN_LOOKBACK as i64, MAX_LOOKBACK as i64) as usize
}

pub fn analyze_volume(
    candles: &[Candle],
    lookback: usize,
    live: Option<LiveVolume>,
) -> Result<VolumeAnalysis, BuildError> {
    if candles.len() < MIN_CANDLES {
        return Err(BuildError::InsufficientData {
            required: MIN_CANDLES,
            available: candles.len(),
        });
    }
    let lookback = lookback.clamp(MIN_LOOKBACK, MAX_LOOKBACK);
    let recent = &candles[candles.len().saturating_sub(HISTORY)..];

    let volumes: Vec<f64> = recent.iter().map(|c| c.volume * c.close).collect();
    let closes: Vec<f64> = recent.iter().map(|c| c.close).collect();
    let n = volumes.len();

    let window_start = n.saturating_sub(lookback + 1);
    let window = &volumes[window_start..];
    let baseline = &window[..window.len() - 1];
    let baseline_prices = &closes[window_start..n - 1];

    let (mut current_volume, mut current_price) = (volumes[n - 1], closes[n - 1]);
    if let Some(live) = live {
        current_volume = live.volume_usd;
        current_price = live.price;
    }

    let avg = mean(baseline);
    let std = population_std(baseline, avg);
    let z_of = |v: f64| if std > 0.0 { (v - avg) / std } else { 0.0 };
    let z_score = z_of(current_volume);

    let below = baseline.iter().filter(|v| **v < current_volume).count();
    let percentile = below as f64 / baseline.len() as f64 * 100.0;
    let volume_ratio = if avg > 0.0 { current_volume / avg } else { 1.0 };

    let mut volume_history: Vec<HistoryPoint> = baseline
        .iter()
        .zip(baseline_prices)
        .map(|(&volume, &price)| HistoryPoint {
            volume,
            price,
            z_score: z_of(volume),
            is_spike: z_of(volume) >= SPIKE_Z,
        })
        .collect();
    volume_history.push(HistoryPoint {
        volume: current_volume,
        price: current_price,
        z_score,
        is_spike: z_score >= SPIKE_Z,
    });

    let spike = VolumeSpike {
        current_volume,
        current_price,
        avg_volume: avg,
        median_volume: median(baseline),
        std_volume: std,
        z_score,
        percentile,
        volume_ratio,
        spike_level: SpikeLevel::from_z(z_score),
        is_spike: z_score >= SPIKE_Z,
        volume_history,
    };

    let last = recent[n - 1];
    let realtime_signals = VolumeSignals {
        volume_velocity: velocity(current_volume, volumes[n - 2]),
        price_volume_divergence: divergence(&volumes, &closes),
        buy_pressure: buy_pressure(&last),
        volume_breakout: breakout(&volumes, current_volume, lookback),
        volume_trend: trend(window, avg),
    };

    Ok(VolumeAnalysis {
        spike,
        realtime_signals,
        lookback_days: lookback,
    })
}

// =============================================================================
// Signals
// =============================================================================

fn percent_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

fn velocity(current: f64, previous: f64) -> Velocity {
    let value = percent_change(current, previous);
    let direction = if value > 0.0 {
        Direction::Up
    } else if value < 0.0 {
        Direction::Down
    } else {
        Direction::Flat
    };
    Velocity {
        value,
        direction,
        alert: value.abs() >= 50.0,
    }
}

/// Day-over-day change of the closed candles.  Volume up on a falling price
/// reads bullish (accumulation); volume down on a rising price bearish.
fn divergence(volumes: &[f64], closes: &[f64]) -> Divergence {
    let n = volumes.len();
    let price_change = percent_change(closes[n - 1], closes[n - 2]);
    let vol_change = percent_change(volumes[n - 1], volumes[n - 2]);

    let (kind, strength) = if vol_change > 20.0 && price_change < -1.0 {
        let strength = if vol_change > 50.0 { Strength::Strong } else { Strength::Moderate };
        (DivergenceType::Bullish, strength)
    } else if vol_change < -20.0 && price_change > 1.0 {
        let strength = if vol_change < -50.0 { Strength::Strong } else { Strength::Moderate };
        (DivergenceType::Bearish, strength)
    } else if vol_change > 10.0 && price_change < 0.0 {
        (DivergenceType::Bullish, Strength::Weak)
    } else if vol_change < -10.0 && price_change > 0.0 {
        (DivergenceType::Bearish, Strength::Weak)
    } else {
        (DivergenceType::None, Strength::None)
    };

    Divergence {
        kind,
        strength,
        price_change,
    }
}

fn buy_pressure(candle: &Candle) -> BuyPressure {
    let range = candle.high - candle.low;
    if range <= 0.0 {
        return BuyPressure {
            ratio: 0.5,
            label: Pressure::Neutral,
        };
    }
    let ratio = (candle.close - candle.low) / range;
    let label = if ratio > 0.7 {
        Pressure::StrongBuying
    } else if ratio > 0.5 {
        Pressure::SlightBuying
    } else if ratio < 0.3 {
        Pressure::StrongSelling
    } else if ratio < 0.5 {
        Pressure::SlightSelling
    } else {
        Pressure::Neutral
    };
    BuyPressure { ratio, label }
}

fn breakout(volumes: &[f64], current: f64, lookback: usize) -> Breakout {
    let n = volumes.len();
    if n < lookback {
        return Breakout {
            is_breakout: false,
            days_since_high: 0,
            lookback_max: current,
        };
    }

    let lookback_max = volumes[n - lookback..n - 1]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    let mut days_since_high = 0;
    for i in 1..lookback.min(n) {
        if volumes[n - 1 - i] >= current {
            break;
        }
        days_since_high = i;
    }

    Breakout {
        is_breakout: current > lookback_max,
        days_since_high,
        lookback_max,
    }
}

fn trend(window: &[f64], avg: f64) -> Trend {
    let slope = ols_slope(window);
    let band = avg * 0.01;
    let direction = if slope > band {
        VolumeTrend::Increasing
    } else if slope < -band {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Stable
    };
    let strength = if avg > 0.0 { slope.abs() / avg * 100.0 } else { 0.0 };
    Trend { direction, strength }
}

// =============================================================================
// Statistics helpers
// =============================================================================

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return mean * 0.1;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Least-squares slope of `values` against their index.
fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean(values);
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::approx;

    /// Candles with close 1.0, so USD volume equals `volume`.
    fn bars(volumes: &[f64]) -> Vec<Candle> {
        volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| Candle {
                time: i as i64 * 86_400,
                open: 1.0,
                high: 1.5,
                low: 0.5,
                close: 1.0,
                volume,
            })
            .collect()
    }

    #[test]
    fn needs_twenty_candles() {
        assert_eq!(
            analyze_volume(&bars(&[1.0; 19]), 14, None),
            Err(BuildError::InsufficientData {
                required: 20,
                available: 19
            })
        );
    }

    #[test]
    fn flat_baseline_gives_zero_z() {
        let mut volumes = vec![10.0; 25];
        volumes[24] = 50.0;
        let out = analyze_volume(&bars(&volumes), 14, None).unwrap();
        assert_eq!(out.spike.std_volume, 0.0);
        assert_eq!(out.spike.z_score, 0.0);
        assert_eq!(out.spike.spike_level, SpikeLevel::Normal);
        assert!(!out.spike.is_spike);
        assert!(approx(out.spike.volume_ratio, 5.0));
        assert_eq!(out.spike.percentile, 100.0);
    }

    #[test]
    fn zero_mean_gives_unit_ratio() {
        let out = analyze_volume(&bars(&[0.0; 25]), 14, None).unwrap();
        assert_eq!(out.spike.avg_volume, 0.0);
        assert_eq!(out.spike.volume_ratio, 1.0);
        assert_eq!(out.spike.z_score, 0.0);
        assert_eq!(out.spike.percentile, 0.0);
        assert_eq!(out.realtime_signals.volume_trend.strength, 0.0);
    }

    #[test]
    fn baseline_excludes_today() {
        // Baseline of 14 days: 1..=14.  Today: 10.5.
        let mut volumes = vec![100.0; 10];
        volumes.extend((1..=14).map(f64::from));
        volumes.push(10.5);
        let out = analyze_volume(&bars(&volumes), 14, None).unwrap();

        assert!(approx(out.spike.avg_volume, 7.5));
        assert!(approx(out.spike.median_volume, 7.5));
        let expected_std = ((1..=14).map(|v| (v as f64 - 7.5).powi(2)).sum::<f64>() / 14.0).sqrt();
        assert!(approx(out.spike.std_volume, expected_std));
        assert!(approx(out.spike.percentile, 10.0 / 14.0 * 100.0));
        assert_eq!(out.spike.volume_history.len(), 15);
        assert_eq!(out.spike.volume_history[0].volume, 1.0);
        assert_eq!(out.spike.volume_history[14].volume, 10.5);
    }

    #[test]
    fn spike_levels_follow_z_thresholds() {
        assert_eq!(SpikeLevel::from_z(3.0), SpikeLevel::Extreme);
        assert_eq!(SpikeLevel::from_z(2.0), SpikeLevel::High);
        assert_eq!(SpikeLevel::from_z(1.5), SpikeLevel::Elevated);
        assert_eq!(SpikeLevel::from_z(1.0), SpikeLevel::AboveAverage);
        assert_eq!(SpikeLevel::from_z(0.99), SpikeLevel::Normal);
        assert_eq!(SpikeLevel::from_z(-1.0), SpikeLevel::BelowAverage);
        assert_eq!(SpikeLevel::from_z(-1.5), SpikeLevel::VeryLow);
    }

    #[test]
    fn large_day_is_an_extreme_breakout() {
        let mut volumes: Vec<f64> = (0..25).map(|i| 10.0 + (i % 2) as f64).collect();
        volumes.push(100.0);
        let out = analyze_volume(&bars(&volumes), 14, None).unwrap();

        assert_eq!(out.spike.spike_level, SpikeLevel::Extreme);
        assert!(out.spike.is_spike);
        let breakout = &out.realtime_signals.volume_breakout;
        assert!(breakout.is_breakout);
        assert_eq!(breakout.lookback_max, 11.0);
        assert_eq!(breakout.days_since_high, 13);
        let velocity = &out.realtime_signals.volume_velocity;
        assert_eq!(velocity.direction, Direction::Up);
        assert!(velocity.alert);
    }

    #[test]
    fn live_reading_replaces_last_candle() {
        let volumes: Vec<f64> = (0..25).map(|i| 10.0 + (i % 3) as f64).collect();
        let live = LiveVolume {
            volume_usd: 500.0,
            price: 2.0,
        };
        let out = analyze_volume(&bars(&volumes), 14, Some(live)).unwrap();
        assert_eq!(out.spike.current_volume, 500.0);
        assert_eq!(out.spike.current_price, 2.0);
        assert_eq!(out.spike.volume_history.last().unwrap().volume, 500.0);
        // Divergence reads closed candles only.
        assert_eq!(out.realtime_signals.price_volume_divergence.price_change, 0.0);
    }

    #[test]
    fn volume_up_price_down_is_bullish_divergence() {
        let mut candles = bars(&[1.0; 24]);
        candles[22].close = 100.0;
        candles[23].close = 98.0;
        candles[23].volume = 2.0;
        let out = analyze_volume(&candles, 14, None).unwrap();
        let d = &out.realtime_signals.price_volume_divergence;
        assert_eq!(d.kind, DivergenceType::Bullish);
        assert_eq!(d.strength, Strength::Strong);
        assert!(approx(d.price_change, -2.0));
    }

    #[test]
    fn close_position_sets_pressure() {
        let mut candle = bars(&[1.0])[0];
        (candle.high, candle.low, candle.close) = (10.0, 0.0, 8.0);
        assert_eq!(buy_pressure(&candle).label, Pressure::StrongBuying);
        candle.close = 4.0;
        assert_eq!(buy_pressure(&candle).label, Pressure::SlightSelling);
        candle.close = 5.0;
        assert_eq!(buy_pressure(&candle).label, Pressure::Neutral);
        (candle.high, candle.low) = (5.0, 5.0);
        let flat = buy_pressure(&candle);
        assert_eq!((flat.ratio, flat.label), (0.5, Pressure::Neutral));
    }

    #[test]
    fn rising_volume_trends_up() {
        let volumes: Vec<f64> = (1..=30).map(f64::from).collect();
        let out = analyze_volume(&bars(&volumes), 14, None).unwrap();
        assert_eq!(out.realtime_signals.volume_trend.direction, VolumeTrend::Increasing);
        assert!(approx(ols_slope(&[1.0, 3.0, 5.0]), 2.0));
    }

    #[test]
    fn lookback_is_clamped() {
        assert_eq!(clamp_lookback(None), 14);
        assert_eq!(clamp_lookback(Some(3)), 7);
        assert_eq!(clamp_lookback(Some(90)), 30);
        let out = analyze_volume(&bars(&[1.0; 40]), 2, None).unwrap();
        assert_eq!(out.lookback_days, 7);
        assert_eq!(out.spike.volume_history.len(), 8);
    }
}
