use common::{Bar, BarSeries, PatternKind};

use crate::config::PatternConfig;
use crate::indicators::SmaIndicator;

/// Bullish reversal detection over one symbol's bar series.
///
/// Every pattern is gated by a downtrend filter: the short SMA of closes must
/// sit strictly below the long SMA at the evaluated index. Until the long SMA
/// has a full window of history the filter is false, so early bars never
/// report a pattern.
pub struct PatternClassifier<'a> {
    series: &'a BarSeries,
    config: PatternConfig,
    short_sma: Vec<Option<f64>>,
    long_sma: Vec<Option<f64>>,
}

impl<'a> PatternClassifier<'a> {
    pub fn new(series: &'a BarSeries, config: PatternConfig) -> Self {
        let closes = series.closes();
        Self {
            series,
            config,
            short_sma: SmaIndicator::new(config.short_window).rolling(&closes),
            long_sma: SmaIndicator::new(config.long_window).rolling(&closes),
        }
    }

    pub fn is_downtrend(&self, index: usize) -> bool {
        let short = self.short_sma.get(index).copied().flatten();
        let long = self.long_sma.get(index).copied().flatten();
        matches!((short, long), (Some(s), Some(l)) if s < l)
    }

    pub fn is_hammer(&self, index: usize) -> bool {
        self.series
            .get(index)
            .is_some_and(|bar| hammer_shape(bar, &self.config) && self.is_downtrend(index))
    }

    pub fn is_engulfing(&self, index: usize) -> bool {
        self.with_previous(index, engulfing_shape) && self.is_downtrend(index)
    }

    pub fn is_piercing(&self, index: usize) -> bool {
        self.with_previous(index, piercing_shape) && self.is_downtrend(index)
    }

    pub fn matches(&self, index: usize, kind: PatternKind) -> bool {
        match kind {
            PatternKind::Hammer => self.is_hammer(index),
            PatternKind::Engulfing => self.is_engulfing(index),
            PatternKind::Piercing => self.is_piercing(index),
        }
    }

    /// All patterns present at `index`, in `PatternKind::ALL` order.
    pub fn classify(&self, index: usize) -> Vec<PatternKind> {
        PatternKind::ALL
            .into_iter()
            .filter(|&kind| self.matches(index, kind))
            .collect()
    }

    fn with_previous(&self, index: usize, shape: fn(&Bar, &Bar) -> bool) -> bool {
        if index == 0 {
            return false;
        }
        match (self.series.get(index - 1), self.series.get(index)) {
            (Some(prev), Some(cur)) => shape(prev, cur),
            _ => false,
        }
    }
}

/// Small body near the top of the range with a long lower wick.
/// A zero-range bar is never a hammer.
pub fn hammer_shape(bar: &Bar, config: &PatternConfig) -> bool {
    let range = bar.high - bar.low;
    if range <= 0.0 || range.is_nan() {
        return false;
    }

    let body = (bar.close - bar.open).abs();
    let lower_wick = bar.open.min(bar.close) - bar.low;
    let upper_shadow = bar.high - bar.open.max(bar.close);

    body / range <= config.body_ratio
        && lower_wick >= config.lower_wick_ratio * body
        && upper_shadow / range <= config.upper_shadow_ratio
        && bar.open != bar.close
}

/// Bullish body that fully covers the previous bearish body.
pub fn engulfing_shape(prev: &Bar, cur: &Bar) -> bool {
    cur.is_bullish() && prev.is_bearish() && cur.close > prev.open && cur.open < prev.close
}

/// Bullish bar opening below the previous bearish close and closing above its midpoint.
pub fn piercing_shape(prev: &Bar, cur: &Bar) -> bool {
    let midpoint = (prev.open + prev.close) / 2.0;
    cur.is_bullish() && prev.is_bearish() && cur.close > midpoint && cur.open < prev.close
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn ohlc(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    /// `n` small bearish bars with closes falling one point per bar from 200.
    fn falling(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|k| {
                let close = 200.0 - k as f64;
                let open = close + 0.5;
                Bar {
                    timestamp: start + Duration::days(k as i64),
                    open,
                    high: open + 0.2,
                    low: close - 0.2,
                    close,
                    volume: 1_000,
                }
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<Bar> {
        let mut bars = falling(n);
        bars.reverse();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (k, bar) in bars.iter_mut().enumerate() {
            bar.timestamp = start + Duration::days(k as i64);
        }
        bars
    }

    fn replace_last(mut bars: Vec<Bar>, open: f64, high: f64, low: f64, close: f64) -> BarSeries {
        let last = bars.last_mut().unwrap();
        last.open = open;
        last.high = high;
        last.low = low;
        last.close = close;
        BarSeries::new("TEST", bars)
    }

    #[test]
    fn hammer_shape_accepts_long_lower_wick() {
        let cfg = PatternConfig::default();
        assert!(hammer_shape(&ohlc(141.0, 141.25, 139.0, 141.2), &cfg));
    }

    #[test]
    fn hammer_shape_rejects_doji_and_degenerate_bars() {
        let cfg = PatternConfig::default();
        // open == close
        assert!(!hammer_shape(&ohlc(141.0, 141.05, 139.0, 141.0), &cfg));
        // high == low
        assert!(!hammer_shape(&ohlc(10.0, 10.0, 10.0, 10.0), &cfg));
    }

    #[test]
    fn hammer_shape_rejects_tall_upper_shadow() {
        let cfg = PatternConfig::default();
        assert!(!hammer_shape(&ohlc(141.0, 142.0, 139.0, 141.2), &cfg));
    }

    #[test]
    fn downtrend_needs_full_long_window() {
        let series = BarSeries::new("TEST", falling(60));
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(!clf.is_downtrend(48));
        assert!(clf.is_downtrend(49));
        assert!(clf.is_downtrend(59));
        assert!(!clf.is_downtrend(60));
    }

    #[test]
    fn engulfing_detected_in_downtrend() {
        // prev bar: open 142.5, close 142.0
        let series = replace_last(falling(60), 141.0, 143.7, 140.8, 143.5);
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(clf.is_engulfing(59));
        assert_eq!(
            clf.classify(59),
            vec![PatternKind::Engulfing, PatternKind::Piercing]
        );
    }

    #[test]
    fn piercing_without_engulfing() {
        let series = replace_last(falling(60), 141.0, 142.4, 140.8, 142.3);
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(clf.is_piercing(59));
        assert!(!clf.is_engulfing(59));
    }

    #[test]
    fn hammer_detected_in_downtrend() {
        let series = replace_last(falling(60), 141.0, 141.25, 139.0, 141.2);
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(clf.is_hammer(59));
    }

    #[test]
    fn hammer_rejected_without_history() {
        let series = replace_last(falling(30), 171.0, 171.25, 169.0, 171.2);
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(!clf.is_hammer(29));
    }

    #[test]
    fn patterns_suppressed_in_uptrend() {
        let mut bars = rising(60);
        // Bearish bar followed by an engulfing hammer-ish bar at the top of an uptrend.
        let prev = &mut bars[58];
        prev.open = 199.5;
        prev.close = 199.0;
        let series = replace_last(bars, 198.0, 201.0, 197.9, 200.0);
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(!clf.is_downtrend(59));
        assert!(clf.classify(59).is_empty());
    }

    #[test]
    fn equal_smas_are_not_a_downtrend() {
        // Closes sit at 100 except a 98 / 102 pair at the end, so both SMA
        // windows sum to the same average at the last bar.
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut bars: Vec<Bar> = (0..60)
            .map(|k| Bar {
                timestamp: start + Duration::days(k as i64),
                ..ohlc(100.5, 100.7, 99.8, 100.0)
            })
            .collect();
        bars[58] = Bar {
            timestamp: bars[58].timestamp,
            ..ohlc(99.0, 99.2, 97.8, 98.0)
        };
        let series = replace_last(bars, 97.5, 102.2, 97.4, 102.0);
        let clf = PatternClassifier::new(&series, PatternConfig::default());

        assert!(engulfing_shape(&series.bars()[58], &series.bars()[59]));
        assert_eq!(clf.short_sma[59], Some(100.0));
        assert_eq!(clf.long_sma[59], Some(100.0));
        assert!(!clf.is_downtrend(59));
        assert!(clf.classify(59).is_empty());
    }

    #[test]
    fn first_bar_has_no_two_bar_pattern() {
        let series = BarSeries::new("TEST", falling(60));
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(!clf.is_engulfing(0));
        assert!(!clf.is_piercing(0));
    }

    #[test]
    fn out_of_range_index_is_false() {
        let series = BarSeries::new("TEST", falling(5));
        let clf = PatternClassifier::new(&series, PatternConfig::default());
        assert!(clf.classify(10).is_empty());
    }
}
