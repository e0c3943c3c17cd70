use std::fmt;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use common::{
    BarProvider, BarSeries, Clock, Interval, PatternHit, PatternKind, Period, RankCategory,
    RankedSymbolSource, Result, MAX_SCAN_SYMBOLS,
};

use crate::classifier::PatternClassifier;
use crate::config::PatternConfig;

/// Symbol → dates for one pattern kind, in the order symbols were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternDates {
    entries: Vec<(String, Vec<NaiveDate>)>,
}

impl PatternDates {
    pub fn push(&mut self, symbol: &str, date: NaiveDate) {
        match self.entries.iter_mut().find(|(s, _)| s == symbol) {
            Some((_, dates)) => dates.push(date),
            None => self.entries.push((symbol.to_string(), vec![date])),
        }
    }

    pub fn contains(&self, symbol: &str, date: NaiveDate) -> bool {
        self.dates(symbol).is_some_and(|dates| dates.contains(&date))
    }

    pub fn dates(&self, symbol: &str) -> Option<&[NaiveDate]> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, dates)| dates.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every occurrence of `date` for `symbol`. A symbol left with no
    /// dates is removed.
    pub fn remove(&mut self, symbol: &str, date: NaiveDate) -> bool {
        let Some(pos) = self.entries.iter().position(|(s, _)| s == symbol) else {
            return false;
        };
        let dates = &mut self.entries[pos].1;
        let before = dates.len();
        dates.retain(|d| *d != date);
        let removed = dates.len() != before;
        if dates.is_empty() {
            self.entries.remove(pos);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NaiveDate])> {
        self.entries.iter().map(|(s, d)| (s.as_str(), d.as_slice()))
    }
}

/// Pattern hits collected over a scan, rendered as one text section per pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    hammer: PatternDates,
    engulfing: PatternDates,
    piercing: PatternDates,
}

impl ScanReport {
    /// Add a hit; returns whether it was kept.
    ///
    /// Engulfing takes priority over piercing on the same symbol and day: a
    /// piercing line on an engulfing day is dropped, and an engulfing hit
    /// clears a piercing line recorded earlier for that day.
    pub fn record(&mut self, hit: &PatternHit) -> bool {
        match hit.kind {
            PatternKind::Piercing if self.engulfing.contains(&hit.symbol, hit.date) => {
                return false;
            }
            PatternKind::Engulfing => {
                self.piercing.remove(&hit.symbol, hit.date);
            }
            _ => {}
        }
        self.dates_mut(hit.kind).push(&hit.symbol, hit.date);
        true
    }

    pub fn dates(&self, kind: PatternKind) -> &PatternDates {
        match kind {
            PatternKind::Hammer => &self.hammer,
            PatternKind::Engulfing => &self.engulfing,
            PatternKind::Piercing => &self.piercing,
        }
    }

    pub fn is_empty(&self) -> bool {
        PatternKind::ALL.iter().all(|&k| self.dates(k).is_empty())
    }

    fn dates_mut(&mut self, kind: PatternKind) -> &mut PatternDates {
        match kind {
            PatternKind::Hammer => &mut self.hammer,
            PatternKind::Engulfing => &mut self.engulfing,
            PatternKind::Piercing => &mut self.piercing,
        }
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, kind) in PatternKind::ALL.into_iter().enumerate() {
            if n > 0 {
                writeln!(f)?;
            }
            write!(f, "--- {kind} ---")?;
            for (symbol, dates) in self.dates(kind).iter() {
                write!(f, "\n{symbol}:")?;
                for date in dates {
                    write!(f, " {}", date.format("%Y. %m. %d"))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Every raw pattern hit in `series` on or after `since`, in bar order.
///
/// The first bar is skipped since it has no predecessor. Engulfing/piercing
/// overlap is left for `ScanReport::record` to resolve.
pub fn scan_series(series: &BarSeries, config: PatternConfig, since: NaiveDate) -> Vec<PatternHit> {
    let classifier = PatternClassifier::new(series, config);

    (1..series.len())
        .filter(|&i| series.get(i).is_some_and(|bar| bar.date() >= since))
        .flat_map(|i| {
            let date = series.bars()[i].date();
            classifier.classify(i).into_iter().map(move |kind| PatternHit {
                symbol: series.symbol().to_string(),
                date,
                kind,
            })
        })
        .collect()
}

/// Runs the candlestick scan over a ranked symbol list.
pub struct Scanner {
    bars: Arc<dyn BarProvider>,
    ranking: Arc<dyn RankedSymbolSource>,
    clock: Arc<dyn Clock>,
    config: PatternConfig,
    symbol_limit: usize,
}

impl Scanner {
    pub fn new(
        bars: Arc<dyn BarProvider>,
        ranking: Arc<dyn RankedSymbolSource>,
        clock: Arc<dyn Clock>,
        config: PatternConfig,
    ) -> Self {
        Self {
            bars,
            ranking,
            clock,
            config,
            symbol_limit: MAX_SCAN_SYMBOLS,
        }
    }

    pub fn with_symbol_limit(mut self, limit: usize) -> Self {
        self.symbol_limit = limit.min(MAX_SCAN_SYMBOLS);
        self
    }

    /// Scan one year of daily bars per ranked symbol, keeping hits from the
    /// last `lookback_days` days.
    ///
    /// Symbols whose fetch fails or returns nothing are skipped.
    pub async fn scan(&self, category: RankCategory, lookback_days: u64) -> Result<ScanReport> {
        let symbols = self.ranking.ranked_symbols(category).await?;
        let today = self.clock.now().date();
        let since = today.checked_sub_days(Days::new(lookback_days)).unwrap_or(NaiveDate::MIN);

        info!(%category, symbols = symbols.len(), %since, "Starting pattern scan");

        let mut report = ScanReport::default();
        for symbol in symbols.iter().take(self.symbol_limit) {
            let series = match self.bars.fetch_bars(symbol, Period::Year, Interval::Daily).await {
                Ok(series) => series,
                Err(e) => {
                    warn!(%symbol, error = %e, "Bar fetch failed, skipping symbol");
                    continue;
                }
            };
            if series.is_empty() {
                debug!(%symbol, "No bars returned, skipping symbol");
                continue;
            }

            for hit in scan_series(&series, self.config, since) {
                if report.record(&hit) {
                    debug!(symbol = %hit.symbol, date = %hit.date, kind = %hit.kind, "Pattern found");
                }
            }
        }

        info!(%category, "Pattern scan finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDateTime, TimeZone, Utc};
    use common::{Bar, Error};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hit(symbol: &str, d: NaiveDate, kind: PatternKind) -> PatternHit {
        PatternHit {
            symbol: symbol.into(),
            date: d,
            kind,
        }
    }

    /// 60 falling daily bars ending on 2024-03-29.
    fn falling() -> Vec<Bar> {
        let end = Utc.with_ymd_and_hms(2024, 3, 29, 14, 30, 0).unwrap();
        (0..60)
            .map(|k| {
                let close = 200.0 - k as f64;
                let open = close + 0.5;
                Bar {
                    timestamp: end - Duration::days(59 - k as i64),
                    open,
                    high: open + 0.2,
                    low: close - 0.2,
                    close,
                    volume: 1_000,
                }
            })
            .collect()
    }

    fn with_last(mut bars: Vec<Bar>, open: f64, high: f64, low: f64, close: f64) -> Vec<Bar> {
        let last = bars.last_mut().unwrap();
        last.open = open;
        last.high = high;
        last.low = low;
        last.close = close;
        bars
    }

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    struct MockBars {
        series: HashMap<String, Vec<Bar>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BarProvider for MockBars {
        async fn fetch_bars(&self, symbol: &str, period: Period, interval: Interval) -> Result<BarSeries> {
            assert_eq!(period, Period::Year);
            assert_eq!(interval, Interval::Daily);
            self.calls.lock().unwrap().push(symbol.to_string());
            if symbol == "BROKEN" {
                return Err(Error::Http("connection reset".into()));
            }
            let bars = self.series.get(symbol).cloned().unwrap_or_default();
            Ok(BarSeries::new(symbol, bars))
        }
    }

    struct MockRanking(Vec<String>);

    #[async_trait]
    impl RankedSymbolSource for MockRanking {
        async fn ranked_symbols(&self, _category: RankCategory) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn scanner(series: HashMap<String, Vec<Bar>>, ranked: &[&str]) -> (Scanner, Arc<MockBars>) {
        let bars = Arc::new(MockBars {
            series,
            calls: Mutex::new(Vec::new()),
        });
        let ranking = Arc::new(MockRanking(ranked.iter().map(|s| s.to_string()).collect()));
        let clock = Arc::new(FixedClock(date(2024, 3, 29).and_hms_opt(12, 0, 0).unwrap()));
        let scanner = Scanner::new(bars.clone(), ranking, clock, PatternConfig::default());
        (scanner, bars)
    }

    #[test]
    fn piercing_suppressed_on_engulfing_day() {
        let mut report = ScanReport::default();
        let d = date(2024, 3, 29);
        assert!(report.record(&hit("AAA", d, PatternKind::Engulfing)));
        assert!(!report.record(&hit("AAA", d, PatternKind::Piercing)));
        assert!(report.dates(PatternKind::Piercing).is_empty());
    }

    #[test]
    fn engulfing_clears_earlier_piercing_same_day() {
        let mut report = ScanReport::default();
        let d = date(2024, 3, 29);
        report.record(&hit("AAA", date(2024, 3, 28), PatternKind::Piercing));
        report.record(&hit("AAA", d, PatternKind::Piercing));
        assert!(report.record(&hit("AAA", d, PatternKind::Engulfing)));

        assert_eq!(
            report.dates(PatternKind::Piercing).dates("AAA"),
            Some(&[date(2024, 3, 28)][..])
        );
        assert!(report.dates(PatternKind::Engulfing).contains("AAA", d));
    }

    #[test]
    fn piercing_kept_for_other_symbol_or_day() {
        let mut report = ScanReport::default();
        let d = date(2024, 3, 29);
        report.record(&hit("AAA", d, PatternKind::Engulfing));
        assert!(report.record(&hit("BBB", d, PatternKind::Piercing)));
        assert!(report.record(&hit("AAA", date(2024, 3, 28), PatternKind::Piercing)));
    }

    #[test]
    fn renders_all_sections_even_when_empty() {
        let text = ScanReport::default().to_string();
        assert_eq!(
            text,
            "--- Hammer ---\n\n--- Bullish Engulfing ---\n\n--- Piercing Line ---\n"
        );
    }

    #[test]
    fn renders_dates_in_scan_order() {
        let mut report = ScanReport::default();
        report.record(&hit("TSLA", date(2024, 3, 25), PatternKind::Hammer));
        report.record(&hit("NVDA", date(2024, 3, 26), PatternKind::Hammer));
        report.record(&hit("TSLA", date(2024, 3, 28), PatternKind::Hammer));

        let text = report.to_string();
        assert!(text.starts_with("--- Hammer ---\nTSLA: 2024. 03. 25 2024. 03. 28\nNVDA: 2024. 03. 26\n"));
    }

    #[test]
    fn scan_series_ignores_bars_before_cutoff() {
        // The engulfing bar sits on 2024-03-29; a cutoff after it hides it.
        let bars = with_last(falling(), 141.0, 143.7, 140.8, 143.5);
        let series = BarSeries::new("AAA", bars);
        assert!(!scan_series(&series, PatternConfig::default(), date(2024, 3, 22)).is_empty());
        assert!(scan_series(&series, PatternConfig::default(), date(2024, 3, 30)).is_empty());
    }

    #[tokio::test]
    async fn scan_collects_hits_and_skips_missing_symbols() {
        let mut series = HashMap::new();
        series.insert("ENG".to_string(), with_last(falling(), 141.0, 143.7, 140.8, 143.5));
        series.insert("PRC".to_string(), with_last(falling(), 141.0, 142.4, 140.8, 142.3));
        series.insert("HAM".to_string(), with_last(falling(), 141.0, 141.25, 139.0, 141.2));
        series.insert("FLAT".to_string(), falling());

        let (scanner, bars) = scanner(series, &["ENG", "GONE", "BROKEN", "PRC", "HAM", "FLAT"]);
        let report = scanner.scan(RankCategory::MostActive, 7).await.unwrap();

        let day = date(2024, 3, 29);
        assert_eq!(report.dates(PatternKind::Engulfing).dates("ENG"), Some(&[day][..]));
        assert!(report.dates(PatternKind::Piercing).dates("ENG").is_none());
        assert_eq!(report.dates(PatternKind::Piercing).dates("PRC"), Some(&[day][..]));
        assert_eq!(report.dates(PatternKind::Hammer).dates("HAM"), Some(&[day][..]));
        assert!(report.dates(PatternKind::Hammer).dates("GONE").is_none());
        assert!(report.dates(PatternKind::Hammer).dates("FLAT").is_none());
        assert_eq!(bars.calls.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn scan_caps_symbol_count() {
        let ranked: Vec<String> = (0..80).map(|i| format!("S{i}")).collect();
        let ranked: Vec<&str> = ranked.iter().map(String::as_str).collect();
        let (scanner, bars) = scanner(HashMap::new(), &ranked);

        let report = scanner.scan(RankCategory::Quality, 7).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(bars.calls.lock().unwrap().len(), MAX_SCAN_SYMBOLS);
    }
}
