use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on how many ranked symbols a scan will look at.
pub const MAX_SCAN_SYMBOLS: usize = 50;

/// One OHLCV observation for a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Start of the interval.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Calendar date of the bar.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Bars for one symbol, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Close prices in series order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Highest volume in the series, `None` when empty.
    pub fn max_volume(&self) -> Option<u64> {
        self.bars.iter().map(|b| b.volume).max()
    }

    /// The most recent bar that has closed.
    ///
    /// The last bar of an intraday series is still forming, so this is the
    /// second-to-last one. `None` when fewer than two bars are present.
    pub fn last_closed(&self) -> Option<&Bar> {
        self.bars.len().checked_sub(2).and_then(|i| self.bars.get(i))
    }
}

/// Candlestick reversal patterns the scanner recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternKind {
    Hammer,
    Engulfing,
    Piercing,
}

impl PatternKind {
    pub const ALL: [PatternKind; 3] = [
        PatternKind::Hammer,
        PatternKind::Engulfing,
        PatternKind::Piercing,
    ];
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Hammer => write!(f, "Hammer"),
            PatternKind::Engulfing => write!(f, "Bullish Engulfing"),
            PatternKind::Piercing => write!(f, "Piercing Line"),
        }
    }
}

/// A pattern found on a given day for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternHit {
    pub symbol: String,
    pub date: NaiveDate,
    pub kind: PatternKind,
}

/// Ranking lists a scan can be run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankCategory {
    /// Highest traded volume today.
    MostActive,
    /// Large, liquid names (options-active list).
    Quality,
}

impl std::fmt::Display for RankCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankCategory::MostActive => write!(f, "most-active"),
            RankCategory::Quality => write!(f, "quality"),
        }
    }
}

/// How far back a bar request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    LastHour,
    Day,
    Year,
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::LastHour => write!(f, "1h"),
            Period::Day => write!(f, "1d"),
            Period::Year => write!(f, "1y"),
        }
    }
}

/// Width of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    FiveMinutes,
    Daily,
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::FiveMinutes => write!(f, "5m"),
            Interval::Daily => write!(f, "1d"),
        }
    }
}

/// Identifier of a chat that receives notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Markup used when rendering a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}
