use async_trait::async_trait;

use crate::{BarSeries, ChatId, Interval, Period, RankCategory, Result, TextFormat};

/// Source of OHLCV bars.
///
/// `YahooClient` implements this against the public chart API. An unknown
/// symbol is reported as `Ok` with an empty series, never as an error.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Fetch bars for `symbol` covering `period`, one bar per `interval`,
    /// oldest first.
    async fn fetch_bars(&self, symbol: &str, period: Period, interval: Interval)
        -> Result<BarSeries>;
}

/// Source of the current top-N symbol list for a ranking category.
#[async_trait]
pub trait RankedSymbolSource: Send + Sync {
    async fn ranked_symbols(&self, category: RankCategory) -> Result<Vec<String>>;
}

/// Fire-and-forget delivery of text to a chat.
///
/// Implementations log delivery failures instead of returning them; no
/// caller can do anything useful with a failed alert.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat: ChatId, text: &str, format: TextFormat);
}
