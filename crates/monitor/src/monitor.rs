use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use common::{BarProvider, ChatId, Clock, Config, Interval, Notifier, Period, TextFormat};

use crate::format;
use crate::hours::MarketHours;
use crate::registry::{Registration, WatchId, WatchInfo, WatchRegistry};
use crate::watch::{VolumeWatch, WatchState};

/// Tunables for volume watches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// A closed bar at or below `collapse_ratio × max` ends the watch.
    pub collapse_ratio: f64,
    pub hours: MarketHours,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            collapse_ratio: 0.3,
            hours: MarketHours::default(),
        }
    }
}

impl From<&Config> for MonitorConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            collapse_ratio: cfg.collapse_ratio,
            hours: MarketHours::new(cfg.window_start, cfg.window_end),
        }
    }
}

/// What happened to a start request. Every outcome has already been
/// reported to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { id: WatchId, max_volume: u64 },
    Duplicate,
    NotFound,
    OutsideHours,
    InvalidSymbol,
    FetchFailed,
}

/// Dependencies shared by the monitor and every watch task.
pub(crate) struct Shared {
    pub(crate) bars: Arc<dyn BarProvider>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) registry: Arc<WatchRegistry>,
    pub(crate) config: MonitorConfig,
}

/// Entry point for starting and stopping volume watches.
pub struct Monitor {
    shared: Arc<Shared>,
}

impl Monitor {
    pub fn new(
        bars: Arc<dyn BarProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                bars,
                notifier,
                clock,
                registry: Arc::new(WatchRegistry::new()),
                config,
            }),
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.shared.registry
    }

    /// Start watching `raw_symbol` for `chat`.
    ///
    /// The last hour of 5-minute bars sets the starting max volume. The watch
    /// is refused outside market hours, for unknown symbols, and for symbols
    /// that are already watched.
    pub async fn start_watch(&self, chat: ChatId, raw_symbol: &str) -> StartOutcome {
        let shared = &self.shared;

        let Some(symbol) = normalize_symbol(raw_symbol) else {
            self.reply(chat, format::invalid_symbol(), TextFormat::Plain).await;
            return StartOutcome::InvalidSymbol;
        };

        if !shared.config.hours.contains(shared.clock.now().time()) {
            self.reply(chat, format::start_outside_hours(), TextFormat::Plain).await;
            return StartOutcome::OutsideHours;
        }

        if shared.registry.owner_of(&symbol).is_some() {
            self.reply(chat, format::duplicate(&symbol), TextFormat::Html).await;
            return StartOutcome::Duplicate;
        }

        let baseline = match shared
            .bars
            .fetch_bars(&symbol, Period::LastHour, Interval::FiveMinutes)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(%symbol, error = %e, "Baseline fetch failed");
                self.reply(chat, format::fetch_failed(&symbol), TextFormat::Plain).await;
                return StartOutcome::FetchFailed;
            }
        };

        let Some(max_volume) = baseline.max_volume() else {
            self.reply(chat, format::not_found(&symbol), TextFormat::Plain).await;
            return StartOutcome::NotFound;
        };

        let id = Uuid::new_v4();
        let watch = VolumeWatch::new(
            id,
            WatchState {
                chat,
                symbol: symbol.clone(),
                max_volume,
                created_at: Utc::now(),
            },
            Arc::clone(shared),
        );
        let task = tokio::spawn(watch.run());

        if let Registration::Duplicate { .. } = shared.registry.register(chat, &symbol, id, task) {
            self.reply(chat, format::duplicate(&symbol), TextFormat::Html).await;
            return StartOutcome::Duplicate;
        }

        info!(chat_id = chat.0, %symbol, max_volume, "Volume watch started");
        self.reply(chat, format::started(&symbol, max_volume), TextFormat::Html).await;
        StartOutcome::Started { id, max_volume }
    }

    /// Stop one watch of `chat`. Returns false if it was not running.
    pub fn stop_watch(&self, chat: ChatId, raw_symbol: &str) -> bool {
        normalize_symbol(raw_symbol).is_some_and(|symbol| self.shared.registry.cancel(chat, &symbol))
    }

    /// Stop every watch of every chat.
    pub fn stop_all(&self) -> usize {
        self.shared.registry.cancel_all()
    }

    pub fn watches(&self, chat: ChatId) -> Vec<WatchInfo> {
        self.shared.registry.watches(chat)
    }

    async fn reply(&self, chat: ChatId, text: String, format: TextFormat) {
        self.shared.notifier.notify(chat, &text, format).await;
    }
}

/// Upper-case a user-typed ticker. `None` unless it is 1–15 characters of
/// ASCII alphanumerics or `.-^=`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 15
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    valid.then_some(symbol)
}
