use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use common::{ChatId, Interval, Period, TextFormat};

use crate::format;
use crate::monitor::Shared;
use crate::registry::WatchId;

/// Running state of one watch. Only its own task reads or writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchState {
    pub chat: ChatId,
    pub symbol: String,
    /// Highest closed-bar volume seen since the watch started.
    pub max_volume: u64,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a watch. `Stopped`, `Collapsed` and `OutOfHours` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Starting,
    Active,
    /// Cancelled from outside.
    Stopped,
    /// Volume fell to or below the collapse ratio of the max.
    Collapsed,
    /// A tick ran outside market hours; every watch was shut down.
    OutOfHours,
}

impl WatchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WatchPhase::Stopped | WatchPhase::Collapsed | WatchPhase::OutOfHours
        )
    }
}

/// Polls intraday volume for one symbol and alerts one chat.
pub struct VolumeWatch {
    id: WatchId,
    state: WatchState,
    phase: WatchPhase,
    shared: Arc<Shared>,
}

impl VolumeWatch {
    pub(crate) fn new(id: WatchId, state: WatchState, shared: Arc<Shared>) -> Self {
        Self {
            id,
            state,
            phase: WatchPhase::Starting,
            shared,
        }
    }

    /// Tick loop. The first poll happens one interval after start; ticks of
    /// one watch never overlap.
    pub(crate) async fn run(mut self) {
        self.phase = WatchPhase::Active;
        let period = self.shared.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.tick().await.is_terminal() {
                break;
            }
        }

        info!(
            chat_id = self.state.chat.0,
            symbol = %self.state.symbol,
            phase = ?self.phase,
            "Watch finished"
        );
    }

    /// One poll: fetch today's 5-minute bars and act on the last closed one.
    ///
    /// Every action is committed against the registry, under its lock, right
    /// before the notification goes out. A watch cancelled earlier sends
    /// nothing.
    pub(crate) async fn tick(&mut self) -> WatchPhase {
        let shared = Arc::clone(&self.shared);
        let chat = self.state.chat;
        let symbol = self.state.symbol.clone();

        let series = match shared
            .bars
            .fetch_bars(&symbol, Period::Day, Interval::FiveMinutes)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!(%symbol, error = %e, "Volume fetch failed, skipping tick");
                return self.phase;
            }
        };

        if !shared.registry.is_current(chat, &symbol, self.id) {
            self.phase = WatchPhase::Stopped;
            return self.phase;
        }

        if series.is_empty() {
            shared
                .notifier
                .notify(chat, &format::no_data(&symbol), TextFormat::Plain)
                .await;
            return self.phase;
        }
        let Some(last_volume) = series.last_closed().map(|bar| bar.volume) else {
            debug!(%symbol, "No closed bar yet");
            return self.phase;
        };

        let now = shared.clock.now().time();
        if !shared.config.hours.contains(now) {
            let Some(cancelled) = shared.registry.cancel_all_from(chat, &symbol, self.id) else {
                self.phase = WatchPhase::Stopped;
                return self.phase;
            };
            info!(%symbol, %now, cancelled, "Outside market hours, stopping all watches");
            self.phase = WatchPhase::OutOfHours;
            shared
                .notifier
                .notify(chat, &format::out_of_hours(), TextFormat::Html)
                .await;
            return self.phase;
        }

        let max_volume = self.state.max_volume;
        let ratio = shared.config.collapse_ratio;

        if last_volume as f64 <= ratio * max_volume as f64 {
            if !shared.registry.release(chat, &symbol, self.id) {
                self.phase = WatchPhase::Stopped;
                return self.phase;
            }
            info!(%symbol, last_volume, max_volume, "Volume collapsed, stopping watch");
            self.phase = WatchPhase::Collapsed;
            shared
                .notifier
                .notify(chat, &format::collapsed(&symbol, last_volume, ratio), TextFormat::Html)
                .await;
        } else if last_volume > max_volume {
            if !shared.registry.is_current(chat, &symbol, self.id) {
                self.phase = WatchPhase::Stopped;
                return self.phase;
            }
            self.state.max_volume = last_volume;
            info!(%symbol, last_volume, previous = max_volume, "New max volume");
            shared
                .notifier
                .notify(chat, &format::new_high(&symbol, last_volume), TextFormat::Html)
                .await;
        } else {
            debug!(%symbol, last_volume, max_volume, "Volume within range");
        }

        self.phase
    }
}
