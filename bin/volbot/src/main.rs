use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{BarProvider, Clock, Config, SystemClock};
use market::{WebullRanking, YahooClient};
use monitor::{Monitor, MonitorConfig};
use patterns::{PatternConfig, Scanner};
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        poll_secs = cfg.poll_interval.as_secs(),
        collapse_ratio = cfg.collapse_ratio,
        window_start = %cfg.window_start,
        window_end = %cfg.window_end,
        "VolBot starting"
    );

    let pattern_cfg = match cfg.pattern_config_path.as_deref() {
        Some(path) => PatternConfig::load(path),
        None => PatternConfig::default(),
    };

    // ── Market data ──────────────────────────────────────────────────────────
    let bars: Arc<dyn BarProvider> = Arc::new(
        YahooClient::new().unwrap_or_else(|e| panic!("Failed to build Yahoo client: {e}")),
    );
    let ranking = Arc::new(
        WebullRanking::new(cfg.scan_symbol_limit)
            .unwrap_or_else(|e| panic!("Failed to build Webull client: {e}")),
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Telegram ──────────────────────────────────────────────────────────────
    let bot = teloxide::Bot::new(cfg.telegram_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));

    // ── Scanner and monitor ──────────────────────────────────────────────────
    let scanner = Scanner::new(bars.clone(), ranking, clock.clone(), pattern_cfg)
        .with_symbol_limit(cfg.scan_symbol_limit);
    let monitor = Monitor::new(bars, notifier, clock, MonitorConfig::from(&cfg));

    let deps = BotDeps {
        monitor: Arc::new(monitor),
        scanner: Arc::new(scanner),
        lookback_days: cfg.scan_lookback_days,
    };

    let monitor = deps.monitor.clone();
    tokio::spawn(start_bot(bot, deps));

    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    let stopped = monitor.stop_all();
    info!(stopped, "Shutdown signal received. Exiting.");
}
