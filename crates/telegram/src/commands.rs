use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::RankCategory;
use monitor::{normalize_symbol, Monitor, WatchInfo};
use patterns::Scanner;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Telegram caps a single message at 4096 characters.
const MESSAGE_LIMIT: usize = 4096;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub monitor: Arc<Monitor>,
    pub scanner: Arc<Scanner>,
    /// Pattern hits older than this many days are left out of scan reports.
    pub lookback_days: u64,
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "VolBot commands:")]
pub enum Command {
    #[command(rename = "1", description = "Scan the most-active top 50 for bullish candles")]
    Actives,
    #[command(rename = "2", description = "Scan the quality top 50 for bullish candles")]
    Quality,
    #[command(description = "Watch intraday volume of a symbol, e.g. /monitor AAPL")]
    Monitor(String),
    #[command(description = "Stop watching one symbol, e.g. /unwatch AAPL")]
    Unwatch(String),
    #[command(description = "Stop every volume watch")]
    Stop,
    #[command(description = "List the symbols watched in this chat")]
    Watches,
    #[command(description = "Show this message")]
    Help,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(bot: Bot, deps: BotDeps) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Actives].endpoint(handle_actives))
        .branch(case![Command::Quality].endpoint(handle_quality))
        .branch(case![Command::Monitor(symbol)].endpoint(handle_monitor))
        .branch(case![Command::Unwatch(symbol)].endpoint(handle_unwatch))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Watches].endpoint(handle_watches))
        .branch(case![Command::Help].endpoint(handle_help));

    Update::filter_message()
        .branch(command_handler)
        .branch(Message::filter_text().endpoint(handle_echo))
}

async fn handle_actives(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    run_scan(bot, msg, deps, RankCategory::MostActive).await
}

async fn handle_quality(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    run_scan(bot, msg, deps, RankCategory::Quality).await
}

async fn run_scan(
    bot: Bot,
    msg: Message,
    deps: Arc<BotDeps>,
    category: RankCategory,
) -> HandlerResult {
    bot.send_message(msg.chat.id, format!("Scanning {category} top 50\u{2026}"))
        .await?;

    match deps.scanner.scan(category, deps.lookback_days).await {
        Ok(report) => {
            for chunk in split_message(&report.to_string(), MESSAGE_LIMIT) {
                bot.send_message(msg.chat.id, chunk).await?;
            }
        }
        Err(e) => {
            warn!(%category, error = %e, "Pattern scan failed");
            bot.send_message(msg.chat.id, format!("Scan failed: {e}")).await?;
        }
    }
    Ok(())
}

async fn handle_monitor(msg: Message, symbol: String, deps: Arc<BotDeps>) -> HandlerResult {
    // Every outcome is reported to the chat by the monitor itself.
    let outcome = deps.monitor.start_watch(chat_of(&msg), &symbol).await;
    info!(chat_id = msg.chat.id.0, ?outcome, "Handled /monitor");
    Ok(())
}

async fn handle_unwatch(bot: Bot, msg: Message, symbol: String, deps: Arc<BotDeps>) -> HandlerResult {
    let Some(symbol) = normalize_symbol(&symbol) else {
        bot.send_message(msg.chat.id, "Please enter a valid symbol. e.g. /unwatch AAPL")
            .await?;
        return Ok(());
    };

    let text = if deps.monitor.stop_watch(chat_of(&msg), &symbol) {
        format!("Stopped monitoring {symbol}.")
    } else {
        format!("{symbol} is not being monitored.")
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    bot.send_message(msg.chat.id, "Stopping all monitoring jobs.").await?;
    let stopped = deps.monitor.stop_all();
    info!(chat_id = msg.chat.id.0, stopped, "Stopped all watches on request");
    Ok(())
}

async fn handle_watches(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let watches = deps.monitor.watches(chat_of(&msg));
    bot.send_message(msg.chat.id, render_watches(&watches)).await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn handle_echo(bot: Bot, msg: Message, text: String) -> HandlerResult {
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

fn chat_of(msg: &Message) -> common::ChatId {
    common::ChatId(msg.chat.id.0)
}

fn render_watches(watches: &[WatchInfo]) -> String {
    if watches.is_empty() {
        return "No active watches.".to_string();
    }
    let mut text = String::from("Active watches:");
    for watch in watches {
        text.push_str(&format!(
            "\n{} (since {} UTC)",
            watch.symbol,
            watch.created_at.format("%H:%M")
        ));
    }
    text
}

/// Break `text` into pieces of at most `limit` characters, on line
/// boundaries where possible.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
