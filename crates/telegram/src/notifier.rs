use async_trait::async_trait;
use teloxide::{payloads::SendMessageSetters, prelude::*, types::ParseMode};
use tracing::warn;

use common::{Notifier, TextFormat};

/// Delivers watch alerts through the bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, chat: common::ChatId, text: &str, format: TextFormat) {
        let request = self.bot.send_message(ChatId(chat.0), text);
        let sent = match format {
            TextFormat::Html => request.parse_mode(ParseMode::Html).await,
            TextFormat::Plain => request.await,
        };
        if let Err(e) = sent {
            warn!(chat_id = chat.0, error = %e, "Failed to send Telegram message");
        }
    }
}
