//! Telegram bot handlers.

use crate::keyboard::{CallbackAction, InlineKeyboard};
use crate::transport::{ChatTransport, TransportError};
use async_trait::async_trait;
use candlewatch_engine::MessageRef;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] RequestError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<RequestError> for TransportError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::RetryAfter(_) => TransportError::RateLimited,
            RequestError::Network(e) => TransportError::Network(e.to_string()),
            other => TransportError::Api(other.to_string()),
        }
    }
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and show the pair menu")]
    Start,
    #[command(description = "Show the pair menu")]
    Menu,
    #[command(description = "Show help")]
    Help,
}

/// Reacts to user commands and button presses.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn on_command(&self, chat_id: i64, command: Command) -> Result<(), TransportError>;

    /// `origin` is the message that carried the pressed button.
    async fn on_callback(
        &self,
        origin: MessageRef,
        action: CallbackAction,
    ) -> Result<(), TransportError>;
}

fn to_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str) -> Self {
        let bot = Bot::new(token);
        Self { bot }
    }

    /// Run the update dispatcher until Ctrl-C.
    ///
    /// Updates queued while the bot was offline are dropped first.
    pub async fn run(self: Arc<Self>, handler: Arc<dyn UpdateHandler>) {
        if let Err(e) = self.bot.delete_webhook().drop_pending_updates(true).await {
            warn!(error = %e, "Failed to drop pending updates");
        }
        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let commands = {
            let handler = Arc::clone(&handler);
            Update::filter_message().filter_command::<Command>().endpoint(
                move |msg: Message, cmd: Command| {
                    let handler = Arc::clone(&handler);
                    async move {
                        debug!(chat_id = msg.chat.id.0, command = ?cmd, "Command received");
                        handler.on_command(msg.chat.id.0, cmd).await?;
                        Ok::<(), TelegramError>(())
                    }
                },
            )
        };

        let callbacks = {
            let this = Arc::clone(&self);
            Update::filter_callback_query().endpoint(move |query: CallbackQuery| {
                let this = Arc::clone(&this);
                let handler = Arc::clone(&handler);
                async move { this.handle_callback(query, handler.as_ref()).await }
            })
        };

        info!("Telegram dispatcher started");
        Dispatcher::builder(self.bot.clone(), dptree::entry().branch(commands).branch(callbacks))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
        info!("Telegram dispatcher stopped");
    }

    async fn handle_callback(
        &self,
        query: CallbackQuery,
        handler: &dyn UpdateHandler,
    ) -> Result<(), TelegramError> {
        // Answer first so the client stops its loading indicator.
        if let Err(e) = self.bot.answer_callback_query(query.id.clone()).await {
            warn!(error = %e, "Failed to answer callback query");
        }

        let Some(origin) = query.message.as_ref().map(|m| MessageRef {
            chat_id: m.chat().id.0,
            message_id: m.id().0,
        }) else {
            debug!("Callback without a message, ignoring");
            return Ok(());
        };

        let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
            warn!(data = ?query.data, "Unrecognized callback data");
            return Ok(());
        };

        handler.on_callback(origin, action).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i32, TransportError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        let message = request.await?;
        Ok(message.id.0)
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(target.chat_id), MessageId(target.message_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!(message_id = target.message_id, "Message unchanged");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{build_keyboard, MenuEntry};
    use candlewatch_core::{Pair, Timeframe};
    use candlewatch_engine::WatchKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/menu", "bot").unwrap(), Command::Menu);
        assert_eq!(Command::parse("/help", "bot").unwrap(), Command::Help);
        assert!(Command::parse("/premium 50", "bot").is_err());
    }

    #[test]
    fn test_markup_mirrors_keyboard() {
        let entries = vec![
            MenuEntry::new("SUI", WatchKey::new(Pair::spot("SUI", "USDT"), Timeframe::M15)),
            MenuEntry::new("ETH", WatchKey::new(Pair::spot("ETH", "USDT"), Timeframe::M15)),
        ];
        let keyboard = build_keyboard(&entries);
        let markup = to_markup(&keyboard);

        let sizes: Vec<usize> = markup.inline_keyboard.iter().map(|row| row.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(markup.inline_keyboard[0][0].text, "SUI");
    }

    #[test]
    fn test_api_error_maps_to_transport_api() {
        let err = RequestError::Api(ApiError::BotBlocked);
        assert!(matches!(TransportError::from(err), TransportError::Api(_)));
    }
}
