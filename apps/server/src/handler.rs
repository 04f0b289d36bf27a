//! Telegram command and button handling.

use crate::context::SharedContext;
use async_trait::async_trait;
use candlewatch_alerts::{
    format_help, format_menu_prompt, format_no_candle, CallbackAction, Command, TransportError,
    UpdateHandler,
};
use candlewatch_engine::{MessageRef, WatchKey};
use tracing::{debug, info, warn};

/// Answers menu requests on demand. Requests bypass duplicate suppression.
pub struct InteractiveHandler {
    ctx: SharedContext,
}

impl InteractiveHandler {
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }

    async fn show_menu(&self, origin: MessageRef) -> Result<(), TransportError> {
        let prompt = format_menu_prompt(self.ctx.threshold());
        self.ctx
            .transport()
            .edit_message(origin, &prompt, Some(self.ctx.keyboard()))
            .await
    }

    async fn request(&self, origin: MessageRef, key: WatchKey) -> Result<(), TransportError> {
        if !self.ctx.menu.iter().any(|entry| entry.key == key) {
            warn!(symbol = %key, "Request for a symbol that is not watched");
            return self.show_menu(origin).await;
        }

        let candle = match self.ctx.latest_significant(&key).await {
            Ok(candle) => candle,
            Err(e) => {
                warn!(symbol = %key, error = %e, "Failed to fetch candles for request");
                None
            }
        };

        match candle {
            Some(candle) => {
                info!(symbol = %key, chat_id = origin.chat_id, "Answering candle request");
                self.ctx.notifier.notify(origin.chat_id, &candle, true).await;
                Ok(())
            }
            None => {
                debug!(symbol = %key, "No significant candle to report");
                let text = format_no_candle(&key.pair, self.ctx.threshold());
                self.ctx
                    .transport()
                    .edit_message(origin, &text, Some(self.ctx.keyboard()))
                    .await
            }
        }
    }
}

#[async_trait]
impl UpdateHandler for InteractiveHandler {
    async fn on_command(&self, chat_id: i64, command: Command) -> Result<(), TransportError> {
        let transport = self.ctx.transport();
        match command {
            Command::Start | Command::Menu => {
                let prompt = format_menu_prompt(self.ctx.threshold());
                transport
                    .send_message(chat_id, &prompt, Some(self.ctx.keyboard()))
                    .await?;
            }
            Command::Help => {
                transport
                    .send_message(chat_id, &format_help(self.ctx.threshold()), None)
                    .await?;
            }
        }
        Ok(())
    }

    async fn on_callback(
        &self,
        origin: MessageRef,
        action: CallbackAction,
    ) -> Result<(), TransportError> {
        match action {
            CallbackAction::Menu => self.show_menu(origin).await,
            CallbackAction::Request(key) => self.request(origin, key).await,
        }
    }
}
