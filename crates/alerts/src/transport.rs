//! Chat transport seam.

use crate::keyboard::InlineKeyboard;
use async_trait::async_trait;
use candlewatch_engine::MessageRef;
use std::sync::atomic::{AtomicI32, Ordering};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Chat API error: {0}")]
    Api(String),
    #[error("Rate limited by chat API")]
    RateLimited,
    #[error("Network error: {0}")]
    Network(String),
}

/// Outbound messaging used by the notifier and the interactive handler.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send an HTML message and return its message id.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i32, TransportError>;

    /// Replace the text (and keyboard) of an earlier message.
    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError>;
}

/// Transport that only logs, used with `--dry-run`.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    next_message_id: AtomicI32,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatTransport for LoggingTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i32, TransportError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            chat_id,
            message_id,
            buttons = keyboard.map(|k| k.buttons().count()).unwrap_or(0),
            "[dry-run] send:\n{}",
            text
        );
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        info!(
            chat_id = target.chat_id,
            message_id = target.message_id,
            "[dry-run] edit:\n{}",
            text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_logging_transport_hands_out_ids() {
        let transport = LoggingTransport::new();
        assert_eq!(transport.send_message(1, "a", None).await, Ok(1));
        assert_eq!(transport.send_message(1, "b", None).await, Ok(2));
        let target = MessageRef {
            chat_id: 1,
            message_id: 2,
        };
        assert_eq!(transport.edit_message(target, "c", None).await, Ok(()));
    }
}
