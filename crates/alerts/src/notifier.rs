//! Alert delivery.

use crate::format::format_alert_message;
use crate::keyboard::InlineKeyboard;
use crate::transport::ChatTransport;
use candlewatch_core::Candle;
use candlewatch_engine::{MessageRef, NotificationRecord, SharedWatchState, WatchKey};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(MessageRef),
    Edited(MessageRef),
    /// Delivery failed; the notification is still recorded.
    Failed,
}

impl Delivery {
    pub fn message(&self) -> Option<MessageRef> {
        match self {
            Delivery::Sent(m) | Delivery::Edited(m) => Some(*m),
            Delivery::Failed => None,
        }
    }
}

/// Sends candle alerts and records them in watch state.
pub struct Notifier {
    transport: Arc<dyn ChatTransport>,
    state: SharedWatchState,
    keyboard: InlineKeyboard,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        state: SharedWatchState,
        keyboard: InlineKeyboard,
    ) -> Self {
        Self {
            transport,
            state,
            keyboard,
        }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    pub fn keyboard(&self) -> &InlineKeyboard {
        &self.keyboard
    }

    /// Deliver an alert for `candle` to `chat_id`.
    ///
    /// With `is_update` set, the previous alert for the same series is edited
    /// in place when it was sent to the same chat; otherwise a new message is
    /// sent. Transport failures are logged, never returned. The notification
    /// record is replaced either way; a failed edit keeps pointing at the
    /// message it tried to edit.
    pub async fn notify(&self, chat_id: i64, candle: &Candle, is_update: bool) -> Delivery {
        let key = WatchKey::of(candle);
        let text = format_alert_message(candle);

        let previous = {
            let state = self.state.lock().await;
            state.last_notified(&key).and_then(|record| record.message)
        };
        let edit_target = previous.filter(|m| is_update && m.chat_id == chat_id);

        let delivery = match edit_target {
            Some(target) => {
                match self
                    .transport
                    .edit_message(target, &text, Some(&self.keyboard))
                    .await
                {
                    Ok(()) => {
                        debug!(symbol = %key, message_id = target.message_id, "Alert edited");
                        Delivery::Edited(target)
                    }
                    Err(e) => {
                        error!(chat_id, symbol = %key, error = %e, "Failed to edit alert");
                        Delivery::Failed
                    }
                }
            }
            None => match self
                .transport
                .send_message(chat_id, &text, Some(&self.keyboard))
                .await
            {
                Ok(message_id) => {
                    info!(
                        symbol = %key,
                        change_pct = candle.change_pct(),
                        "Alert sent"
                    );
                    Delivery::Sent(MessageRef {
                        chat_id,
                        message_id,
                    })
                }
                Err(e) => {
                    error!(chat_id, symbol = %key, error = %e, "Failed to send alert");
                    Delivery::Failed
                }
            },
        };

        let record = NotificationRecord {
            candle: candle.clone(),
            notified_at: Utc::now(),
            message: delivery.message().or(edit_target),
        };
        self.state.lock().await.record_notification(&key, record);

        delivery
    }
}
