//! Inline keyboard of watched symbols and the callback payloads it carries.

use candlewatch_core::{Pair, Timeframe};
use candlewatch_engine::WatchKey;
use serde::{Deserialize, Serialize};

/// Buttons per keyboard row. Kept small for phone screens.
pub const BUTTONS_PER_ROW: usize = 3;

/// Telegram's limit on callback data length in bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

const MENU_DATA: &str = "menu";
const REQUEST_PREFIX: &str = "req:";

/// What a button press asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Latest significant candle for one series.
    Request(WatchKey),
    /// Re-render the symbol menu.
    Menu,
}

impl CallbackAction {
    /// Encode as callback data, e.g. `req:15m:SUI/USDT:USDT`.
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Menu => MENU_DATA.to_string(),
            CallbackAction::Request(key) => {
                format!("{}{}:{}", REQUEST_PREFIX, key.timeframe, key.pair)
            }
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        if data == MENU_DATA {
            return Some(CallbackAction::Menu);
        }
        let rest = data.strip_prefix(REQUEST_PREFIX)?;
        let (timeframe, pair) = rest.split_once(':')?;
        let timeframe: Timeframe = timeframe.parse().ok()?;
        let pair: Pair = pair.parse().ok()?;
        Some(CallbackAction::Request(WatchKey::new(pair, timeframe)))
    }
}

/// One inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            label: label.into(),
            data: action.encode(),
        }
    }
}

/// Transport-neutral inline keyboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<Button>>,
}

impl InlineKeyboard {
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// A selectable entry in the symbol menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub key: WatchKey,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>, key: WatchKey) -> Self {
        Self {
            label: label.into(),
            key,
        }
    }
}

/// Build the symbol menu: entries in rows of three, then a "Menu" row.
/// Entries whose callback data would not fit are left out.
pub fn build_keyboard(entries: &[MenuEntry]) -> InlineKeyboard {
    let buttons: Vec<Button> = entries
        .iter()
        .map(|entry| Button::new(entry.label.clone(), &CallbackAction::Request(entry.key.clone())))
        .filter(|button| button.data.len() <= MAX_CALLBACK_DATA_LEN)
        .collect();

    let mut rows: Vec<Vec<Button>> = buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| chunk.to_vec())
        .collect();
    rows.push(vec![Button::new("Menu", &CallbackAction::Menu)]);

    InlineKeyboard { rows }
}
