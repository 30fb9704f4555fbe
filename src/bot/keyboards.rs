//! Постоянная reply-клавиатура пользователя.

use teloxide::types::{KeyboardButton, KeyboardMarkup};

pub const BTN_GET_VLESS: &str = "🔑 Получить VLESS";
pub const BTN_GUIDE: &str = "❓ Инструкция";

pub fn user_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(BTN_GET_VLESS),
        KeyboardButton::new(BTN_GUIDE),
    ]])
    .resize_keyboard()
    .persistent()
}
