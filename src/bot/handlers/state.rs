use crate::config::Config;
use crate::xui::XuiClient;
use std::sync::Arc;
use teloxide::types::Message;

/// Общие зависимости обработчиков. Изменяемого состояния нет.
#[derive(Clone)]
pub struct BotState {
    pub config: Arc<Config>,
    pub panel: XuiClient,
}

pub fn sender_user_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|user| user.id.0 as i64)
}

/// Подпись для ссылки: username, иначе числовой id.
pub fn sender_link_label(msg: &Message) -> Option<String> {
    msg.from.as_ref().map(|user| match user.username.as_deref() {
        Some(username) if !username.trim().is_empty() => username.to_string(),
        _ => user.id.0.to_string(),
    })
}
