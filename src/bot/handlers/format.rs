use super::shared::IssuedLink;
use crate::xui::PanelError;
use chrono::{DateTime, Local, Utc};

pub fn format_expiry(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

pub fn format_traffic(traffic_gb: u32) -> String {
    if traffic_gb == 0 {
        "без лимита".to_string()
    } else {
        format!("{} ГБ", traffic_gb)
    }
}

pub fn help_text() -> &'static str {
    "Привет! Я выдам тебе VLESS ссылку. Используй команду /vless для получения.\n\
     Например: /vless 30 30 — трафик 30 ГБ на 30 дней.\n\n\
     Аргументы необязательные: без них выдаётся 30 ГБ на 30 дней, 0 ГБ — без лимита трафика."
}

pub fn usage_guide_text() -> &'static str {
    r#"Как подключиться:

1) Нажмите «🔑 Получить VLESS» или отправьте /vless [ГБ] [дней].
2) Скопируйте ссылку vless://… или отсканируйте QR-код.
3) Импортируйте её в клиент (v2rayN, v2rayNG, sing-box, Hiddify и т.п.).

Если не получается, обратитесь к администратору."#
}

pub fn render_issued_link_text(issued: &IssuedLink) -> String {
    format!(
        "Готово! Твоя VLESS ссылка:\n\
         {}\n\n\
         Трафик: {}\n\
         Действует до: {}\n\n\
         Подключайся в своем клиенте (v2ray, sing-box и т.п.).",
        issued.link,
        format_traffic(issued.client.traffic_gb),
        format_expiry(issued.client.expiry_time_ms),
    )
}

/// Из нескольких попыток пользователю показывается самая конкретная причина.
pub fn render_panel_error(error: &PanelError) -> String {
    let reason = match error {
        PanelError::Exhausted { attempts } => attempts
            .iter()
            .map(|(_, cause)| cause)
            .max_by_key(|cause| cause_rank(cause))
            .map(short_reason)
            .unwrap_or("неизвестная ошибка"),
        other => short_reason(other),
    };
    format!(
        "Ошибка при создании пользователя: {}.\nПопробуйте позже или обратитесь к администратору.",
        reason
    )
}

fn cause_rank(error: &PanelError) -> u8 {
    match error {
        PanelError::Auth(_) => 4,
        PanelError::Unreachable(_) => 3,
        PanelError::Malformed(_) => 2,
        PanelError::Rejected { .. } => 1,
        PanelError::Exhausted { .. } => 0,
    }
}

fn short_reason(error: &PanelError) -> &'static str {
    match error {
        PanelError::Unreachable(_) => "панель недоступна",
        PanelError::Auth(_) => "панель отклонила авторизацию",
        PanelError::Rejected { .. } => "панель отклонила запрос",
        PanelError::Malformed(_) => "неожиданный ответ панели",
        PanelError::Exhausted { .. } => "все варианты запроса к панели не сработали",
    }
}

pub fn render_admin_audit(issued: &IssuedLink, user_id: i64, label: &str) -> String {
    format!(
        "🔑 Выдан VLESS-доступ\n\
         User ID: {}\n\
         Имя: {}\n\
         Email в панели: {}\n\
         Трафик: {}\n\
         До: {}\n\
         Вариант API: {}",
        user_id,
        label,
        issued.client.email,
        format_traffic(issued.client.traffic_gb),
        format_expiry(issued.client.expiry_time_ms),
        issued.client.variant,
    )
}
