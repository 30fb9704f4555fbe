use super::format::{render_admin_audit, render_issued_link_text, render_panel_error};
use super::state::BotState;
use crate::link::build_vless_link;
use crate::xui::{ClientRequest, CreatedClient, PanelError};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use std::io::Cursor;
use teloxide::prelude::*;
use teloxide::types::InputFile;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const DEFAULT_TRAFFIC_GB: u32 = 30;
pub const DEFAULT_DAYS_VALID: u32 = 30;
pub const MAX_DAYS_VALID: u32 = 3650;

/// Аргументы `/vless [GB] [days]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlessArgs {
    pub traffic_gb: u32,
    pub days_valid: u32,
}

impl Default for VlessArgs {
    fn default() -> Self {
        Self {
            traffic_gb: DEFAULT_TRAFFIC_GB,
            days_valid: DEFAULT_DAYS_VALID,
        }
    }
}

/// Каждый аргумент независимо откатывается к значению по умолчанию, если он
/// не указан или не разбирается. 0 ГБ — без лимита; срок должен быть в
/// пределах 1..=MAX_DAYS_VALID.
pub fn parse_vless_args(args: &str) -> VlessArgs {
    let mut parts = args.split_whitespace();
    let traffic_gb = parts
        .next()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(DEFAULT_TRAFFIC_GB);
    let days_valid = parts
        .next()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|days| (1..=MAX_DAYS_VALID).contains(days))
        .unwrap_or(DEFAULT_DAYS_VALID);
    VlessArgs {
        traffic_gb,
        days_valid,
    }
}

#[derive(Debug, Clone)]
pub struct IssuedLink {
    pub client: CreatedClient,
    pub link: String,
}

/// Создаёт клиента в панели и сразу превращает его UUID в ссылку.
pub async fn issue_vless_link(
    state: &BotState,
    tg_user_id: i64,
    label: &str,
    args: VlessArgs,
) -> Result<IssuedLink, PanelError> {
    let request = ClientRequest {
        telegram_user_id: tg_user_id,
        traffic_gb: args.traffic_gb,
        days_valid: args.days_valid,
    };
    let client = state.panel.add_vless_client(&request).await?;
    let link = build_vless_link(&state.config.link, &client.id, label);
    Ok(IssuedLink { client, link })
}

pub fn build_link_qr_png_bytes(payload: &str) -> Result<Vec<u8>, anyhow::Error> {
    let qr = QrCode::new(payload.as_bytes())?;
    let image = qr
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(512, 512)
        .build();
    let mut bytes = Vec::new();
    {
        let mut cursor = Cursor::new(&mut bytes);
        DynamicImage::ImageLuma8(image).write_to(&mut cursor, ImageFormat::Png)?;
    }
    Ok(bytes)
}

pub async fn notify_admins(bot: &Bot, state: &BotState, text: &str) {
    for admin_id in &state.config.admin_ids {
        if let Err(error) = bot.send_message(ChatId(*admin_id), text).await {
            tracing::warn!(
                admin_id = *admin_id,
                error = %error,
                "Не удалось отправить аудит выдачи доступа"
            );
        }
    }
}

/// Полный цикл выдачи: уведомление, вызов панели, ссылка + QR или ошибка.
pub async fn send_vless_link(
    bot: &Bot,
    chat_id: ChatId,
    tg_user_id: i64,
    label: &str,
    args: VlessArgs,
    state: &BotState,
) -> HandlerResult {
    tracing::info!(
        user_id = tg_user_id,
        traffic_gb = args.traffic_gb,
        days_valid = args.days_valid,
        "Issuing VLESS link"
    );
    bot.send_message(chat_id, "Генерирую ссылку, подождите…")
        .await?;

    let issued = match issue_vless_link(state, tg_user_id, label, args).await {
        Ok(issued) => issued,
        Err(error) => {
            tracing::error!(user_id = tg_user_id, error = %error, "Failed to create vless client");
            bot.send_message(chat_id, render_panel_error(&error))
                .reply_markup(crate::bot::keyboards::user_menu())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, render_issued_link_text(&issued))
        .reply_markup(crate::bot::keyboards::user_menu())
        .await?;

    match build_link_qr_png_bytes(&issued.link) {
        Ok(qr_png) => {
            bot.send_photo(
                chat_id,
                InputFile::memory(qr_png).file_name(format!("vless-{}.png", tg_user_id)),
            )
            .caption("QR-код для импорта в клиент")
            .await?;
        }
        Err(error) => {
            tracing::warn!(error = %error, "Не удалось построить QR-код ссылки");
        }
    }

    notify_admins(bot, state, &render_admin_audit(&issued, tg_user_id, label)).await;
    Ok(())
}
