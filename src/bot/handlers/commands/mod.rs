use super::format::help_text;
use super::shared::{parse_vless_args, send_vless_link, HandlerResult};
use super::state::{sender_link_label, sender_user_id, BotState};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum BotCommand {
    /// Параметр deep-link `/start <payload>` игнорируется.
    #[command(description = "Начать и показать справку")]
    Start(String),
    #[command(description = "Справка")]
    Help,
    #[command(description = "Получить VLESS-ссылку: /vless [ГБ] [дней]")]
    Vless(String),
}

pub fn handler() -> teloxide::dispatching::UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    teloxide::filter_command::<BotCommand, _>()
        .branch(dptree::case![BotCommand::Start(payload)].endpoint(start_cmd))
        .branch(dptree::case![BotCommand::Help].endpoint(start_cmd))
        .branch(dptree::case![BotCommand::Vless(args)].endpoint(cmd_vless))
}

async fn start_cmd(bot: Bot, msg: Message) -> HandlerResult {
    tracing::info!(user_id = ?sender_user_id(&msg), "Received /start command");
    send_help(&bot, msg.chat.id).await
}

/// Статическая справка, от конфигурации не зависит.
pub async fn send_help(bot: &Bot, chat_id: ChatId) -> HandlerResult {
    bot.send_message(chat_id, help_text())
        .reply_markup(crate::bot::keyboards::user_menu())
        .await?;
    Ok(())
}

async fn cmd_vless(bot: Bot, msg: Message, args: String, state: BotState) -> HandlerResult {
    let (Some(user_id), Some(label)) = (sender_user_id(&msg), sender_link_label(&msg)) else {
        tracing::warn!("Received /vless without sender");
        return Ok(());
    };
    tracing::info!(user_id = user_id, args = %args, "Received /vless command");

    let args = parse_vless_args(&args);
    send_vless_link(&bot, msg.chat.id, user_id, &label, args, &state).await
}
