use super::format::usage_guide_text;
use super::shared::{send_vless_link, HandlerResult, VlessArgs};
use super::state::{sender_link_label, sender_user_id, BotState};
use teloxide::prelude::*;

pub async fn handle_menu_buttons(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let (Some(user_id), Some(label)) = (sender_user_id(&msg), sender_link_label(&msg)) else {
        return Ok(());
    };

    match text {
        crate::bot::keyboards::BTN_GET_VLESS => {
            send_vless_link(&bot, msg.chat.id, user_id, &label, VlessArgs::default(), &state).await?;
        }
        crate::bot::keyboards::BTN_GUIDE => {
            bot.send_message(msg.chat.id, usage_guide_text())
                .reply_markup(crate::bot::keyboards::user_menu())
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "Не понял запрос. Используйте /vless [ГБ] [дней] или кнопки меню ниже.",
            )
            .reply_markup(crate::bot::keyboards::user_menu())
            .await?;
        }
    }
    Ok(())
}
