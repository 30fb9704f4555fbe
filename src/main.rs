//! xui-vless-bot — Telegram-бот, выдающий VLESS-ссылки через API панели x-ui/3x-ui.

mod bot;
mod config;
mod link;
mod xui;

use std::sync::Arc;
use teloxide::dispatching::Dispatcher;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting xui-vless-bot");

    let config = Arc::new(config::Config::from_env()?);
    tracing::info!(
        admin_count = config.admin_ids.len(),
        panel_url = %config.panel.base_url,
        inbound_id = config.panel.inbound_id,
        insecure_tls = config.panel.insecure_tls,
        link_host = %config.link.host,
        link_port = config.link.port,
        "Configuration loaded"
    );

    let panel = xui::XuiClient::new(config.panel.clone())?;

    let bot = Bot::new(config.bot_token());
    if let Err(error) = bot
        .set_my_commands(bot::handlers::BotCommand::bot_commands())
        .await
    {
        tracing::warn!(error = %error, "Не удалось зарегистрировать список команд");
    }

    let state = bot::handlers::BotState { config, panel };
    tracing::info!("Dispatcher initialized, bot is ready");

    Dispatcher::builder(bot, bot::handlers::schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
