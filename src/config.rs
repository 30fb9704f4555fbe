//! Конфигурация бота из переменных окружения (и `.env`, если он есть).

use crate::link::LinkTemplate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Не задана переменная окружения {0}")]
    Missing(&'static str),
    #[error("Некорректное значение {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("Нужен XUI_API_TOKEN или пара XUI_USERNAME/XUI_PASSWORD")]
    NoPanelCredentials,
}

/// Способ авторизации в панели.
#[derive(Clone)]
pub enum PanelAuth {
    Token(String),
    Session { username: String, password: String },
}

impl std::fmt::Debug for PanelAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelAuth::Token(_) => f.write_str("Token(***)"),
            PanelAuth::Session { username, .. } => f
                .debug_struct("Session")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Базовый URL панели, всегда с завершающим `/`.
    pub base_url: String,
    pub auth: PanelAuth,
    pub inbound_id: u32,
    pub insecure_tls: bool,
}

#[derive(Clone)]
pub struct Config {
    bot_token: String,
    pub admin_ids: Vec<i64>,
    pub panel: PanelConfig,
    pub link: LinkTemplate,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"***")
            .field("admin_ids", &self.admin_ids)
            .field("panel", &self.panel)
            .field("link", &self.link)
            .finish()
    }
}

impl Config {
    /// Читает `.env` (если есть) и переменные окружения процесса.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(error) = dotenvy::dotenv()
            && !error.not_found()
        {
            tracing::warn!(error = %error, "Не удалось прочитать .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bot_token = require("BOT_TOKEN")?;
        let admin_ids = parse_admin_ids(get("ADMIN_IDS").as_deref().unwrap_or(""))?;

        let mut base_url = require("XUI_BASE_URL")?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "XUI_BASE_URL",
                value: base_url,
                reason: "ожидается http:// или https://".to_string(),
            });
        }
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let auth = match (get("XUI_API_TOKEN"), get("XUI_USERNAME"), get("XUI_PASSWORD")) {
            (Some(token), _, _) => PanelAuth::Token(token),
            (None, Some(username), Some(password)) => PanelAuth::Session { username, password },
            _ => return Err(ConfigError::NoPanelCredentials),
        };

        let inbound_id = parse_number::<u32>("XUI_INBOUND_ID", &require("XUI_INBOUND_ID")?)?;
        if inbound_id == 0 {
            return Err(ConfigError::Invalid {
                var: "XUI_INBOUND_ID",
                value: "0".to_string(),
                reason: "id inbound должен быть больше нуля".to_string(),
            });
        }
        let insecure_tls = get("XUI_INSECURE_TLS")
            .map(|value| parse_flag("XUI_INSECURE_TLS", &value))
            .transpose()?
            .unwrap_or(false);

        let port = parse_number::<u16>("VLESS_PORT", &require("VLESS_PORT")?)?;
        if port == 0 {
            return Err(ConfigError::Invalid {
                var: "VLESS_PORT",
                value: "0".to_string(),
                reason: "порт должен быть в диапазоне 1..=65535".to_string(),
            });
        }

        let defaults = LinkTemplate::default();
        let link = LinkTemplate {
            host: require("VLESS_HOST")?,
            port,
            network: get("VLESS_TYPE").unwrap_or(defaults.network),
            security: get("VLESS_SECURITY").unwrap_or(defaults.security),
            public_key: get("VLESS_PBK"),
            fingerprint: get("VLESS_FP").unwrap_or(defaults.fingerprint),
            sni: get("VLESS_SNI").unwrap_or(defaults.sni),
            short_id: get("VLESS_SID"),
            spider_x: get("VLESS_SPX").unwrap_or(defaults.spider_x),
            flow: get("VLESS_FLOW").unwrap_or(defaults.flow),
        };

        Ok(Self {
            bot_token,
            admin_ids,
            panel: PanelConfig {
                base_url,
                auth,
                inbound_id,
                insecure_tls,
            },
            link,
        })
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|error| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: error.to_string(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "ожидается true/false".to_string(),
        }),
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_number::<i64>("ADMIN_IDS", part))
        .collect()
}
