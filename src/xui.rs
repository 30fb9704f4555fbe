//! HTTP-клиент панели x-ui / 3x-ui: добавление VLESS-клиента в inbound.
//!
//! Разные форки панели принимают `addClient` по разным путям и в разных
//! форматах, поэтому варианты запроса перебираются по порядку до первого
//! успешного.

use crate::config::{PanelAuth, PanelConfig};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const BYTES_PER_GB: u64 = 1_073_741_824;
const MS_PER_DAY: i64 = 86_400_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CLIENT_FLOW: &str = "xtls-rprx-vision";
const CLIENT_LIMIT_IP: u32 = 3;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("панель недоступна: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("ошибка авторизации в панели: {0}")]
    Auth(String),
    #[error("панель отклонила запрос ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("неожиданный ответ панели: {0}")]
    Malformed(String),
    #[error("все варианты запроса завершились ошибкой: {}", render_attempts(.attempts))]
    Exhausted {
        attempts: Vec<(AddClientVariant, PanelError)>,
    },
}

fn render_attempts(attempts: &[(AddClientVariant, PanelError)]) -> String {
    attempts
        .iter()
        .map(|(variant, error)| format!("{}: {}", variant, error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Вариант запроса `addClient`, порядок в [`AddClientVariant::ALL`] — порядок попыток.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddClientVariant {
    /// 3x-ui: JSON на `panel/api/inbounds/addClient`.
    JsonApi,
    /// Старые форки x-ui: form-urlencoded на `xui/API/inbounds/addClient`.
    LegacyForm,
}

impl AddClientVariant {
    pub const ALL: [AddClientVariant; 2] = [AddClientVariant::JsonApi, AddClientVariant::LegacyForm];

    pub fn path(self) -> &'static str {
        match self {
            AddClientVariant::JsonApi => "panel/api/inbounds/addClient",
            AddClientVariant::LegacyForm => "xui/API/inbounds/addClient",
        }
    }
}

impl fmt::Display for AddClientVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddClientVariant::JsonApi => f.write_str("json-api"),
            AddClientVariant::LegacyForm => f.write_str("legacy-form"),
        }
    }
}

/// Параметры одного запроса на выдачу доступа.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub telegram_user_id: i64,
    /// 0 — без лимита.
    pub traffic_gb: u32,
    pub days_valid: u32,
}

/// То, что вернула панель после создания клиента.
#[derive(Debug, Clone)]
pub struct CreatedClient {
    pub id: String,
    pub email: String,
    pub expiry_time_ms: i64,
    pub traffic_gb: u32,
    pub variant: AddClientVariant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientSettings {
    id: String,
    email: String,
    flow: &'static str,
    alter_id: u32,
    limit_ip: u32,
    #[serde(rename = "totalGB")]
    total_gb: u64,
    expiry_time: i64,
    enable: bool,
    /// 3x-ui хранит `tgId` как int64.
    tg_id: i64,
    sub_id: String,
    reset: u32,
}

#[derive(Debug, Serialize)]
struct InboundSettings<'a> {
    clients: [&'a ClientSettings; 1],
}

#[derive(Debug, Serialize)]
struct AddClientPayload {
    id: u32,
    settings: String,
}

/// Стандартный конверт ответа x-ui.
#[derive(Debug, Deserialize)]
struct PanelResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    msg: String,
}

fn default_success() -> bool {
    true
}

#[derive(Clone)]
pub struct XuiClient {
    http: reqwest::Client,
    config: PanelConfig,
}

impl XuiClient {
    pub fn new(config: PanelConfig) -> Result<Self, PanelError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(config.insecure_tls)
            .user_agent(format!("xui-vless-bot/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            PanelAuth::Token(token) => request.bearer_auth(token),
            PanelAuth::Session { .. } => request,
        }
    }

    /// Сессионный вход; при авторизации по токену ничего не делает.
    async fn login(&self) -> Result<(), PanelError> {
        let PanelAuth::Session { username, password } = &self.config.auth else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.url("login"))
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::FOUND {
            return Err(PanelError::Auth(format!("HTTP {}", status)));
        }

        // Некоторые форки отвечают 200 с success=false на неверный пароль.
        let body = response.text().await?;
        if let Ok(envelope) = serde_json::from_str::<PanelResponse>(&body)
            && !envelope.success
        {
            return Err(PanelError::Auth(envelope.msg));
        }
        tracing::debug!(username = %username, "Logged in to panel");
        Ok(())
    }

    /// Создаёт клиента в настроенном inbound. Не идемпотентно: каждый вызов
    /// добавляет нового клиента.
    pub async fn add_vless_client(&self, request: &ClientRequest) -> Result<CreatedClient, PanelError> {
        self.login().await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let client = build_client_settings(request, now_ms);
        let settings = serde_json::to_string(&InboundSettings { clients: [&client] })
            .map_err(|error| PanelError::Malformed(error.to_string()))?;
        let payload = AddClientPayload {
            id: self.config.inbound_id,
            settings,
        };

        let mut attempts = Vec::with_capacity(AddClientVariant::ALL.len());
        for variant in AddClientVariant::ALL {
            tracing::info!(
                variant = %variant,
                inbound_id = payload.id,
                email = %client.email,
                "Adding client to panel"
            );
            match self.send_add_client(variant, &payload).await {
                Ok(()) => {
                    tracing::info!(variant = %variant, client_id = %client.id, "Panel accepted client");
                    return Ok(CreatedClient {
                        id: client.id,
                        email: client.email,
                        expiry_time_ms: client.expiry_time,
                        traffic_gb: request.traffic_gb,
                        variant,
                    });
                }
                Err(error) => {
                    tracing::warn!(variant = %variant, error = %error, "addClient attempt failed");
                    attempts.push((variant, error));
                }
            }
        }

        Err(PanelError::Exhausted { attempts })
    }

    async fn send_add_client(
        &self,
        variant: AddClientVariant,
        payload: &AddClientPayload,
    ) -> Result<(), PanelError> {
        let request = self.with_auth(self.http.post(self.url(variant.path())));
        let request = match variant {
            AddClientVariant::JsonApi => request.json(payload),
            AddClientVariant::LegacyForm => request.form(payload),
        };
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PanelError::Auth(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(PanelError::Rejected {
                status,
                message: truncate(&body, 200),
            });
        }

        let envelope: PanelResponse = serde_json::from_str(&body)
            .map_err(|_| PanelError::Malformed(truncate(&body, 200)))?;
        if !envelope.success {
            return Err(PanelError::Rejected {
                status,
                message: envelope.msg,
            });
        }
        Ok(())
    }
}

fn build_client_settings(request: &ClientRequest, now_ms: i64) -> ClientSettings {
    let email = format!(
        "tg_{}_{}@xui",
        request.telegram_user_id,
        now_ms.div_euclid(1000)
    );
    ClientSettings {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        flow: CLIENT_FLOW,
        alter_id: 0,
        limit_ip: CLIENT_LIMIT_IP,
        total_gb: u64::from(request.traffic_gb) * BYTES_PER_GB,
        expiry_time: now_ms + i64::from(request.days_valid) * MS_PER_DAY,
        enable: true,
        tg_id: request.telegram_user_id,
        sub_id: String::new(),
        reset: 0,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > max_chars {
        format!("{}...", trimmed.chars().take(max_chars).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const ADD_JSON: &str = "/panel/api/inbounds/addClient";
    const ADD_FORM: &str = "/xui/API/inbounds/addClient";

    fn panel_config(server: &mockito::ServerGuard, auth: PanelAuth) -> PanelConfig {
        PanelConfig {
            base_url: format!("{}/", server.url()),
            auth,
            inbound_id: 3,
            insecure_tls: false,
        }
    }

    fn token_client(server: &mockito::ServerGuard) -> XuiClient {
        XuiClient::new(panel_config(server, PanelAuth::Token("secret".to_string()))).unwrap()
    }

    fn request() -> ClientRequest {
        ClientRequest {
            telegram_user_id: 42,
            traffic_gb: 30,
            days_valid: 30,
        }
    }

    #[test]
    fn client_settings_follow_panel_format() {
        let settings = build_client_settings(&request(), 1_700_000_000_123);
        assert_eq!(settings.email, "tg_42_1700000000@xui");
        assert_eq!(settings.total_gb, 30 * BYTES_PER_GB);
        assert_eq!(settings.expiry_time, 1_700_000_000_123 + 30 * MS_PER_DAY);
        assert!(uuid::Uuid::parse_str(&settings.id).is_ok());

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["totalGB"], 30 * BYTES_PER_GB);
        assert_eq!(json["limitIp"], 3);
        assert_eq!(json["tgId"], 42);
        assert!(json["tgId"].is_i64());
        assert_eq!(json["flow"], "xtls-rprx-vision");
        assert_eq!(json["enable"], true);
    }

    #[test]
    fn zero_traffic_means_unlimited() {
        let settings = build_client_settings(
            &ClientRequest {
                traffic_gb: 0,
                ..request()
            },
            0,
        );
        assert_eq!(settings.total_gb, 0);
    }

    #[tokio::test]
    async fn first_variant_success_skips_fallback() {
        let mut server = mockito::Server::new_async().await;
        let json_mock = server
            .mock("POST", ADD_JSON)
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({ "id": 3 })))
            .with_status(200)
            .with_body(r#"{"success":true,"msg":"ok","obj":null}"#)
            .expect(1)
            .create_async()
            .await;
        let form_mock = server.mock("POST", ADD_FORM).expect(0).create_async().await;

        let created = token_client(&server).add_vless_client(&request()).await.unwrap();

        assert_eq!(created.variant, AddClientVariant::JsonApi);
        assert_eq!(created.traffic_gb, 30);
        assert!(created.email.starts_with("tg_42_"));
        json_mock.assert_async().await;
        form_mock.assert_async().await;
    }

    #[tokio::test]
    async fn falls_back_to_form_variant() {
        let mut server = mockito::Server::new_async().await;
        let json_mock = server
            .mock("POST", ADD_JSON)
            .with_status(404)
            .with_body("404 page not found")
            .expect(1)
            .create_async()
            .await;
        let form_mock = server
            .mock("POST", ADD_FORM)
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "3".into()),
                Matcher::Regex("settings=".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let created = token_client(&server).add_vless_client(&request()).await.unwrap();

        assert_eq!(created.variant, AddClientVariant::LegacyForm);
        json_mock.assert_async().await;
        form_mock.assert_async().await;
    }

    #[tokio::test]
    async fn success_false_envelope_triggers_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", ADD_JSON)
            .with_status(200)
            .with_body(r#"{"success":false,"msg":"Duplicate email"}"#)
            .create_async()
            .await;
        server
            .mock("POST", ADD_FORM)
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let created = token_client(&server).add_vless_client(&request()).await.unwrap();
        assert_eq!(created.variant, AddClientVariant::LegacyForm);
    }

    #[tokio::test]
    async fn both_variants_failing_reports_each_attempt() {
        let mut server = mockito::Server::new_async().await;
        let json_mock = server
            .mock("POST", ADD_JSON)
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;
        let form_mock = server
            .mock("POST", ADD_FORM)
            .with_status(200)
            .with_body("<html>login</html>")
            .expect(1)
            .create_async()
            .await;

        let error = token_client(&server)
            .add_vless_client(&request())
            .await
            .unwrap_err();

        let PanelError::Exhausted { attempts } = &error else {
            panic!("unexpected error: {error:?}");
        };
        assert_eq!(attempts.len(), 2);
        assert!(matches!(
            attempts[0],
            (AddClientVariant::JsonApi, PanelError::Rejected { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(matches!(
            attempts[1],
            (AddClientVariant::LegacyForm, PanelError::Malformed(_))
        ));
        assert!(error.to_string().contains("json-api"));
        json_mock.assert_async().await;
        form_mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_reported_as_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", ADD_JSON).with_status(401).create_async().await;
        server.mock("POST", ADD_FORM).with_status(403).create_async().await;

        let error = token_client(&server)
            .add_vless_client(&request())
            .await
            .unwrap_err();
        let PanelError::Exhausted { attempts } = error else {
            panic!("expected exhausted attempts");
        };
        assert!(attempts.iter().all(|(_, e)| matches!(e, PanelError::Auth(_))));
    }

    #[tokio::test]
    async fn session_login_precedes_add_client() {
        let mut server = mockito::Server::new_async().await;
        let login_mock = server
            .mock("POST", "/login")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "admin".into()),
                Matcher::UrlEncoded("password".into(), "pw".into()),
            ]))
            .with_status(200)
            .with_header("set-cookie", "3x-ui=session; Path=/")
            .with_body(r#"{"success":true,"msg":"Login successful"}"#)
            .expect(1)
            .create_async()
            .await;
        let add_mock = server
            .mock("POST", ADD_JSON)
            .match_header("cookie", Matcher::Regex("3x-ui=session".into()))
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .expect(1)
            .create_async()
            .await;

        let client = XuiClient::new(panel_config(
            &server,
            PanelAuth::Session {
                username: "admin".to_string(),
                password: "pw".to_string(),
            },
        ))
        .unwrap();
        client.add_vless_client(&request()).await.unwrap();

        login_mock.assert_async().await;
        add_mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_login_stops_before_add_client() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"success":false,"msg":"wrong password"}"#)
            .create_async()
            .await;
        let add_mock = server.mock("POST", ADD_JSON).expect(0).create_async().await;

        let client = XuiClient::new(panel_config(
            &server,
            PanelAuth::Session {
                username: "admin".to_string(),
                password: "bad".to_string(),
            },
        ))
        .unwrap();
        let error = client.add_vless_client(&request()).await.unwrap_err();

        assert!(matches!(error, PanelError::Auth(ref msg) if msg == "wrong password"));
        add_mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_panel_is_transport_error() {
        let config = PanelConfig {
            base_url: "http://127.0.0.1:9/".to_string(),
            auth: PanelAuth::Token("t".to_string()),
            inbound_id: 1,
            insecure_tls: false,
        };
        let error = XuiClient::new(config)
            .unwrap()
            .add_vless_client(&request())
            .await
            .unwrap_err();
        let PanelError::Exhausted { attempts } = error else {
            panic!("expected exhausted attempts");
        };
        assert!(attempts
            .iter()
            .all(|(_, e)| matches!(e, PanelError::Unreachable(_))));
    }
}
