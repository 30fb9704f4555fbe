//! Сборка VLESS-ссылки из UUID клиента и шаблона параметров.

/// Статические параметры ссылки, задаются оператором при развёртывании.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    pub host: String,
    pub port: u16,
    /// Транспорт (`type=`).
    pub network: String,
    pub security: String,
    /// REALITY public key (`pbk=`).
    pub public_key: Option<String>,
    pub fingerprint: String,
    pub sni: String,
    /// REALITY short id (`sid=`).
    pub short_id: Option<String>,
    /// REALITY spider path (`spx=`).
    pub spider_x: String,
    pub flow: String,
}

impl Default for LinkTemplate {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 443,
            network: "tcp".to_string(),
            security: "reality".to_string(),
            public_key: None,
            fingerprint: "chrome".to_string(),
            sni: "google.com".to_string(),
            short_id: None,
            spider_x: "/".to_string(),
            flow: "xtls-rprx-vision".to_string(),
        }
    }
}

/// `vless://<id>@<host>:<port>?<params>#<label>`
pub fn build_vless_link(template: &LinkTemplate, client_id: &str, label: &str) -> String {
    let mut params: Vec<(&str, &str)> = vec![
        ("type", template.network.as_str()),
        ("encryption", "none"),
        ("security", template.security.as_str()),
    ];
    if let Some(pbk) = non_empty(&template.public_key) {
        params.push(("pbk", pbk));
    }
    params.push(("fp", template.fingerprint.as_str()));
    params.push(("sni", template.sni.as_str()));
    if let Some(sid) = non_empty(&template.short_id) {
        params.push(("sid", sid));
    }
    params.push(("spx", template.spider_x.as_str()));
    params.push(("flow", template.flow.as_str()));

    let query = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "vless://{}@{}:{}?{}#{}",
        client_id,
        format_host(&template.host),
        template.port,
        query,
        urlencoding::encode(label)
    )
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// IPv6-адрес в ссылке должен быть в квадратных скобках.
fn format_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}
