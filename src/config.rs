//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ROTA__*` 覆盖（双下划线表示嵌套，如 `ROTA__TWILIO__AUTH_TOKEN=...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub store: StoreSection,
    pub twilio: TwilioSection,
    pub auth: AuthSection,
    pub rotation: RotationSection,
}

/// [app] 段：应用名、收短信时使用的默认家庭
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 收到短信但请求未指定 collection 时使用
    #[serde(default = "default_collection")]
    pub default_collection: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            default_collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "trash-reminder".to_string()
}

/// [server] 段：监听地址与对外 URL
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 对外可见的基地址（如 https://rota.example.com），用于 Twilio 签名校验；未设置时按 Host 头拼 https URL
    pub public_url: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// [store] 段：存储后端（sqlite / memory）与数据库路径
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("rota.db")
}

/// [twilio] 段：账号凭据与发信号码
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioSection {
    pub account_sid: Option<String>,
    /// 同时用于发信 Basic Auth 与 Webhook 签名校验
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TwilioSection {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// [auth] 段：/send_reminders 的 Bearer 令牌
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthSection {
    pub trigger_token: Option<String>,
}

/// [rotation] 段
#[derive(Debug, Clone, Deserialize)]
pub struct RotationSection {
    /// 资格窗口（小时）：窗口内被提醒过的人不会再被选中
    #[serde(default = "default_attempt_window_hours")]
    pub attempt_window_hours: i64,
}

impl Default for RotationSection {
    fn default() -> Self {
        Self {
            attempt_window_hours: default_attempt_window_hours(),
        }
    }
}

fn default_attempt_window_hours() -> i64 {
    crate::rotation::DEFAULT_ATTEMPT_WINDOW_HOURS
}

/// 从 config 目录加载配置，环境变量 ROTA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ROTA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    // 不开启 try_parsing：号码 "+1555..." 与 "0012345" 这类令牌必须按原样保留为字符串，
    // port 等数值字段在反序列化时再由 config 从字符串转换
    builder = builder.add_source(config::Environment::with_prefix("ROTA").separator("__"));

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.default_collection, "trash-reminder");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.store.backend, "sqlite");
        assert_eq!(cfg.twilio.api_base, "https://api.twilio.com");
        assert_eq!(cfg.rotation.attempt_window_hours, 24);
        assert!(cfg.auth.trigger_token.is_none());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rota.toml");
        std::fs::write(
            &path,
            r#"
[app]
default_collection = "dishes"

[server]
port = 8080
public_url = "https://rota.example.com"

[store]
backend = "memory"

[twilio]
account_sid = "AC123"
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.default_collection, "dishes");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.public_url.as_deref(), Some("https://rota.example.com"));
        assert_eq!(cfg.store.backend, "memory");
        assert_eq!(cfg.twilio.account_sid.as_deref(), Some("AC123"));
        assert_eq!(cfg.twilio.api_base, "https://api.twilio.com");
    }

    #[test]
    fn test_env_keeps_phone_number_and_token() {
        std::env::set_var("ROTA__TWILIO__FROM_NUMBER", "+15551234567");
        std::env::set_var("ROTA__AUTH__TRIGGER_TOKEN", "0012345");
        std::env::set_var("ROTA__ROTATION__ATTEMPT_WINDOW_HOURS", "48");

        let cfg = load_config(None);

        std::env::remove_var("ROTA__TWILIO__FROM_NUMBER");
        std::env::remove_var("ROTA__AUTH__TRIGGER_TOKEN");
        std::env::remove_var("ROTA__ROTATION__ATTEMPT_WINDOW_HOURS");

        let cfg = cfg.unwrap();
        assert_eq!(cfg.twilio.from_number.as_deref(), Some("+15551234567"));
        assert_eq!(cfg.auth.trigger_token.as_deref(), Some("0012345"));
        assert_eq!(cfg.rotation.attempt_window_hours, 48);
    }
}
