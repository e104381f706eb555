//! Rota HTTP 服务
//!
//! 接收 Pub/Sub 推送的提醒触发与 Twilio 短信回调，驱动家务轮值。
//!
//! 配置: config/default.toml，环境变量 ROTA__* 覆盖，例如:
//! - ROTA__TWILIO__ACCOUNT_SID / ROTA__TWILIO__AUTH_TOKEN / ROTA__TWILIO__FROM_NUMBER
//! - ROTA__AUTH__TRIGGER_TOKEN: /send_reminders 的 Bearer 令牌
//! - ROTA__SERVER__PUBLIC_URL: Twilio Webhook 的对外基地址
//!
//! 启动: cargo run --bin rota

#[cfg(feature = "server")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use rota::config::load_config;
    use rota::core::RotaError;
    use rota::integrations::webhook::{create_router, WebhookState};
    use rota::service::{create_engine, create_sender};

    rota::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;

    let twilio_auth_token = cfg
        .twilio
        .auth_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RotaError::Config("twilio.auth_token must be set".to_string()))?;
    if cfg.auth.trigger_token.is_none() {
        tracing::warn!("auth.trigger_token not set, /send_reminders will reject every request");
    }

    let sender = create_sender(&cfg).context("Failed to create SMS sender")?;
    let engine = create_engine(&cfg, sender)
        .await
        .context("Failed to create rotation engine")?;

    let state = Arc::new(WebhookState {
        engine,
        default_collection: cfg.app.default_collection.clone(),
        trigger_token: cfg.auth.trigger_token.clone(),
        twilio_auth_token,
        public_url: cfg.server.public_url.clone(),
    });

    let app = create_router(state);

    let addr: std::net::SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Rota server listening on http://{}", addr);
    tracing::info!("Twilio webhook URL: http://YOUR_HOST:{}/receive_sms", cfg.server.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(not(feature = "server"))]
fn main() {
    eprintln!("请使用 --features server 编译: cargo run --bin rota --features server");
    std::process::exit(1);
}
