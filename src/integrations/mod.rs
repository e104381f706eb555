//! 外部集成：Pub/Sub 触发与 Twilio 短信 Webhook（需 server feature 与公网 Webhook 域名）

pub mod auth;

#[cfg(feature = "server")]
pub mod webhook;
