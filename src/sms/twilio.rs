//! Twilio REST API 短信发送
//!
//! POST {api_base}/2010-04-01/Accounts/{sid}/Messages.json，表单字段 To / From / Body，Basic Auth。

use async_trait::async_trait;
use serde::Serialize;

use super::SmsSender;
use crate::config::TwilioSection;
use crate::core::RotaError;

/// Twilio 发送端
pub struct TwilioSender {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

/// 创建消息请求体（application/x-www-form-urlencoded）
#[derive(Debug, Serialize)]
struct CreateMessageForm<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

impl TwilioSender {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
        }
    }

    /// 从 [twilio] 配置段创建；缺少凭据时返回 Config 错误
    pub fn from_config(cfg: &TwilioSection) -> Result<Self, RotaError> {
        let account_sid = require(&cfg.account_sid, "twilio.account_sid")?;
        let auth_token = require(&cfg.auth_token, "twilio.auth_token")?;
        let from_number = require(&cfg.from_number, "twilio.from_number")?;
        Ok(Self::new(
            cfg.api_base.clone(),
            account_sid,
            auth_token,
            from_number,
        ))
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

fn require(value: &Option<String>, key: &str) -> Result<String, RotaError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RotaError::Config(format!("{} must be set", key)))
}

#[async_trait]
impl SmsSender for TwilioSender {
    async fn send_text(&self, phone_number: &str, body: &str) -> Result<(), RotaError> {
        let form = CreateMessageForm {
            to: phone_number,
            from: &self.from_number,
            body,
        };

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RotaError::Transport(format!(
                "Twilio API error ({}): {}",
                status, text
            )));
        }

        tracing::debug!(to = phone_number, "SMS sent");
        Ok(())
    }
}
