//! 记录型发送端（无需 Twilio 账号）
//!
//! 只把短信记下来并打日志，用于测试与 rota-trigger --dry-run。

use std::sync::Mutex;

use async_trait::async_trait;

use super::SmsSender;
use crate::core::RotaError;

/// 已「发送」的一条短信
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub body: String,
}

impl SentMessage {
    pub fn new(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
        }
    }
}

/// 记录型发送端；`fail_for` 中的号码发送时返回 Transport 错误
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    fail_for: Mutex<Vec<String>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让发往该号码的短信失败（模拟运营商故障）
    pub fn fail_for(&self, phone_number: &str) {
        if let Ok(mut fail_for) = self.fail_for.lock() {
            fail_for.push(phone_number.to_string());
        }
    }

    /// 已发送短信的快照
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SmsSender for RecordingSender {
    async fn send_text(&self, phone_number: &str, body: &str) -> Result<(), RotaError> {
        let failing = self
            .fail_for
            .lock()
            .map(|f| f.iter().any(|n| n == phone_number))
            .unwrap_or(false);
        if failing {
            return Err(RotaError::Transport(format!(
                "delivery to {} failed",
                phone_number
            )));
        }

        tracing::info!(to = phone_number, body, "SMS recorded");
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage::new(phone_number, body));
        }
        Ok(())
    }
}
