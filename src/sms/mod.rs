//! 短信发送抽象
//!
//! 所有后端（Twilio / Recording）实现 SmsSender：send_text 发送一条短信，失败以错误上抛，不做内部重试。

mod recording;
mod twilio;

use async_trait::async_trait;

use crate::core::RotaError;

pub use recording::{RecordingSender, SentMessage};
pub use twilio::TwilioSender;

/// 短信发送 trait
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_text(&self, phone_number: &str, body: &str) -> Result<(), RotaError>;
}
