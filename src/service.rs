//! 服务装配：按配置创建存储、短信发送端与 RotationEngine
//!
//! 供 rota（HTTP 服务）与 rota-trigger（一次性触发）共用。

use std::sync::Arc;

use chrono::Duration;

use crate::config::AppConfig;
use crate::core::RotaError;
use crate::rotation::RotationEngine;
use crate::sms::{SmsSender, TwilioSender};
use crate::store::create_store;

/// 按 [twilio] 配置创建 Twilio 发送端
pub fn create_sender(cfg: &AppConfig) -> Result<Arc<dyn SmsSender>, RotaError> {
    Ok(Arc::new(TwilioSender::from_config(&cfg.twilio)?))
}

/// 创建 RotationEngine：存储来自 [store]，资格窗口来自 [rotation]
pub async fn create_engine(
    cfg: &AppConfig,
    sender: Arc<dyn SmsSender>,
) -> Result<RotationEngine, RotaError> {
    if cfg.rotation.attempt_window_hours <= 0 {
        return Err(RotaError::Config(
            "rotation.attempt_window_hours must be positive".to_string(),
        ));
    }
    let store = create_store(&cfg.store).await?;
    Ok(RotationEngine::new(store, sender)
        .with_attempt_window(Duration::hours(cfg.rotation.attempt_window_hours)))
}
