//! 轮值服务错误类型
//!
//! 「无法识别的回复」与「已有人回复」不是错误，由 RotationEngine 作为正常分支处理；
//! 这里只收录需要上抛给调用方的失败。

use thiserror::Error;

/// 轮值流程中可能出现的错误（查无此人、提醒记录缺失、存储/短信失败、配置缺失）
#[derive(Error, Debug)]
pub enum RotaError {
    /// 收到的号码不在该家庭名单中（上游路由错误，不能静默吞掉）
    #[error("Person {phone_number} not found in {collection}")]
    PersonNotFound {
        collection: String,
        phone_number: String,
    },

    /// 家庭的提醒激活记录不存在（应由外部预先创建）
    #[error("Reminder {0} not found")]
    ReminderNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("SMS transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl RotaError {
    pub fn person_not_found(collection: &str, phone_number: &str) -> Self {
        Self::PersonNotFound {
            collection: collection.to_string(),
            phone_number: phone_number.to_string(),
        }
    }

    /// 是否属于「记录不存在」一类（Webhook 映射为 404）
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PersonNotFound { .. } | Self::ReminderNotFound(_))
    }
}

#[cfg(feature = "async-sqlite")]
impl From<sqlx::Error> for RotaError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<reqwest::Error> for RotaError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<config::ConfigError> for RotaError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
