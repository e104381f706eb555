//! 轮值记录：成员（Person）、提醒激活状态（ReminderStatus）与 RotationState
//!
//! RotationState 不缓存任何状态：每次读取都回到存储层，避免并发回复读到陈旧的激活标记。

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::RotaError;
use crate::store::RotationStore;

/// 构造 RotationState 时触发激活的状态标记
pub const NEW_MARKER: &str = "new";

/// 「从未」哨兵时间：1971-01-01T00:00:00Z（从未完成 / 从未被提醒）
pub fn never() -> DateTime<Utc> {
    DateTime::from_timestamp(31_536_000, 0).unwrap_or_default()
}

/// 家庭成员的轮值记录（以手机号为键）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// 手机号：集合内唯一，同时是短信地址
    pub phone_number: String,
    /// 显示名，用于短信文案
    pub name: String,
    pub last_completed: DateTime<Utc>,
    pub last_attempted: DateTime<Utc>,
    /// 最近一次原样记录的回复（保留大小写）
    pub last_response: String,
}

impl Person {
    /// 新成员：两个时间戳均为哨兵值，回复为空
    pub fn new(phone_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            name: name.into(),
            last_completed: never(),
            last_attempted: never(),
            last_response: String::new(),
        }
    }

    pub fn with_last_attempted(mut self, at: DateTime<Utc>) -> Self {
        self.last_attempted = at;
        self
    }

    pub fn with_last_completed(mut self, at: DateTime<Utc>) -> Self {
        self.last_completed = at;
        self
    }
}

/// 家庭提醒的激活状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    Active,
    Inactive,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Active => "active",
            ReminderStatus::Inactive => "inactive",
        }
    }

    /// 仅 "active" 视为激活，其余持久化值一律按未激活处理
    pub fn parse(s: &str) -> Self {
        if s == "active" {
            ReminderStatus::Active
        } else {
            ReminderStatus::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReminderStatus::Active)
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个家庭的轮值身份；构造时可按 "new" 标记强制激活
pub struct RotationState {
    collection: String,
    store: Arc<dyn RotationStore>,
}

impl RotationState {
    /// 绑定家庭键；`status_hint == Some("new")` 时立即将提醒置为 active（幂等），其他取值不改动
    pub async fn open(
        store: Arc<dyn RotationStore>,
        collection: &str,
        status_hint: Option<&str>,
    ) -> Result<Self, RotaError> {
        if status_hint == Some(NEW_MARKER) {
            store
                .set_reminder_status(collection, ReminderStatus::Active)
                .await?;
            tracing::info!(collection, "Reminder activated");
        }
        Ok(Self {
            collection: collection.to_string(),
            store,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 重新从存储读取激活状态
    pub async fn status(&self) -> Result<ReminderStatus, RotaError> {
        self.store.reminder_status(&self.collection).await
    }
}
