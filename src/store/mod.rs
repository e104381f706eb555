//! 存储抽象层
//!
//! 定义轮值所需的持久化接口，支持内存和 SQLite 两种实现

mod memory;
#[cfg(feature = "async-sqlite")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StoreSection;
use crate::core::RotaError;
use crate::rotation::{Person, ReminderStatus};

pub use memory::MemoryStore;
#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteStore;

/// 轮值存储接口：成员记录 + 家庭提醒激活记录
#[async_trait]
pub trait RotationStore: Send + Sync {
    /// `last_attempted <= cutoff` 的成员，按 last_attempted、last_completed、手机号升序，最多 limit 个
    async fn eligible_people(
        &self,
        collection: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Person>, RotaError>;

    /// 家庭全部成员（按手机号排序）
    async fn all_people(&self, collection: &str) -> Result<Vec<Person>, RotaError>;

    async fn get_person(
        &self,
        collection: &str,
        phone_number: &str,
    ) -> Result<Option<Person>, RotaError>;

    async fn set_last_attempted(
        &self,
        collection: &str,
        phone_number: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RotaError>;

    async fn set_last_response(
        &self,
        collection: &str,
        phone_number: &str,
        body: &str,
    ) -> Result<(), RotaError>;

    /// 条件完成：仅当提醒仍为 active 时置为 inactive 并记录该成员的 last_completed；
    /// 返回是否由本次调用完成
    async fn complete_reminder(
        &self,
        collection: &str,
        phone_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RotaError>;

    /// 激活状态；记录不存在时返回 ReminderNotFound
    async fn reminder_status(&self, collection: &str) -> Result<ReminderStatus, RotaError>;

    async fn set_reminder_status(
        &self,
        collection: &str,
        status: ReminderStatus,
    ) -> Result<(), RotaError>;
}

/// 按配置创建存储
///
/// backend = "sqlite" 且启用了 async-sqlite feature 时使用 SQLite；否则使用内存存储
pub async fn create_store(cfg: &StoreSection) -> Result<Arc<dyn RotationStore>, RotaError> {
    match cfg.backend.as_str() {
        "memory" => {
            tracing::info!("Using in-memory rotation store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "async-sqlite")]
        "sqlite" => {
            let store = SqliteStore::new(&cfg.path).await?;
            tracing::info!("Using SQLite rotation store: {:?}", cfg.path);
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "async-sqlite"))]
        "sqlite" => Err(RotaError::Config(
            "store.backend = \"sqlite\" requires the async-sqlite feature".to_string(),
        )),
        other => Err(RotaError::Config(format!("unknown store backend: {}", other))),
    }
}
