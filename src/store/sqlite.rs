//! 异步 SQLite 轮值存储（sqlx）
//!
//! 时间戳以 Unix 毫秒整数保存，使 SQL 排序与时间先后一致。
//! 需要启用 `async-sqlite` feature。

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::RotationStore;
use crate::core::RotaError;
use crate::rotation::{never, Person, ReminderStatus};

/// SQLite 轮值存储
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件并建表
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, RotaError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;

        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS people (
                collection TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                name TEXT NOT NULL,
                last_completed INTEGER NOT NULL,
                last_attempted INTEGER NOT NULL,
                last_response TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (collection, phone_number)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reminders (
                collection TEXT PRIMARY KEY,
                status TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_people_rotation
                ON people(collection, last_attempted, last_completed)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 写入或覆盖成员记录
    pub async fn upsert_person(&self, collection: &str, person: &Person) -> Result<(), RotaError> {
        sqlx::query(
            "INSERT OR REPLACE INTO people
                (collection, phone_number, name, last_completed, last_attempted, last_response)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&person.phone_number)
        .bind(&person.name)
        .bind(person.last_completed.timestamp_millis())
        .bind(person.last_attempted.timestamp_millis())
        .bind(&person.last_response)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 写入或覆盖家庭提醒记录
    pub async fn create_reminder(
        &self,
        collection: &str,
        status: ReminderStatus,
    ) -> Result<(), RotaError> {
        sqlx::query("INSERT OR REPLACE INTO reminders (collection, status) VALUES (?, ?)")
            .bind(collection)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ensure_person_updated(
    rows_affected: u64,
    collection: &str,
    phone_number: &str,
) -> Result<(), RotaError> {
    if rows_affected == 0 {
        return Err(RotaError::person_not_found(collection, phone_number));
    }
    Ok(())
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(never)
}

fn person_from_row(row: &SqliteRow) -> Person {
    Person {
        phone_number: row.get("phone_number"),
        name: row.get("name"),
        last_completed: from_millis(row.get("last_completed")),
        last_attempted: from_millis(row.get("last_attempted")),
        last_response: row.get("last_response"),
    }
}

#[async_trait]
impl RotationStore for SqliteStore {
    async fn eligible_people(
        &self,
        collection: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Person>, RotaError> {
        let rows = sqlx::query(
            "SELECT phone_number, name, last_completed, last_attempted, last_response
             FROM people
             WHERE collection = ? AND last_attempted <= ?
             ORDER BY last_attempted ASC, last_completed ASC, phone_number ASC
             LIMIT ?",
        )
        .bind(collection)
        .bind(cutoff.timestamp_millis())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(person_from_row).collect())
    }

    async fn all_people(&self, collection: &str) -> Result<Vec<Person>, RotaError> {
        let rows = sqlx::query(
            "SELECT phone_number, name, last_completed, last_attempted, last_response
             FROM people WHERE collection = ? ORDER BY phone_number ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(person_from_row).collect())
    }

    async fn get_person(
        &self,
        collection: &str,
        phone_number: &str,
    ) -> Result<Option<Person>, RotaError> {
        let row = sqlx::query(
            "SELECT phone_number, name, last_completed, last_attempted, last_response
             FROM people WHERE collection = ? AND phone_number = ?",
        )
        .bind(collection)
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(person_from_row))
    }

    async fn set_last_attempted(
        &self,
        collection: &str,
        phone_number: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RotaError> {
        // MAX 保证时间戳只会前移
        let result = sqlx::query(
            "UPDATE people SET last_attempted = MAX(last_attempted, ?)
             WHERE collection = ? AND phone_number = ?",
        )
        .bind(at.timestamp_millis())
        .bind(collection)
        .bind(phone_number)
        .execute(&self.pool)
        .await?;
        ensure_person_updated(result.rows_affected(), collection, phone_number)
    }

    async fn set_last_response(
        &self,
        collection: &str,
        phone_number: &str,
        body: &str,
    ) -> Result<(), RotaError> {
        let result = sqlx::query(
            "UPDATE people SET last_response = ? WHERE collection = ? AND phone_number = ?",
        )
        .bind(body)
        .bind(collection)
        .bind(phone_number)
        .execute(&self.pool)
        .await?;
        ensure_person_updated(result.rows_affected(), collection, phone_number)
    }

    async fn complete_reminder(
        &self,
        collection: &str,
        phone_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RotaError> {
        let mut tx = self.pool.begin().await?;

        // 条件更新必须是事务第一句：先拿写锁，并发回复在 busy_timeout 内排队
        // 只有仍为 active 的那一次回复能完成本轮
        let flipped = sqlx::query(
            "UPDATE reminders SET status = 'inactive' WHERE collection = ? AND status = 'active'",
        )
        .bind(collection)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;
        if !flipped {
            let exists = sqlx::query("SELECT status FROM reminders WHERE collection = ?")
                .bind(collection)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;
            if !exists {
                return Err(RotaError::ReminderNotFound(collection.to_string()));
            }
            return Ok(false);
        }

        let stamped = sqlx::query(
            "UPDATE people SET last_completed = MAX(last_completed, ?)
             WHERE collection = ? AND phone_number = ?",
        )
        .bind(at.timestamp_millis())
        .bind(collection)
        .bind(phone_number)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if stamped == 0 {
            tx.rollback().await?;
            return Err(RotaError::person_not_found(collection, phone_number));
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn reminder_status(&self, collection: &str) -> Result<ReminderStatus, RotaError> {
        let row = sqlx::query("SELECT status FROM reminders WHERE collection = ?")
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let status: String = row.get("status");
                Ok(ReminderStatus::parse(&status))
            }
            None => Err(RotaError::ReminderNotFound(collection.to_string())),
        }
    }

    async fn set_reminder_status(
        &self,
        collection: &str,
        status: ReminderStatus,
    ) -> Result<(), RotaError> {
        let result = sqlx::query("UPDATE reminders SET status = ? WHERE collection = ?")
            .bind(status.as_str())
            .bind(collection)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RotaError::ReminderNotFound(collection.to_string()));
        }
        Ok(())
    }
}
