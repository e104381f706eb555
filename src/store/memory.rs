//! 内存存储：单进程内的轮值记录，用于测试与本地试跑

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::RotationStore;
use crate::core::RotaError;
use crate::rotation::{Person, ReminderStatus};

/// collection -> (手机号 -> Person)；BTreeMap 保证按手机号有序
type PeopleByCollection = HashMap<String, BTreeMap<String, Person>>;

/// 内存轮值存储
#[derive(Default)]
pub struct MemoryStore {
    people: RwLock<PeopleByCollection>,
    reminders: RwLock<HashMap<String, ReminderStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖成员记录
    pub async fn upsert_person(&self, collection: &str, person: Person) {
        self.people
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(person.phone_number.clone(), person);
    }

    /// 写入或覆盖家庭提醒记录
    pub async fn create_reminder(&self, collection: &str, status: ReminderStatus) {
        self.reminders
            .write()
            .await
            .insert(collection.to_string(), status);
    }

    async fn update_person<F>(
        &self,
        collection: &str,
        phone_number: &str,
        f: F,
    ) -> Result<(), RotaError>
    where
        F: FnOnce(&mut Person),
    {
        let mut people = self.people.write().await;
        let person = people
            .get_mut(collection)
            .and_then(|c| c.get_mut(phone_number))
            .ok_or_else(|| RotaError::person_not_found(collection, phone_number))?;
        f(person);
        Ok(())
    }
}

#[async_trait]
impl RotationStore for MemoryStore {
    async fn eligible_people(
        &self,
        collection: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Person>, RotaError> {
        let people = self.people.read().await;
        let mut eligible: Vec<Person> = people
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|p| p.last_attempted <= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        eligible.sort_by(|a, b| {
            (a.last_attempted, a.last_completed, &a.phone_number).cmp(&(
                b.last_attempted,
                b.last_completed,
                &b.phone_number,
            ))
        });
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn all_people(&self, collection: &str) -> Result<Vec<Person>, RotaError> {
        let people = self.people.read().await;
        Ok(people
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_person(
        &self,
        collection: &str,
        phone_number: &str,
    ) -> Result<Option<Person>, RotaError> {
        let people = self.people.read().await;
        Ok(people
            .get(collection)
            .and_then(|c| c.get(phone_number))
            .cloned())
    }

    async fn set_last_attempted(
        &self,
        collection: &str,
        phone_number: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RotaError> {
        self.update_person(collection, phone_number, |p| {
            p.last_attempted = p.last_attempted.max(at);
        })
        .await
    }

    async fn set_last_response(
        &self,
        collection: &str,
        phone_number: &str,
        body: &str,
    ) -> Result<(), RotaError> {
        self.update_person(collection, phone_number, |p| {
            p.last_response = body.to_string();
        })
        .await
    }

    async fn complete_reminder(
        &self,
        collection: &str,
        phone_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RotaError> {
        // 先持有提醒写锁，保证「检查 active -> 置 inactive」原子
        let mut reminders = self.reminders.write().await;
        let status = reminders
            .get_mut(collection)
            .ok_or_else(|| RotaError::ReminderNotFound(collection.to_string()))?;
        if !status.is_active() {
            return Ok(false);
        }
        self.update_person(collection, phone_number, |p| {
            p.last_completed = p.last_completed.max(at);
        })
        .await?;
        *status = ReminderStatus::Inactive;
        Ok(true)
    }

    async fn reminder_status(&self, collection: &str) -> Result<ReminderStatus, RotaError> {
        self.reminders
            .read()
            .await
            .get(collection)
            .copied()
            .ok_or_else(|| RotaError::ReminderNotFound(collection.to_string()))
    }

    async fn set_reminder_status(
        &self,
        collection: &str,
        status: ReminderStatus,
    ) -> Result<(), RotaError> {
        let mut reminders = self.reminders.write().await;
        let current = reminders
            .get_mut(collection)
            .ok_or_else(|| RotaError::ReminderNotFound(collection.to_string()))?;
        *current = status;
        Ok(())
    }
}
