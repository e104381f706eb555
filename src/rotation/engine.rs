//! 轮值引擎：选人并发送提醒、处理回复
//!
//! 存储与短信发送均通过构造参数注入；每次调用都重新读取存储，不在调用之间缓存任何记录。
//! 否定回复会直接调用一次 send_reminder 推进轮转，send_reminder 自身不会再回到 receive，调用深度有界。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::reply::{
    escalation_message, prompt_message, Reply, ACKNOWLEDGED, ALREADY_RESPONDED, NOT_UNDERSTOOD,
};
use super::state::{Person, RotationState};
use crate::core::RotaError;
use crate::sms::SmsSender;
use crate::store::RotationStore;

/// 当前时间来源（测试中可固定）
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// 默认资格窗口：24 小时内被提醒过的人不再被选中
pub const DEFAULT_ATTEMPT_WINDOW_HOURS: i64 = 24;

/// send_reminder 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    /// 提醒未激活，未发送任何短信
    Inactive,
    /// 已提醒该手机号并记录尝试时间
    Prompted(String),
    /// 无人合格，已向全部成员群发（人数）
    Escalated(usize),
}

/// receive 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// 回复不在词表内
    NotUnderstood,
    /// 本轮已被他人完成或从未激活
    AlreadyResolved,
    /// 肯定回复，本轮结束（false 表示被并发回复抢先完成）
    Completed(bool),
    /// 否定回复，已推进到下一次提醒
    Declined(ReminderOutcome),
}

/// 轮值引擎
pub struct RotationEngine {
    store: Arc<dyn RotationStore>,
    sender: Arc<dyn SmsSender>,
    attempt_window: Duration,
    clock: Clock,
}

impl RotationEngine {
    pub fn new(store: Arc<dyn RotationStore>, sender: Arc<dyn SmsSender>) -> Self {
        Self {
            store,
            sender,
            attempt_window: Duration::hours(DEFAULT_ATTEMPT_WINDOW_HOURS),
            clock: Arc::new(Utc::now),
        }
    }

    /// 设置资格窗口（默认 24 小时）
    pub fn with_attempt_window(mut self, window: Duration) -> Self {
        self.attempt_window = window;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// 绑定家庭；status 为 "new" 时激活提醒
    pub async fn activate(
        &self,
        collection: &str,
        status_hint: Option<&str>,
    ) -> Result<RotationState, RotaError> {
        RotationState::open(self.store.clone(), collection, status_hint).await
    }

    /// 提醒下一位合格成员；无人合格时向全部成员群发通知
    pub async fn send_reminder(&self, collection: &str) -> Result<ReminderOutcome, RotaError> {
        let status = self.store.reminder_status(collection).await?;
        if !status.is_active() {
            tracing::debug!(collection, "Reminder inactive, nothing to send");
            return Ok(ReminderOutcome::Inactive);
        }

        let now = (self.clock)();
        let cutoff = now - self.attempt_window;
        let next = self
            .store
            .eligible_people(collection, cutoff, 1)
            .await?
            .into_iter()
            .next();

        let Some(person) = next else {
            return self.escalate(collection).await;
        };

        // 先发后记：发送失败时不记录尝试，重试会重新选人
        self.sender
            .send_text(&person.phone_number, &prompt_message(&person.name))
            .await?;
        self.store
            .set_last_attempted(collection, &person.phone_number, now)
            .await?;

        tracing::info!(
            collection,
            to = %person.phone_number,
            name = %person.name,
            "Reminder sent"
        );
        Ok(ReminderOutcome::Prompted(person.phone_number))
    }

    async fn escalate(&self, collection: &str) -> Result<ReminderOutcome, RotaError> {
        let people: Vec<Person> = self.store.all_people(collection).await?;
        tracing::warn!(
            collection,
            people = people.len(),
            "Nobody eligible for reminder, notifying everyone"
        );
        for person in &people {
            self.sender
                .send_text(&person.phone_number, &escalation_message(&person.name))
                .await?;
        }
        Ok(ReminderOutcome::Escalated(people.len()))
    }

    /// 处理一条回复短信
    pub async fn receive(
        &self,
        collection: &str,
        phone_number: &str,
        message_body: &str,
    ) -> Result<ReplyOutcome, RotaError> {
        if self
            .store
            .get_person(collection, phone_number)
            .await?
            .is_none()
        {
            return Err(RotaError::person_not_found(collection, phone_number));
        }

        let Some(reply) = Reply::parse(message_body) else {
            tracing::debug!(collection, from = phone_number, "Reply not understood");
            self.sender.send_text(phone_number, NOT_UNDERSTOOD).await?;
            return Ok(ReplyOutcome::NotUnderstood);
        };

        if !self.store.reminder_status(collection).await?.is_active() {
            tracing::debug!(collection, from = phone_number, "Reminder already resolved");
            self.sender.send_text(phone_number, ALREADY_RESPONDED).await?;
            return Ok(ReplyOutcome::AlreadyResolved);
        }

        // 先记后发：回复原文（保留大小写）
        self.store
            .set_last_response(collection, phone_number, message_body)
            .await?;
        self.sender.send_text(phone_number, ACKNOWLEDGED).await?;

        match reply {
            Reply::Affirmative => {
                let now = (self.clock)();
                let completed = self
                    .store
                    .complete_reminder(collection, phone_number, now)
                    .await?;
                if completed {
                    tracing::info!(collection, by = phone_number, "Reminder completed");
                } else {
                    tracing::warn!(
                        collection,
                        by = phone_number,
                        "Reminder was completed concurrently by someone else"
                    );
                }
                Ok(ReplyOutcome::Completed(completed))
            }
            Reply::Negative => {
                tracing::info!(collection, by = phone_number, "Declined, advancing rotation");
                let next = self.send_reminder(collection).await?;
                Ok(ReplyOutcome::Declined(next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::{never, ReminderStatus};
    use crate::sms::{RecordingSender, SentMessage};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    const BRIAN: &str = "+11111111111";
    const ANNIE: &str = "+12222222222";
    const HALEY: &str = "+12345678901";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 2, 1, 18, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        sender: Arc<RecordingSender>,
        engine: RotationEngine,
    }

    async fn fixture(people: Vec<Person>, status: ReminderStatus) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        for p in people {
            store.upsert_person("H", p).await;
        }
        store.create_reminder("H", status).await;
        let sender = Arc::new(RecordingSender::new());
        let engine = RotationEngine::new(store.clone(), sender.clone())
            .with_clock(Arc::new(now));
        Fixture {
            store,
            sender,
            engine,
        }
    }

    async fn person(f: &Fixture, phone: &str) -> Person {
        f.store.get_person("H", phone).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_send_reminder_single_person() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Active).await;

        let outcome = f.engine.send_reminder("H").await.unwrap();

        assert_eq!(outcome, ReminderOutcome::Prompted(BRIAN.to_string()));
        assert_eq!(
            f.sender.sent(),
            vec![SentMessage::new(BRIAN, prompt_message("Brian"))]
        );
        assert_eq!(person(&f, BRIAN).await.last_attempted, now());
    }

    #[tokio::test]
    async fn test_send_reminder_fairness_order() {
        let day = |d| Utc.with_ymd_and_hms(2023, 1, d, 0, 0, 0).unwrap();
        let f = fixture(
            vec![
                Person::new(BRIAN, "Brian").with_last_completed(day(20)),
                Person::new(ANNIE, "Annie").with_last_completed(day(10)),
                Person::new(HALEY, "Haley")
                    .with_last_attempted(day(5))
                    .with_last_completed(never()),
            ],
            ReminderStatus::Active,
        )
        .await;

        // 最久未被提醒者优先，其次最久未完成者
        f.engine.send_reminder("H").await.unwrap();
        f.engine.send_reminder("H").await.unwrap();
        f.engine.send_reminder("H").await.unwrap();

        let order: Vec<String> = f.sender.sent().into_iter().map(|m| m.to).collect();
        assert_eq!(order, [ANNIE, BRIAN, HALEY]);
    }

    #[tokio::test]
    async fn test_send_reminder_escalates_when_nobody_eligible() {
        let f = fixture(
            vec![
                Person::new(BRIAN, "Brian").with_last_attempted(now()),
                Person::new(ANNIE, "Annie").with_last_attempted(now() - Duration::hours(23)),
            ],
            ReminderStatus::Active,
        )
        .await;

        let outcome = f.engine.send_reminder("H").await.unwrap();

        assert_eq!(outcome, ReminderOutcome::Escalated(2));
        let sent = f.sender.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&SentMessage::new(BRIAN, escalation_message("Brian"))));
        assert!(sent.contains(&SentMessage::new(ANNIE, escalation_message("Annie"))));
        assert_eq!(person(&f, BRIAN).await.last_attempted, now());
        assert_eq!(
            person(&f, ANNIE).await.last_attempted,
            now() - Duration::hours(23)
        );
    }

    #[tokio::test]
    async fn test_send_reminder_noop_when_inactive() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Inactive).await;

        let outcome = f.engine.send_reminder("H").await.unwrap();

        assert_eq!(outcome, ReminderOutcome::Inactive);
        assert!(f.sender.sent().is_empty());
        assert_eq!(person(&f, BRIAN).await.last_attempted, never());
    }

    #[tokio::test]
    async fn test_send_reminder_transport_failure_records_nothing() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Active).await;
        f.sender.fail_for(BRIAN);

        let err = f.engine.send_reminder("H").await.unwrap_err();

        assert!(matches!(err, RotaError::Transport(_)));
        assert_eq!(person(&f, BRIAN).await.last_attempted, never());
    }

    #[tokio::test]
    async fn test_send_reminder_missing_reminder_record() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_person("H", Person::new(BRIAN, "Brian")).await;
        let engine = RotationEngine::new(store, Arc::new(RecordingSender::new()));

        let err = engine.send_reminder("H").await.unwrap_err();
        assert!(matches!(err, RotaError::ReminderNotFound(c) if c == "H"));
    }

    #[tokio::test]
    async fn test_attempt_window_is_configurable() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_person(
                "H",
                Person::new(BRIAN, "Brian").with_last_attempted(now() - Duration::hours(3)),
            )
            .await;
        store.create_reminder("H", ReminderStatus::Active).await;
        let sender = Arc::new(RecordingSender::new());
        let engine = RotationEngine::new(store, sender.clone())
            .with_clock(Arc::new(now))
            .with_attempt_window(Duration::hours(2));

        let outcome = engine.send_reminder("H").await.unwrap();
        assert_eq!(outcome, ReminderOutcome::Prompted(BRIAN.to_string()));
    }

    #[tokio::test]
    async fn test_receive_positive_response() {
        let f = fixture(
            vec![Person::new(BRIAN, "Brian"), Person::new(ANNIE, "Annie")],
            ReminderStatus::Active,
        )
        .await;

        let outcome = f.engine.receive("H", BRIAN, "YES").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::Completed(true));
        assert_eq!(f.sender.sent(), vec![SentMessage::new(BRIAN, ACKNOWLEDGED)]);
        let brian = person(&f, BRIAN).await;
        assert_eq!(brian.last_response, "YES");
        assert_eq!(brian.last_completed, now());
        assert_eq!(person(&f, ANNIE).await.last_completed, never());
        assert_eq!(
            f.store.reminder_status("H").await.unwrap(),
            ReminderStatus::Inactive
        );
    }

    #[tokio::test]
    async fn test_receive_vocabulary_is_case_insensitive() {
        for body in ["y", "Y", "yes", "YES", "Yes"] {
            let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Active).await;
            let outcome = f.engine.receive("H", BRIAN, body).await.unwrap();
            assert_eq!(outcome, ReplyOutcome::Completed(true), "{body}");
        }
        for body in ["n", "N", "no", "NO", "No"] {
            let f = fixture(
                vec![Person::new(BRIAN, "Brian").with_last_attempted(now())],
                ReminderStatus::Active,
            )
            .await;
            let outcome = f.engine.receive("H", BRIAN, body).await.unwrap();
            assert_eq!(
                outcome,
                ReplyOutcome::Declined(ReminderOutcome::Escalated(1)),
                "{body}"
            );
        }
    }

    #[tokio::test]
    async fn test_receive_from_non_user() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Active).await;

        let err = f.engine.receive("H", "123", "blah").await.unwrap_err();

        assert!(err.to_string().contains("not found"));
        assert!(matches!(err, RotaError::PersonNotFound { .. }));
        assert!(f.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_receive_non_valid_response() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Active).await;

        let outcome = f.engine.receive("H", BRIAN, "BLAH").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::NotUnderstood);
        assert_eq!(f.sender.sent(), vec![SentMessage::new(BRIAN, NOT_UNDERSTOOD)]);
        assert!(person(&f, BRIAN).await.last_response.is_empty());
        assert!(f.store.reminder_status("H").await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_receive_completed_reminder() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Inactive).await;

        let outcome = f.engine.receive("H", BRIAN, "Yes").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::AlreadyResolved);
        assert_eq!(
            f.sender.sent(),
            vec![SentMessage::new(BRIAN, ALREADY_RESPONDED)]
        );
        let brian = person(&f, BRIAN).await;
        assert!(brian.last_response.is_empty());
        assert_eq!(brian.last_completed, never());
    }

    #[tokio::test]
    async fn test_receive_negative_response_advances() {
        let f = fixture(
            vec![
                Person::new(BRIAN, "Brian").with_last_attempted(now() - Duration::minutes(5)),
                Person::new(ANNIE, "Other"),
            ],
            ReminderStatus::Active,
        )
        .await;

        let outcome = f.engine.receive("H", BRIAN, "No").await.unwrap();

        assert_eq!(
            outcome,
            ReplyOutcome::Declined(ReminderOutcome::Prompted(ANNIE.to_string()))
        );
        assert_eq!(
            f.sender.sent(),
            vec![
                SentMessage::new(BRIAN, ACKNOWLEDGED),
                SentMessage::new(ANNIE, prompt_message("Other")),
            ]
        );
        assert_eq!(person(&f, BRIAN).await.last_response, "No");
        assert_eq!(person(&f, ANNIE).await.last_attempted, now());
        assert!(f.store.reminder_status("H").await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_second_reply_after_completion() {
        let f = fixture(
            vec![Person::new(BRIAN, "Brian"), Person::new(ANNIE, "Annie")],
            ReminderStatus::Active,
        )
        .await;

        f.engine.receive("H", BRIAN, "y").await.unwrap();
        let outcome = f.engine.receive("H", ANNIE, "yes").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::AlreadyResolved);
        assert_eq!(
            f.sender.sent().last(),
            Some(&SentMessage::new(ANNIE, ALREADY_RESPONDED))
        );
        assert_eq!(person(&f, ANNIE).await.last_completed, never());
    }

    #[tokio::test]
    async fn test_activate_then_send() {
        let f = fixture(vec![Person::new(BRIAN, "Brian")], ReminderStatus::Inactive).await;

        let state = f.engine.activate("H", Some("new")).await.unwrap();
        assert!(state.status().await.unwrap().is_active());

        let outcome = f.engine.send_reminder(state.collection()).await.unwrap();
        assert_eq!(outcome, ReminderOutcome::Prompted(BRIAN.to_string()));
    }
}
