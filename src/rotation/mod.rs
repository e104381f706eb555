//! 轮值核心：成员记录、激活状态、回复词表与 RotationEngine 状态机

pub mod engine;
pub mod reply;
pub mod state;

pub use engine::{
    Clock, ReminderOutcome, ReplyOutcome, RotationEngine, DEFAULT_ATTEMPT_WINDOW_HOURS,
};
pub use reply::{escalation_message, prompt_message, Reply};
pub use state::{never, Person, ReminderStatus, RotationState, NEW_MARKER};
