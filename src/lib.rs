//! Rota - 家务轮值短信提醒
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **integrations**: Pub/Sub 触发与 Twilio Webhook（鉴权 + 路由）
//! - **observability**: tracing 日志初始化
//! - **rotation**: 成员记录、激活状态、RotationEngine 轮值状态机
//! - **service**: 按配置装配存储、短信发送端与引擎
//! - **sms**: 短信发送抽象与实现（Twilio / Recording）
//! - **store**: 持久化抽象与实现（内存 / SQLite）

pub mod config;
pub mod core;
pub mod integrations;
pub mod observability;
pub mod rotation;
pub mod service;
pub mod sms;
pub mod store;

pub use rotation::{RotationEngine, RotationState};
