//! Rota 一次性触发
//!
//! 不经过 HTTP，直接对某个家庭执行一次「发送提醒」事件（手动补发、本地调试）。
//!
//! 用法: rota-trigger <collection> [--new] [--dry-run]
//! - --new: 先把该家庭的提醒置为 active（开启新一轮）
//! - --dry-run: 不调用 Twilio，只在日志中打印将要发送的短信

use std::sync::Arc;

use anyhow::Context;
use rota::config::load_config;
use rota::rotation::NEW_MARKER;
use rota::service::{create_engine, create_sender};
use rota::sms::{RecordingSender, SmsSender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rota::observability::init();

    let mut collection = None;
    let mut new_cycle = false;
    let mut dry_run = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--new" => new_cycle = true,
            "--dry-run" => dry_run = true,
            other if other.starts_with("--") => anyhow::bail!("unknown flag: {}", other),
            other => collection = Some(other.to_string()),
        }
    }
    let collection =
        collection.context("usage: rota-trigger <collection> [--new] [--dry-run]")?;

    let cfg = load_config(None).context("Failed to load config")?;
    let sender: Arc<dyn SmsSender> = if dry_run {
        Arc::new(RecordingSender::new())
    } else {
        create_sender(&cfg).context("Failed to create SMS sender")?
    };
    let engine = create_engine(&cfg, sender)
        .await
        .context("Failed to create rotation engine")?;

    let status = new_cycle.then_some(NEW_MARKER);
    let rotation = engine
        .activate(&collection, status)
        .await
        .with_context(|| format!("Failed to open rotation {}", collection))?;
    let outcome = engine
        .send_reminder(rotation.collection())
        .await
        .context("Failed to send reminder")?;

    tracing::info!(collection = %collection, outcome = ?outcome, "Trigger finished");
    Ok(())
}
