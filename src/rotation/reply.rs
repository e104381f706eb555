//! 回复词表与短信文案
//!
//! 文案需逐字保留（含 emoji），下游用户已习惯这些提示。

/// 可识别的回复：是 / 否
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Affirmative,
    Negative,
}

impl Reply {
    /// 转小写后匹配 y/yes 与 n/no；不做 trim，词表外一律返回 None
    pub fn parse(body: &str) -> Option<Self> {
        match body.to_lowercase().as_str() {
            "y" | "yes" => Some(Reply::Affirmative),
            "n" | "no" => Some(Reply::Negative),
            _ => None,
        }
    }
}

pub const NOT_UNDERSTOOD: &str =
    "I did not understand your response. Please send only yes, no, y or n.";

pub const ALREADY_RESPONDED: &str = "Someone already responded, so don't worry about it!";

pub const ACKNOWLEDGED: &str = "Got it! Thanks!";

/// 轮到某人时的提醒
pub fn prompt_message(name: &str) -> String {
    format!(
        "Hi {}, it's your turn to take out the trash tonight! Can you pick it up tonight? Please respond with Yes or No.",
        name
    )
}

/// 所有人 24 小时内都已被提醒过时的群发通知
pub fn escalation_message(name: &str) -> String {
    format!(
        "Hi {}, NOBODY is able to take out the trash tonight! 🤷‍♂️ Figure it out, humans!",
        name
    )
}
