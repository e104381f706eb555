//! HTTP 入口：Pub/Sub 推送触发提醒、Twilio 短信 Webhook
//!
//! - POST /send_reminders：Bearer 鉴权，解析 Pub/Sub 推送信封，按需激活后发送提醒
//! - POST /receive_sms：校验 X-Twilio-Signature，把 From / Body 交给 RotationEngine::receive
//! - GET /health

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

use super::auth::{check_bearer, validate_twilio_signature};
use crate::core::RotaError;
use crate::rotation::RotationEngine;

/// Webhook 服务状态
pub struct WebhookState {
    pub engine: RotationEngine,
    /// 短信请求未带 collection 参数时使用的家庭
    pub default_collection: String,
    pub trigger_token: Option<String>,
    pub twilio_auth_token: String,
    /// 对外基地址，用于还原 Twilio 签名时的 URL
    pub public_url: Option<String>,
}

/// 触发请求体：Pub/Sub 推送信封，兼容旧格式 {"reminder": "..."}
#[derive(Debug, Deserialize)]
pub struct TriggerPayload {
    pub message: Option<PubSubMessage>,
    pub reminder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PubSubMessage {
    pub attributes: Option<PubSubAttributes>,
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PubSubAttributes {
    pub collection: Option<String>,
    /// "new" 表示开启新一轮
    pub status: Option<String>,
}

impl TriggerPayload {
    /// Pub/Sub 消息 ID，仅用于日志关联
    fn message_id(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.message_id.as_deref())
    }

    /// 取出 (collection, status)
    fn into_parts(self) -> Option<(String, Option<String>)> {
        let attributes = self.message.and_then(|m| m.attributes);
        match attributes {
            Some(PubSubAttributes {
                collection: Some(collection),
                status,
            }) => Some((collection, status)),
            _ => self.reminder.map(|collection| (collection, None)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceiveQuery {
    pub collection: Option<String>,
}

/// 处理失败时的 HTTP 映射；不向短信用户暴露任何错误文案
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    Rota(RotaError),
}

impl From<RotaError> for ApiError {
    fn from(e: RotaError) -> Self {
        ApiError::Rota(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            ApiError::Rota(e) => {
                tracing::error!("Rotation error: {}", e);
                let status = if e.is_not_found() {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, e.to_string()).into_response()
            }
        }
    }
}

/// 创建路由
pub fn create_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/send_reminders", post(send_reminders))
        .route("/receive_sms", post(receive_sms))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

/// POST /send_reminders - Pub/Sub 推送（或调度器直接调用）
async fn send_reminders(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !check_bearer(auth, state.trigger_token.as_deref()) {
        tracing::warn!("send_reminders: rejected unauthenticated trigger");
        return Err(ApiError::Unauthorized);
    }

    let payload: TriggerPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid trigger payload: {}", e)))?;
    let message_id = payload.message_id().map(str::to_string);
    let (collection, status) = payload
        .into_parts()
        .ok_or_else(|| ApiError::BadRequest("missing collection".to_string()))?;

    tracing::info!(
        collection = %collection,
        status = ?status,
        message_id = ?message_id,
        "Reminder trigger received"
    );
    let rotation = state.engine.activate(&collection, status.as_deref()).await?;
    state.engine.send_reminder(rotation.collection()).await?;

    Ok(Json(serde_json::json!({})))
}

/// 还原 Twilio 请求时使用的 URL：优先 public_url，否则按 Host 头拼 https（服务部署在 TLS 终止之后）
fn signed_url(public_url: Option<&str>, headers: &HeaderMap, path_and_query: &str) -> String {
    match public_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path_and_query),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("https://{}{}", host, path_and_query)
        }
    }
}

fn form_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// POST /receive_sms - Twilio 收到短信回调
async fn receive_sms(
    State(state): State<Arc<WebhookState>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ReceiveQuery>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/receive_sms");
    let url = signed_url(state.public_url.as_deref(), &headers, path_and_query);
    let signature = headers
        .get("X-Twilio-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !validate_twilio_signature(&state.twilio_auth_token, &url, &params, signature) {
        tracing::warn!(url = %url, "receive_sms: invalid Twilio signature");
        return Err(ApiError::Unauthorized);
    }

    let (Some(from), Some(body)) = (form_value(&params, "From"), form_value(&params, "Body"))
    else {
        return Err(ApiError::BadRequest("missing From or Body".to_string()));
    };

    let collection = query
        .collection
        .unwrap_or_else(|| state.default_collection.clone());
    let outcome = state.engine.receive(&collection, from, body).await?;
    tracing::info!(collection = %collection, from, outcome = ?outcome, "SMS processed");

    Ok(Json(serde_json::json!({})))
}
