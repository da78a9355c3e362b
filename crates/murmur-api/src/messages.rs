use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use murmur_db::models::{NewMessage, PageCursor};
use murmur_types::api::{Claims, MarkReadResponse, SendMessageRequest, StatusMessage};

use crate::extract::{AppJson, AppQuery};
use crate::views::{message_view, message_views};
use crate::{ApiError, AppState, blocking};

const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: pass the `createdAt` of the oldest message
    /// from the previous page to fetch older messages.
    pub before: Option<String>,
    /// The `id` of that same message. Optional, but without it messages
    /// sharing the cursor's timestamp are skipped.
    pub before_id: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// GET /messages/{other_user_id}. Messages in both directions, oldest
/// first. Soft-deleted messages are included and flagged.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(other_id): Path<String>,
    AppQuery(query): AppQuery<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let before = query
        .before
        .as_deref()
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ApiError::Validation(format!("Invalid 'before' cursor: {}", raw)))
        })
        .transpose()?;
    let limit = query.limit.clamp(1, MAX_PAGE);
    let uid = claims.sub.to_string();

    let messages = blocking(&state, "Error fetching messages", move |db| {
        let cursor = before.map(|created_at| PageCursor {
            created_at,
            id: query.before_id.as_deref(),
        });
        let rows = db.conversation(&uid, &other_id, limit, cursor.as_ref())?;
        message_views(db, rows)
    })
    .await?;

    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let media = req.media.filter(|m| !m.trim().is_empty());
    let content = req.content.unwrap_or_default();
    if content.trim().is_empty() && media.is_none() {
        return Err(ApiError::Validation(
            "Message content is required unless media is attached".into(),
        ));
    }

    let message_id = Uuid::new_v4().to_string();
    let uid = claims.sub.to_string();

    let message = blocking(&state, "Error sending message", move |db| {
        let row = db.insert_message(
            &NewMessage {
                id: &message_id,
                sender_id: &uid,
                recipient_id: &req.recipient_id,
                content: &content,
                media: media.as_deref(),
                media_type: req.media_type,
                reply_to: req.reply_to.as_deref(),
            },
            Utc::now(),
        )?;
        message_view(db, row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// PUT /messages/read/{sender_id}. Marks everything the sender sent the
/// caller as read by the caller.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(sender_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let marked = blocking(&state, "Error marking messages as read", move |db| {
        db.mark_read(&uid, &sender_id, Utc::now())
    })
    .await?;

    Ok(Json(MarkReadResponse {
        message: "Messages marked as read".into(),
        marked,
    }))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    blocking(&state, "Error deleting message", move |db| {
        db.soft_delete_message(&message_id, &uid, Utc::now())
    })
    .await?;

    Ok(Json(StatusMessage::new("Message deleted successfully")))
}
