use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use murmur_db::StoreError;
use murmur_types::api::{Claims, ReactRequest};

use crate::extract::AppJson;
use crate::views::message_view;
use crate::{ApiError, AppState, blocking};

/// POST /messages/{id}/reactions. A user holds at most one reaction per
/// message; reacting again replaces the previous emoji.
pub async fn add_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<ReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() {
        return Err(ApiError::Validation("Emoji is required".into()));
    }

    let uid = claims.sub.to_string();
    let message = blocking(&state, "Error adding reaction", move |db| {
        db.upsert_reaction(&message_id, &uid, &emoji, chrono::Utc::now())?;
        let row = db
            .get_message(&message_id)?
            .ok_or(StoreError::NotFound("Message"))?;
        message_view(db, row)
    })
    .await?;

    Ok(Json(message))
}
