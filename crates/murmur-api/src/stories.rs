use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use murmur_db::models::NewStory;
use murmur_types::api::{Claims, CreateStoryRequest, StatusMessage};

use crate::extract::AppJson;
use crate::views::{story_view, story_views};
use crate::{ApiError, AppState, blocking};

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.media.trim().is_empty() {
        return Err(ApiError::Validation("Story media is required".into()));
    }

    let story_id = Uuid::new_v4().to_string();
    let uid = claims.sub.to_string();

    let story = blocking(&state, "Error creating story", move |db| {
        let row = db.insert_story(
            &NewStory {
                id: &story_id,
                user_id: &uid,
                media: &req.media,
                media_type: req.media_type,
                caption: req.caption.as_deref().unwrap_or_default(),
            },
            Utc::now(),
        )?;
        story_view(db, row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(story)))
}

/// GET /stories/feed. Live stories from everyone the caller follows,
/// newest first.
pub async fn feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let stories = blocking(&state, "Error fetching stories", move |db| {
        let rows = db.feed_stories(&uid, Utc::now())?;
        story_views(db, rows)
    })
    .await?;

    Ok(Json(stories))
}

pub async fn my_stories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let stories = blocking(&state, "Error fetching stories", move |db| {
        let rows = db.stories_by(&uid, Utc::now())?;
        story_views(db, rows)
    })
    .await?;

    Ok(Json(stories))
}

pub async fn view_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    blocking(&state, "Error marking story as viewed", move |db| {
        db.mark_story_viewed(&story_id, &uid, Utc::now())
    })
    .await?;

    Ok(Json(StatusMessage::new("Story marked as viewed")))
}

/// DELETE /stories/{id}. Deactivates rather than removes; the reaper
/// deletes the row once it expires.
pub async fn delete_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    blocking(&state, "Error deleting story", move |db| {
        db.deactivate_story(&story_id, &uid, Utc::now())
    })
    .await?;

    Ok(Json(StatusMessage::new("Story deleted successfully")))
}
