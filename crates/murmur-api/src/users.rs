use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use murmur_db::StoreError;
use murmur_db::models::ProfileUpdate;
use murmur_types::api::{Claims, StatusMessage, UpdateProfileRequest, UserProfile};

use crate::auth::validate_username;
use crate::extract::AppJson;
use crate::views::{public_user, summary};
use crate::{ApiError, AppState, blocking};

/// Upper bound on search results.
const SEARCH_LIMIT: u32 = 10;

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = blocking(&state, "Error fetching user profile", move |db| {
        let user = db
            .get_user_by_id(&user_id)?
            .ok_or(StoreError::NotFound("User"))?;
        let followers = db.followers_of(&user_id)?;
        let following = db.following_of(&user_id)?;

        Ok(UserProfile {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            profile_picture: user.profile_picture,
            followers: followers.into_iter().map(summary).collect(),
            following: following.into_iter().map(summary).collect(),
            created_at: user.created_at,
        })
    })
    .await?;

    Ok(Json(profile))
}

/// PUT /users/profile. Absent or empty fields are left as they are.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(username) = req.username.as_deref().filter(|u| !u.is_empty()) {
        validate_username(username)?;
    }

    let uid = claims.sub.to_string();
    let row = blocking(&state, "Error updating profile", move |db| {
        db.update_profile(
            &uid,
            &ProfileUpdate {
                username: req.username.as_deref(),
                bio: req.bio.as_deref(),
                profile_picture: req.profile_picture.as_deref(),
            },
            chrono::Utc::now(),
        )
    })
    .await?;

    Ok(Json(public_user(row)))
}

pub async fn follow(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let target = target_id.clone();
    blocking(&state, "Error following user", move |db| {
        db.follow(&uid, &target, chrono::Utc::now())
    })
    .await?;

    info!("{} followed {}", claims.username, target_id);
    Ok(Json(StatusMessage::new("Successfully followed user")))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let target = target_id.clone();
    blocking(&state, "Error unfollowing user", move |db| {
        db.unfollow(&uid, &target)
    })
    .await?;

    info!("{} unfollowed {}", claims.username, target_id);
    Ok(Json(StatusMessage::new("Successfully unfollowed user")))
}

pub async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, "Error searching users", move |db| {
        db.search_users(&query, SEARCH_LIMIT)
    })
    .await?;

    Ok(Json(rows.into_iter().map(public_user).collect::<Vec<_>>()))
}
