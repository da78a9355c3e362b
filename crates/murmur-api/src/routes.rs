use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::middleware::require_auth;
use crate::{AppState, auth, messages, reactions, stories, users};

/// Builds the `/api` router. Transport layers (CORS, tracing) are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users/profile", put(users::update_profile))
        .route("/users/search/{query}", get(users::search))
        .route("/users/{id}", get(users::get_profile))
        .route("/users/{id}/follow", post(users::follow))
        .route("/users/{id}/unfollow", post(users::unfollow))
        .route("/messages", post(messages::send_message))
        .route("/messages/read/{id}", put(messages::mark_read))
        .route(
            "/messages/{id}",
            get(messages::get_conversation).delete(messages::delete_message),
        )
        .route("/messages/{id}/reactions", post(reactions::add_reaction))
        .route("/stories", post(stories::create_story))
        .route("/stories/feed", get(stories::feed))
        .route("/stories/my-stories", get(stories::my_stories))
        .route("/stories/{id}", delete(stories::delete_story))
        .route("/stories/{id}/view", post(stories::view_story))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
