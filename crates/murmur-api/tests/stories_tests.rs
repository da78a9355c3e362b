mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use murmur_api::reaper;
use murmur_db::models::NewStory;
use murmur_types::models::StoryMediaKind;

use common::{TestApp, TestUser};

async fn post_story(app: &TestApp, user: &TestUser, media: &str) -> Value {
    let (status, body) = app
        .post(
            "/api/stories",
            user,
            json!({ "media": media, "mediaType": "image", "caption": "sunrise" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

fn seed_old_story(app: &TestApp, owner: &TestUser, id: &str, hours_ago: i64) {
    app.state
        .db
        .insert_story(
            &NewStory {
                id,
                user_id: &owner.id,
                media: "https://cdn/old.png",
                media_type: StoryMediaKind::Image,
                caption: "",
            },
            Utc::now() - Duration::hours(hours_ago),
        )
        .unwrap();
}

#[tokio::test]
async fn created_story_shows_in_my_stories() {
    let app = TestApp::new();
    let alice = app.user("alice");

    let story = post_story(&app, &alice, "https://cdn/a.png").await;
    assert_eq!(story["user"]["username"], "alice");
    assert_eq!(story["mediaType"], "image");
    assert_eq!(story["caption"], "sunrise");
    assert_eq!(story["isActive"], true);
    assert_eq!(story["viewers"], json!([]));

    let (status, body) = app.get("/api/stories/my-stories", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], story["id"]);
}

#[tokio::test]
async fn story_media_kind_is_checked() {
    let app = TestApp::new();
    let alice = app.user("alice");

    let (status, body) = app
        .post(
            "/api/stories",
            &alice,
            json!({ "media": "https://cdn/a.mp3", "mediaType": "audio" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("audio"));

    let (status, _) = app
        .post("/api/stories", &alice, json!({ "media": "", "mediaType": "video" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feed_only_has_followed_users() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let carol = app.user("carol");

    app.post(&format!("/api/users/{}/follow", bob.id), &alice, json!({}))
        .await;
    let first = post_story(&app, &bob, "https://cdn/b1.png").await;
    let second = post_story(&app, &bob, "https://cdn/b2.png").await;
    post_story(&app, &carol, "https://cdn/c.png").await;
    post_story(&app, &alice, "https://cdn/own.png").await;

    let (status, body) = app.get("/api/stories/feed", &alice).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = body.as_array().unwrap().iter().map(|s| s["id"].clone()).collect();
    assert_eq!(ids, [second["id"].clone(), first["id"].clone()]);

    let (_, body) = app.get("/api/stories/feed", &carol).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn viewing_twice_records_one_viewer() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let story = post_story(&app, &alice, "https://cdn/a.png").await;
    let path = format!("/api/stories/{}/view", story["id"].as_str().unwrap());

    for _ in 0..2 {
        let (status, body) = app.post(&path, &bob, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Story marked as viewed");
    }

    let (_, body) = app.get("/api/stories/my-stories", &alice).await;
    let viewers = body[0]["viewers"].as_array().unwrap();
    assert_eq!(viewers.len(), 1);
    assert_eq!(viewers[0]["user"]["id"], bob.id);

    let (status, _) = app.post("/api/stories/missing/view", &bob, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_owner_can_delete() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    let story = post_story(&app, &alice, "https://cdn/a.png").await;
    let path = format!("/api/stories/{}", story["id"].as_str().unwrap());

    let (status, body) = app.delete(&path, &bob).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized to delete this story");

    let (status, _) = app.delete("/api/stories/missing", &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&path, &alice).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/stories/my-stories", &alice).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn expired_stories_are_hidden_then_reaped() {
    let app = TestApp::new();
    let alice = app.user("alice");
    let bob = app.user("bob");
    app.post(&format!("/api/users/{}/follow", alice.id), &bob, json!({}))
        .await;

    seed_old_story(&app, &alice, "stale", 25);
    seed_old_story(&app, &alice, "fresh", 23);

    let (_, body) = app.get("/api/stories/feed", &bob).await;
    let ids: Vec<_> = body.as_array().unwrap().iter().map(|s| s["id"].clone()).collect();
    assert_eq!(ids, [json!("fresh")]);

    let removed = reaper::reap_expired(&app.state).await.unwrap();
    assert_eq!(removed, 1);
    assert!(app.state.db.get_story("stale").unwrap().is_none());
    assert!(app.state.db.get_story("fresh").unwrap().is_some());

    assert_eq!(reaper::reap_expired(&app.state).await.unwrap(), 0);
}
