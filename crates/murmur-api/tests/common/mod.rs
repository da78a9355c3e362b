//! Shared harness: the real router over an in-memory store, driven with
//! `oneshot` so no socket is bound.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use murmur_api::auth::create_token;
use murmur_api::{AppState, AppStateInner, routes};
use murmur_db::Database;
use murmur_db::models::NewUser;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: SECRET.to_string(),
        });
        Self {
            router: routes::router(state.clone()),
            state,
        }
    }

    /// Seeds a user straight into the store and mints a token for them,
    /// skipping the (slow) password hash.
    pub fn user(&self, username: &str) -> TestUser {
        let uid = Uuid::new_v4();
        let id = uid.to_string();
        let email = format!("{}@example.com", username);
        self.state
            .db
            .create_user(
                &NewUser {
                    id: &id,
                    username,
                    email: &email,
                    password_hash: "unused",
                },
                Utc::now(),
            )
            .unwrap();
        let token = create_token(SECRET, uid, username).unwrap();
        TestUser { id, token }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, path: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(&user.token), None).await
    }

    pub async fn post(&self, path: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(&user.token), Some(body)).await
    }

    pub async fn put(&self, path: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(&user.token), body).await
    }

    pub async fn delete(&self, path: &str, user: &TestUser) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, Some(&user.token), None).await
    }
}
