use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::Database;
use crate::models::NewUser;

pub(crate) fn db() -> Database {
    Database::open_in_memory().unwrap()
}

/// Fixed base instant plus `secs`, so tests control ordering exactly.
pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

pub(crate) fn user(db: &Database, username: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let email = format!("{}@example.com", username.to_lowercase());
    db.create_user(
        &NewUser {
            id: &id,
            username,
            email: &email,
            password_hash: "not-a-real-hash",
        },
        at(0),
    )
    .unwrap();
    id
}
