//! Database row types. These map directly to SQLite rows and stay
//! distinct from the murmur-types wire models to keep the store layer
//! independent of the HTTP surface.

use chrono::{DateTime, Utc};
use murmur_types::models::{MediaKind, StoryMediaKind};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: String,
    pub profile_picture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// id/username/picture projection joined into other rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummaryRow {
    pub id: String,
    pub username: String,
    pub profile_picture: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender: UserSummaryRow,
    pub recipient: UserSummaryRow,
    pub content: String,
    pub media: Option<String>,
    pub media_type: Option<String>,
    pub reply_to: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ReadRow {
    pub message_id: String,
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

pub struct StoryRow {
    pub id: String,
    pub owner: UserSummaryRow,
    pub media: String,
    pub media_type: String,
    pub caption: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct ViewerRow {
    pub story_id: String,
    pub viewer: UserSummaryRow,
    pub viewed_at: DateTime<Utc>,
}

// -- Inserts --

pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Partial profile update. Empty strings are treated the same as `None`.
#[derive(Default)]
pub struct ProfileUpdate<'a> {
    pub username: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub profile_picture: Option<&'a str>,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub sender_id: &'a str,
    pub recipient_id: &'a str,
    pub content: &'a str,
    pub media: Option<&'a str>,
    pub media_type: Option<MediaKind>,
    pub reply_to: Option<&'a str>,
}

/// The oldest message of the page already seen. `id` separates messages
/// created in the same microsecond; without it every tie is skipped.
pub struct PageCursor<'a> {
    pub created_at: DateTime<Utc>,
    pub id: Option<&'a str>,
}

pub struct NewStory<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub media: &'a str,
    pub media_type: StoryMediaKind,
    pub caption: &'a str,
}
