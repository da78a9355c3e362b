//! Turns store rows into wire responses, batch-loading the sub-entities
//! (receipts, reactions, reply targets, viewers) a page of rows needs.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::warn;

use murmur_db::Database;
use murmur_db::models::{MessageRow, StoryRow, UserRow, UserSummaryRow};
use murmur_types::api::{
    MessageResponse, PublicUser, Reaction, ReadReceipt, ReplyPreview, StoryResponse, StoryViewer,
    UserSummary,
};
use murmur_types::models::{MediaKind, StoryMediaKind};

pub(crate) fn summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: row.id,
        username: row.username,
        profile_picture: row.profile_picture,
    }
}

pub(crate) fn public_user(row: UserRow) -> PublicUser {
    PublicUser {
        id: row.id,
        username: row.username,
        email: row.email,
        bio: row.bio,
        profile_picture: row.profile_picture,
    }
}

fn media_kind(raw: Option<&str>, message_id: &str) -> Option<MediaKind> {
    raw.and_then(|s| {
        MediaKind::from_str(s)
            .map_err(|e| warn!("Corrupt media_type on message '{}': {}", message_id, e))
            .ok()
    })
}

pub(crate) fn message_views(
    db: &Database,
    rows: Vec<MessageRow>,
) -> murmur_db::Result<Vec<MessageResponse>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let reply_ids: Vec<String> = rows.iter().filter_map(|r| r.reply_to.clone()).collect();

    let mut reads: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
    for r in db.reads_for_messages(&ids)? {
        reads.entry(r.message_id).or_default().push(ReadReceipt {
            user: r.user_id,
            read_at: r.read_at,
        });
    }

    let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
    for r in db.reactions_for_messages(&ids)? {
        reactions.entry(r.message_id).or_default().push(Reaction {
            user: r.user_id,
            emoji: r.emoji,
        });
    }

    let replies: HashMap<String, ReplyPreview> = db
        .messages_by_ids(&reply_ids)?
        .into_iter()
        .map(|m| {
            let preview = ReplyPreview {
                media_type: media_kind(m.media_type.as_deref(), &m.id),
                id: m.id.clone(),
                sender: m.sender.id,
                content: m.content,
                media: m.media,
                is_deleted: m.is_deleted,
                created_at: m.created_at,
            };
            (m.id, preview)
        })
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| MessageResponse {
            media_type: media_kind(row.media_type.as_deref(), &row.id),
            reply_to: row.reply_to.as_ref().and_then(|id| replies.get(id).cloned()),
            read_by: reads.remove(&row.id).unwrap_or_default(),
            reactions: reactions.remove(&row.id).unwrap_or_default(),
            sender: summary(row.sender),
            recipient: summary(row.recipient),
            content: row.content,
            media: row.media,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
            id: row.id,
        })
        .collect())
}

pub(crate) fn message_view(db: &Database, row: MessageRow) -> murmur_db::Result<MessageResponse> {
    let mut views = message_views(db, vec![row])?;
    views
        .pop()
        .ok_or(murmur_db::StoreError::NotFound("Message"))
}

pub(crate) fn story_views(
    db: &Database,
    rows: Vec<StoryRow>,
) -> murmur_db::Result<Vec<StoryResponse>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut viewers: HashMap<String, Vec<StoryViewer>> = HashMap::new();
    for v in db.viewers_for_stories(&ids)? {
        viewers.entry(v.story_id).or_default().push(StoryViewer {
            user: summary(v.viewer),
            viewed_at: v.viewed_at,
        });
    }

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            // The schema CHECK constraint makes this unreachable short of
            // manual edits to the database file.
            let media_type = StoryMediaKind::from_str(&row.media_type)
                .map_err(|e| warn!("Skipping story '{}': {}", row.id, e))
                .ok()?;

            Some(StoryResponse {
                viewers: viewers.remove(&row.id).unwrap_or_default(),
                user: summary(row.owner),
                media: row.media,
                media_type,
                caption: row.caption,
                is_active: row.is_active,
                expires_at: row.expires_at,
                created_at: row.created_at,
                id: row.id,
            })
        })
        .collect())
}

pub(crate) fn story_view(db: &Database, row: StoryRow) -> murmur_db::Result<StoryResponse> {
    let mut views = story_views(db, vec![row])?;
    views.pop().ok_or(murmur_db::StoreError::NotFound("Story"))
}
