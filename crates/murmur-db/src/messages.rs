use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::models::{MessageRow, NewMessage, PageCursor, ReactionRow, ReadRow};
use crate::users::{ensure_user, summary};
use crate::{Database, Result, StoreError, placeholders, time};

// Sender and recipient summaries are joined in so a page of messages
// resolves in one query.
const MESSAGE_SELECT: &str = "
    SELECT m.id,
           s.id, s.username, s.profile_picture,
           r.id, r.username, r.profile_picture,
           m.content, m.media, m.media_type, m.reply_to, m.is_deleted,
           m.created_at, m.updated_at
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.recipient_id";

impl Database {
    pub fn insert_message(&self, msg: &NewMessage<'_>, now: DateTime<Utc>) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_user(&tx, msg.sender_id)?;
            ensure_user(&tx, msg.recipient_id)?;

            if let Some(reply_to) = msg.reply_to {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
                    [reply_to],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::NotFound("Reply target"));
                }
            }

            let ts = time::to_db(&now);
            tx.execute(
                "INSERT INTO messages
                    (id, sender_id, recipient_id, content, media, media_type, reply_to, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    msg.id,
                    msg.sender_id,
                    msg.recipient_id,
                    msg.content,
                    msg.media,
                    msg.media_type.map(|k| k.as_str()),
                    msg.reply_to,
                    ts,
                ],
            )?;

            let row = query_message(&tx, msg.id)?.ok_or(StoreError::NotFound("Message"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// The newest `limit` messages between two users in either direction,
    /// returned oldest first. `before` restricts the page to messages that
    /// sort strictly before the cursor.
    pub fn conversation(
        &self,
        user_a: &str,
        user_b: &str,
        limit: u32,
        before: Option<&PageCursor<'_>>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE ((m.sender_id = ?1 AND m.recipient_id = ?2)
                     OR (m.sender_id = ?2 AND m.recipient_id = ?1))
                   AND (?3 IS NULL
                        OR m.created_at < ?3
                        OR (m.created_at = ?3 AND m.id < ?4))
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?5"
            );
            let before_ts = before.map(|c| time::to_db(&c.created_at));
            let before_id = before.and_then(|c| c.id);

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(
                    params![user_a, user_b, before_ts, before_id, limit],
                    message_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.reverse();
            Ok(rows)
        })
    }

    /// Records a read receipt from `reader_id` on every message `sender_id`
    /// sent them that they haven't read yet. Returns how many were added.
    pub fn mark_read(&self, reader_id: &str, sender_id: &str, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let added = conn.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
                 SELECT id, ?1, ?3 FROM messages
                 WHERE sender_id = ?2 AND recipient_id = ?1
                 ORDER BY created_at, rowid",
                params![reader_id, sender_id, time::to_db(&now)],
            )?;
            Ok(added)
        })
    }

    /// Replaces any reaction `user_id` already left on the message. The new
    /// reaction goes to the end of the list.
    pub fn upsert_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = time::to_db(&now);

            let changed = tx.execute(
                "UPDATE messages SET updated_at = ?2 WHERE id = ?1",
                params![message_id, ts],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("Message"));
            }

            tx.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2",
                params![message_id, user_id],
            )?;
            tx.execute(
                "INSERT INTO message_reactions (message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, user_id, emoji, ts],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Flags the message as deleted. The row and its content are kept.
    pub fn soft_delete_message(
        &self,
        message_id: &str,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let sender: String = tx
                .query_row(
                    "SELECT sender_id FROM messages WHERE id = ?1",
                    [message_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound("Message"))?;

            if sender != actor_id {
                return Err(StoreError::Forbidden("delete this message"));
            }

            tx.execute(
                "UPDATE messages SET is_deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![message_id, time::to_db(&now)],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Batch-fetch messages by id, in no particular order.
    pub fn messages_by_ids(&self, ids: &[String]) -> Result<Vec<MessageRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.id IN ({})", placeholders(ids.len()));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids), message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch read receipts, in the order they were recorded.
    pub fn reads_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReadRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id, read_at FROM message_reads
                 WHERE message_id IN ({})
                 ORDER BY rowid",
                placeholders(message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(message_ids), |row| {
                    Ok(ReadRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        read_at: time::column(row, 2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch reactions, in the order they were left.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id, emoji, created_at FROM message_reactions
                 WHERE message_id IN ({})
                 ORDER BY rowid",
                placeholders(message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(message_ids), |row| {
                    Ok(ReactionRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        emoji: row.get(2)?,
                        created_at: time::column(row, 3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    Ok(conn.query_row(&sql, [id], message_row).optional()?)
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender: summary(row, 1)?,
        recipient: summary(row, 4)?,
        content: row.get(7)?,
        media: row.get(8)?,
        media_type: row.get(9)?,
        reply_to: row.get(10)?,
        is_deleted: row.get(11)?,
        created_at: time::column(row, 12)?,
        updated_at: time::column(row, 13)?,
    })
}
