use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                bio             TEXT NOT NULL DEFAULT '',
                profile_picture TEXT NOT NULL DEFAULT '',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            -- One row per edge: both the follower's `following` and the
            -- followee's `followers` are read from here.
            CREATE TABLE follows (
                follower_id TEXT NOT NULL REFERENCES users(id),
                followee_id TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            );

            CREATE INDEX idx_follows_followee ON follows(followee_id);

            CREATE TABLE messages (
                id           TEXT PRIMARY KEY,
                sender_id    TEXT NOT NULL REFERENCES users(id),
                recipient_id TEXT NOT NULL REFERENCES users(id),
                content      TEXT NOT NULL DEFAULT '',
                media        TEXT,
                media_type   TEXT,
                reply_to     TEXT REFERENCES messages(id),
                is_deleted   INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_messages_pair
                ON messages(sender_id, recipient_id, created_at);

            CREATE TABLE message_reads (
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id    TEXT NOT NULL REFERENCES users(id),
                read_at    TEXT NOT NULL,
                UNIQUE(message_id, user_id)
            );

            CREATE TABLE message_reactions (
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id    TEXT NOT NULL REFERENCES users(id),
                emoji      TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(message_id, user_id)
            );

            CREATE TABLE stories (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL REFERENCES users(id),
                media      TEXT NOT NULL,
                media_type TEXT NOT NULL CHECK (media_type IN ('image', 'video')),
                caption    TEXT NOT NULL DEFAULT '',
                is_active  INTEGER NOT NULL DEFAULT 1,
                expires_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX idx_stories_user ON stories(user_id, created_at);
            CREATE INDEX idx_stories_expiry ON stories(expires_at);

            CREATE TABLE story_viewers (
                story_id  TEXT NOT NULL REFERENCES stories(id) ON DELETE CASCADE,
                user_id   TEXT NOT NULL REFERENCES users(id),
                viewed_at TEXT NOT NULL,
                UNIQUE(story_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
