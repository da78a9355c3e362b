use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::is_unique_violation;
use crate::models::{NewUser, ProfileUpdate, UserRow, UserSummaryRow};
use crate::{Database, Result, StoreError, time};

const USER_COLUMNS: &str =
    "id, username, email, password, bio, profile_picture, created_at, updated_at";

impl Database {
    pub fn create_user(&self, user: &NewUser<'_>, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            let ts = time::to_db(&now);
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![user.id, user.username, user.email, user.password_hash, ts],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("Username or email already taken")
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            Ok(conn.query_row(&sql, [username], user_row).optional()?)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Applies the non-empty fields of `update` and returns the stored row.
    pub fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate<'_>,
        now: DateTime<Utc>,
    ) -> Result<UserRow> {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_owned);
        let username = non_empty(update.username);
        let bio = non_empty(update.bio);
        let picture = non_empty(update.profile_picture);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx
                .execute(
                    "UPDATE users SET
                        username = COALESCE(?2, username),
                        bio = COALESCE(?3, bio),
                        profile_picture = COALESCE(?4, profile_picture),
                        updated_at = ?5
                     WHERE id = ?1",
                    params![id, username, bio, picture, time::to_db(&now)],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::Conflict("Username already taken")
                    } else {
                        e.into()
                    }
                })?;

            if changed == 0 {
                return Err(StoreError::NotFound("User"));
            }

            let row = query_user_by_id(&tx, id)?.ok_or(StoreError::NotFound("User"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    // -- Social graph --

    pub fn follow(&self, actor_id: &str, target_id: &str, now: DateTime<Utc>) -> Result<()> {
        if actor_id == target_id {
            return Err(StoreError::InvalidOperation("Cannot follow yourself"));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_user(&tx, actor_id)?;
            ensure_user(&tx, target_id)?;

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![actor_id, target_id, time::to_db(&now)],
            )?;
            if inserted == 0 {
                return Err(StoreError::Conflict("Already following this user"));
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Removes the edge if present. Unfollowing someone you don't follow
    /// succeeds without doing anything.
    pub fn unfollow(&self, actor_id: &str, target_id: &str) -> Result<()> {
        if actor_id == target_id {
            return Err(StoreError::InvalidOperation("Cannot unfollow yourself"));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_user(&tx, actor_id)?;
            ensure_user(&tx, target_id)?;

            tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                params![actor_id, target_id],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn followers_of(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.profile_picture
                 FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.followee_id = ?1
                 ORDER BY f.created_at, f.rowid",
            )?;
            let rows = stmt
                .query_map([user_id], |row| summary(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn following_of(&self, user_id: &str) -> Result<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.profile_picture
                 FROM follows f
                 JOIN users u ON u.id = f.followee_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at, f.rowid",
            )?;
            let rows = stmt
                .query_map([user_id], |row| summary(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Case-insensitive substring match on username or email.
    pub fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE instr(fold(username), ?1) > 0
                    OR instr(fold(email), ?1) > 0
                 ORDER BY created_at, rowid
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![query.to_lowercase(), limit], user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], user_row).optional()?)
}

pub(crate) fn ensure_user(conn: &Connection, id: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::NotFound("User"))
    }
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        bio: row.get(4)?,
        profile_picture: row.get(5)?,
        created_at: time::column(row, 6)?,
        updated_at: time::column(row, 7)?,
    })
}

/// Reads an `id, username, profile_picture` triple starting at `offset`.
pub(crate) fn summary(row: &Row<'_>, offset: usize) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        profile_picture: row.get(offset + 2)?,
    })
}
