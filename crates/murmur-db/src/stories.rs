use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::models::{NewStory, StoryRow, ViewerRow};
use crate::users::{ensure_user, summary};
use crate::{Database, Result, StoreError, placeholders, time};

/// How long a story stays visible after it is posted.
pub const STORY_TTL_HOURS: i64 = 24;

const STORY_SELECT: &str = "
    SELECT s.id,
           u.id, u.username, u.profile_picture,
           s.media, s.media_type, s.caption, s.is_active, s.expires_at, s.created_at
    FROM stories s
    JOIN users u ON u.id = s.user_id";

// Visible stories: not deleted by the owner and not yet past expiry.
const LIVE: &str = "s.is_active = 1 AND s.expires_at > ?2";

impl Database {
    pub fn insert_story(&self, story: &NewStory<'_>, now: DateTime<Utc>) -> Result<StoryRow> {
        let expires_at = now + Duration::hours(STORY_TTL_HOURS);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_user(&tx, story.user_id)?;

            let ts = time::to_db(&now);
            tx.execute(
                "INSERT INTO stories
                    (id, user_id, media, media_type, caption, is_active, expires_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
                params![
                    story.id,
                    story.user_id,
                    story.media,
                    story.media_type.as_str(),
                    story.caption,
                    time::to_db(&expires_at),
                    ts,
                ],
            )?;

            let row = query_story(&tx, story.id)?.ok_or(StoreError::NotFound("Story"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_story(&self, id: &str) -> Result<Option<StoryRow>> {
        self.with_conn(|conn| query_story(conn, id))
    }

    /// The caller's own live stories, newest first.
    pub fn stories_by(&self, owner_id: &str, now: DateTime<Utc>) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{STORY_SELECT}
                 WHERE s.user_id = ?1 AND {LIVE}
                 ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![owner_id, time::to_db(&now)], story_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Live stories by everyone `viewer_id` follows, newest first.
    pub fn feed_stories(&self, viewer_id: &str, now: DateTime<Utc>) -> Result<Vec<StoryRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{STORY_SELECT}
                 JOIN follows f ON f.followee_id = s.user_id
                 WHERE f.follower_id = ?1 AND {LIVE}
                 ORDER BY s.created_at DESC, s.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![viewer_id, time::to_db(&now)], story_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Records the first view of a story by `viewer_id`. Returns whether a
    /// new viewer entry was added.
    pub fn mark_story_viewed(
        &self,
        story_id: &str,
        viewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM stories WHERE id = ?1)",
                [story_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound("Story"));
            }
            ensure_user(&tx, viewer_id)?;

            let ts = time::to_db(&now);
            let added = tx.execute(
                "INSERT OR IGNORE INTO story_viewers (story_id, user_id, viewed_at)
                 VALUES (?1, ?2, ?3)",
                params![story_id, viewer_id, ts],
            )?;
            if added > 0 {
                tx.execute(
                    "UPDATE stories SET updated_at = ?2 WHERE id = ?1",
                    params![story_id, ts],
                )?;
            }

            tx.commit()?;
            Ok(added > 0)
        })
    }

    /// Hides the story from every active query. The reaper still removes
    /// it once it expires.
    pub fn deactivate_story(&self, story_id: &str, actor_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owner: String = tx
                .query_row(
                    "SELECT user_id FROM stories WHERE id = ?1",
                    [story_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound("Story"))?;

            if owner != actor_id {
                return Err(StoreError::Forbidden("delete this story"));
            }

            tx.execute(
                "UPDATE stories SET is_active = 0, updated_at = ?2 WHERE id = ?1",
                params![story_id, time::to_db(&now)],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Batch-fetch viewers with their summaries, in viewing order.
    pub fn viewers_for_stories(&self, story_ids: &[String]) -> Result<Vec<ViewerRow>> {
        if story_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT v.story_id, u.id, u.username, u.profile_picture, v.viewed_at
                 FROM story_viewers v
                 JOIN users u ON u.id = v.user_id
                 WHERE v.story_id IN ({})
                 ORDER BY v.rowid",
                placeholders(story_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(story_ids), |row| {
                    Ok(ViewerRow {
                        story_id: row.get(0)?,
                        viewer: summary(row, 1)?,
                        viewed_at: time::column(row, 4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Physically deletes every story whose expiry has passed, viewers
    /// included. Returns the number of stories removed.
    pub fn reap_expired_stories(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM stories WHERE expires_at <= ?1",
                [time::to_db(&now)],
            )?;
            Ok(removed)
        })
    }
}

fn query_story(conn: &Connection, id: &str) -> Result<Option<StoryRow>> {
    let sql = format!("{STORY_SELECT} WHERE s.id = ?1");
    Ok(conn.query_row(&sql, [id], story_row).optional()?)
}

fn story_row(row: &Row<'_>) -> rusqlite::Result<StoryRow> {
    Ok(StoryRow {
        id: row.get(0)?,
        owner: summary(row, 1)?,
        media: row.get(4)?,
        media_type: row.get(5)?,
        caption: row.get(6)?,
        is_active: row.get(7)?,
        expires_at: time::column(row, 8)?,
        created_at: time::column(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use murmur_types::models::StoryMediaKind;
    use uuid::Uuid;

    use super::STORY_TTL_HOURS;
    use crate::models::NewStory;
    use crate::test_support::{at, db, user};
    use crate::{Database, StoreError};

    fn post(db: &Database, owner: &str, secs: i64) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_story(
            &NewStory {
                id: &id,
                user_id: owner,
                media: "https://cdn.example.com/beach.jpg",
                media_type: StoryMediaKind::Image,
                caption: "",
            },
            at(secs),
        )
        .unwrap();
        id
    }

    fn ids(db: &Database, owner: &str, now_secs: i64) -> Vec<String> {
        db.stories_by(owner, at(now_secs))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect()
    }

    fn feed(db: &Database, viewer: &str, now_secs: i64) -> Vec<String> {
        db.feed_stories(viewer, at(now_secs))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect()
    }

    #[test]
    fn new_story_expires_after_a_day() {
        let db = db();
        let a = user(&db, "alice");
        let id = post(&db, &a, 0);

        let story = db.get_story(&id).unwrap().unwrap();
        assert!(story.is_active);
        assert_eq!(story.expires_at, at(0) + Duration::hours(STORY_TTL_HOURS));
        assert_eq!(story.owner.username, "alice");
        assert_eq!(story.media_type, "image");
    }

    #[test]
    fn feed_is_newest_first_and_scoped_to_followed_users() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let c = user(&db, "carol");
        let viewer = user(&db, "dave");

        assert!(feed(&db, &viewer, 120).is_empty());

        db.follow(&viewer, &a, at(0)).unwrap();
        db.follow(&viewer, &b, at(0)).unwrap();
        let old = post(&db, &a, 0);
        let new = post(&db, &b, 60);
        post(&db, &c, 30);
        post(&db, &viewer, 90);

        assert_eq!(feed(&db, &viewer, 120), vec![new.clone(), old]);

        db.unfollow(&viewer, &a).unwrap();
        assert_eq!(feed(&db, &viewer, 120), vec![new]);
    }

    #[test]
    fn feed_handles_a_large_following_list() {
        let db = db();
        let viewer = user(&db, "viewer");
        let mut last = String::new();
        for i in 0..1200 {
            last = user(&db, &format!("author{i}"));
            db.follow(&viewer, &last, at(0)).unwrap();
        }
        let story = post(&db, &last, 10);

        assert_eq!(feed(&db, &viewer, 20), vec![story]);
    }

    #[test]
    fn expired_story_is_hidden_even_while_active() {
        let db = db();
        let a = user(&db, "alice");
        let id = post(&db, &a, 0);

        let day = STORY_TTL_HOURS * 3600;
        assert_eq!(ids(&db, &a, day - 1), vec![id.clone()]);
        assert!(ids(&db, &a, day).is_empty());
        assert!(db.get_story(&id).unwrap().unwrap().is_active);
    }

    #[test]
    fn mark_viewed_is_idempotent() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let id = post(&db, &a, 0);

        assert!(db.mark_story_viewed(&id, &b, at(5)).unwrap());
        assert!(!db.mark_story_viewed(&id, &b, at(9)).unwrap());

        let viewers = db.viewers_for_stories(&[id.clone()]).unwrap();
        assert_eq!(viewers.len(), 1);
        assert_eq!(viewers[0].viewer.id, b);
        assert_eq!(viewers[0].viewed_at, at(5));

        assert!(matches!(
            db.mark_story_viewed("missing", &b, at(5)),
            Err(StoreError::NotFound("Story"))
        ));
    }

    #[test]
    fn only_owner_can_deactivate() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");
        let id = post(&db, &a, 0);

        assert!(matches!(
            db.deactivate_story(&id, &b, at(1)),
            Err(StoreError::Forbidden(_))
        ));
        assert!(matches!(
            db.deactivate_story("missing", &a, at(1)),
            Err(StoreError::NotFound(_))
        ));

        db.deactivate_story(&id, &a, at(1)).unwrap();
        assert!(ids(&db, &a, 2).is_empty());
        assert!(!db.get_story(&id).unwrap().unwrap().is_active);
    }

    #[test]
    fn reaper_removes_only_expired_stories() {
        let db = db();
        let a = user(&db, "alice");
        let b = user(&db, "bob");

        let expired = post(&db, &a, 0);
        let live = post(&db, &a, 3600);
        db.mark_story_viewed(&expired, &b, at(10)).unwrap();

        let day = STORY_TTL_HOURS * 3600;
        assert_eq!(db.reap_expired_stories(at(day + 1)).unwrap(), 1);

        assert!(db.get_story(&expired).unwrap().is_none());
        assert!(db.get_story(&live).unwrap().is_some());
        assert!(db.viewers_for_stories(&[expired]).unwrap().is_empty());

        assert_eq!(db.reap_expired_stories(at(day + 1)).unwrap(), 0);
    }
}
