use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};

use super::records::{
    CourseRecord, EnrollmentRecord, EntryRecord, LoginRecord, TopicRecord, UserRecord,
};
use crate::{
    auth::services::ADMIN_LOGIN_ID,
    db::{ENROLLMENT_TEACHER, STATE_ACTIVE},
};

pub const INSTRUCTOR_LOGIN_ID: &str = "instructor1";

const TABLES: [&str; 6] = ["users", "courses", "enrollment", "login", "topics", "entries"];

/// Rows written per table during one load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub users: usize,
    pub courses: usize,
    pub enrollments: usize,
    pub logins: usize,
    pub topics: usize,
    pub entries: usize,
}

async fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Option<Vec<T>> {
    let path: PathBuf = dir.join(format!("{name}.json"));
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "table export not readable; skipping");
            return None;
        }
    };
    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(rows) => {
            info!(table = name, rows = rows.len(), "read table export");
            Some(rows)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "table export malformed; skipping");
            None
        }
    }
}

/// Drops entries without a creation time and clears parent references that
/// point at an unknown entry or at an entry in another topic.
pub(crate) fn prepare_entries(
    records: Vec<EntryRecord>,
    existing: &HashMap<i64, i64>,
) -> Vec<EntryRecord> {
    let dated: Vec<EntryRecord> = records
        .into_iter()
        .filter(|r| {
            if r.entry_created_at.is_none() {
                warn!(entry_id = r.entry_id, "entry has no creation time; skipping");
                return false;
            }
            true
        })
        .collect();

    let mut topic_of = existing.clone();
    for r in &dated {
        topic_of.insert(r.entry_id, r.topic_id);
    }

    dated
        .into_iter()
        .map(|mut r| {
            if let Some(parent) = r.entry_parent_id {
                match topic_of.get(&parent) {
                    Some(&topic) if topic == r.topic_id && parent != r.entry_id => {}
                    other => {
                        warn!(
                            entry_id = r.entry_id,
                            parent_id = parent,
                            parent_topic = ?other,
                            "clearing invalid parent reference"
                        );
                        r.entry_parent_id = None;
                    }
                }
            }
            r
        })
        .collect()
}

/// Login ids handed to the first two active teachers; the admin login falls
/// back to the instructor when only one teacher exists.
pub(crate) fn test_account_logins(teacher_ids: &[i64]) -> Vec<(i64, &'static str)> {
    match teacher_ids {
        [] => Vec::new(),
        [only] => vec![(*only, INSTRUCTOR_LOGIN_ID), (*only, ADMIN_LOGIN_ID)],
        [first, second, ..] => vec![(*first, INSTRUCTOR_LOGIN_ID), (*second, ADMIN_LOGIN_ID)],
    }
}

/// Loads every table export found in `dir` in a single transaction.
#[instrument(skip(db))]
pub async fn load_dir(db: &PgPool, dir: &Path) -> anyhow::Result<LoadSummary> {
    let users: Option<Vec<UserRecord>> = read_table(dir, "users").await;
    let courses: Option<Vec<CourseRecord>> = read_table(dir, "courses").await;
    let enrollments: Option<Vec<EnrollmentRecord>> = read_table(dir, "enrollment").await;
    let logins: Option<Vec<LoginRecord>> = read_table(dir, "login").await;
    let topics: Option<Vec<TopicRecord>> = read_table(dir, "topics").await;
    let entries: Option<Vec<EntryRecord>> = read_table(dir, "entries").await;

    let mut tx = db.begin().await.context("begin ingest transaction")?;
    let mut summary = LoadSummary::default();

    for u in users.unwrap_or_default() {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, user_name, user_created_at, user_state)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET user_name = EXCLUDED.user_name,
                user_created_at = EXCLUDED.user_created_at,
                user_state = EXCLUDED.user_state
            "#,
        )
        .bind(u.user_id)
        .bind(&u.user_name)
        .bind(u.user_created_at)
        .bind(&u.user_state)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert user {}", u.user_id))?;
        summary.users += 1;
    }

    for c in courses.unwrap_or_default() {
        sqlx::query(
            r#"
            INSERT INTO courses (course_id, semester, course_code, course_name, course_created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (course_id) DO UPDATE
            SET semester = EXCLUDED.semester,
                course_code = EXCLUDED.course_code,
                course_name = EXCLUDED.course_name,
                course_created_at = EXCLUDED.course_created_at
            "#,
        )
        .bind(c.course_id)
        .bind(&c.semester)
        .bind(&c.course_code)
        .bind(&c.course_name)
        .bind(c.course_created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert course {}", c.course_id))?;
        summary.courses += 1;
    }

    for e in enrollments.unwrap_or_default() {
        sqlx::query(
            r#"
            INSERT INTO enrollment (user_id, course_id, enrollment_type, enrollment_state)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, course_id, enrollment_type) DO UPDATE
            SET enrollment_state = EXCLUDED.enrollment_state
            "#,
        )
        .bind(e.user_id)
        .bind(e.course_id)
        .bind(&e.enrollment_type)
        .bind(&e.enrollment_state)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert enrollment {}/{}", e.user_id, e.course_id))?;
        summary.enrollments += 1;
    }

    for l in logins.unwrap_or_default() {
        upsert_login(&mut tx, l.user_id, &l.user_login_id).await?;
        summary.logins += 1;
    }

    for t in topics.unwrap_or_default() {
        sqlx::query(
            r#"
            INSERT INTO topics (topic_id, topic_title, topic_content, topic_created_at,
                                topic_state, course_id, topic_posted_by_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (topic_id) DO UPDATE
            SET topic_title = EXCLUDED.topic_title,
                topic_content = EXCLUDED.topic_content,
                topic_created_at = EXCLUDED.topic_created_at,
                topic_state = EXCLUDED.topic_state,
                course_id = EXCLUDED.course_id,
                topic_posted_by_user_id = EXCLUDED.topic_posted_by_user_id
            "#,
        )
        .bind(t.topic_id)
        .bind(&t.topic_title)
        .bind(&t.topic_content)
        .bind(t.topic_created_at)
        .bind(&t.topic_state)
        .bind(t.course_id)
        .bind(t.topic_posted_by_user_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert topic {}", t.topic_id))?;
        summary.topics += 1;
    }

    if let Some(entries) = entries {
        let existing: HashMap<i64, i64> =
            sqlx::query_as::<_, (i64, i64)>("SELECT entry_id, topic_id FROM entries")
                .fetch_all(&mut *tx)
                .await
                .context("load existing entry topics")?
                .into_iter()
                .collect();

        for e in prepare_entries(entries, &existing) {
            sqlx::query(
                r#"
                INSERT INTO entries (entry_id, entry_content, entry_created_at, entry_state,
                                     entry_parent_id, entry_posted_by_user_id, topic_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (entry_id) DO UPDATE
                SET entry_content = EXCLUDED.entry_content,
                    entry_created_at = EXCLUDED.entry_created_at,
                    entry_state = EXCLUDED.entry_state,
                    entry_parent_id = EXCLUDED.entry_parent_id,
                    entry_posted_by_user_id = EXCLUDED.entry_posted_by_user_id,
                    topic_id = EXCLUDED.topic_id
                "#,
            )
            .bind(e.entry_id)
            .bind(&e.entry_content)
            .bind(e.entry_created_at)
            .bind(&e.entry_state)
            .bind(e.entry_parent_id)
            .bind(e.entry_posted_by_user_id)
            .bind(e.topic_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("upsert entry {}", e.entry_id))?;
            summary.entries += 1;
        }
    }

    provision_test_accounts(&mut tx).await?;

    tx.commit().await.context("commit ingest transaction")?;
    log_table_counts(db).await?;
    Ok(summary)
}

async fn upsert_login(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    login_id: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO login (user_id, user_login_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET user_login_id = EXCLUDED.user_login_id
        "#,
    )
    .bind(user_id)
    .bind(login_id)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("upsert login for user {user_id}"))?;
    Ok(())
}

async fn provision_test_accounts(tx: &mut Transaction<'_, Postgres>) -> anyhow::Result<()> {
    let teacher_ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT user_id
        FROM enrollment
        WHERE enrollment_type = $1 AND enrollment_state = $2
        ORDER BY id
        LIMIT 2
        "#,
    )
    .bind(ENROLLMENT_TEACHER)
    .bind(STATE_ACTIVE)
    .fetch_all(&mut **tx)
    .await
    .context("find teachers for test accounts")?;

    for (user_id, login_id) in test_account_logins(&teacher_ids) {
        // The login id is unique; take it away from whoever held it before.
        sqlx::query("DELETE FROM login WHERE user_login_id = $1 AND user_id <> $2")
            .bind(login_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .context("release test login id")?;
        upsert_login(tx, user_id, login_id).await?;
        info!(user_id, login_id, "test account ready");
    }
    Ok(())
}

async fn log_table_counts(db: &PgPool) -> anyhow::Result<()> {
    for table in TABLES {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db)
            .await
            .with_context(|| format!("count {table}"))?;
        info!(table, rows = count, "table loaded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn entry(id: i64, topic: i64, parent: Option<i64>) -> EntryRecord {
        EntryRecord {
            entry_id: id,
            entry_content: String::new(),
            entry_created_at: Some(datetime!(2024-01-01 12:00 UTC)),
            entry_state: "active".into(),
            entry_parent_id: parent,
            entry_posted_by_user_id: 1,
            topic_id: topic,
        }
    }

    #[test]
    fn keeps_parents_in_the_same_topic() {
        let existing = HashMap::from([(50, 5)]);
        let out = prepare_entries(
            vec![entry(1, 5, None), entry(2, 5, Some(1)), entry(3, 5, Some(50))],
            &existing,
        );
        let parents: Vec<Option<i64>> = out.iter().map(|e| e.entry_parent_id).collect();
        assert_eq!(parents, vec![None, Some(1), Some(50)]);
    }

    #[test]
    fn clears_dangling_cross_topic_and_self_parents() {
        let out = prepare_entries(
            vec![
                entry(1, 5, None),
                entry(2, 6, Some(1)),
                entry(3, 5, Some(999)),
                entry(4, 5, Some(4)),
            ],
            &HashMap::new(),
        );
        assert!(out.iter().all(|e| e.entry_parent_id.is_none()));
    }

    #[test]
    fn skips_entries_without_creation_time() {
        let mut undated = entry(9, 5, None);
        undated.entry_created_at = None;
        let out = prepare_entries(vec![entry(1, 5, None), undated], &HashMap::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry_id, 1);
    }

    #[test]
    fn replies_to_undated_entries_lose_their_parent() {
        let mut undated = entry(1, 5, None);
        undated.entry_created_at = None;
        let out = prepare_entries(vec![undated, entry(2, 5, Some(1))], &HashMap::new());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry_id, 2);
        assert_eq!(out[0].entry_parent_id, None);
    }

    #[test]
    fn undated_rows_do_not_mask_stored_parents() {
        let existing = HashMap::from([(1, 5)]);
        let mut undated = entry(1, 5, None);
        undated.entry_created_at = None;
        let out = prepare_entries(vec![undated, entry(2, 5, Some(1))], &existing);
        assert_eq!(out[0].entry_parent_id, Some(1));
    }

    #[test]
    fn test_accounts_for_one_or_two_teachers() {
        assert!(test_account_logins(&[]).is_empty());
        assert_eq!(
            test_account_logins(&[7]),
            vec![(7, "instructor1"), (7, "admin")]
        );
        assert_eq!(
            test_account_logins(&[7, 8]),
            vec![(7, "instructor1"), (8, "admin")]
        );
    }

    #[tokio::test]
    async fn missing_table_files_are_skipped() {
        let dir = std::env::temp_dir().join("lms-analytics-missing-tables");
        let rows: Option<Vec<UserRecord>> = read_table(&dir, "users").await;
        assert!(rows.is_none());
    }
}
