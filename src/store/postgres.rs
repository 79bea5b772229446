use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgArguments, query::QueryAs, PgPool, Postgres};

use super::{DiscussionStore, EntryFilter};
use crate::db::{
    Course, EntryFact, Login, StudentEnrollment, Topic, User, ENROLLMENT_STUDENT,
    ENROLLMENT_TEACHER, STATE_ACTIVE,
};

const ENTRY_FACT_SELECT: &str = r#"
    SELECT e.entry_id, e.topic_id, t.course_id, t.topic_state, e.entry_parent_id,
           e.entry_created_at, u.user_id AS author_id, u.user_name AS author_name,
           u.user_state AS author_state
    FROM entries e
    JOIN topics t ON t.topic_id = e.topic_id
    JOIN users u ON u.user_id = e.entry_posted_by_user_id
    WHERE e.entry_state = $1
"#;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn filter_clause(filter: &EntryFilter) -> &'static str {
    match filter {
        EntryFilter::All => "",
        EntryFilter::Courses(_) => " AND t.course_id = ANY($2)",
        EntryFilter::Topic(_) => " AND e.topic_id = $2",
    }
}

fn bind_filter<'q>(
    query: QueryAs<'q, Postgres, EntryFact, PgArguments>,
    filter: &'q EntryFilter,
) -> QueryAs<'q, Postgres, EntryFact, PgArguments> {
    let query = query.bind(STATE_ACTIVE);
    match filter {
        EntryFilter::All => query,
        EntryFilter::Courses(ids) => query.bind(ids.as_slice()),
        EntryFilter::Topic(id) => query.bind(*id),
    }
}

#[async_trait]
impl DiscussionStore for PgStore {
    async fn list_courses(&self) -> anyhow::Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, Course>(
            r#"
            SELECT course_id, semester, course_code, course_name, course_created_at
            FROM courses
            ORDER BY course_id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list courses")?;
        Ok(rows)
    }

    async fn find_course(&self, course_id: i64) -> anyhow::Result<Option<Course>> {
        let row = sqlx::query_as::<_, Course>(
            r#"
            SELECT course_id, semester, course_code, course_name, course_created_at
            FROM courses
            WHERE course_id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.db)
        .await
        .context("find course")?;
        Ok(row)
    }

    async fn find_topic(&self, topic_id: i64) -> anyhow::Result<Option<Topic>> {
        let row = sqlx::query_as::<_, Topic>(
            r#"
            SELECT topic_id, topic_title, topic_content, topic_created_at, topic_state,
                   course_id, topic_posted_by_user_id
            FROM topics
            WHERE topic_id = $1
            "#,
        )
        .bind(topic_id)
        .fetch_optional(&self.db)
        .await
        .context("find topic")?;
        Ok(row)
    }

    async fn active_topics(&self) -> anyhow::Result<Vec<Topic>> {
        let rows = sqlx::query_as::<_, Topic>(
            r#"
            SELECT topic_id, topic_title, topic_content, topic_created_at, topic_state,
                   course_id, topic_posted_by_user_id
            FROM topics
            WHERE topic_state = $1
            ORDER BY topic_id
            "#,
        )
        .bind(STATE_ACTIVE)
        .fetch_all(&self.db)
        .await
        .context("list active topics")?;
        Ok(rows)
    }

    async fn active_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<EntryFact>> {
        let sql = format!(
            "{ENTRY_FACT_SELECT}{} ORDER BY e.entry_created_at, e.entry_id",
            filter_clause(filter)
        );
        let rows = bind_filter(sqlx::query_as::<_, EntryFact>(&sql), filter)
            .fetch_all(&self.db)
            .await
            .context("list active entries")?;
        Ok(rows)
    }

    async fn recent_entries(
        &self,
        filter: &EntryFilter,
        limit: i64,
    ) -> anyhow::Result<Vec<EntryFact>> {
        let limit_param = match filter {
            EntryFilter::All => "$2",
            _ => "$3",
        };
        let sql = format!(
            "{ENTRY_FACT_SELECT}{} ORDER BY e.entry_created_at DESC, e.entry_id DESC LIMIT {limit_param}",
            filter_clause(filter)
        );
        let rows = bind_filter(sqlx::query_as::<_, EntryFact>(&sql), filter)
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .context("list recent entries")?;
        Ok(rows)
    }

    async fn active_students(&self, course_id: i64) -> anyhow::Result<Vec<StudentEnrollment>> {
        let rows = sqlx::query_as::<_, StudentEnrollment>(
            r#"
            SELECT u.user_id, u.user_name
            FROM enrollment en
            JOIN users u ON u.user_id = en.user_id
            WHERE en.course_id = $1
              AND en.enrollment_type = $2
              AND en.enrollment_state = $3
            GROUP BY u.user_id, u.user_name
            ORDER BY MIN(en.id)
            "#,
        )
        .bind(course_id)
        .bind(ENROLLMENT_STUDENT)
        .bind(STATE_ACTIVE)
        .fetch_all(&self.db)
        .await
        .context("list active students")?;
        Ok(rows)
    }

    async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, user_name, user_created_at, user_state
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find user")?;
        Ok(row)
    }

    async fn find_login(&self, login_id: &str) -> anyhow::Result<Option<Login>> {
        let row = sqlx::query_as::<_, Login>(
            r#"SELECT user_id, user_login_id FROM login WHERE user_login_id = $1"#,
        )
        .bind(login_id)
        .fetch_optional(&self.db)
        .await
        .context("find login")?;
        Ok(row)
    }

    async fn login_for_user(&self, user_id: i64) -> anyhow::Result<Option<Login>> {
        let row = sqlx::query_as::<_, Login>(
            r#"SELECT user_id, user_login_id FROM login WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find login for user")?;
        Ok(row)
    }

    async fn has_teacher_enrollment(&self, user_id: i64) -> anyhow::Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM enrollment WHERE user_id = $1 AND enrollment_type = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(ENROLLMENT_TEACHER)
        .fetch_one(&self.db)
        .await
        .context("check teacher enrollment")?;
        Ok(exists)
    }

    async fn active_course_ids(&self, user_id: i64) -> anyhow::Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT course_id
            FROM enrollment
            WHERE user_id = $1 AND enrollment_state = $2
            ORDER BY course_id
            "#,
        )
        .bind(user_id)
        .bind(STATE_ACTIVE)
        .fetch_all(&self.db)
        .await
        .context("list enrolled course ids")?;
        Ok(ids)
    }
}
