use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;

pub const STATE_ACTIVE: &str = "active";
pub const STATE_REGISTERED: &str = "registered";
pub const ENROLLMENT_STUDENT: &str = "student";
pub const ENROLLMENT_TEACHER: &str = "teacher";

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub user_created_at: Option<OffsetDateTime>,
    pub user_state: String,
}

impl User {
    pub fn is_registered(&self) -> bool {
        self.user_state == STATE_REGISTERED
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub course_id: i64,
    pub semester: String,
    pub course_code: String,
    pub course_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub course_created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub topic_id: i64,
    pub topic_title: String,
    pub topic_content: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub topic_created_at: Option<OffsetDateTime>,
    pub topic_state: String,
    pub course_id: i64,
    pub topic_posted_by_user_id: i64,
}

impl Topic {
    pub fn is_active(&self) -> bool {
        self.topic_state == STATE_ACTIVE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Login {
    pub user_id: i64,
    pub user_login_id: String,
}

/// An active entry joined with its topic and author.
#[derive(Debug, Clone, FromRow)]
pub struct EntryFact {
    pub entry_id: i64,
    pub topic_id: i64,
    pub course_id: i64,
    pub topic_state: String,
    pub entry_parent_id: Option<i64>,
    pub entry_created_at: OffsetDateTime,
    pub author_id: i64,
    pub author_name: String,
    pub author_state: String,
}

impl EntryFact {
    pub fn in_active_topic(&self) -> bool {
        self.topic_state == STATE_ACTIVE
    }

    pub fn by_registered_author(&self) -> bool {
        self.author_state == STATE_REGISTERED
    }
}

/// A user holding an active student enrollment.
#[derive(Debug, Clone, FromRow)]
pub struct StudentEnrollment {
    pub user_id: i64,
    pub user_name: String,
}
