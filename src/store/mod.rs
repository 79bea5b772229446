use async_trait::async_trait;

use crate::db::{Course, EntryFact, Login, StudentEnrollment, Topic, User};

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

/// Which active entries to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryFilter {
    All,
    Courses(Vec<i64>),
    Topic(i64),
}

/// Read-only queries the analytics and auth layers run against the store.
///
/// Entry queries only ever return entries whose state is `active`; the topic
/// state is carried on each row so callers can decide whether it matters.
#[async_trait]
pub trait DiscussionStore: Send + Sync {
    /// All courses ordered by id.
    async fn list_courses(&self) -> anyhow::Result<Vec<Course>>;
    async fn find_course(&self, course_id: i64) -> anyhow::Result<Option<Course>>;
    async fn find_topic(&self, topic_id: i64) -> anyhow::Result<Option<Topic>>;
    /// Active topics ordered by id.
    async fn active_topics(&self) -> anyhow::Result<Vec<Topic>>;
    /// Active entries ordered by creation time, then id.
    async fn active_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<EntryFact>>;
    /// The newest active entries, newest first.
    async fn recent_entries(&self, filter: &EntryFilter, limit: i64)
        -> anyhow::Result<Vec<EntryFact>>;
    /// One row per user with an active student enrollment, in enrollment order.
    async fn active_students(&self, course_id: i64) -> anyhow::Result<Vec<StudentEnrollment>>;

    async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<User>>;
    async fn find_login(&self, login_id: &str) -> anyhow::Result<Option<Login>>;
    async fn login_for_user(&self, user_id: i64) -> anyhow::Result<Option<Login>>;
    async fn has_teacher_enrollment(&self, user_id: i64) -> anyhow::Result<bool>;
    /// Ids of courses the user is actively enrolled in, ascending.
    async fn active_course_ids(&self, user_id: i64) -> anyhow::Result<Vec<i64>>;
}
