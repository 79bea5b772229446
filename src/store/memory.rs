//! In-memory `DiscussionStore` used by unit tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{DiscussionStore, EntryFilter};
use crate::db::{
    Course, EntryFact, Login, StudentEnrollment, Topic, User, ENROLLMENT_STUDENT,
    ENROLLMENT_TEACHER, STATE_ACTIVE,
};

#[derive(Debug, Clone)]
pub struct EnrollmentRow {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub enrollment_type: String,
    pub enrollment_state: String,
}

#[derive(Debug, Clone)]
pub struct EntryRow {
    pub entry_id: i64,
    pub topic_id: i64,
    pub entry_state: String,
    pub entry_parent_id: Option<i64>,
    pub entry_posted_by_user_id: i64,
    pub entry_created_at: OffsetDateTime,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub users: Vec<User>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<EnrollmentRow>,
    pub topics: Vec<Topic>,
    pub entries: Vec<EntryRow>,
    pub logins: Vec<Login>,
    /// When set, every query fails as if the database were unreachable.
    pub unavailable: bool,
}

impl MemoryStore {
    pub fn user(mut self, user_id: i64, name: &str, state: &str) -> Self {
        self.users.push(User {
            user_id,
            user_name: name.into(),
            user_created_at: None,
            user_state: state.into(),
        });
        self
    }

    pub fn course(mut self, course_id: i64, name: &str) -> Self {
        self.courses.push(Course {
            course_id,
            semester: "2024S1".into(),
            course_code: format!("C{course_id}"),
            course_name: name.into(),
            course_created_at: None,
        });
        self
    }

    pub fn enroll(mut self, user_id: i64, course_id: i64, kind: &str, state: &str) -> Self {
        let id = self.enrollments.len() as i64 + 1;
        self.enrollments.push(EnrollmentRow {
            id,
            user_id,
            course_id,
            enrollment_type: kind.into(),
            enrollment_state: state.into(),
        });
        self
    }

    pub fn topic(mut self, topic_id: i64, course_id: i64, state: &str) -> Self {
        self.topics.push(Topic {
            topic_id,
            topic_title: format!("Topic {topic_id}"),
            topic_content: String::new(),
            topic_created_at: None,
            topic_state: state.into(),
            course_id,
            topic_posted_by_user_id: 0,
        });
        self
    }

    pub fn entry(
        mut self,
        entry_id: i64,
        topic_id: i64,
        author: i64,
        parent: Option<i64>,
        state: &str,
        created_at: OffsetDateTime,
    ) -> Self {
        self.entries.push(EntryRow {
            entry_id,
            topic_id,
            entry_state: state.into(),
            entry_parent_id: parent,
            entry_posted_by_user_id: author,
            entry_created_at: created_at,
        });
        self
    }

    pub fn login(mut self, user_id: i64, login_id: &str) -> Self {
        self.logins.push(Login {
            user_id,
            user_login_id: login_id.into(),
        });
        self
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.unavailable {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    fn facts(&self, filter: &EntryFilter) -> Vec<EntryFact> {
        let mut facts: Vec<EntryFact> = self
            .entries
            .iter()
            .filter(|e| e.entry_state == STATE_ACTIVE)
            .filter_map(|e| {
                let topic = self.topics.iter().find(|t| t.topic_id == e.topic_id)?;
                let author = self
                    .users
                    .iter()
                    .find(|u| u.user_id == e.entry_posted_by_user_id)?;
                Some(EntryFact {
                    entry_id: e.entry_id,
                    topic_id: e.topic_id,
                    course_id: topic.course_id,
                    topic_state: topic.topic_state.clone(),
                    entry_parent_id: e.entry_parent_id,
                    entry_created_at: e.entry_created_at,
                    author_id: author.user_id,
                    author_name: author.user_name.clone(),
                    author_state: author.user_state.clone(),
                })
            })
            .filter(|f| match filter {
                EntryFilter::All => true,
                EntryFilter::Courses(ids) => ids.contains(&f.course_id),
                EntryFilter::Topic(id) => f.topic_id == *id,
            })
            .collect();
        facts.sort_by_key(|f| (f.entry_created_at, f.entry_id));
        facts
    }
}

#[async_trait]
impl DiscussionStore for MemoryStore {
    async fn list_courses(&self) -> anyhow::Result<Vec<Course>> {
        self.check()?;
        let mut courses = self.courses.clone();
        courses.sort_by_key(|c| c.course_id);
        Ok(courses)
    }

    async fn find_course(&self, course_id: i64) -> anyhow::Result<Option<Course>> {
        self.check()?;
        Ok(self.courses.iter().find(|c| c.course_id == course_id).cloned())
    }

    async fn find_topic(&self, topic_id: i64) -> anyhow::Result<Option<Topic>> {
        self.check()?;
        Ok(self.topics.iter().find(|t| t.topic_id == topic_id).cloned())
    }

    async fn active_topics(&self) -> anyhow::Result<Vec<Topic>> {
        self.check()?;
        let mut topics: Vec<Topic> = self.topics.iter().filter(|t| t.is_active()).cloned().collect();
        topics.sort_by_key(|t| t.topic_id);
        Ok(topics)
    }

    async fn active_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<EntryFact>> {
        self.check()?;
        Ok(self.facts(filter))
    }

    async fn recent_entries(
        &self,
        filter: &EntryFilter,
        limit: i64,
    ) -> anyhow::Result<Vec<EntryFact>> {
        self.check()?;
        let mut facts = self.facts(filter);
        facts.reverse();
        facts.truncate(limit.max(0) as usize);
        Ok(facts)
    }

    async fn active_students(&self, course_id: i64) -> anyhow::Result<Vec<StudentEnrollment>> {
        self.check()?;
        let mut seen = BTreeSet::new();
        let mut rows = Vec::new();
        let mut enrollments = self.enrollments.clone();
        enrollments.sort_by_key(|e| e.id);
        for en in enrollments {
            if en.course_id != course_id
                || en.enrollment_type != ENROLLMENT_STUDENT
                || en.enrollment_state != STATE_ACTIVE
                || !seen.insert(en.user_id)
            {
                continue;
            }
            if let Some(user) = self.users.iter().find(|u| u.user_id == en.user_id) {
                rows.push(StudentEnrollment {
                    user_id: user.user_id,
                    user_name: user.user_name.clone(),
                });
            }
        }
        Ok(rows)
    }

    async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn find_login(&self, login_id: &str) -> anyhow::Result<Option<Login>> {
        self.check()?;
        Ok(self
            .logins
            .iter()
            .find(|l| l.user_login_id == login_id)
            .cloned())
    }

    async fn login_for_user(&self, user_id: i64) -> anyhow::Result<Option<Login>> {
        self.check()?;
        Ok(self.logins.iter().find(|l| l.user_id == user_id).cloned())
    }

    async fn has_teacher_enrollment(&self, user_id: i64) -> anyhow::Result<bool> {
        self.check()?;
        Ok(self
            .enrollments
            .iter()
            .any(|e| e.user_id == user_id && e.enrollment_type == ENROLLMENT_TEACHER))
    }

    async fn active_course_ids(&self, user_id: i64) -> anyhow::Result<Vec<i64>> {
        self.check()?;
        let ids: BTreeSet<i64> = self
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id && e.enrollment_state == STATE_ACTIVE)
            .map(|e| e.course_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}
