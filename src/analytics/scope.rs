use std::collections::BTreeSet;

use crate::{
    db::{Course, Topic},
    error::AppError,
    store::{DiscussionStore, EntryFilter},
};

/// The set of courses a caller may see analytics for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseScope {
    /// Administrators see every course.
    All,
    /// Everyone else sees the courses they are actively enrolled in.
    Enrolled(BTreeSet<i64>),
}

impl CourseScope {
    pub fn contains(&self, course_id: i64) -> bool {
        match self {
            CourseScope::All => true,
            CourseScope::Enrolled(ids) => ids.contains(&course_id),
        }
    }

    pub fn entry_filter(&self) -> EntryFilter {
        match self {
            CourseScope::All => EntryFilter::All,
            CourseScope::Enrolled(ids) => EntryFilter::Courses(ids.iter().copied().collect()),
        }
    }
}

/// Loads a course the caller is allowed to see.
pub async fn visible_course(
    store: &dyn DiscussionStore,
    scope: &CourseScope,
    course_id: i64,
) -> Result<Course, AppError> {
    let course = store
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course {course_id} not found")))?;
    if !scope.contains(course.course_id) {
        return Err(AppError::Forbidden(format!(
            "Not enrolled in course {course_id}"
        )));
    }
    Ok(course)
}

/// Loads a topic whose course the caller is allowed to see.
pub async fn visible_topic(
    store: &dyn DiscussionStore,
    scope: &CourseScope,
    topic_id: i64,
) -> Result<Topic, AppError> {
    let topic = store
        .find_topic(topic_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Topic {topic_id} not found")))?;
    if !scope.contains(topic.course_id) {
        return Err(AppError::Forbidden(format!(
            "Not enrolled in the course of topic {topic_id}"
        )));
    }
    Ok(topic)
}
