use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseStats {
    pub total_courses: usize,
    pub topic_stats: Vec<TopicStat>,
    pub activity_stats: Vec<ActivityStat>,
    pub participation_stats: Vec<ParticipationStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStat {
    pub course: String,
    pub topics: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityStat {
    pub course: String,
    pub posts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipationStat {
    pub course: String,
    pub active_students: usize,
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub course_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    #[serde(with = "calendar_date")]
    pub date: Date,
    pub posts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentEngagement {
    pub student_name: String,
    pub posts: usize,
    pub topics_participated: usize,
    pub engagement_score: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadAnalysis {
    pub total_posts: usize,
    pub original_posts: usize,
    pub replies: usize,
    pub participants: usize,
    pub timeline: Vec<ThreadEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadEntry {
    pub entry_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub parent_id: Option<i64>,
    pub author: String,
}
