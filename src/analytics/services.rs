use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use super::{
    dto::{
        ActivityStat, CourseStats, ParticipationStat, StudentEngagement, ThreadAnalysis,
        ThreadEntry, TimelinePoint, TopicStat,
    },
    scope::{visible_course, visible_topic, CourseScope},
};
use crate::{
    db::{Course, EntryFact, StudentEnrollment, Topic},
    error::AppError,
    store::{DiscussionStore, EntryFilter},
};

/// Topic, activity and participation counts per course in scope.
pub async fn course_stats(
    store: &dyn DiscussionStore,
    scope: &CourseScope,
) -> Result<CourseStats, AppError> {
    let courses: Vec<Course> = store
        .list_courses()
        .await?
        .into_iter()
        .filter(|c| scope.contains(c.course_id))
        .collect();
    let topics = store.active_topics().await?;
    let entries = store.active_entries(&scope.entry_filter()).await?;
    Ok(aggregate_course_stats(&courses, &topics, &entries))
}

pub(crate) fn aggregate_course_stats(
    courses: &[Course],
    topics: &[Topic],
    entries: &[EntryFact],
) -> CourseStats {
    let mut topic_counts: HashMap<i64, usize> = HashMap::new();
    for topic in topics.iter().filter(|t| t.is_active()) {
        *topic_counts.entry(topic.course_id).or_default() += 1;
    }

    let mut post_counts: HashMap<i64, usize> = HashMap::new();
    let mut authors: HashMap<i64, HashSet<i64>> = HashMap::new();
    for entry in entries.iter().filter(|e| e.in_active_topic()) {
        *post_counts.entry(entry.course_id).or_default() += 1;
        if entry.by_registered_author() {
            authors
                .entry(entry.course_id)
                .or_default()
                .insert(entry.author_id);
        }
    }

    let mut stats = CourseStats {
        total_courses: courses.len(),
        topic_stats: Vec::new(),
        activity_stats: Vec::new(),
        participation_stats: Vec::new(),
    };
    let mut ordered: Vec<&Course> = courses.iter().collect();
    ordered.sort_by_key(|c| c.course_id);
    for course in ordered {
        if let Some(&topics) = topic_counts.get(&course.course_id) {
            stats.topic_stats.push(TopicStat {
                course: course.course_name.clone(),
                topics,
            });
        }
        if let Some(&posts) = post_counts.get(&course.course_id) {
            stats.activity_stats.push(ActivityStat {
                course: course.course_name.clone(),
                posts,
            });
        }
        if let Some(students) = authors.get(&course.course_id) {
            stats.participation_stats.push(ParticipationStat {
                course: course.course_name.clone(),
                active_students: students.len(),
            });
        }
    }
    stats
}

/// Posts per calendar day, optionally for a single course.
pub async fn discussion_timeline(
    store: &dyn DiscussionStore,
    scope: &CourseScope,
    course_id: Option<i64>,
) -> Result<Vec<TimelinePoint>, AppError> {
    let filter = match course_id {
        Some(id) => {
            let course = visible_course(store, scope, id).await?;
            EntryFilter::Courses(vec![course.course_id])
        }
        None => scope.entry_filter(),
    };
    let entries = store.active_entries(&filter).await?;
    Ok(bucket_by_day(&entries))
}

pub(crate) fn bucket_by_day(entries: &[EntryFact]) -> Vec<TimelinePoint> {
    let mut days: BTreeMap<time::Date, usize> = BTreeMap::new();
    for entry in entries {
        *days.entry(entry.entry_created_at.date()).or_default() += 1;
    }
    days.into_iter()
        .map(|(date, posts)| TimelinePoint { date, posts })
        .collect()
}

/// Ranks a course's actively enrolled students by engagement.
pub async fn student_engagement(
    store: &dyn DiscussionStore,
    scope: &CourseScope,
    course_id: i64,
) -> Result<Vec<StudentEngagement>, AppError> {
    let course = visible_course(store, scope, course_id).await?;
    let students = store.active_students(course.course_id).await?;
    let entries = store
        .active_entries(&EntryFilter::Courses(vec![course.course_id]))
        .await?;
    debug!(
        course_id,
        students = students.len(),
        entries = entries.len(),
        "ranking students"
    );
    Ok(rank_students(&students, &entries))
}

pub(crate) fn rank_students(
    students: &[StudentEnrollment],
    entries: &[EntryFact],
) -> Vec<StudentEngagement> {
    let mut by_author: HashMap<i64, (usize, BTreeSet<i64>)> = HashMap::new();
    for entry in entries {
        let (posts, topics) = by_author.entry(entry.author_id).or_default();
        *posts += 1;
        topics.insert(entry.topic_id);
    }

    let mut seen = HashSet::new();
    let mut ranking: Vec<StudentEngagement> = students
        .iter()
        .filter(|s| seen.insert(s.user_id))
        .map(|s| {
            let (posts, topics_participated) = by_author
                .get(&s.user_id)
                .map(|(posts, topics)| (*posts, topics.len()))
                .unwrap_or((0, 0));
            StudentEngagement {
                student_name: s.user_name.clone(),
                posts,
                topics_participated,
                engagement_score: engagement_score(posts, topics_participated),
            }
        })
        .collect();
    // Stable: equal scores keep enrollment order.
    ranking.sort_by(|a, b| b.engagement_score.cmp(&a.engagement_score));
    ranking
}

pub fn engagement_score(posts: usize, topics_participated: usize) -> usize {
    posts + 2 * topics_participated
}

/// Flat reply structure of one topic.
pub async fn thread_analysis(
    store: &dyn DiscussionStore,
    scope: &CourseScope,
    topic_id: i64,
) -> Result<ThreadAnalysis, AppError> {
    let topic = visible_topic(store, scope, topic_id).await?;
    let entries = store.active_entries(&EntryFilter::Topic(topic.topic_id)).await?;
    Ok(analyze_thread(&entries))
}

pub(crate) fn analyze_thread(entries: &[EntryFact]) -> ThreadAnalysis {
    let mut ordered: Vec<&EntryFact> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.entry_created_at, e.entry_id));

    let original_posts = ordered.iter().filter(|e| e.entry_parent_id.is_none()).count();
    let participants: HashSet<i64> = ordered.iter().map(|e| e.author_id).collect();

    ThreadAnalysis {
        total_posts: ordered.len(),
        original_posts,
        replies: ordered.len() - original_posts,
        participants: participants.len(),
        timeline: ordered
            .into_iter()
            .map(|e| ThreadEntry {
                entry_id: e.entry_id,
                created_at: e.entry_created_at,
                parent_id: e.entry_parent_id,
                author: e.author_name.clone(),
            })
            .collect(),
    }
}
