use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CourseStats, StudentEngagement, ThreadAnalysis, TimelinePoint, TimelineQuery},
    services,
};
use crate::{
    auth::{services::course_scope, CurrentUser},
    error::AppError,
    state::AppState,
};

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/course-stats", get(course_stats))
        .route("/analytics/discussion-timeline", get(discussion_timeline))
        .route(
            "/analytics/student-engagement/:course_id",
            get(student_engagement),
        )
        .route("/analytics/thread-analysis/:topic_id", get(thread_analysis))
}

#[instrument(skip(state, current), fields(user_id = current.user.user_id))]
pub async fn course_stats(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<CourseStats>, AppError> {
    let store = state.store.as_ref();
    let scope = course_scope(store, &current).await?;
    let stats = services::course_stats(store, &scope).await?;
    info!(total_courses = stats.total_courses, "course stats");
    Ok(Json(stats))
}

#[instrument(skip(state, current), fields(user_id = current.user.user_id))]
pub async fn discussion_timeline(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(q): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelinePoint>>, AppError> {
    let store = state.store.as_ref();
    let scope = course_scope(store, &current).await?;
    let timeline = services::discussion_timeline(store, &scope, q.course_id).await?;
    Ok(Json(timeline))
}

#[instrument(skip(state, current), fields(user_id = current.user.user_id))]
pub async fn student_engagement(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(course_id): Path<i64>,
) -> Result<Json<Vec<StudentEngagement>>, AppError> {
    let store = state.store.as_ref();
    let scope = course_scope(store, &current).await?;
    let ranking = services::student_engagement(store, &scope, course_id).await?;
    info!(course_id, students = ranking.len(), "student engagement");
    Ok(Json(ranking))
}

#[instrument(skip(state, current), fields(user_id = current.user.user_id))]
pub async fn thread_analysis(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(topic_id): Path<i64>,
) -> Result<Json<ThreadAnalysis>, AppError> {
    let store = state.store.as_ref();
    let scope = course_scope(store, &current).await?;
    let thread = services::thread_analysis(store, &scope, topic_id).await?;
    Ok(Json(thread))
}
