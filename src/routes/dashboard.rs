use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{dto::PublicUser, services::course_scope, CurrentUser},
    db::Course,
    error::AppError,
    state::AppState,
};

const RECENT_ENTRIES: i64 = 10;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: PublicUser,
    pub courses: Vec<Course>,
    pub recent_entries: Vec<RecentEntry>,
}

#[derive(Debug, Serialize)]
pub struct RecentEntry {
    pub entry_id: i64,
    pub topic_id: i64,
    pub course_id: i64,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

/// Courses the caller can see plus the latest activity across them.
#[instrument(skip(state, current), fields(user_id = current.user.user_id))]
pub async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let store = state.store.as_ref();
    let scope = course_scope(store, &current).await?;

    let courses = store
        .list_courses()
        .await?
        .into_iter()
        .filter(|c| scope.contains(c.course_id))
        .collect();
    let recent_entries = store
        .recent_entries(&scope.entry_filter(), RECENT_ENTRIES)
        .await?
        .into_iter()
        .map(|e| RecentEntry {
            entry_id: e.entry_id,
            topic_id: e.topic_id,
            course_id: e.course_id,
            author: e.author_name,
            created_at: e.entry_created_at,
        })
        .collect();

    Ok(Json(DashboardResponse {
        user: current.public(),
        courses,
        recent_entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::services::resolve_current_user, store::memory::MemoryStore};
    use std::sync::Arc;
    use time::{macros::datetime, Duration};

    #[tokio::test]
    async fn dashboard_lists_visible_courses_and_latest_entries() {
        let base = datetime!(2024-05-01 8:00 UTC);
        let mut store = MemoryStore::default()
            .user(1, "Ada", "registered")
            .course(1, "Algebra")
            .course(2, "Biology")
            .enroll(1, 1, "teacher", "active")
            .topic(10, 1, "active")
            .topic(20, 2, "active")
            .login(1, "instructor1");
        for i in 0..12 {
            store = store.entry(i, 10, 1, None, "active", base + Duration::hours(i));
        }
        store = store.entry(99, 20, 1, None, "active", base + Duration::days(5));
        let state = AppState::fake(Arc::new(store));
        let current = resolve_current_user(state.store.as_ref(), 1).await.unwrap();

        let Json(body) = dashboard(State(state), current).await.unwrap();
        assert!(body.user.is_instructor);
        assert_eq!(body.courses.len(), 1);
        assert_eq!(body.recent_entries.len(), 10);
        assert_eq!(body.recent_entries[0].entry_id, 11);
        assert!(body.recent_entries.iter().all(|e| e.course_id == 1));
    }
}
