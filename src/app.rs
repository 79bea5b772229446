use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{analytics, auth, routes};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(analytics::router())
                .merge(routes::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::services::JwtKeys, store::memory::MemoryStore};
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        let store = MemoryStore::default()
            .user(1, "Ada", "registered")
            .course(1, "Algebra")
            .enroll(1, 1, "student", "active")
            .login(1, "ada");
        AppState::fake(Arc::new(store))
    }

    async fn get_status(state: AppState, uri: &str, token: Option<&str>) -> StatusCode {
        let mut req = Request::builder().uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        build_app(state)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn non_integer_ids_are_bad_requests() {
        let state = state();
        let token = JwtKeys::from_ref(&state).sign(1).unwrap();

        for uri in [
            "/api/v1/analytics/student-engagement/abc",
            "/api/v1/analytics/thread-analysis/1.5",
            "/api/v1/analytics/discussion-timeline?course_id=x",
        ] {
            assert_eq!(
                get_status(state.clone(), uri, Some(&token)).await,
                StatusCode::BAD_REQUEST,
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn analytics_require_a_session() {
        assert_eq!(
            get_status(state(), "/api/v1/analytics/course-stats", None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(state(), "/api/v1/health", None).await,
            StatusCode::OK
        );
    }
}
