mod analytics;
mod app;
mod auth;
mod config;
mod db;
mod error;
mod ingest;
mod routes;
mod state;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "lms_analytics=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    if let Some(dir) = app_state.config.data_dir.clone() {
        match ingest::load_dir(&app_state.db, &dir).await {
            Ok(summary) => tracing::info!(?summary, "initial data loaded"),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "could not load initial data"),
        }
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
