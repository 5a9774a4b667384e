mod accounts;
mod app;
mod config;
mod courses;
mod db;
mod error;
mod mail;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use crate::accounts::services::ensure_bootstrap_admin;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "coursehub=debug,axum=info,tower_http=info".to_string());
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

    if let Some(admin) = &app_state.config.bootstrap_admin {
        ensure_bootstrap_admin(app_state.users.as_ref(), admin).await?;
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
