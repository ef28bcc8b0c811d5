use std::time::Duration;

mod app;
mod auth;
mod clock;
mod config;
mod error;
mod state;

const THROTTLE_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "eventhub=debug,axum=info,tower_http=info".to_string());
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

    let throttle = app_state.throttle.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(THROTTLE_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            throttle.prune();
        }
    });

    let app = app::build_app(app_state);
    app::serve(app).await
}
