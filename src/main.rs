use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_board_api::{build_router, config::Config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.data_dir).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!(
        "Data in {}, uploads in {}",
        config.data_dir.display(),
        config.upload_dir.display()
    );

    let state = AppState::load(config).await;
    match state.gate.allow_list().professor() {
        Some(professor) => info!("Professor account: {}", professor),
        None => warn!("No registered emails; every login will be refused until the allow-list is provided"),
    }

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);

    info!("Course board API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
