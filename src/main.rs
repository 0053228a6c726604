use allmitools::config::{LoggingSettings, Settings};
use allmitools::Application;
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let settings = Settings::new().context("failed to load configuration")?;
    init_tracing(&settings.logging);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded configuration from .env file"),
        Err(_) => info!("No .env file found, using defaults and environment variables"),
    }
    info!(
        port = settings.application.port,
        environment = %settings.application.environment,
        "Starting AllMiTools"
    );

    let app = Application::with_settings(settings)
        .await
        .context("failed to initialize database connection")?;
    app.run().await?;

    Ok(())
}
