use std::path::PathBuf;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub export_dir: PathBuf,
}

impl AppConfig {
    pub fn new(store_path: PathBuf, export_dir: PathBuf) -> Self {
        Self {
            store_path,
            export_dir,
        }
    }

    /// Only the commands that talk to the server need this.
    pub fn database_url(&self) -> anyhow::Result<String> {
        std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to the triage Postgres instance")
    }

    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let database_url = self.database_url()?;
        PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")
    }
}

/// Logs go to stderr; stdout carries the rendered dashboard.
/// `json` comes from the global `--log-json` flag.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}
