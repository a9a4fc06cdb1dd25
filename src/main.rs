use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};

mod analytics;
mod config;
mod dashboard;
mod db;
mod models;
mod pdf;
mod report;
mod store;

use config::AppConfig;
use dashboard::{Dashboard, DASHBOARD_REGION_ID};
use report::{ExportFormat, ExportKind, ExportTask};
use store::LocalStore;

#[derive(Parser)]
#[command(name = "triage-analytics")]
#[command(about = "Analytics dashboard and report export for triage patient records", long_about = None)]
struct Cli {
    /// Local patient store (JSON snapshot)
    #[arg(long, global = true, env = "TRIAGE_STORE_PATH", default_value = "triage-store.json")]
    store: PathBuf,
    /// Directory exported documents are written to
    #[arg(long, global = true, env = "TRIAGE_EXPORT_DIR", default_value = ".")]
    export_dir: PathBuf,
    /// Emit logs as JSON lines
    #[arg(
        long,
        global = true,
        env = "TRIAGE_LOG_JSON",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the server schema
    InitDb,
    /// Load realistic seed patients on the server
    Seed,
    /// Import patients from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Append to the local store instead of the server
        #[arg(long)]
        local: bool,
    },
    /// Refresh the local store from the server
    Sync,
    /// Render the analytics dashboard
    Dashboard,
    /// Export the analytics report
    Export {
        /// Capture a dashboard region instead of the data-only report
        #[arg(long)]
        with_visuals: bool,
        #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
        format: ExportFormat,
        #[arg(long, default_value = DASHBOARD_REGION_ID)]
        region: String,
    },
    /// Configure alert thresholds
    ConfigureAlerts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_tracing(cli.log_json);
    let config = AppConfig::new(cli.store, cli.export_dir);

    match cli.command {
        Commands::InitDb => {
            let pool = config.connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = config.connect().await?;
            db::seed(&pool).await?;
            println!("Seed patients inserted.");
        }
        Commands::Import { csv, local } => {
            let inserted = if local {
                let mut store = LocalStore::open(&config.store_path).await?;
                store.import_csv(&csv).await?
            } else {
                let pool = config.connect().await?;
                db::import_csv(&pool, &csv).await?
            };
            println!("Inserted {inserted} patients from {}.", csv.display());
        }
        Commands::Sync => {
            let pool = config.connect().await?;
            let mut store = LocalStore::open(&config.store_path).await?;
            store.sync(&pool).await?;

            let mut dashboard = Dashboard::new(store.snapshot());
            dashboard.mark_ready();
            print!("{}", dashboard.view().render());
        }
        Commands::Dashboard => {
            let store = LocalStore::open(&config.store_path).await?;
            let mut dashboard = Dashboard::new(store.snapshot());
            dashboard.mark_ready();
            print!("{}", dashboard.view().render());
        }
        Commands::Export {
            with_visuals,
            format,
            region,
        } => {
            let store = LocalStore::open(&config.store_path).await?;
            let mut dashboard = Dashboard::new(store.snapshot());
            dashboard.mark_ready();
            let generated_at = Utc::now();

            let mut task = if with_visuals {
                ExportTask::spawn(
                    ExportKind::Dashboard,
                    report::export_region(
                        region,
                        dashboard.view(),
                        config.export_dir.clone(),
                        format,
                        generated_at,
                    ),
                )
            } else {
                let subsets = store.subsets();
                let summary = analytics::summarize(store.patients(), &subsets);
                let payload = analytics::export_payload(&summary, store.patients(), &subsets);
                ExportTask::spawn(
                    ExportKind::Report,
                    report::export_analytics(
                        payload,
                        config.export_dir.clone(),
                        format,
                        generated_at,
                    ),
                )
            };

            let finished = tokio::select! {
                result = task.wait() => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            };
            let result = match finished {
                Some(result) => result,
                None => {
                    tracing::warn!("interrupted, cancelling export");
                    task.abort();
                    task.wait().await
                }
            };
            println!("{}", report::notification(task.kind(), &result));
        }
        Commands::ConfigureAlerts => {
            tracing::warn!("alert configuration requested but not available");
            println!("{}", dashboard::configure_alerts());
        }
    }

    Ok(())
}
