//! facture - entry point for the invoice extraction service

use std::sync::Arc;

use facture::config::Settings;
use facture::providers::ai::GeminiProvider;
use facture::providers::auth::GoogleAuth;
use facture::providers::pdf::PdfTextExtractor;
use facture::services::{parse_cron, SyncService};
use facture::storage::Database;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting facture");

    if let Err(e) = run().await {
        tracing::error!("Service error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load();

    let db_path = settings.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(&db_path).await?;
    tracing::info!(path = %db_path.display(), "database opened");

    let auth = GoogleAuth::new(
        settings.google.client_id.clone(),
        settings.google.client_secret.clone(),
    );
    let llm = Arc::new(GeminiProvider::new(
        settings.ai.api_key.clone(),
        settings.ai.model.clone(),
    ));
    let text = Arc::new(PdfTextExtractor::new());

    let sync = Arc::new(SyncService::new(db, auth, llm, text));

    if settings.sync.enabled {
        let schedule = parse_cron(&settings.sync.schedule)?;
        tracing::info!(schedule = %settings.sync.schedule, "scheduler started");
        Arc::clone(&sync).start_scheduler(schedule);
    } else {
        tracing::info!("scheduled processing disabled");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    sync.stop_scheduler();

    Ok(())
}
