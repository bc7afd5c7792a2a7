use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use intake::{router, AppConfig, AppState, StoreBackend};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;
    match &cfg.backend {
        StoreBackend::Xlsx { data_dir, artifact_name } => {
            info!(data_dir = %data_dir.display(), artifact = %artifact_name, "store: xlsx");
        }
        StoreBackend::Sheets { sheet_id, sheet_tab, .. } => {
            info!(sheet_id = %sheet_id, tab = %sheet_tab, "store: google sheets");
        }
    }
    info!(
        sync_status = ?cfg.sync_status,
        write_timeout = ?cfg.write_timeout,
        diagnostics = cfg.diagnostics,
        "config loaded"
    );

    let state = Arc::new(AppState::new(cfg.clone())?);
    let app = router(state);

    let addr = &cfg.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("report-intake listening on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
