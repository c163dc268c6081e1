use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use delivery_eta::{
    server::{self, AppState},
    RawInput, ServiceConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServiceConfig::from_env()?;

    // The blocking HTTP client must not run on a runtime worker.
    let load_cfg = cfg.clone();
    let predictor =
        tokio::task::spawn_blocking(move || server::load_predictor(&load_cfg)).await??;

    // Warmup so a broken model fails at startup rather than on first request
    let warmup = predictor.estimate(&RawInput::default())?;
    tracing::info!(minutes = warmup.minutes, "warmup prediction ok");
    tracing::info!(
        "loaded model; schema[{}]: {:?}",
        predictor.schema().len(),
        predictor.schema().columns()
    );

    let app = server::router(AppState {
        predictor: Arc::new(predictor),
        log_pred: cfg.log_pred,
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
