use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    types::{PredictionOut, SchemaOut},
    ArtifactCache, Predictor, RawInput, ServiceConfig,
};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub log_pred: bool,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (status, Json(json!({ "error": msg.to_string() })))
}

// ---------- Handlers ----------

async fn predict(
    State(state): State<AppState>,
    Json(raw): Json<RawInput>,
) -> Result<Json<PredictionOut>, ApiError> {
    raw.check_ranges()
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let encoded = state.predictor.encode(&raw);
    if state.log_pred {
        tracing::info!("recv {}", encoded.vector.summary(6));
    }

    let warnings = encoded.warnings;
    let minutes = state
        .predictor
        .predict(encoded.vector)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    Ok(Json(PredictionOut {
        t: now_ms,
        estimated_minutes: minutes,
        warnings,
    }))
}

async fn schema(State(state): State<AppState>) -> Json<SchemaOut> {
    Json(state.predictor.describe())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/schema", get(schema))
        .with_state(state)
}

// ---------- Startup ----------

/// Load every configured artifact. Blocking: call it off the async runtime.
pub fn load_predictor(cfg: &ServiceConfig) -> anyhow::Result<Predictor> {
    let artifacts = cfg.artifacts()?;
    let cache = ArtifactCache::new(cfg.fetch_timeout())?;
    let mut predictor = Predictor::load(&cache, &artifacts)?;
    if let Some(columns) = &cfg.numeric_columns {
        predictor = predictor.with_numeric_columns(columns.clone());
    }
    Ok(predictor)
}
