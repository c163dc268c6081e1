use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, time::Duration};

use crate::loader::{Locator, DEFAULT_FETCH_TIMEOUT};
use crate::predictor::ArtifactConfig;

/// Service settings. Seeded from the JSON file named by `CONFIG_PATH`
/// when set; individual env vars override file values.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub model_path: Option<String>,
    pub meta_path: Option<String>,
    pub scaler_path: Option<String>,
    /// Scaler input order, when it differs from the default numeric order.
    pub numeric_columns: Option<Vec<String>>,
    pub port: u16,
    pub fetch_timeout_secs: u64,
    pub log_pred: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            meta_path: None,
            scaler_path: None,
            numeric_columns: None,
            port: 8080,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            log_pred: false,
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path))?;
        serde_json::from_str(&data).with_context(|| format!("invalid config JSON in {}", path))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match var("CONFIG_PATH") {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };

        if let Some(v) = var("MODEL_PATH") {
            cfg.model_path = Some(v);
        }
        if let Some(v) = var("META_PATH") {
            cfg.meta_path = Some(v);
        }
        if let Some(v) = var("SCALER_PATH") {
            cfg.scaler_path = Some(v);
        }
        if let Some(v) = var("NUMERIC_COLUMNS") {
            let columns: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
            if columns.is_empty() {
                bail!("NUMERIC_COLUMNS is set but names no columns");
            }
            cfg.numeric_columns = Some(columns);
        }
        if let Some(v) = var("PORT") {
            cfg.port = v.parse().with_context(|| format!("invalid PORT {:?}", v))?;
        }
        if let Some(v) = var("FETCH_TIMEOUT_SECS") {
            cfg.fetch_timeout_secs = v
                .parse()
                .with_context(|| format!("invalid FETCH_TIMEOUT_SECS {:?}", v))?;
        }
        if let Some(v) = var("LOG_PRED") {
            cfg.log_pred = v == "1";
        }
        Ok(cfg)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn artifacts(&self) -> Result<ArtifactConfig> {
        let Some(model) = self.model_path.as_deref() else {
            bail!("MODEL_PATH not set");
        };
        Ok(ArtifactConfig {
            model: Locator::parse(model),
            meta: self.meta_path.as_deref().map(Locator::parse),
            scaler: self.scaler_path.as_deref().map(Locator::parse),
        })
    }
}
