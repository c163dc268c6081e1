//! Artifact loading.
//!
//! Artifacts are fetched from a filesystem path or an HTTP(S) URL, decoded,
//! and memoized per locator. The cache lock is held for the whole
//! fetch-and-decode so concurrent first access issues a single fetch.
//! Failures are never cached.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::model::{model_from_json, ModelFormat, Regressor};
use crate::scaler::Scaler;
use crate::schema::FeatureSchema;

/// Default bound on a remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Path(PathBuf),
    Url(String),
}

impl Locator {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if has_http_scheme(s) {
            Locator::Url(s.to_string())
        } else {
            Locator::Path(PathBuf::from(s.strip_prefix("file://").unwrap_or(s)))
        }
    }
}

/// Schemes compare case-insensitively, so `HTTPS://` is still a URL.
pub(crate) fn has_http_scheme(s: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        s.get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Path(p) => write!(f, "{}", p.display()),
            Locator::Url(u) => f.write_str(u),
        }
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::parse(s)
    }
}

/// Raw byte retrieval for a locator.
pub trait Fetch: Send + Sync {
    fn fetch(&self, locator: &Locator) -> anyhow::Result<Vec<u8>>;
}

/// Filesystem reads plus a blocking HTTP client with a bounded timeout.
///
/// Construct and use outside an async runtime (e.g. in `spawn_blocking`).
pub struct ArtifactFetcher {
    client: Client,
}

impl ArtifactFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Use a preconfigured client; it should carry its own timeout.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetch for ArtifactFetcher {
    fn fetch(&self, locator: &Locator) -> anyhow::Result<Vec<u8>> {
        match locator {
            Locator::Path(path) => {
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))
            }
            Locator::Url(url) => {
                debug!(url = %url, "fetching artifact");
                let response = self
                    .client
                    .get(url)
                    .header(
                        USER_AGENT,
                        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
                    )
                    .send()
                    .with_context(|| format!("request to {} failed", url))?;
                let status = response.status();
                if !status.is_success() {
                    bail!("HTTP {} from {}", status.as_u16(), url);
                }
                let body = response
                    .bytes()
                    .with_context(|| format!("failed to read body from {}", url))?;
                Ok(body.to_vec())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Model {
        locator: Locator,
        meta: Option<Locator>,
    },
    Scaler(Locator),
}

enum Cached {
    Model(Arc<dyn Regressor>),
    Scaler(Arc<Scaler>),
}

/// Process-wide artifact handles, loaded on first request.
pub struct ArtifactCache<F = ArtifactFetcher> {
    fetcher: F,
    entries: Mutex<HashMap<CacheKey, Cached>>,
}

impl ArtifactCache<ArtifactFetcher> {
    pub fn new(timeout: Duration) -> Result<Self> {
        let fetcher = ArtifactFetcher::new(timeout)
            .map_err(|e| PipelineError::unavailable("<http client>", format!("{:#}", e)))?;
        Ok(Self::with_fetcher(fetcher))
    }
}

impl<F: Fetch> ArtifactCache<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Number of successfully loaded artifacts.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load (or reuse) a model. `meta` names the feature-list sidecar that
    /// TorchScript artifacts need; JSON artifacts carry their own.
    pub fn load_model(
        &self,
        locator: &Locator,
        meta: Option<&Locator>,
    ) -> Result<Arc<dyn Regressor>> {
        let key = CacheKey::Model {
            locator: locator.clone(),
            meta: meta.cloned(),
        };
        let mut entries = self.entries.lock();
        if let Some(Cached::Model(model)) = entries.get(&key) {
            debug!(locator = %locator, "model cache hit");
            return Ok(Arc::clone(model));
        }

        let model = self
            .decode_model(locator, meta)
            .map_err(|e| PipelineError::unavailable(locator, format!("{:#}", e)))?;
        info!(
            locator = %locator,
            kind = model.kind(),
            features = model.feature_names().len(),
            "model loaded"
        );
        entries.insert(key, Cached::Model(Arc::clone(&model)));
        Ok(model)
    }

    /// Load (or reuse) a fitted scaler.
    pub fn load_scaler(&self, locator: &Locator) -> Result<Arc<Scaler>> {
        let key = CacheKey::Scaler(locator.clone());
        let mut entries = self.entries.lock();
        if let Some(Cached::Scaler(scaler)) = entries.get(&key) {
            debug!(locator = %locator, "scaler cache hit");
            return Ok(Arc::clone(scaler));
        }

        let scaler = self
            .fetcher
            .fetch(locator)
            .and_then(|bytes| Scaler::from_json(&bytes))
            .map(Arc::new)
            .map_err(|e| PipelineError::unavailable(locator, format!("{:#}", e)))?;
        info!(
            locator = %locator,
            columns = scaler.n_features(),
            "scaler loaded"
        );
        entries.insert(key, Cached::Scaler(Arc::clone(&scaler)));
        Ok(scaler)
    }

    fn decode_model(
        &self,
        locator: &Locator,
        meta: Option<&Locator>,
    ) -> anyhow::Result<Arc<dyn Regressor>> {
        let bytes = self.fetcher.fetch(locator)?;
        let model: Arc<dyn Regressor> = match ModelFormat::detect(&locator.to_string()) {
            ModelFormat::Json => model_from_json(&bytes)?,
            ModelFormat::TorchScript => self.decode_torchscript(&bytes, meta)?,
        };
        // Reject artifacts whose feature list cannot serve as a schema.
        FeatureSchema::new(model.feature_names().to_vec())?;
        Ok(model)
    }

    #[cfg(feature = "torch")]
    fn decode_torchscript(
        &self,
        bytes: &[u8],
        meta: Option<&Locator>,
    ) -> anyhow::Result<Arc<dyn Regressor>> {
        let Some(meta) = meta else {
            bail!("TorchScript model needs a meta.json locator");
        };
        let meta_bytes = self.fetcher.fetch(meta)?;
        Ok(Arc::new(crate::model::TorchScriptModel::from_bytes(
            bytes,
            &meta_bytes,
        )?))
    }

    #[cfg(not(feature = "torch"))]
    fn decode_torchscript(
        &self,
        _bytes: &[u8],
        _meta: Option<&Locator>,
    ) -> anyhow::Result<Arc<dyn Regressor>> {
        bail!("TorchScript models require building with the `torch` feature")
    }
}
