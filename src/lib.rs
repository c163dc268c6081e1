//! Delivery time estimation.
//!
//! Raw trip attributes are one-hot encoded against the feature schema a
//! trained model carries, optionally scaled, and fed to the model for a
//! single estimate in minutes. Artifacts are loaded once and shared.

pub mod config;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod model;
pub mod predictor;
pub mod scaler;
pub mod schema;
pub mod server;
pub mod types;

pub use config::ServiceConfig;
pub use encoder::{encode, Encoded, FeatureVector};
pub use error::{EncodeWarning, PipelineError};
pub use loader::{ArtifactCache, ArtifactFetcher, Fetch, Locator};
pub use model::Regressor;
pub use predictor::{predict, ArtifactConfig, Estimate, Predictor};
pub use scaler::Scaler;
pub use schema::{CategoricalGroup, FeatureSchema, NumericField};
pub use types::RawInput;
