//! Error types for artifact loading and inference, plus the recoverable
//! warnings the encoder reports alongside a vector.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::schema::CategoricalGroup;

/// Failures that stop a prediction.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Model or scaler could not be fetched or decoded.
    #[error("artifact unavailable at {locator}: {reason}")]
    ArtifactUnavailable {
        /// Locator the load was attempted from.
        locator: String,
        /// What went wrong.
        reason: String,
    },

    /// The model is missing, raised, or returned something unusable.
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl PipelineError {
    pub(crate) fn unavailable(locator: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::ArtifactUnavailable {
            locator: locator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn inference(reason: impl fmt::Display) -> Self {
        Self::InferenceFailure(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Anomalies that degrade a single request without failing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeWarning {
    /// The categorical value has no one-hot column in the schema; the whole
    /// group was left at zero.
    UnmappedCategory {
        group: CategoricalGroup,
        value: String,
        column: String,
    },
    /// A numeric column the pipeline fills is not part of the schema and
    /// was skipped.
    SchemaMismatch { column: String },
}

impl fmt::Display for EncodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmappedCategory { group, value, column } => write!(
                f,
                "{} value {:?} has no schema column {}; group encoded as all-zero",
                group, value, column
            ),
            Self::SchemaMismatch { column } => {
                write!(f, "numeric column {} absent from schema; skipped", column)
            }
        }
    }
}
