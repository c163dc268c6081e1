//! Fitted scalers for the numeric subset of the feature vector.

use anyhow::{bail, Result};
use serde::Deserialize;

/// A previously fitted transform, decoded from a JSON artifact tagged by
/// `"kind"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard {
        #[serde(default)]
        feature_names: Option<Vec<String>>,
        mean: Vec<f32>,
        scale: Vec<f32>,
    },
    /// Maps `[data_min, data_max]` onto `feature_range`.
    MinMax {
        #[serde(default)]
        feature_names: Option<Vec<String>>,
        data_min: Vec<f32>,
        data_max: Vec<f32>,
        #[serde(default = "default_feature_range")]
        feature_range: (f32, f32),
    },
}

fn default_feature_range() -> (f32, f32) {
    (0.0, 1.0)
}

impl Scaler {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let scaler: Scaler = serde_json::from_slice(bytes)?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<()> {
        let (a, b, names) = match self {
            Scaler::Standard {
                mean,
                scale,
                feature_names,
            } => (mean.len(), scale.len(), feature_names),
            Scaler::MinMax {
                data_min,
                data_max,
                feature_names,
                ..
            } => (data_min.len(), data_max.len(), feature_names),
        };
        if a == 0 {
            bail!("scaler has no fitted columns");
        }
        if a != b {
            bail!("scaler parameter lengths differ: {} vs {}", a, b);
        }
        if let Some(names) = names {
            if names.len() != a {
                bail!(
                    "scaler feature_names has {} entries for {} fitted columns",
                    names.len(),
                    a
                );
            }
        }
        Ok(())
    }

    /// Number of columns the scaler was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { data_min, .. } => data_min.len(),
        }
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        match self {
            Scaler::Standard { feature_names, .. } | Scaler::MinMax { feature_names, .. } => {
                feature_names.as_deref()
            }
        }
    }

    /// Transform `row` in place. `row` must hold exactly the fitted columns,
    /// in fitting order.
    pub fn transform(&self, row: &mut [f32]) -> Result<()> {
        if row.len() != self.n_features() {
            bail!(
                "scaler fitted on {} columns, got {}",
                self.n_features(),
                row.len()
            );
        }
        match self {
            Scaler::Standard { mean, scale, .. } => {
                for ((x, m), s) in row.iter_mut().zip(mean).zip(scale) {
                    // Zero-variance columns were fitted with unit scale.
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    *x = (*x - m) / s;
                }
            }
            Scaler::MinMax {
                data_min,
                data_max,
                feature_range: (lo, hi),
                ..
            } => {
                for ((x, min), max) in row.iter_mut().zip(data_min).zip(data_max) {
                    let span = max - min;
                    let span = if span == 0.0 { 1.0 } else { span };
                    *x = (*x - min) / span * (hi - lo) + lo;
                }
            }
        }
        Ok(())
    }
}
