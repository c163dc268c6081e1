//! Scaling and model invocation, plus the immutable state object that ties
//! the cached artifacts together for request handling.

use std::sync::Arc;

use tracing::{debug, info};

use crate::encoder::{encode, Encoded, FeatureVector};
use crate::error::{EncodeWarning, PipelineError, Result};
use crate::loader::{ArtifactCache, Fetch, Locator};
use crate::model::Regressor;
use crate::scaler::Scaler;
use crate::schema::{CategoricalGroup, FeatureSchema, NumericField};
use crate::types::{GroupOut, RawInput, SchemaOut};

/// Run the model on an encoded vector.
///
/// With a scaler, the `numeric_columns` subset is pulled out in that order,
/// transformed, and written back to the same positions. Without one, values
/// reach the model unchanged. The first model output is the estimate.
pub fn predict(
    mut vector: FeatureVector,
    numeric_columns: &[String],
    scaler: Option<&Scaler>,
    model: Option<&dyn Regressor>,
) -> Result<f32> {
    let model = model.ok_or_else(|| PipelineError::inference("no model loaded"))?;

    if !vector.matches_columns(model.feature_names()) {
        return Err(PipelineError::inference(format!(
            "vector columns do not match model schema ({} vs {} columns)",
            vector.len(),
            model.feature_names().len()
        )));
    }

    if let Some(scaler) = scaler {
        if let Some(fitted) = scaler.feature_names() {
            if fitted != numeric_columns {
                return Err(PipelineError::inference(format!(
                    "scaler fitted on {:?}, numeric columns are {:?}",
                    fitted, numeric_columns
                )));
            }
        }
        let positions = numeric_columns
            .iter()
            .map(|c| {
                vector.position(c).ok_or_else(|| {
                    PipelineError::inference(format!(
                        "numeric column {} missing from vector; scaler cannot be applied",
                        c
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let values = vector.values_mut();
        let mut subset: Vec<f32> = positions.iter().map(|&i| values[i]).collect();
        scaler
            .transform(&mut subset)
            .map_err(|e| PipelineError::inference(format!("{:#}", e)))?;
        for (&i, x) in positions.iter().zip(subset) {
            values[i] = x;
        }
    }

    let outputs = model
        .predict(vector.values())
        .map_err(|e| PipelineError::inference(format!("{:#}", e)))?;
    match outputs.first() {
        Some(&y) if y.is_finite() => Ok(y),
        Some(&y) => Err(PipelineError::inference(format!("model returned {}", y))),
        None => Err(PipelineError::inference("model returned no output")),
    }
}

/// Locators for one deployment's artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactConfig {
    pub model: Locator,
    pub meta: Option<Locator>,
    pub scaler: Option<Locator>,
}

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub minutes: f32,
    pub warnings: Vec<EncodeWarning>,
}

/// Loaded model, optional scaler and the schema derived from the model.
///
/// Built once at startup and shared read-only (e.g. behind an `Arc`).
pub struct Predictor {
    model: Arc<dyn Regressor>,
    scaler: Option<Arc<Scaler>>,
    schema: FeatureSchema,
    numeric_columns: Vec<String>,
}

impl Predictor {
    pub fn new(model: Arc<dyn Regressor>, scaler: Option<Arc<Scaler>>) -> Result<Self> {
        let schema = FeatureSchema::new(model.feature_names().to_vec())
            .map_err(|e| PipelineError::unavailable("<model schema>", e))?;
        Ok(Self {
            model,
            scaler,
            schema,
            numeric_columns: NumericField::default_columns(),
        })
    }

    /// Load every artifact named by `config` through `cache`. Any load
    /// failure is returned as-is; nothing is substituted.
    pub fn load<F: Fetch>(cache: &ArtifactCache<F>, config: &ArtifactConfig) -> Result<Self> {
        let model = cache.load_model(&config.model, config.meta.as_ref())?;
        let scaler = config
            .scaler
            .as_ref()
            .map(|loc| cache.load_scaler(loc))
            .transpose()?;
        let predictor = Self::new(model, scaler)?;
        info!(
            columns = predictor.schema.len(),
            scaled = predictor.scaler.is_some(),
            "predictor ready"
        );
        Ok(predictor)
    }

    /// Override the numeric column order handed to the scaler.
    pub fn with_numeric_columns(mut self, columns: Vec<String>) -> Self {
        self.numeric_columns = columns;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn is_scaled(&self) -> bool {
        self.scaler.is_some()
    }

    /// Column layout served by `GET /schema`.
    pub fn describe(&self) -> SchemaOut {
        let groups = CategoricalGroup::ALL
            .iter()
            .map(|&group| GroupOut {
                group,
                columns: self
                    .schema
                    .group_positions(group)
                    .into_iter()
                    .map(|i| self.schema.columns()[i].clone())
                    .collect(),
                domain: group.domain(),
            })
            .collect();
        SchemaOut {
            columns: self.schema.columns().to_vec(),
            numeric_columns: self.numeric_columns.clone(),
            scaled: self.is_scaled(),
            groups,
        }
    }

    pub fn encode(&self, raw: &RawInput) -> Encoded {
        encode(raw, &self.schema)
    }

    pub fn predict(&self, vector: FeatureVector) -> Result<f32> {
        predict(
            vector,
            &self.numeric_columns,
            self.scaler.as_deref(),
            Some(self.model.as_ref()),
        )
    }

    /// Encode then predict.
    pub fn estimate(&self, raw: &RawInput) -> Result<Estimate> {
        let Encoded { vector, warnings } = self.encode(raw);
        debug!(vector = %vector.summary(6), "encoded request");
        let minutes = self.predict(vector)?;
        Ok(Estimate { minutes, warnings })
    }
}
