//! Raw input → schema-ordered feature vector.

use std::sync::Arc;

use tracing::warn;

use crate::error::EncodeWarning;
use crate::schema::{CategoricalGroup, FeatureSchema, NumericField};
use crate::types::RawInput;

// ---------- Feature vector ----------

// Numeric columns carry magnitudes, one-hot columns 0.0 or 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Arc<[String]>,
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, column: &str) -> Option<f32> {
        self.position(column).map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn matches_columns(&self, columns: &[String]) -> bool {
        self.values.len() == self.columns.len() && *self.columns == *columns
    }

    pub fn summary(&self, sample: usize) -> String {
        let n = self.values.len();
        let nonzero = self.values.iter().filter(|x| **x != 0.0).count();
        let mean = if n == 0 {
            0.0
        } else {
            self.values.iter().sum::<f32>() / n as f32
        };
        let head: Vec<String> = self
            .iter()
            .take(sample)
            .map(|(name, v)| format!("{}={:.3}", name, v))
            .collect();
        format!(
            "in_dim={} nonzero={} mean={:.3} sample=[{}]",
            n,
            nonzero,
            mean,
            head.join(", ")
        )
    }
}

// ---------- Encoding ----------

#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub vector: FeatureVector,
    pub warnings: Vec<EncodeWarning>,
}

/// Build the model input for `raw`. Categorical values are matched
/// verbatim; one with no `<prefix><value>` column leaves its group all-zero
/// and is reported as [`EncodeWarning::UnmappedCategory`].
pub fn encode(raw: &RawInput, schema: &FeatureSchema) -> Encoded {
    let mut values = vec![0.0_f32; schema.len()];
    let mut warnings = Vec::new();

    for field in NumericField::ALL {
        match schema.position(field.column()) {
            Some(i) => values[i] = field.value(raw),
            None => warnings.push(EncodeWarning::SchemaMismatch {
                column: field.column().to_string(),
            }),
        }
    }

    for group in CategoricalGroup::ALL {
        let value = group.value(raw);
        let column = group.column_for(value);
        match schema.position(&column) {
            Some(i) => values[i] = 1.0,
            None => warnings.push(EncodeWarning::UnmappedCategory {
                group,
                value: value.to_string(),
                column,
            }),
        }
    }

    for w in &warnings {
        warn!(warning = %w, "feature encoding degraded");
    }

    Encoded {
        vector: FeatureVector {
            columns: schema.shared_columns(),
            values,
        },
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(names: &[&str]) -> FeatureSchema {
        FeatureSchema::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn numeric_values_land_in_schema_positions() {
        let s = schema(&[
            "Courier_Experience_yrs",
            "Weather_Clear",
            "Distance_km",
            "Preparation_Time_min",
        ]);
        let mut raw = RawInput::default();
        raw.distance_km = 7.25;
        raw.prep_time_min = 12;
        raw.courier_experience_yrs = 3.0;

        let enc = encode(&raw, &s);
        assert_eq!(enc.vector.values(), &[3.0, 1.0, 7.25, 12.0]);
        // Traffic, time of day and vehicle have no columns here.
        assert_eq!(enc.warnings.len(), 3);
    }

    #[test]
    fn missing_numeric_column_is_skipped() {
        let s = schema(&["Distance_km", "Weather_Clear"]);
        let enc = encode(&RawInput::default(), &s);
        assert_eq!(enc.vector.len(), 2);
        assert!(enc.warnings.contains(&EncodeWarning::SchemaMismatch {
            column: "Courier_Experience_yrs".to_string()
        }));
    }

    #[test]
    fn case_mismatch_is_not_normalized() {
        let s = schema(&["Distance_km", "Weather_Rainy"]);
        let mut raw = RawInput::default();
        raw.weather = "rainy".to_string();
        let enc = encode(&raw, &s);
        assert_eq!(enc.vector.get("Weather_Rainy"), Some(0.0));
        assert!(enc.warnings.iter().any(|w| matches!(
            w,
            EncodeWarning::UnmappedCategory { column, .. } if column == "Weather_rainy"
        )));
    }

    #[test]
    fn summary_counts_nonzero() {
        let s = schema(&["Distance_km", "Weather_Clear", "Weather_Rainy"]);
        let mut raw = RawInput::default();
        raw.distance_km = 2.0;
        let enc = encode(&raw, &s);
        let line = enc.vector.summary(2);
        assert!(line.contains("in_dim=3"));
        assert!(line.contains("nonzero=2"));
        assert!(line.contains("Distance_km=2.000"));
    }
}
