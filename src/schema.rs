//! Column identifiers and the model's feature schema.
//!
//! The schema is the ordered column list a model artifact was trained on.
//! It is authoritative for vector width and position; the pipeline only
//! knows which of those columns it can fill.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::types::{RawInput, TimeOfDay, TrafficLevel, VehicleType, Weather};

// ---------- Column identifiers ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    Distance,
    PreparationTime,
    CourierExperience,
}

impl NumericField {
    // Default scaler input order.
    pub const ALL: [NumericField; 3] = [
        NumericField::Distance,
        NumericField::PreparationTime,
        NumericField::CourierExperience,
    ];

    pub fn column(self) -> &'static str {
        match self {
            NumericField::Distance => "Distance_km",
            NumericField::PreparationTime => "Preparation_Time_min",
            NumericField::CourierExperience => "Courier_Experience_yrs",
        }
    }

    pub fn value(self, raw: &RawInput) -> f32 {
        match self {
            NumericField::Distance => raw.distance_km as f32,
            NumericField::PreparationTime => raw.prep_time_min as f32,
            NumericField::CourierExperience => raw.courier_experience_yrs as f32,
        }
    }

    pub fn default_columns() -> Vec<String> {
        Self::ALL.iter().map(|f| f.column().to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalGroup {
    Weather,
    TrafficLevel,
    TimeOfDay,
    VehicleType,
}

impl CategoricalGroup {
    pub const ALL: [CategoricalGroup; 4] = [
        CategoricalGroup::Weather,
        CategoricalGroup::TrafficLevel,
        CategoricalGroup::TimeOfDay,
        CategoricalGroup::VehicleType,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            CategoricalGroup::Weather => "Weather_",
            CategoricalGroup::TrafficLevel => "Traffic_Level_",
            CategoricalGroup::TimeOfDay => "Time_of_Day_",
            CategoricalGroup::VehicleType => "Vehicle_Type_",
        }
    }

    pub fn value(self, raw: &RawInput) -> &str {
        match self {
            CategoricalGroup::Weather => &raw.weather,
            CategoricalGroup::TrafficLevel => &raw.traffic_level,
            CategoricalGroup::TimeOfDay => &raw.time_of_day,
            CategoricalGroup::VehicleType => &raw.vehicle_type,
        }
    }

    pub fn column_for(self, value: &str) -> String {
        format!("{}{}", self.prefix(), value)
    }

    pub fn domain(self) -> Vec<&'static str> {
        match self {
            CategoricalGroup::Weather => Weather::ALL.iter().map(|v| v.as_str()).collect(),
            CategoricalGroup::TrafficLevel => {
                TrafficLevel::ALL.iter().map(|v| v.as_str()).collect()
            }
            CategoricalGroup::TimeOfDay => TimeOfDay::ALL.iter().map(|v| v.as_str()).collect(),
            CategoricalGroup::VehicleType => {
                VehicleType::ALL.iter().map(|v| v.as_str()).collect()
            }
        }
    }
}

impl fmt::Display for CategoricalGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CategoricalGroup::Weather => "weather",
            CategoricalGroup::TrafficLevel => "traffic_level",
            CategoricalGroup::TimeOfDay => "time_of_day",
            CategoricalGroup::VehicleType => "vehicle_type",
        };
        f.write_str(name)
    }
}

// ---------- Schema ----------

#[derive(Debug, Clone)]
pub struct FeatureSchema {
    columns: Arc<[String]>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            bail!("feature schema is empty");
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                bail!("duplicate column {:?} in feature schema", name);
            }
        }
        Ok(Self {
            columns: columns.into(),
            index,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn group_positions(&self, group: CategoricalGroup) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.starts_with(group.prefix()))
            .map(|(i, _)| i)
            .collect()
    }
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}
