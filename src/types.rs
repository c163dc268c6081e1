use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::error::EncodeWarning;
use crate::schema::CategoricalGroup;

/// Declares a closed categorical domain with its canonical spellings.
macro_rules! categorical_domain {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

categorical_domain!(Weather { Windy, Clear, Foggy, Rainy, Snowy });
categorical_domain!(TrafficLevel { Low, Medium, High });
categorical_domain!(TimeOfDay { Morning, Afternoon, Evening, Night });
categorical_domain!(VehicleType { Scooter, Bike, Car });

/// One delivery to estimate.
///
/// Categorical fields hold the caller's string as-is. The encoder matches
/// them case-sensitively against schema columns and does not normalize;
/// callers are expected to pass the canonical spellings of [`Weather`],
/// [`TrafficLevel`], [`TimeOfDay`] and [`VehicleType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub distance_km: f64,
    pub prep_time_min: u32,
    pub courier_experience_yrs: f64,
    pub weather: String,
    pub traffic_level: String,
    pub time_of_day: String,
    pub vehicle_type: String,
}

impl RawInput {
    pub fn new(
        distance_km: f64,
        prep_time_min: u32,
        courier_experience_yrs: f64,
        weather: Weather,
        traffic_level: TrafficLevel,
        time_of_day: TimeOfDay,
        vehicle_type: VehicleType,
    ) -> Self {
        Self {
            distance_km,
            prep_time_min,
            courier_experience_yrs,
            weather: weather.to_string(),
            traffic_level: traffic_level.to_string(),
            time_of_day: time_of_day.to_string(),
            vehicle_type: vehicle_type.to_string(),
        }
    }

    /// Range check for the numeric fields. Callers at the input boundary
    /// run this before handing the record to the pipeline.
    pub fn check_ranges(&self) -> Result<()> {
        ensure!(
            self.distance_km.is_finite() && self.distance_km >= 0.0,
            "distance_km must be >= 0, got {}",
            self.distance_km
        );
        ensure!(
            self.courier_experience_yrs.is_finite() && self.courier_experience_yrs >= 0.0,
            "courier_experience_yrs must be >= 0, got {}",
            self.courier_experience_yrs
        );
        Ok(())
    }
}

impl Default for RawInput {
    fn default() -> Self {
        Self::new(
            0.0,
            0,
            0.0,
            Weather::Clear,
            TrafficLevel::Low,
            TimeOfDay::Morning,
            VehicleType::Bike,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionOut {
    pub t: i64,
    pub estimated_minutes: f32,
    pub warnings: Vec<EncodeWarning>,
}

#[derive(Debug, Serialize)]
pub struct SchemaOut {
    pub columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub scaled: bool,
    pub groups: Vec<GroupOut>,
}

/// One-hot layout of a categorical group. `domain` values with no entry in
/// `columns` encode as an all-zero group.
#[derive(Debug, Serialize)]
pub struct GroupOut {
    pub group: CategoricalGroup,
    pub columns: Vec<String>,
    pub domain: Vec<&'static str>,
}
