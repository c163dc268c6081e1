#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use delivery_eta::{Fetch, FeatureSchema, Locator};

/// Column layout of the production delivery model.
pub const FULL_COLUMNS: &[&str] = &[
    "Distance_km",
    "Preparation_Time_min",
    "Courier_Experience_yrs",
    "Weather_Windy",
    "Weather_Clear",
    "Weather_Foggy",
    "Weather_Rainy",
    "Weather_Snowy",
    "Traffic_Level_Low",
    "Traffic_Level_Medium",
    "Traffic_Level_High",
    "Time_of_Day_Afternoon",
    "Time_of_Day_Evening",
    "Time_of_Day_Night",
    "Time_of_Day_Morning",
    "Vehicle_Type_Scooter",
    "Vehicle_Type_Bike",
    "Vehicle_Type_Car",
];

/// Same model trained with the first level of each category dropped.
pub const DROP_FIRST_COLUMNS: &[&str] = &[
    "Distance_km",
    "Preparation_Time_min",
    "Courier_Experience_yrs",
    "Weather_Foggy",
    "Weather_Rainy",
    "Weather_Snowy",
    "Weather_Windy",
    "Traffic_Level_Low",
    "Traffic_Level_Medium",
    "Time_of_Day_Evening",
    "Time_of_Day_Morning",
    "Time_of_Day_Night",
    "Vehicle_Type_Car",
    "Vehicle_Type_Scooter",
];

pub fn names(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|s| s.to_string()).collect()
}

pub fn schema(cols: &[&str]) -> FeatureSchema {
    FeatureSchema::new(names(cols)).unwrap()
}

/// Linear model JSON over `cols` with the given coefficient per column
/// (zero when absent).
pub fn linear_json(cols: &[&str], coef: &[(&str, f32)], intercept: f32) -> String {
    let coefficients: Vec<f32> = cols
        .iter()
        .map(|c| {
            coef.iter()
                .find(|(name, _)| name == c)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        })
        .collect();
    serde_json::json!({
        "kind": "linear",
        "feature_names": cols,
        "coefficients": coefficients,
        "intercept": intercept,
    })
    .to_string()
}

/// In-memory artifact store that counts every fetch.
#[derive(Default)]
pub struct CountingFetcher {
    pub artifacts: HashMap<Locator, Vec<u8>>,
    pub fetches: AtomicUsize,
}

impl CountingFetcher {
    pub fn with(mut self, locator: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.artifacts.insert(Locator::parse(locator), bytes.into());
        self
    }

    pub fn count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Fetch for CountingFetcher {
    fn fetch(&self, locator: &Locator) -> anyhow::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Widen the window for concurrent callers.
        std::thread::sleep(std::time::Duration::from_millis(5));
        self.artifacts
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no artifact at {}", locator))
    }
}
