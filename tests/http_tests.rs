/// Integration tests for the HTTP service
///
/// Run with: cargo test --test http_tests -- --nocapture
mod common;

use std::sync::Arc;

use common::*;
use delivery_eta::model::{model_from_json, LinearModel};
use delivery_eta::server::{load_predictor, router, AppState};
use delivery_eta::{Predictor, ServiceConfig};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::{json, Value};

const DELIVERY: &str = r#"{"distance_km":5.0,"prep_time_min":20,"courier_experience_yrs":2.0,
    "weather":"Rainy","traffic_level":"Medium","time_of_day":"Evening","vehicle_type":"Bike"}"#;

/// Serves `predictor` on an ephemeral port. The runtime must outlive the
/// requests, so it is handed back to the caller.
fn serve(predictor: Predictor) -> (tokio::runtime::Runtime, String) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let listener = rt
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(AppState {
        predictor: Arc::new(predictor),
        log_pred: true,
    });
    rt.spawn(async move { axum::serve(listener, app).await });
    (rt, format!("http://{}", addr))
}

fn linear_predictor() -> Predictor {
    let model = linear_json(
        FULL_COLUMNS,
        &[("Distance_km", 2.0), ("Weather_Rainy", 5.0)],
        10.0,
    );
    Predictor::new(model_from_json(model.as_bytes()).unwrap(), None).unwrap()
}

fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

fn post_predict(base: &str, body: &str) -> (StatusCode, Value) {
    let response = client()
        .post(format!("{}/predict", base))
        .header(CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .send()
        .unwrap();
    let status = response.status();
    (status, serde_json::from_str(&response.text().unwrap()).unwrap())
}

fn get_schema(base: &str) -> Value {
    let response = client().get(format!("{}/schema", base)).send().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_str(&response.text().unwrap()).unwrap()
}

#[test]
fn test_predict_returns_estimate() {
    println!("\n=== Test: POST /predict ===");
    let (_rt, base) = serve(linear_predictor());
    let (status, body) = post_predict(&base, DELIVERY);

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["estimated_minutes"], json!(25.0));
    assert_eq!(body["warnings"], json!([]));
    assert!(body["t"].as_i64().unwrap() > 0);
    println!("✓ {}", body);
}

#[test]
fn test_negative_distance_is_unprocessable() {
    println!("\n=== Test: Out-Of-Range Input ===");
    let (_rt, base) = serve(linear_predictor());
    let body = DELIVERY.replace("5.0", "-3.0");
    let (status, body) = post_predict(&base, &body);

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("distance_km"));
    println!("✓ 422: {}", body["error"]);
}

#[test]
fn test_unknown_category_is_reported_in_warnings() {
    println!("\n=== Test: Warnings In Response ===");
    let (_rt, base) = serve(linear_predictor());
    let (status, body) = post_predict(&base, &DELIVERY.replace("Rainy", "Overcast"));

    assert_eq!(status, StatusCode::OK);
    // Weather group zeroed: only distance and intercept remain.
    assert_eq!(body["estimated_minutes"], json!(20.0));
    assert_eq!(
        body["warnings"],
        json!([{
            "kind": "unmapped_category",
            "group": "weather",
            "value": "Overcast",
            "column": "Weather_Overcast"
        }])
    );
    println!("✓ {}", body["warnings"]);
}

#[test]
fn test_inference_failure_is_server_error() {
    println!("\n=== Test: Inference Failure ===");
    let model = LinearModel {
        feature_names: names(FULL_COLUMNS),
        coefficients: {
            let mut c = vec![0.0; FULL_COLUMNS.len()];
            c[0] = f32::INFINITY;
            c
        },
        intercept: 0.0,
    };
    let (_rt, base) = serve(Predictor::new(Arc::new(model), None).unwrap());
    let (status, body) = post_predict(&base, DELIVERY);

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("inference failed"));
    println!("✓ 500: {}", body["error"]);
}

#[test]
fn test_schema_describes_groups() {
    println!("\n=== Test: GET /schema ===");
    let model = linear_json(DROP_FIRST_COLUMNS, &[], 0.0);
    let predictor =
        Predictor::new(model_from_json(model.as_bytes()).unwrap(), None).unwrap();
    let (_rt, base) = serve(predictor);
    let body = get_schema(&base);

    assert_eq!(body["columns"].as_array().unwrap().len(), DROP_FIRST_COLUMNS.len());
    assert_eq!(body["scaled"], json!(false));
    let traffic = &body["groups"][1];
    assert_eq!(traffic["group"], json!("traffic_level"));
    assert_eq!(
        traffic["columns"],
        json!(["Traffic_Level_Low", "Traffic_Level_Medium"])
    );
    assert_eq!(traffic["domain"], json!(["Low", "Medium", "High"]));
    println!("✓ {}", traffic);
}

#[test]
fn test_config_numeric_order_reaches_service() {
    println!("\n=== Test: Numeric Column Order From Config ===");
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("eta_model.json");
    let scaler_path = dir.path().join("scaler.json");
    std::fs::write(
        &model_path,
        linear_json(FULL_COLUMNS, &[("Distance_km", 1.0)], 0.0),
    )
    .unwrap();
    std::fs::write(
        &scaler_path,
        json!({
            "kind": "standard",
            "feature_names": ["Courier_Experience_yrs", "Preparation_Time_min", "Distance_km"],
            "mean": [0.0, 0.0, 1.0],
            "scale": [1.0, 1.0, 2.0]
        })
        .to_string(),
    )
    .unwrap();

    let model_env = model_path.to_str().unwrap().to_string();
    let scaler_env = scaler_path.to_str().unwrap().to_string();
    let cfg = ServiceConfig::from_lookup(|key| match key {
        "MODEL_PATH" => Some(model_env.clone()),
        "SCALER_PATH" => Some(scaler_env.clone()),
        "NUMERIC_COLUMNS" => {
            Some("Courier_Experience_yrs,Preparation_Time_min,Distance_km".to_string())
        }
        _ => None,
    })
    .unwrap();
    let predictor = load_predictor(&cfg).unwrap();
    let (_rt, base) = serve(predictor);

    let schema = get_schema(&base);
    assert_eq!(schema["scaled"], json!(true));
    assert_eq!(
        schema["numeric_columns"],
        json!(["Courier_Experience_yrs", "Preparation_Time_min", "Distance_km"])
    );

    // (5 - 1) / 2 on the distance column only.
    let (status, body) = post_predict(&base, DELIVERY);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["estimated_minutes"], json!(2.0));
    println!("✓ scaled estimate {}", body["estimated_minutes"]);
}
