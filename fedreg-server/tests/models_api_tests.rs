//! Integration tests for the model registry endpoints

mod common;

use common::*;
use serde_json::{json, Value};

fn model_body(name: &str, version: &str) -> Value {
    json!({
        "model_name": name,
        "model_version": version,
        "algorithm": "ResNet50",
        "learning_rate": 0.001,
        "epochs": 20,
        "aggregation_strategy": "FedAvg",
        "optimizer": "Adam"
    })
}

async fn create_model(app: &TestApp, token: &str, name: &str, version: &str) -> i64 {
    let (status, body) = app
        .send_json(json_request("POST", "/api/models", Some(token), model_body(name, version)))
        .await;
    assert_eq!(status, 200, "create failed: {}", body);
    body["data"]["model"]["model_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_models_require_authentication() {
    let app = TestApp::new().await;
    let (status, body) = app.send_json(get("/api/models")).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Token is missing");
}

#[tokio::test]
async fn test_mutations_require_admin() {
    let app = TestApp::new().await;
    let (_, doctor) = app.user_with_token("doc", "doctor").await;
    let (_, admin) = app.user_with_token("admin", "admin").await;

    let (status, _) = app
        .send_json(json_request("POST", "/api/models", Some(&doctor), model_body("m", "1.0")))
        .await;
    assert_eq!(status, 403);

    let id = create_model(&app, &admin, "m", "1.0").await;

    let (status, _) = app
        .send_json(delete_authed(&format!("/api/models/{}", id), Some(&doctor)))
        .await;
    assert_eq!(status, 403);

    // Reads are open to any account
    let (status, body) = app
        .send_json(get_authed(&format!("/api/models/{}", id), &doctor))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["model"]["model_name"], "m");
}

#[tokio::test]
async fn test_create_validates_required_fields_and_duplicates() {
    let app = TestApp::new().await;
    let (_, admin) = app.user_with_token("admin", "admin").await;

    let (status, body) = app
        .send_json(json_request(
            "POST",
            "/api/models",
            Some(&admin),
            json!({"model_name": "no-algorithm"}),
        ))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Missing required field: algorithm");

    let (status, _) = app
        .send_json(json_request("POST", "/api/models", Some(&admin), json!({})))
        .await;
    assert_eq!(status, 400);

    create_model(&app, &admin, "tb-detector", "1.0.0").await;
    let (status, body) = app
        .send_json(json_request(
            "POST",
            "/api/models",
            Some(&admin),
            model_body("tb-detector", "1.0.0"),
        ))
        .await;
    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_create_defaults() {
    let app = TestApp::new().await;
    let (_, admin) = app.user_with_token("admin", "admin").await;

    let (status, body) = app
        .send_json(json_request(
            "POST",
            "/api/models",
            Some(&admin),
            json!({"model_name": "bare", "algorithm": "CNN"}),
        ))
        .await;
    assert_eq!(status, 200);
    let model = &body["data"]["model"];
    assert_eq!(model["model_version"], "1.0.0");
    assert_eq!(model["model_status"], "training");
    assert!(model["learning_rate"].is_null());
    assert!(model.get("is_deleted").is_none());
}

#[tokio::test]
async fn test_list_pagination_and_filters() {
    let app = TestApp::new().await;
    let (_, admin) = app.user_with_token("admin", "admin").await;
    for (name, version) in [("lung-a", "1"), ("lung-b", "1"), ("heart", "1")] {
        create_model(&app, &admin, name, version).await;
    }

    let (status, body) = app
        .send_json(get_authed("/api/models?page=1&pageSize=2", &admin))
        .await;
    assert_eq!(status, 200);
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["totalCount"], 3);
    assert_eq!(pagination["totalPages"], 2);
    assert_eq!(pagination["hasPrev"], false);
    assert_eq!(pagination["hasNext"], true);
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .send_json(get_authed(
            "/api/models?model_name=lung&sort_by=model_name&sort_order=asc",
            &admin,
        ))
        .await;
    let names: Vec<&str> = body["data"]["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["model_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["lung-a", "lung-b"]);

    let (_, body) = app
        .send_json(get_authed("/api/models?page=9", &admin))
        .await;
    assert!(body["data"]["list"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["pagination"]["currentPage"], 9);
}

#[tokio::test]
async fn test_update_and_soft_delete() {
    let app = TestApp::new().await;
    let (_, admin) = app.user_with_token("admin", "admin").await;
    let a = create_model(&app, &admin, "alpha", "1.0").await;
    create_model(&app, &admin, "beta", "1.0").await;

    let (status, body) = app
        .send_json(json_request(
            "PUT",
            &format!("/api/models/{}", a),
            Some(&admin),
            json!({"model_status": "completed", "epochs": 50}),
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["model"]["model_status"], "completed");
    assert_eq!(body["data"]["model"]["epochs"], 50);

    let (status, _) = app
        .send_json(json_request(
            "PUT",
            &format!("/api/models/{}", a),
            Some(&admin),
            json!({"model_name": "beta"}),
        ))
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .send_json(json_request(
            "PUT",
            &format!("/api/models/{}", a),
            Some(&admin),
            json!({"model_status": "exploded"}),
        ))
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .send_json(delete_authed(&format!("/api/models/{}", a), Some(&admin)))
        .await;
    assert_eq!(status, 200);

    let (status, body) = app
        .send_json(get_authed(&format!("/api/models/{}", a), &admin))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["message"], "Model not found");

    let (status, _) = app
        .send_json(delete_authed(&format!("/api/models/{}", a), Some(&admin)))
        .await;
    assert_eq!(status, 404);

    let (_, body) = app.send_json(get_authed("/api/models", &admin)).await;
    assert_eq!(body["data"]["pagination"]["totalCount"], 1);
}

#[tokio::test]
async fn test_options() {
    let app = TestApp::new().await;
    let (_, token) = app.user_with_token("doc", "doctor").await;

    let (status, body) = app.send_json(get_authed("/api/models/options", &token)).await;
    assert_eq!(status, 200);
    assert_eq!(
        body["data"]["model_status"],
        json!(["training", "completed", "failed", "stopped"])
    );
    assert_eq!(
        body["data"]["aggregation_strategy"],
        json!(["FedAvg", "FedMA", "FedProx", "FedNova", "SCAFFOLD"])
    );
    assert_eq!(
        body["data"]["optimizer"],
        json!(["SGD", "Adam", "AdamW", "RMSprop", "Adagrad"])
    );
}
