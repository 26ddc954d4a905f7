//! HTTP API integration tests: every endpoint against mock collaborators.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pearl_config::PearlConfig;
use pearl_config::schema::ServerConfig;
use pearl_core::Priority;
use pearl_llm::{MockEmbedding, MockProvider};
use pearl_memory::entry::{MemoryEntry, rule_metadata};
use pearl_memory::{MemoryBank, VectorStore};
use pearl_runtime::PearlRuntime;
use serde_json::{Value, json};
use std::sync::Arc;

const DIMS: usize = 128;

/// Build a test router whose mock provider replays `responses` in order.
fn setup(responses: Vec<&str>) -> (axum::Router, Arc<PearlRuntime>) {
    let mut mock = MockProvider::new("mock");
    for r in responses {
        mock = mock.with_response(r);
    }
    let mut config = PearlConfig::default();
    config.triage.retry_delay_ms = 1;
    let runtime = Arc::new(PearlRuntime::with_parts(
        &config,
        MemoryBank::in_memory(),
        Arc::new(mock),
        Arc::new(MockEmbedding::new(DIMS)),
    ));
    let server_config = ServerConfig {
        cors: false,
        ..Default::default()
    };
    let state = pearl_server::AppState::new(runtime.clone());
    (pearl_server::build_router(&server_config, state), runtime)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ── Health & stats ─────────────────────────────────────────────

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup(vec![]);
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_memory_stats_endpoint() {
    let (app, runtime) = setup(vec![]);
    runtime
        .bank
        .rules
        .add(vec![MemoryEntry::new("r", "rule", vec![1.0; DIMS])])
        .unwrap();
    let req = Request::get("/api/v1/memory/stats").body(Body::empty()).unwrap();
    let json = body_json(app.oneshot(req).await.unwrap()).await;
    assert_eq!(json["triage_pearls"], 1);
    assert_eq!(json["gold_standard_cases"], 0);
    assert_eq!(json["visual_corrections"], 0);
}

// ── Triage & feedback ──────────────────────────────────────────

#[tokio::test]
async fn test_triage_returns_assessment() {
    let (app, _) = setup(vec![
        r#"{"scans": ["MRI"], "reasoning": "r", "urgency": "Urgent",
            "medical_diagnosis": ["Discitis"], "Additional_comments": "none",
            "cited_rules": []}"#,
    ]);
    let resp = app
        .oneshot(post_json(
            "/triage",
            json!({"details": {"age": 70}, "medicalHistory": {"chiefComplaint": "Night pain"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["urgency"], "Urgent");
    assert_eq!(json["Additional_comments"], "none");
}

#[tokio::test]
async fn test_triage_fallback_is_still_200() {
    let (app, _) = setup(vec!["definitely not json"]);
    let resp = app.oneshot(post_json("/triage", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["medical_diagnosis"][0], "System Unavailable");
}

#[tokio::test]
async fn test_doctor_agree_archives_and_boosts() {
    let (app, runtime) = setup(vec![]);
    let embedder = MockEmbedding::new(DIMS);
    let text = "Red Flag: Night pain -> MRI";
    runtime
        .bank
        .rules
        .add(vec![
            MemoryEntry::new("r", text, embedder.vector_for(text))
                .with_metadata(rule_metadata(Priority::Standard, 1.0, "seed")),
        ])
        .unwrap();

    let resp = app
        .oneshot(post_json(
            "/doctor_agree",
            json!({
                "patient_data": {"fullName": "Jane Roe"},
                "ai_response": {"medical_diagnosis": ["Discitis"], "cited_rules": [text]},
                "doctor_id": "dr_patel"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["boosted"][0]["id"], "r");
    assert_eq!(runtime.bank.cases.count().unwrap(), 1);
    let rule = runtime.bank.rules.get("r").unwrap().unwrap();
    assert!((rule.confidence() - 1.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_submit_correction_learns_override() {
    let (app, runtime) = setup(vec!["CRITICAL OVERRIDE: IF painless foot drop THEN decompress."]);
    let resp = app
        .oneshot(post_json(
            "/submit_correction",
            json!({"correct_diagnosis": "L5 root compression", "doctor_reasoning": "Power 2/5"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json["new_rule"].as_str().unwrap().starts_with("CRITICAL OVERRIDE:"));
    let id = json["id"].as_str().unwrap();
    let entry = runtime.bank.rules.get(id).unwrap().unwrap();
    assert_eq!(entry.priority(), Priority::CriticalOverride);
}

#[tokio::test]
async fn test_empty_learned_rule_maps_to_bad_gateway() {
    let (app, _) = setup(vec!["   "]);
    let resp = app
        .oneshot(post_json("/submit_correction", json!({"correct_diagnosis": "x"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(body_json(resp).await["detail"].is_string());
}

// ── Vision ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_analyze_images_with_base64_payload() {
    let (app, _) = setup(vec![
        r#"{"scan_quality": "Readable", "agreement_with_triage": "Yes",
            "visual_findings": [], "final_radiological_diagnosis": ["Normal"], "confidence": 0.7}"#,
    ]);
    let image = base64::engine::general_purpose::STANDARD.encode([0xffu8, 0xd8, 0xff]);
    let resp = app
        .oneshot(post_json(
            "/analyze_images",
            json!({
                "patient_context": {"age": 40, "gender": "Male", "chiefComplaint": "Back pain"},
                "images": [{"mime_type": "image/jpeg", "data": image}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["confidence"], 0.7);
}

#[tokio::test]
async fn test_analyze_images_rejects_bad_base64() {
    let (app, _) = setup(vec![]);
    let resp = app
        .oneshot(post_json(
            "/analyze_images",
            json!({"patient_context": {}, "images": [{"data": "%%%"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_learn_from_mistake_and_archive_vision_case() {
    let (app, runtime) = setup(vec![]);
    let resp = app
        .clone()
        .oneshot(post_json(
            "/learn_from_mistake",
            json!({"correction": "Pars defect missed at L5", "doctor_id": "dr_kim"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Visual rule learned.");
    assert_eq!(runtime.bank.visual.count().unwrap(), 1);

    let resp = app
        .oneshot(post_json(
            "/archive_vision_case",
            json!({
                "patient_context": {"age": 33, "gender": "Female", "chiefComplaint": "Back pain"},
                "vision_result": {
                    "scan_quality": "Readable",
                    "visual_findings": [{"structure": "L5", "observation": "Pars defect", "severity": "Mild"}],
                    "final_radiological_diagnosis": ["Spondylolysis"]
                },
                "doctor_id": "dr_kim"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(json["id"].as_str().unwrap().starts_with("gold_vision_"));
    assert_eq!(runtime.bank.cases.count().unwrap(), 1);
}

// ── Malformed requests ─────────────────────────────────────────

#[tokio::test]
async fn test_missing_field_is_422_with_detail() {
    let (app, _) = setup(vec![]);
    let resp = app
        .oneshot(post_json("/analyze_images", json!({"images": []})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(resp).await;
    assert!(json["detail"].as_str().unwrap().contains("patient_context"));
}

#[tokio::test]
async fn test_broken_json_is_400_with_detail() {
    let (app, _) = setup(vec![]);
    let req = Request::post("/triage")
        .header("content-type", "application/json")
        .body(Body::from("{\"details\": "))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["detail"].is_string());
}

#[tokio::test]
async fn test_missing_content_type_is_415_with_detail() {
    let (app, _) = setup(vec![]);
    let req = Request::post("/submit_correction")
        .body(Body::from("{}"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body_json(resp).await["detail"].is_string());
}
