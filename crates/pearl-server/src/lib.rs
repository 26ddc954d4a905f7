//! # pearl-server
//!
//! HTTP API over the Pearl runtime:
//!
//! - `POST /triage`: assess an intake record
//! - `POST /doctor_agree` / `POST /submit_correction`: triage feedback
//! - `POST /analyze_images`: scan review (base64 images in JSON)
//! - `POST /learn_from_mistake` / `POST /archive_vision_case`: scan feedback
//! - `GET /health`, `GET /api/v1/memory/stats`

pub mod error;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use pearl_config::schema::ServerConfig;
use pearl_llm::Attachment;
use pearl_memory::BankStats;
use pearl_runtime::{
    Agreement, PatientData, PearlRuntime, ReinforcementOutcome, TriageAssessment,
    VisionAssessment, VisionContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, ApiJson};

/// Shared server state.
pub struct AppState {
    /// Swapped wholesale when the config file is reloaded.
    runtime: RwLock<Arc<PearlRuntime>>,
    started_at: Instant,
}

impl AppState {
    pub fn new(runtime: Arc<PearlRuntime>) -> Arc<Self> {
        Arc::new(Self {
            runtime: RwLock::new(runtime),
            started_at: Instant::now(),
        })
    }

    pub async fn runtime(&self) -> Arc<PearlRuntime> {
        self.runtime.read().await.clone()
    }

    pub async fn replace_runtime(&self, runtime: Arc<PearlRuntime>) {
        *self.runtime.write().await = runtime;
        info!("runtime replaced");
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
}

#[derive(Serialize)]
struct StatusResponse<T: Serialize> {
    status: &'static str,
    message: String,
    #[serde(flatten)]
    details: T,
}

fn success<T: Serialize>(message: &str, details: T) -> Json<StatusResponse<T>> {
    Json(StatusResponse {
        status: "success",
        message: message.to_string(),
        details,
    })
}

fn default_doctor() -> String {
    "doc_default".into()
}

#[derive(Deserialize)]
struct AgreeRequest {
    #[serde(default)]
    patient_data: Map<String, Value>,
    #[serde(default)]
    ai_response: AgreedAssessment,
    #[serde(default = "default_doctor")]
    doctor_id: String,
}

/// The parts of a triage answer that agreement needs. Lenient so the
/// front-end can echo back whatever it received.
#[derive(Deserialize, Default)]
struct AgreedAssessment {
    #[serde(default)]
    medical_diagnosis: Vec<String>,
    #[serde(default)]
    cited_rules: Vec<String>,
}

#[derive(Deserialize)]
struct CorrectionRequest {
    #[serde(default)]
    correct_diagnosis: String,
    #[serde(default)]
    doctor_reasoning: String,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    patient_context: VisionContext,
    #[serde(default)]
    images: Vec<ImagePayload>,
}

#[derive(Deserialize)]
struct ImagePayload {
    #[serde(default)]
    mime_type: Option<String>,
    /// Base64, optionally as a `data:<mime>;base64,` URL.
    data: String,
}

#[derive(Deserialize)]
struct VisualCorrectionRequest {
    correction: String,
    #[serde(default = "default_doctor")]
    doctor_id: String,
}

#[derive(Deserialize)]
struct ArchiveVisionRequest {
    patient_context: VisionContext,
    vision_result: VisionAssessment,
    #[serde(default = "default_doctor")]
    doctor_id: String,
}

#[derive(Serialize)]
struct NewRule {
    id: String,
    new_rule: String,
}

#[derive(Serialize)]
struct EntryId {
    id: String,
}

/// Build the Axum router.
pub fn build_router(config: &ServerConfig, state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/memory/stats", get(stats_handler))
        .route("/triage", post(triage_handler))
        .route("/doctor_agree", post(doctor_agree_handler))
        .route("/submit_correction", post(submit_correction_handler))
        .route("/analyze_images", post(analyze_images_handler))
        .route("/learn_from_mistake", post(learn_from_mistake_handler))
        .route("/archive_vision_case", post(archive_vision_case_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Result<Json<BankStats>, ApiError> {
    Ok(Json(state.runtime().await.stats()?))
}

async fn triage_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(patient): ApiJson<PatientData>,
) -> Result<Json<TriageAssessment>, ApiError> {
    Ok(Json(state.runtime().await.triage.assess(&patient).await))
}

async fn doctor_agree_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<AgreeRequest>,
) -> Result<Json<StatusResponse<ReinforcementOutcome>>, ApiError> {
    let full_name = req
        .patient_data
        .get("fullName")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let agreement = Agreement::new(
        full_name,
        &req.ai_response.medical_diagnosis,
        req.ai_response.cited_rules,
        &req.doctor_id,
    );
    let outcome = state.runtime().await.reinforcement.reinforce(&agreement).await?;
    Ok(success("Memory Reinforced", outcome))
}

async fn submit_correction_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CorrectionRequest>,
) -> Result<Json<StatusResponse<NewRule>>, ApiError> {
    let learned = state
        .runtime()
        .await
        .learning
        .learn(&req.correct_diagnosis, &req.doctor_reasoning)
        .await?;
    Ok(success(
        "Rule learned",
        NewRule {
            id: learned.id,
            new_rule: learned.text,
        },
    ))
}

async fn analyze_images_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<AnalyzeRequest>,
) -> Result<Json<VisionAssessment>, ApiError> {
    let images = req
        .images
        .into_iter()
        .enumerate()
        .map(|(i, img)| decode_image(img).map_err(|e| ApiError::BadRequest(format!("image {i}: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;
    info!(images = images.len(), "scan analysis requested");
    Ok(Json(state.runtime().await.vision.analyze(&req.patient_context, images).await))
}

async fn learn_from_mistake_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<VisualCorrectionRequest>,
) -> Result<Json<StatusResponse<EntryId>>, ApiError> {
    let id = state
        .runtime()
        .await
        .learning
        .learn_visual(&req.correction, &req.doctor_id)
        .await?;
    Ok(success("Visual rule learned.", EntryId { id }))
}

async fn archive_vision_case_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ArchiveVisionRequest>,
) -> Result<Json<StatusResponse<EntryId>>, ApiError> {
    let id = state
        .runtime()
        .await
        .reinforcement
        .archive_vision_case(&req.patient_context, &req.vision_result, &req.doctor_id)
        .await?;
    Ok(success("Visual Case Archived", EntryId { id }))
}

fn decode_image(img: ImagePayload) -> Result<Attachment, String> {
    let (url_mime, payload) = match img.data.strip_prefix("data:") {
        Some(rest) => {
            let (header, body) = rest
                .split_once(',')
                .ok_or_else(|| "malformed data URL".to_string())?;
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            (Some(mime.to_string()), body.to_string())
        }
        None => (None, img.data),
    };
    let data = BASE64.decode(payload.trim()).map_err(|e| e.to_string())?;
    let mime_type = img
        .mime_type
        .or(url_mime)
        .unwrap_or_else(|| "image/jpeg".to_string());
    Ok(Attachment { mime_type, data })
}

/// Bind and serve until ctrl-c.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> pearl_core::Result<()> {
    let listen = config.listen.clone();
    let router = build_router(config, state);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| pearl_core::PearlError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url_takes_mime() {
        let img = ImagePayload {
            mime_type: None,
            data: format!("data:image/png;base64,{}", BASE64.encode([1u8, 2, 3])),
        };
        let att = decode_image(img).unwrap();
        assert_eq!(att.mime_type, "image/png");
        assert_eq!(att.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_plain_base64_defaults_to_jpeg() {
        let img = ImagePayload {
            mime_type: None,
            data: BASE64.encode([9u8]),
        };
        assert_eq!(decode_image(img).unwrap().mime_type, "image/jpeg");
        let bad = ImagePayload {
            mime_type: None,
            data: "***".into(),
        };
        assert!(decode_image(bad).is_err());
    }
}
