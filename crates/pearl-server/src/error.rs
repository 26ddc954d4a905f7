use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pearl_core::PearlError;
use serde_json::json;
use tracing::error;

/// Handler error rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Pearl(PearlError),
    BadRequest(String),
    /// Body that is not JSON or does not fit the request type.
    Rejected(JsonRejection),
}

impl From<PearlError> for ApiError {
    fn from(e: PearlError) -> Self {
        ApiError::Pearl(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Rejected(r)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(r) => r.status(),
            ApiError::Pearl(PearlError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Pearl(PearlError::MalformedOutput(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Pearl(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            ApiError::Pearl(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Rejected(r) => r.body_text(),
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), detail = %detail, "request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// `Json` extractor whose rejections render as [`ApiError`].
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}
