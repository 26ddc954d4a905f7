use async_trait::async_trait;
use base64::Engine;
use pearl_core::{PearlError, Result};
use std::time::Duration;
use tracing::debug;

use crate::http::{json_body, send_error};
use crate::provider::*;

/// Google Gemini `generateContent` provider. Images travel as inline data.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_timeout(api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn build_body(request: &GenerationRequest) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({ "text": &request.prompt })];
        for attachment in &request.attachments {
            parts.push(serde_json::json!({
                "inline_data": {
                    "mime_type": &attachment.mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(&attachment.data),
                }
            }));
        }

        let mut generation_config = serde_json::json!({
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        });
        if request.response_format == ResponseFormat::Json {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }

        serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        })
    }
}

#[async_trait]
impl ReasoningProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        debug!(
            model = %request.model,
            attachments = request.attachments.len(),
            "sending Gemini generateContent request"
        );

        let model = request.model.trim_start_matches("models/");
        let resp = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| send_error("gemini", e))?;

        let data = json_body("gemini", resp).await?;

        let text: String = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            let reason = data["candidates"][0]["finishReason"]
                .as_str()
                .or_else(|| data["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("no candidates");
            return Err(PearlError::MalformedOutput(format!(
                "gemini returned no text ({reason})"
            )));
        }

        let usage = Usage {
            input_tokens: data["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            output_tokens: data["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0) as u32,
        };

        Ok(Generation { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_includes_inline_images_and_json_mode() {
        let request = GenerationRequest::new("gemini-3-flash-preview", "Read this scan")
            .json()
            .with_attachments(vec![Attachment {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
            }]);
        let body = GeminiProvider::build_body(&request);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "Read this scan");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_text_mode_omits_mime_type() {
        let request = GenerationRequest::new("gemini-3-flash-preview", "hello");
        let body = GeminiProvider::build_body(&request);
        assert!(body["generationConfig"]["responseMimeType"].is_null());
    }
}
