use async_trait::async_trait;
use base64::Engine;
use pearl_core::{PearlError, Result};
use std::time::Duration;
use tracing::debug;

use crate::http::{json_body, send_error};
use crate::provider::*;

/// OpenAI-compatible chat completions provider (OpenAI, Azure, vLLM, ...).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
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
            base_url: "https://api.openai.com/v1".into(),
            provider_name: "openai".into(),
        }
    }

    /// Use a custom base URL (for Azure, Together, vLLM, etc.)
    pub fn with_base_url(mut self, url: String, name: String) -> Self {
        self.base_url = url;
        self.provider_name = name;
        self
    }

    fn build_body(request: &GenerationRequest) -> serde_json::Value {
        let content = if request.attachments.is_empty() {
            serde_json::json!(&request.prompt)
        } else {
            let mut blocks = vec![serde_json::json!({ "type": "text", "text": &request.prompt })];
            for attachment in &request.attachments {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&attachment.data);
                blocks.push(serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", attachment.mime_type, encoded) },
                }));
            }
            serde_json::Value::Array(blocks)
        };

        let mut body = serde_json::json!({
            "model": &request.model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.response_format == ResponseFormat::Json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        debug!(model = %request.model, provider = %self.provider_name, "sending chat completion request");

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| send_error(&self.provider_name, e))?;

        let data = json_body(&self.provider_name, resp).await?;

        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if text.is_empty() {
            return Err(PearlError::MalformedOutput(format!(
                "{}: response has no message content",
                self.provider_name
            )));
        }

        let usage = Usage {
            input_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };

        Ok(Generation { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_prompt_is_string_content() {
        let request = GenerationRequest::new("gpt-4o", "hello");
        let body = OpenAiProvider::build_body(&request);
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!(body["response_format"].is_null());
    }

    #[test]
    fn test_images_become_data_urls() {
        let request = GenerationRequest::new("gpt-4o", "scan")
            .json()
            .with_attachments(vec![Attachment {
                mime_type: "image/jpeg".into(),
                data: vec![0xff, 0xd8],
            }]);
        let body = OpenAiProvider::build_body(&request);
        let blocks = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(body["response_format"]["type"], "json_object");
    }
}
