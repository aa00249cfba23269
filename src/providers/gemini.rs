//! Google Generative AI backend over the generateContent REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::traits::{ModelBackend, ModelHandle};
use crate::types::{GenerationConfig, RequestPart};

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn create_model(
        &self,
        config: &GenerationConfig,
    ) -> anyhow::Result<Arc<dyn ModelHandle>> {
        if config.model.is_empty() {
            anyhow::bail!("empty model name");
        }
        Ok(Arc::new(GeminiModel {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            url: format!(
                "{}/models/{}:generateContent",
                self.base_url, config.model
            ),
            config: config.clone(),
        }))
    }
}

struct GeminiModel {
    client: Client,
    api_key: String,
    url: String,
    config: GenerationConfig,
}

#[async_trait]
impl ModelHandle for GeminiModel {
    async fn generate_content(&self, parts: &[RequestPart]) -> anyhow::Result<String> {
        let body = build_request_body(&self.config, parts);

        let resp = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let data: Value = resp.json().await?;

        if !status.is_success() {
            let message = data["error"]["message"]
                .as_str()
                .unwrap_or("unknown provider error");
            anyhow::bail!("generateContent failed ({}): {}", status, message);
        }

        extract_text(&data, &self.config.model)
    }
}

fn build_request_body(config: &GenerationConfig, parts: &[RequestPart]) -> Value {
    let rendered: Vec<Value> = parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => json!({ "text": text }),
            RequestPart::Audio { mime_type, data } => json!({
                "inline_data": {
                    "mime_type": mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(data),
                }
            }),
        })
        .collect();

    let mut body = json!({
        "contents": [{ "role": "user", "parts": rendered }],
        "generationConfig": {
            "temperature": config.temperature,
            "topK": config.top_k,
            "topP": config.top_p,
            "maxOutputTokens": config.max_output_tokens,
        },
    });

    if !config.system_instruction.is_empty() {
        body["system_instruction"] = json!({
            "parts": [{ "text": config.system_instruction }]
        });
    }

    body
}

/// Pull the text out of a generateContent response, surfacing safety
/// blocking as an error the gateway can classify.
fn extract_text(data: &Value, model: &str) -> anyhow::Result<String> {
    if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
        let categories = blocked_categories(data["promptFeedback"]["safetyRatings"].as_array());
        anyhow::bail!(
            "prompt blocked by safety filter ({}): {}",
            reason,
            categories.join(", ")
        );
    }

    let Some(candidate) = data["candidates"].get(0) else {
        warn!(model, "Gemini returned no candidates");
        anyhow::bail!("no candidates returned by provider");
    };

    let finish_reason = candidate["finishReason"].as_str().unwrap_or("");
    if finish_reason.eq_ignore_ascii_case("safety") {
        let categories = blocked_categories(candidate["safetyRatings"].as_array());
        anyhow::bail!(
            "candidate blocked by safety filter: {}",
            categories.join(", ")
        );
    }

    let empty = vec![];
    let parts = candidate["content"]["parts"].as_array().unwrap_or(&empty);
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        debug!(model, finish_reason, "Gemini returned empty text");
        anyhow::bail!("empty response from provider (finishReason: {})", finish_reason);
    }

    Ok(text)
}

fn blocked_categories(ratings: Option<&Vec<Value>>) -> Vec<String> {
    let mut categories = Vec::new();
    if let Some(ratings) = ratings {
        for rating in ratings {
            let blocked = rating["blocked"].as_bool().unwrap_or(false);
            if !blocked {
                continue;
            }
            if let Some(category) = rating["category"].as_str() {
                if !categories.iter().any(|c| c == category) {
                    categories.push(category.to_string());
                }
            }
        }
    }
    categories
}
