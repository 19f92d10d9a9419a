use async_trait::async_trait;
use parley_core::{GenerationError, GenerationRequest, TextGenerator};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

use crate::transport_error;

/// Client for a local Ollama server's `/api/generate` endpoint.
///
/// The whole request is rendered into a single prompt.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaClient {
    pub fn new() -> Self {
        info!("Creating OllamaClient");
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
            default_model: "qwen3:8b".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = model;
        self
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let model = request
            .model_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.default_model);

        let mut options = serde_json::Map::new();
        if let Some(temperature) = request.params.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = request.params.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }
        // Ollama takes sampling knobs under `options`.
        for (key, value) in &request.params.extra {
            options.entry(key.clone()).or_insert_with(|| value.clone());
        }

        json!({
            "model": model,
            "prompt": request.render_prompt(),
            "stream": false,
            "options": options,
        })
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(request);
        info!("Sending request to Ollama: model={}", body["model"]);

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport_error)?
            .json::<Value>()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        response["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GenerationError::InvalidResponse("missing response field".into()))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
