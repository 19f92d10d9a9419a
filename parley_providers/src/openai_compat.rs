use std::time::Duration;

use async_trait::async_trait;
use parley_core::{GenerationError, GenerationRequest, TextGenerator};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::info;

use crate::retry::retry_with_backoff;
use crate::{is_retryable, transport_error};

/// Client for vendors exposing an OpenAI-style `/chat/completions` endpoint.
///
/// System memory is sent as a system message, each window entry as an
/// assistant message, then the current message as the user turn.
pub struct OpenAiCompatibleClient {
    client: Client,
    vendor: String,
    api_key: String,
    base_url: String,
    default_model: String,
    retry_delays: Vec<Duration>,
}

impl OpenAiCompatibleClient {
    pub fn new(vendor: &str, api_key: String, base_url: String, default_model: String) -> Self {
        info!("Creating {} client", vendor);
        Self {
            client: Client::new(),
            vendor: vendor.to_string(),
            api_key,
            base_url,
            default_model,
            retry_delays: vec![Duration::from_secs(2), Duration::from_secs(4)],
        }
    }

    pub fn dashscope(api_key: String) -> Self {
        Self::new(
            "dashscope",
            api_key,
            "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            "qwen-turbo".to_string(),
        )
    }

    pub fn modelscope(api_key: String) -> Self {
        Self::new(
            "modelscope",
            api_key,
            "https://api-inference.modelscope.cn/v1".to_string(),
            "Qwen/Qwen2.5-7B-Instruct".to_string(),
        )
    }

    pub fn zhipu(api_key: String) -> Self {
        Self::new(
            "zhipu",
            api_key,
            "https://open.bigmodel.cn/api/paas/v4".to_string(),
            "glm-4-flash".to_string(),
        )
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

    #[must_use]
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    fn build_body(&self, request: &GenerationRequest) -> Value {
        let model = request
            .model_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.default_model);

        let mut messages = Vec::new();
        let system = request.system_memory.trim();
        if !system.is_empty() {
            messages.push(json!({"role": "system", "content": system}));
        }
        for entry in request.window.iter().filter(|e| !e.trim().is_empty()) {
            messages.push(json!({"role": "assistant", "content": entry}));
        }
        messages.push(json!({"role": "user", "content": request.user_message}));

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if let Some(temperature) = request.params.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Value::Object(fields) = &mut body {
            for (key, value) in &request.params.extra {
                fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        body
    }

    async fn try_send(&self, body: &Value) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport_error)?
            .json::<Value>()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        extract_content(&response)
    }
}

fn extract_content(response: &Value) -> Result<String, GenerationError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::InvalidResponse("missing choices[0].message.content".into())
        })
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(request);
        info!("Sending request to {}: model={}", self.vendor, body["model"]);

        let reply = retry_with_backoff(|| self.try_send(&body), &self.retry_delays, is_retryable)
            .await?;

        info!("Received response from {}", self.vendor);
        Ok(reply)
    }

    fn name(&self) -> &str {
        &self.vendor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ExchangeParams;

    #[test]
    fn body_orders_system_window_then_user() {
        let client = OpenAiCompatibleClient::dashscope("key".to_string());
        let request = GenerationRequest {
            system_memory: "Be brief.".to_string(),
            window: vec!["Peer: hi".to_string(), String::new(), "Me: hello".to_string()],
            user_message: "how are you?".to_string(),
            params: ExchangeParams {
                temperature: Some(0.5),
                ..ExchangeParams::default()
            },
            ..GenerationRequest::default()
        };

        let body = client.build_body(&request);
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .map(|m| m.iter().filter_map(|m| m["role"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(roles, vec!["system", "assistant", "assistant", "user"]);
        assert_eq!(body["model"], "qwen-turbo");
        assert_eq!(body["temperature"], json!(0.5));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn extras_are_merged_without_clobbering_known_fields() {
        let client = OpenAiCompatibleClient::modelscope("key".to_string());
        let mut extra = serde_json::Map::new();
        extra.insert("top_p".to_string(), json!(0.9));
        extra.insert("stream".to_string(), json!(true));
        let request = GenerationRequest {
            user_message: "hi".to_string(),
            params: ExchangeParams {
                extra,
                ..ExchangeParams::default()
            },
            ..GenerationRequest::default()
        };

        let body = client.build_body(&request);
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn agent_model_name_overrides_default() {
        let client = OpenAiCompatibleClient::zhipu("key".to_string());
        let request = GenerationRequest {
            model_name: Some("glm-4-plus".to_string()),
            user_message: "hi".to_string(),
            ..GenerationRequest::default()
        };
        assert_eq!(client.build_body(&request)["model"], "glm-4-plus");
    }

    #[test]
    fn content_is_read_from_first_choice() {
        let response = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(extract_content(&response), Ok("hello".to_string()));
        assert!(matches!(
            extract_content(&json!({"choices": []})),
            Err(GenerationError::InvalidResponse(_))
        ));
    }
}
