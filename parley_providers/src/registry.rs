use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::{GenerationError, GenerationRequest, TextGenerator};
use tracing::{debug, warn};

/// Canonical registry key for a vendor selector.
///
/// Case, surrounding whitespace, `_` and `-` are ignored; `qwen` and
/// `dash_scope` both name DashScope.
#[must_use]
pub fn normalize_vendor(model_type: &str) -> String {
    let key: String = model_type
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    match key.as_str() {
        "qwen" | "dashscope" => "dashscope".to_string(),
        _ => key,
    }
}

/// Dispatches generation to a vendor by the request's `model_type`.
///
/// Unknown or missing vendors go to the fallback. Every call is bounded by
/// the configured timeout.
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn TextGenerator>>,
    fallback: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl GeneratorRegistry {
    pub fn new(fallback: &str) -> Self {
        Self {
            generators: HashMap::new(),
            fallback: normalize_vendor(fallback),
            timeout: Duration::from_secs(60),
            default_temperature: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Temperature applied when a request does not carry one.
    #[must_use]
    pub const fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    pub fn register(&mut self, vendor: &str, generator: Arc<dyn TextGenerator>) {
        let key = normalize_vendor(vendor);
        debug!("Registered generator {} as {}", generator.name(), key);
        self.generators.insert(key, generator);
    }

    /// Registered vendor keys, sorted.
    pub fn vendors(&self) -> Vec<&str> {
        let mut vendors: Vec<&str> = self.generators.keys().map(String::as_str).collect();
        vendors.sort_unstable();
        vendors
    }

    pub fn resolve(
        &self,
        model_type: Option<&str>,
    ) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        if let Some(generator) = model_type
            .map(normalize_vendor)
            .and_then(|key| self.generators.get(&key))
        {
            return Ok(Arc::clone(generator));
        }
        self.generators
            .get(&self.fallback)
            .cloned()
            .ok_or_else(|| GenerationError::Unsupported(model_type.unwrap_or("<none>").to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeneratorRegistry {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let generator = self.resolve(request.model_type.as_deref())?;

        let mut request = request.clone();
        if request.params.temperature.is_none() {
            request.params.temperature = self.default_temperature;
        }

        debug!("Dispatching generation to {}", generator.name());
        match tokio::time::timeout(self.timeout, generator.generate(&request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", generator.name(), self.timeout);
                Err(GenerationError::Timeout(self.timeout))
            }
        }
    }

    fn name(&self) -> &'static str {
        "registry"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::testing::ScriptedGenerator;

    fn named(reply: &'static str) -> Arc<ScriptedGenerator> {
        Arc::new(ScriptedGenerator::new(reply, move |_| Ok(reply.to_string())))
    }

    fn request(model_type: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            model_type: model_type.map(str::to_string),
            user_message: "hi".to_string(),
            ..GenerationRequest::default()
        }
    }

    #[test]
    fn vendor_aliases_normalise() {
        assert_eq!(normalize_vendor("QWEN"), "dashscope");
        assert_eq!(normalize_vendor(" dash_scope "), "dashscope");
        assert_eq!(normalize_vendor("DashScope"), "dashscope");
        assert_eq!(normalize_vendor("Model-Scope"), "modelscope");
        assert_eq!(normalize_vendor("OLLAMA"), "ollama");
    }

    #[tokio::test]
    async fn dispatches_by_model_type() {
        let mut registry = GeneratorRegistry::new("ollama");
        registry.register("ollama", named("from ollama"));
        registry.register("dashscope", named("from dashscope"));

        assert_eq!(registry.generate(&request(Some("qwen"))).await, Ok("from dashscope".into()));
        assert_eq!(registry.generate(&request(Some("OLLAMA"))).await, Ok("from ollama".into()));
        assert_eq!(registry.vendors(), vec!["dashscope", "ollama"]);
    }

    #[tokio::test]
    async fn unknown_or_missing_vendor_uses_fallback() {
        let mut registry = GeneratorRegistry::new("ollama");
        registry.register("ollama", named("from ollama"));

        assert_eq!(registry.generate(&request(Some("openai"))).await, Ok("from ollama".into()));
        assert_eq!(registry.generate(&request(None)).await, Ok("from ollama".into()));
    }

    #[tokio::test]
    async fn missing_fallback_is_unsupported() {
        let registry = GeneratorRegistry::new("ollama");
        assert!(matches!(
            registry.generate(&request(Some("zhipu"))).await,
            Err(GenerationError::Unsupported(vendor)) if vendor == "zhipu"
        ));
    }

    #[tokio::test]
    async fn default_temperature_fills_missing_value() {
        let generator = named("ok");
        let mut registry = GeneratorRegistry::new("ollama").with_default_temperature(0.5);
        registry.register("ollama", generator.clone());

        registry.generate(&request(None)).await.unwrap();
        let seen = generator.requests().await;
        assert_eq!(seen[0].params.temperature, Some(0.5));
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn generate(&self, _: &GenerationRequest) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn slow_generator_times_out() {
        let timeout = Duration::from_millis(20);
        let mut registry = GeneratorRegistry::new("ollama").with_timeout(timeout);
        registry.register("ollama", Arc::new(Stalled));

        assert_eq!(
            registry.generate(&request(None)).await,
            Err(GenerationError::Timeout(timeout))
        );
    }
}
