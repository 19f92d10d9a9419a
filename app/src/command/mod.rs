//! Static strategy pattern for CLI commands.
//!
//! Each command is its own strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;
use std::time::Duration;

use parley_config::{Config, OpenAiCompatConfig};
use parley_conversation::{Orchestrator, RoundRunner};
use parley_memory::{InMemoryListStore, MemoryWindowStore};
use parley_providers::{GeneratorRegistry, OllamaClient, OpenAiCompatibleClient};
use parley_store::DatabaseStore;
use tracing::info;

mod init;
mod round;
mod serve;
mod version;

pub use init::{InitInput, InitStrategy};
pub use round::{RoundInput, RoundStrategy};
pub use serve::{ServeInput, ServeStrategy};
pub use version::VersionStrategy;

/// Contract shared by every command.
pub trait CommandStrategy: Send + Sync + 'static {
    /// Input accepted by this command.
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Collaborators shared by commands that talk to agents.
struct Components {
    orchestrator: Arc<Orchestrator>,
    rounds: Arc<RoundRunner>,
}

/// Register every configured vendor behind one dispatching generator.
fn build_generators(config: &Config) -> GeneratorRegistry {
    let generation = &config.generation;
    let mut registry = GeneratorRegistry::new(&generation.fallback_vendor)
        .with_timeout(Duration::from_secs(generation.timeout_secs))
        .with_default_temperature(generation.temperature);

    let ollama_config = config.providers.ollama.clone().unwrap_or_default();
    let mut ollama = OllamaClient::new();
    if let Some(base_url) = ollama_config.base_url {
        ollama = ollama.with_base_url(base_url);
    }
    if let Some(model) = ollama_config.default_model {
        ollama = ollama.with_default_model(model);
    }
    registry.register("ollama", Arc::new(ollama));

    type Builder = fn(String) -> OpenAiCompatibleClient;
    let compatible: [(&str, &Option<OpenAiCompatConfig>, Builder); 3] = [
        ("dashscope", &config.providers.dashscope, OpenAiCompatibleClient::dashscope),
        ("modelscope", &config.providers.modelscope, OpenAiCompatibleClient::modelscope),
        ("zhipu", &config.providers.zhipu, OpenAiCompatibleClient::zhipu),
    ];
    for (vendor, section, build) in compatible {
        let Some(section) = section else { continue };
        let mut client = build(section.api_key.clone());
        if let Some(base_url) = &section.base_url {
            client = client.with_base_url(base_url.clone());
        }
        if let Some(model) = &section.default_model {
            client = client.with_default_model(model.clone());
        }
        registry.register(vendor, Arc::new(client));
    }

    info!("Registered generation vendors: {:?}", registry.vendors());
    registry
}

async fn init_components(config: &Config) -> anyhow::Result<Components> {
    info!("Connecting to database");
    let store = Arc::new(DatabaseStore::connect(&config.database.url).await?);

    let memory = MemoryWindowStore::new(Arc::new(InMemoryListStore::new()))
        .with_window_length(config.memory.window_length)?
        .with_ttl(Duration::from_secs(config.memory.ttl_seconds));

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        Arc::new(memory),
        Arc::new(build_generators(config)),
    ));
    let rounds = Arc::new(
        RoundRunner::new(Arc::clone(&orchestrator))
            .with_digest_limit(config.rounds.digest_limit)
            .with_public_room(&config.rounds.public_room)
            .with_max_batch_rounds(config.rounds.max_batch_rounds),
    );

    Ok(Components {
        orchestrator,
        rounds,
    })
}
