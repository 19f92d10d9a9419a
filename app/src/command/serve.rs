//! Runs the WebSocket gateway and the HTTP API.

use parley_config::Config;
use parley_gateway::{AppState, ServerConfig};
use tracing::info;

use super::init_components;

#[derive(Debug, Clone)]
pub struct ServeInput {
    pub config: Config,
    /// Overrides `server.port` from the config file.
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy)]
pub struct ServeStrategy;

impl super::CommandStrategy for ServeStrategy {
    type Input = ServeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = input.config;
        let components = init_components(&config).await?;

        let server = ServerConfig {
            host: config.server.host.clone(),
            port: input.port.unwrap_or(config.server.port),
            outbound_queue: config.server.outbound_queue,
        };
        let state = AppState::new(
            components.orchestrator,
            components.rounds,
            server.outbound_queue,
        )
        .with_public_room(&config.rounds.public_room);

        info!("Serving on {}:{}", server.host, server.port);
        parley_gateway::serve(&server, state).await
    }
}
