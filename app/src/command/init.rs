//! `parley init`: write the config template, or check an existing file.

use parley_config::Config;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct InitInput {
    /// Replace an existing config with the template.
    pub force: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = InitInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let path = Config::config_path()?;
        if !path.exists() || input.force {
            return Config::create_config(input.force);
        }

        // Already initialised: parse it so mistakes surface before `serve`.
        let config = Config::load_from(&path)?;
        info!("Existing config at {} parsed", path.display());
        println!("Config already present at {}", path.display());
        println!("   database:  {}", config.database.url);
        println!("   listen:    {}:{}", config.server.host, config.server.port);
        println!("   vendors:   {}", config.providers.configured().join(", "));
        println!("Rerun with --force to replace it with the template.");
        Ok(())
    }
}
