//! Runs autonomous rounds from the command line and prints their reports.

use parley_config::Config;
use parley_core::monotonic_millis;
use tracing::info;

use super::init_components;

#[derive(Debug, Clone)]
pub struct RoundInput {
    pub config: Config,
    pub participants: Vec<i64>,
    /// First round id; the current epoch millisecond when absent.
    pub round_id: Option<i64>,
    pub rounds: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RoundStrategy;

impl super::CommandStrategy for RoundStrategy {
    type Input = RoundInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        if input.participants.is_empty() {
            anyhow::bail!("No participants given. Use --participants 1,2,3");
        }
        let components = init_components(&input.config).await?;
        let start = input.round_id.unwrap_or_else(monotonic_millis);

        info!(
            "Running {} round(s) from {} with participants {:?}",
            input.rounds.max(1),
            start,
            input.participants
        );
        let reports = components
            .rounds
            .run_rounds(&input.participants, start, input.rounds)
            .await?;

        println!("{}", serde_json::to_string_pretty(&reports)?);
        Ok(())
    }
}
