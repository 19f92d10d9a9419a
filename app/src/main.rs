#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use parley_config::Config;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{
    CommandStrategy, InitInput, InitStrategy, RoundInput, RoundStrategy, ServeInput,
    ServeStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Multi-agent chat gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the WebSocket gateway and HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run autonomous rounds
    Round {
        /// Comma-separated agent ids
        #[arg(short = 'p', long, value_delimiter = ',', required = true)]
        participants: Vec<i64>,

        /// Id of the first round
        #[arg(long)]
        round_id: Option<i64>,

        /// Number of consecutive rounds
        #[arg(short = 'n', long, default_value_t = 1)]
        rounds: u32,
    },
    /// Initialize configuration
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show version
    Version,
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let config = Config::load()?;
            init_tracing(&config.log_level)?;
            ServeStrategy.execute(ServeInput { config, port }).await
        }
        Commands::Round {
            participants,
            round_id,
            rounds,
        } => {
            let config = Config::load()?;
            init_tracing(&config.log_level)?;
            RoundStrategy
                .execute(RoundInput {
                    config,
                    participants,
                    round_id,
                    rounds,
                })
                .await
        }
        Commands::Init { force } => {
            init_tracing("info")?;
            InitStrategy.execute(InitInput { force }).await
        }
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
