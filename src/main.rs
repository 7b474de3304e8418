use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burrow::server::{Daemon, ServerConfig};
use burrow::wizard;

#[derive(Parser)]
#[command(name = "burrow", about = "Encrypted in-memory cache server", version)]
struct Args {
  #[command(subcommand)]
  command: Commands,

  #[arg(long, global = true, default_value = "info")]
  log_level: String,
}

#[derive(Subcommand)]
enum Commands {
  /// Create a new server configuration
  Init {
    /// Take every pool option from the defaults
    #[arg(short, long)]
    default: bool,

    /// Where to write the configuration
    #[arg(short, long, default_value = "config.json")]
    output: String,
  },
  /// Start the cache server
  Start {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,
  },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| args.log_level.clone().into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  match args.command {
    Commands::Init { default, output } => wizard::run(default, output),
    Commands::Start { config } => {
      let config = ServerConfig::from_file(&config)
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
      Daemon::new(config).run().await
    }
  }
}
