use clap::Parser;
use tracing_subscriber::EnvFilter;

use jobwatch::config::{Cli, Command};
use jobwatch::runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobwatch=info"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let options = cli.run_options();
    match cli.resolved_command() {
        Command::Run => {
            runner::run_once(&options).await?;
        }
        Command::Watch { interval } => {
            runner::watch(&options, interval).await?;
        }
    }

    Ok(())
}
