//! Exoscale provider process
//!
//! Speaks one JSON request per line on stdin and answers one JSON response
//! per line on stdout. Logs go to stderr so stdout stays clean for the
//! protocol.

mod protocol;

use anyhow::Context;
use clap::{Parser, Subcommand};
use exoscale_provider::{Provider, ProviderConfig};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "terraform-provider-exoscale")]
#[command(about = "Exoscale infrastructure provider", version)]
struct Cli {
    /// Provider attributes as a JSON file; environment variables fill the rest
    #[arg(short, long, env = "EXOSCALE_PROVIDER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer requests from stdin until it closes (default)
    Serve,
    /// List supported resource and data source types
    Resources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    let config = match &cli.config {
        Some(path) => ProviderConfig::load(path)
            .await
            .with_context(|| format!("loading provider configuration from {}", path.display()))?,
        None => ProviderConfig::from_env().context("resolving provider configuration")?,
    };
    let provider = Provider::configure(config).context("configuring the Exoscale client")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Resources => {
            for kind in provider.resource_types() {
                println!("resource    {}", kind);
            }
            for kind in provider.data_source_types() {
                println!("data source {}", kind);
            }
            Ok(())
        }
        Commands::Serve => serve(&provider).await,
    }
}

async fn serve(provider: &Provider) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    tracing::info!("provider ready");
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = protocol::handle(provider, &line).await;
        let mut encoded = serde_json::to_string(&response).context("encoding response")?;
        encoded.push('\n');
        stdout
            .write_all(encoded.as_bytes())
            .await
            .context("writing stdout")?;
        stdout.flush().await.context("flushing stdout")?;
    }
    tracing::info!("stdin closed, exiting");
    Ok(())
}
