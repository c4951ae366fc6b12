use anyhow::Context;
use clap::Parser;
use station_aggregator::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let input = cli.command.input().display().to_string();
    run(cli)
        .await
        .with_context(|| format!("failed to aggregate {}", input))
}
