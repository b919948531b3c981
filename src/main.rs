mod cli;

use anyhow::Result;
use clap::Parser;

use cli::Args;
use entity_posterior::config::ScoringConfig;
use entity_posterior::driver;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("entity_posterior=info".parse()?),
        )
        .init();

    let config: ScoringConfig = Args::parse().into();
    driver::run(&config)
}
