mod config;
mod controller;
mod error;
mod lookup;
mod naming;
mod operator;
mod predicates;
mod sanitize;
mod status;
mod validation;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;
use operator::Operator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    Operator::new(config).run().await
}
