#![forbid(unsafe_code)]
use bundchain::config::load_config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "bundchain node", long_about = None)]
struct Cli {
    /// Node configuration file; defaults apply when it does not exist
    #[arg(long, short = 'c', default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    bundchain::node::init_tracing();

    let config = load_config(&cli.config)?;
    bundchain::node::run(config).await
}
