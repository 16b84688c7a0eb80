mod cli;

use anyhow::Result;
use clap::Parser;
use memscope::config::{validate_config, Config, ConfigLoader};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, load_error) = match ConfigLoader::new(&args.config).load_or_default() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    init_logging(&config, args.log_to_file)?;
    info!("memscope v{}", memscope::VERSION);

    if let Some(e) = load_error {
        warn!("Failed to load config {:?}: {}, using defaults", args.config, e);
    }
    validate_config(&config)?;

    cli::run(args, config).await
}

fn init_logging(config: &Config, to_file: bool) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.file)?;
        builder.with_ansi(false).with_writer(Arc::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}
