use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use susi::cli::{Cli, execute};
use susi::config::AppConfig;
use susi::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let cfg = AppConfig::load(cli.config_layer())?;
    init_logging(&cfg.log_level, cfg.log_file.as_deref())?;
    info!(
        base_url=%cfg.base_url,
        model=%cfg.model,
        stream=cfg.stream,
        store_root=?cfg.store_root,
        "app config"
    );

    execute(cli.command(), cfg).await
}
