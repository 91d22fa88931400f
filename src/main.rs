mod cli;

use std::sync::Arc;

use clap::Parser;

use pagechat_settings::{store_path, KvStore};
use pagechat_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let store = Arc::new(KvStore::open(store_path()));
    let config = if store.settings().debug_mode {
        TelemetryConfig::debug()
    } else {
        TelemetryConfig::default()
    };
    init_telemetry(config);

    cli::run(args, store).await
}
