//! Minegrid Server Binary
//!
//! Loads configuration, opens storage and serves the Mines game API.

use clap::Parser;
use minegrid::api::{build_engine, ApiServer};
use minegrid::config::MinegridConfig;
use minegrid::storage::Storage;

#[derive(Parser, Debug)]
#[command(name = "minegrid")]
#[command(about = "Provably fair Mines game server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// API server host (overrides config file)
    #[arg(long)]
    host: Option<String>,

    /// API server port (overrides config file)
    #[arg(long)]
    port: Option<u16>,

    /// Database directory (overrides config file)
    #[arg(long)]
    db_path: Option<String>,

    /// Allowed CORS origins, comma-separated, * for all (overrides config file)
    #[arg(long)]
    cors_origins: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MinegridConfig::load_from_file(path)?,
        None => MinegridConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db_path) = args.db_path {
        config.storage.data_directory = db_path;
    }
    if let Some(origins) = args.cors_origins {
        config.server.allowed_origins =
            origins.split(',').map(|s| s.trim().to_string()).collect();
    }
    config.validate()?;

    let storage = Storage::open(&config.storage.data_directory)?;
    let (engine, ledger, _store) = build_engine(storage, config.game);

    ApiServer::new(config.server, engine, ledger).run().await
}
