mod server;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use agora_core::{load_config, logging};
use agora_presence::Coordinator;

use server::AgoraServer;

#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(about = "Agora live conference presence server", long_about = None)]
struct Args {
    /// Path to a YAML config file
    #[arg(long, short = 'c', env = "AGORA_CONFIG_PATH")]
    config: Option<String>,

    /// HTTP port, overriding the config file
    #[arg(long, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.http_port = port;
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Agora server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Build the coordinator; all presence state lives in memory
    let coordinator = Coordinator::new(config.conference.clone());
    info!(
        default_room_capacity = config.conference.default_room_capacity,
        outbound_buffer = config.conference.outbound_buffer,
        "Presence coordinator initialized"
    );

    // 4. Serve until a shutdown signal arrives
    AgoraServer::new(config, coordinator).run().await?;

    info!("Agora server stopped");
    Ok(())
}
