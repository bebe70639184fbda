use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::game::WorldConfig;
use server::network::Server;

/// Parses the command line, then runs the server until it stops or Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::parse();
    info!(
        "Starting server on {} at {} Hz (max {} connections)",
        config.address(),
        config.tick_rate,
        config.max_clients
    );

    let mut server = Server::new(config, WorldConfig::default()).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
