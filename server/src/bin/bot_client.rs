//! Headless client that joins a running server, wanders around with random
//! inputs and logs what it receives.

use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::packets::{decode_server_packet, encode_client_packet};
use shared::{ClientPacket, ServerPacket, Vec2};
use std::f32::consts::TAU;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep_until, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless test bot", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,

    /// Display name to join with
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Seconds to stay connected
    #[arg(short, long, default_value_t = 30)]
    duration: u64,

    /// Inputs sent per second
    #[arg(long, default_value_t = 10)]
    input_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Bot socket bound to {}", socket.local_addr()?);

    let join = encode_client_packet(&ClientPacket::Join {
        name: args.name.clone(),
    })?;
    socket.send_to(&join, args.server).await?;
    info!("Sent join as \"{}\" to {}", args.name, args.server);

    let mut rng = rand::thread_rng();
    let mut input_interval = interval(Duration::from_millis(
        1000 / u64::from(args.input_rate.max(1)),
    ));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut buf = vec![0u8; 65_536];
    let mut updates = 0u64;
    let mut bytes = 0usize;

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => break,

            _ = input_interval.tick() => {
                let input = ClientPacket::Input {
                    direction: Vec2::from_angle(rng.gen_range(0.0..TAU)),
                    movement: rng.gen_range(0.2..1.0),
                    attacking: rng.gen_bool(0.5),
                };
                socket.send_to(&encode_client_packet(&input)?, args.server).await?;
            }

            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match decode_server_packet(&buf[..len]) {
                    Some(ServerPacket::Update(update)) => {
                        updates += 1;
                        bytes += len;
                        if let Some(player) = &update.player {
                            info!("Player state changed: {:?}", player);
                        }
                        for line in &update.chat {
                            info!("[chat] {}", line.content);
                        }
                        if updates % 30 == 0 {
                            info!(
                                "Tick {}: {} full, {} partial, {} deleted, {} bytes",
                                update.tick,
                                update.full_entities.len(),
                                update.partial_entities.len(),
                                update.deleted_entities.len(),
                                len
                            );
                        }
                        if update.player.as_ref().and_then(|player| player.dead) == Some(true) {
                            info!("Died, rejoining");
                            socket.send_to(&join, args.server).await?;
                        }
                    }
                    Some(ServerPacket::Disconnected { reason }) => {
                        warn!("Disconnected by server: {}", reason);
                        return Ok(());
                    }
                    None => warn!("Received {} undecodable bytes", len),
                }
            }
        }
    }

    socket
        .send_to(&encode_client_packet(&ClientPacket::Leave)?, args.server)
        .await?;
    info!(
        "Left after {} updates ({} bytes, {:.0} bytes/update)",
        updates,
        bytes,
        bytes as f64 / updates.max(1) as f64
    );
    Ok(())
}
