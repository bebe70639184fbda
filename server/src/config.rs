use clap::Parser;
use std::time::Duration;

/// Server configuration, parsed from the command line.
///
/// Only `tick_rate` shapes the simulation itself; the address, capacity and
/// timeout flags belong to the UDP transport, and `admin_secret` is carried
/// for the session layer.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=240))]
    pub tick_rate: u32,

    /// Shared secret for privileged chat commands
    #[arg(long, default_value = "", hide_default_value = true)]
    pub admin_secret: String,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value_t = 64)]
    pub max_clients: usize,

    /// Seconds of silence before a connection is dropped
    #[arg(long, default_value_t = 10)]
    pub client_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: 30,
            admin_secret: String::new(),
            max_clients: 64,
            client_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between two ticks, `1000 / tick_rate` milliseconds.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate.max(1)))
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}
