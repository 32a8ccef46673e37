//! Configuration for the tombola server binary.
//!
//! Everything is a command-line flag with a sensible default, so the
//! server runs with zero arguments in a local setup.

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tombola_core::server::ServerConfig;

/// TCP bet intake server for the tombola lottery.
#[derive(Parser, Debug)]
#[command(name = "tombola-server")]
#[command(about = "Accepts agency bet submissions and discloses winners")]
pub struct Config {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "12345")]
    pub port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Number of agencies expected this run
    #[arg(short, long, default_value = "5")]
    pub agencies: u8,

    /// The drawn winning number bets are matched against
    #[arg(short, long, default_value = "7574")]
    pub winning_number: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Skip the metrics summary on exit
    #[arg(long)]
    pub no_metrics: bool,
}

impl Config {
    /// Validate and convert into the core server configuration.
    pub fn server_config(&self) -> Result<ServerConfig, String> {
        if self.agencies == 0 {
            return Err("at least one agency is required".to_string());
        }
        Ok(ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            agencies: self.agencies,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 12345,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            agencies: 5,
            winning_number: "7574".to_string(),
            debug: false,
            no_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_a_server_config() {
        let config = Config::default();
        let server = config.server_config().unwrap();
        assert_eq!(server.bind_addr.port(), 12345);
        assert_eq!(server.agencies, 5);
    }

    #[test]
    fn test_zero_agencies_rejected() {
        let config = Config {
            agencies: 0,
            ..Config::default()
        };
        assert!(config.server_config().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config =
            Config::parse_from(["tombola-server", "--port", "0", "--agencies", "3", "-w", "42"]);
        assert_eq!(config.agencies, 3);
        assert_eq!(config.winning_number, "42");
        assert_eq!(config.server_config().unwrap().bind_addr.port(), 0);
    }
}
