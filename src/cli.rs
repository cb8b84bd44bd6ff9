//! Command-line surface. Only `main.rs` touches this module; the library
//! core never parses flags directly, it only consumes a [`Config`].

use crate::config::{Config, DEFAULT_PORT};
use crate::error::ConfigError;
use clap::Parser;
use std::net::Ipv4Addr;

#[derive(Parser, Debug)]
#[command(name = "p2p-chat-chain")]
#[command(about = "A decentralized peer-to-peer chat node secured by a proof-of-work chain")]
pub struct Args {
    /// Address to bind the listener to.
    #[arg(long = "host-ip", default_value = "0.0.0.0")]
    pub host_ip: Ipv4Addr,

    /// Port to bind the listener to.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Identifier for the interactive chat session. Required unless `--server`.
    #[arg(long)]
    pub id: Option<String>,

    /// An optional seed peer to dial on start-up.
    #[arg(long)]
    pub peer: Option<Ipv4Addr>,

    /// Self-IP hint, excluded from outbound dialing and the peer table.
    #[arg(long = "advertised-ip")]
    pub advertised_ip: Option<Ipv4Addr>,

    /// Run headless: suppress the interactive prompt, log to stdout.
    #[arg(long)]
    pub server: bool,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, ConfigError> {
        if args.id.is_none() && !args.server {
            return Err(ConfigError::MissingGroupIdentifier);
        }
        Ok(Config {
            host_ip: args.host_ip,
            port: args.port,
            group_identifier: args.id,
            initial_peer_ip: args.peer,
            advertised_ip: args.advertised_ip,
            is_server_mode: args.server,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn requires_id_unless_server() {
        let args = Args {
            host_ip: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            id: None,
            peer: None,
            advertised_ip: None,
            server: false,
        };
        assert!(matches!(
            Config::try_from(args),
            Err(ConfigError::MissingGroupIdentifier)
        ));
    }

    #[test]
    fn server_mode_does_not_require_id() {
        let args = Args {
            host_ip: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            id: None,
            peer: None,
            advertised_ip: None,
            server: true,
        };
        assert!(Config::try_from(args).is_ok());
    }
}
