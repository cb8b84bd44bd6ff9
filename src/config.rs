use std::net::Ipv4Addr;

/// Default TCP port for both listening and dialing peers.
pub const DEFAULT_PORT: u16 = 51511;

/// Immutable record consumed by the node at start-up. Only `host_ip`,
/// `port`, `initial_peer_ip`, and `advertised_ip` affect core behavior;
/// `group_identifier` and `is_server_mode` are read by the CLI/REPL layer
/// only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host_ip: Ipv4Addr,
    pub port: u16,
    pub group_identifier: Option<String>,
    pub initial_peer_ip: Option<Ipv4Addr>,
    pub advertised_ip: Option<Ipv4Addr>,
    pub is_server_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host_ip: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            group_identifier: None,
            initial_peer_ip: None,
            advertised_ip: None,
            is_server_mode: false,
        }
    }
}
