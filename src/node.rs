//! P2P orchestration: connection acceptance, outbound dialing, the
//! per-connection read loop, periodic peer discovery, and the best-effort
//! majority-confirmation broadcast after mining.

use crate::chain::Blockchain;
use crate::chat::Chat;
use crate::codec;
use crate::config::Config;
use crate::error::ProtocolError;
use crate::msg::Message;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};
use tokio::time;

const PEER_DISCOVERY_INTERVAL: Duration = Duration::from_secs(5);
const CONFIRMATION_ATTEMPTS: u32 = 10;
const BROADCAST_SETTLE_DELAY: Duration = Duration::from_secs(1);
const ARCHIVE_REQUEST_SETTLE_DELAY: Duration = Duration::from_secs(2);
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// A live outbound connection to a peer. The write-half is owned here and
/// guarded by its own mutex so that broadcast traffic and direct replies to
/// the same peer never interleave frames on the wire.
struct PeerHandle {
    writer: Mutex<OwnedWriteHalf>,
}

/// The number of peers that must confirm a mined chat to count as a
/// majority: `floor(total_peers / 2) + 1`.
fn required_majority(total_peers: usize) -> usize {
    total_peers / 2 + 1
}

/// How many recorded archive responses contain `chat`.
fn count_confirmations(chat: &Chat, archive_responses: &HashMap<String, Vec<Chat>>) -> usize {
    archive_responses
        .values()
        .filter(|history| history.contains(chat))
        .count()
}

/// The dotted-quad IPv4 string for a socket address, or `None` if it is IPv6.
fn ipv4_of(addr: &SocketAddr) -> Option<String> {
    match addr.ip() {
        IpAddr::V4(v4) => Some(v4.to_string()),
        IpAddr::V6(_) => None,
    }
}

/// A full node on the network: its identity, its peer table, and its local
/// chain. Always handled behind an `Arc` so spawned tasks can share it.
pub struct Node {
    host_ip: Ipv4Addr,
    port: u16,
    advertised_ip: Option<Ipv4Addr>,
    initial_peer_ip: Option<Ipv4Addr>,
    peers: RwLock<HashMap<String, Arc<PeerHandle>>>,
    archive_responses: Mutex<HashMap<String, Vec<Chat>>>,
    chain: Arc<Blockchain>,
}

impl Node {
    pub fn new(config: &Config, chain: Arc<Blockchain>) -> Arc<Self> {
        Arc::new(Node {
            host_ip: config.host_ip,
            port: config.port,
            advertised_ip: config.advertised_ip,
            initial_peer_ip: config.initial_peer_ip,
            peers: RwLock::new(HashMap::new()),
            archive_responses: Mutex::new(HashMap::new()),
            chain,
        })
    }

    /// Binds the listener, then spawns the listener loop, the periodic
    /// peer-discovery task, and (if configured) an initial-peer dial task.
    /// Returns once the listener is bound; everything else runs in the
    /// background.
    pub async fn start(self: &Arc<Self>) -> std::io::Result<()> {
        let listener = TcpListener::bind((self.host_ip, self.port)).await?;
        tracing::info!(host_ip = %self.host_ip, port = self.port, "node listening");

        let listening = self.clone();
        tokio::spawn(async move { listening.run_listener(listener).await });

        let discovering = self.clone();
        tokio::spawn(async move { discovering.run_peer_discovery().await });

        if let Some(peer_ip) = self.initial_peer_ip {
            let dialing = self.clone();
            tokio::spawn(async move { dialing.connect_to_peer(peer_ip).await });
        }

        Ok(())
    }

    async fn run_listener(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => match ipv4_of(&addr) {
                    Some(peer_ip) => {
                        let node = self.clone();
                        tokio::spawn(async move { node.handle_connection(stream, peer_ip, None).await });
                    }
                    None => tracing::warn!(%addr, "rejecting non-IPv4 peer"),
                },
                Err(e) => tracing::error!(error = %e, "accept failed"),
            }
        }
    }

    /// Dials `ip`, sends an `ArchiveRequest`, then enters the same
    /// per-connection handler inbound connections use. Deduplicates against
    /// the peer table and excludes our own addresses.
    pub async fn connect_to_peer(self: Arc<Self>, ip: Ipv4Addr) {
        let ip_string = ip.to_string();
        {
            let peers = self.peers.read().await;
            if ip == self.host_ip || Some(ip) == self.advertised_ip || peers.contains_key(&ip_string) {
                return;
            }
        }

        let addr = SocketAddr::new(IpAddr::V4(ip), self.port);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                self.handle_connection(stream, ip_string, Some(Message::ArchiveRequest))
                    .await;
            }
            Err(e) => tracing::warn!(peer = %ip, error = %e, "failed to dial peer"),
        }
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_ip: String,
        initial: Option<Message>,
    ) {
        let (mut read_half, write_half) = stream.into_split();
        let handle = Arc::new(PeerHandle {
            writer: Mutex::new(write_half),
        });
        self.peers.write().await.insert(peer_ip.clone(), handle.clone());

        if let Some(message) = initial {
            if let Err(e) = Self::send_via(&handle, &message).await {
                tracing::warn!(peer = %peer_ip, error = %e, "failed to send initial message");
                self.evict_if_current(&peer_ip, &handle).await;
                return;
            }
        }

        loop {
            match codec::read_message(&mut read_half).await {
                Ok(message) => {
                    if let Err(e) = self.dispatch(&peer_ip, &handle, message).await {
                        tracing::warn!(peer = %peer_ip, error = %e, "error replying to peer");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(peer = %peer_ip, error = %e, "connection error");
                    break;
                }
            }
        }

        self.evict_if_current(&peer_ip, &handle).await;
    }

    /// Removes `peer_ip`'s table entry only if it still points at `handle`.
    /// A reconnect from the same IP replaces the entry before the old
    /// connection's handler notices it died, so a stale handler must never
    /// evict the newer, live one.
    async fn evict_if_current(&self, peer_ip: &str, handle: &Arc<PeerHandle>) {
        let mut peers = self.peers.write().await;
        if peers.get(peer_ip).is_some_and(|stored| Arc::ptr_eq(stored, handle)) {
            peers.remove(peer_ip);
        }
    }

    async fn dispatch(
        self: &Arc<Self>,
        peer_ip: &str,
        handle: &Arc<PeerHandle>,
        message: Message,
    ) -> Result<(), ProtocolError> {
        match message {
            Message::PeerRequest => {
                let ips = self.peers.read().await.keys().cloned().collect();
                Self::send_via(handle, &Message::PeerList { ips }).await
            }

            Message::PeerList { ips } => {
                for ip_string in ips {
                    if let Ok(ip) = ip_string.parse::<Ipv4Addr>() {
                        let node = self.clone();
                        tokio::spawn(async move { node.connect_to_peer(ip).await });
                    }
                }
                Ok(())
            }

            Message::ArchiveRequest => {
                let history = self.chain.get_chain().await;
                Self::send_via(handle, &Message::ArchiveResponse { history }).await
            }

            Message::ArchiveResponse { history } => {
                self.chain.replace_chain(history.clone()).await;
                self.archive_responses
                    .lock()
                    .await
                    .insert(peer_ip.to_string(), history);
                Ok(())
            }

            Message::NotificationMessage { .. } => Ok(()),
        }
    }

    async fn send_via(handle: &PeerHandle, message: &Message) -> Result<(), ProtocolError> {
        let mut writer = handle.writer.lock().await;
        codec::write_message(&mut *writer, message).await
    }

    async fn peer_snapshot(&self) -> Vec<(String, Arc<PeerHandle>)> {
        self.peers
            .read()
            .await
            .iter()
            .map(|(ip, handle)| (ip.clone(), handle.clone()))
            .collect()
    }

    async fn broadcast(&self, message: &Message) {
        for (peer_ip, handle) in self.peer_snapshot().await {
            if let Err(e) = Self::send_via(&handle, message).await {
                tracing::warn!(peer = %peer_ip, error = %e, "broadcast send failed");
            }
        }
    }

    /// Every [`PEER_DISCOVERY_INTERVAL`], broadcasts a `PeerRequest` to every
    /// known peer. Per-peer send errors are logged and never abort this task.
    async fn run_peer_discovery(self: Arc<Self>) {
        let mut ticker = time::interval(PEER_DISCOVERY_INTERVAL);
        loop {
            ticker.tick().await;
            self.broadcast(&Message::PeerRequest).await;
        }
    }

    /// Mines `text` into a new chat, then best-effort broadcasts the
    /// updated history and polls peers for majority confirmation.
    pub async fn create_and_broadcast_chat(self: &Arc<Self>, text: String) {
        let chat = self.chain.mine_chat(text).await;
        tracing::info!(text = %chat.text, "mined a new chat");

        let history = self.chain.get_chain().await;

        for attempt in 1..=CONFIRMATION_ATTEMPTS {
            self.broadcast(&Message::ArchiveResponse {
                history: history.clone(),
            })
            .await;
            time::sleep(BROADCAST_SETTLE_DELAY).await;

            self.broadcast(&Message::ArchiveRequest).await;
            time::sleep(ARCHIVE_REQUEST_SETTLE_DELAY).await;

            let total_peers = self.peers.read().await.len();
            let confirmations = {
                let archive_responses = self.archive_responses.lock().await;
                count_confirmations(&chat, &archive_responses)
            };

            if confirmations >= required_majority(total_peers) {
                tracing::info!(confirmations, total_peers, attempt, "majority confirmed");
                return;
            }

            time::sleep(RETRY_DELAY).await;
        }

        tracing::warn!("failed to reach majority confirmation after all attempts");
    }
}
