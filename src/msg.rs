use crate::chat::Chat;
use std::fmt::{self, Debug, Formatter};

/// The wire protocol: every message a node sends or accepts on a connection.
///
/// Framing and byte layout live in [`crate::codec`]; this enum only carries
/// the typed payload.
#[derive(Clone, PartialEq, Eq)]
pub enum Message {
    /// Ask a peer for the IPs it currently knows about.
    PeerRequest,

    /// A peer's answer to [`Message::PeerRequest`], or an unsolicited
    /// announcement of newly discovered IPs.
    PeerList { ips: Vec<String> },

    /// Ask a peer for its full chain history.
    ArchiveRequest,

    /// A peer's answer to [`Message::ArchiveRequest`], or an unsolicited
    /// announcement that a new chat was mined.
    ArchiveResponse { history: Vec<Chat> },

    /// An informational line accepted by a peer but never acted upon.
    NotificationMessage { text: String },
}

impl Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Message::PeerRequest => write!(f, "PeerRequest"),
            Message::PeerList { ips } => write!(f, "PeerList({} ips)", ips.len()),
            Message::ArchiveRequest => write!(f, "ArchiveRequest"),
            Message::ArchiveResponse { history } => {
                write!(f, "ArchiveResponse({} chats)", history.len())
            }
            Message::NotificationMessage { text } => write!(f, "NotificationMessage({text:?})"),
        }
    }
}
