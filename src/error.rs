use thiserror::Error;

/// Errors surfaced while framing or parsing a [`crate::msg::Message`] or
/// [`crate::chat::Chat`] on the wire.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unknown message type tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("chat text is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("text is {0} bytes, which does not fit in a single length byte")]
    TextTooLong(usize),

    #[error("connection closed while reading a frame")]
    Io(#[from] std::io::Error),
}

/// Errors produced while validating or replacing chain history.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("chat at index {0} does not hash under the leading-zero target")]
    MissingLeadingZeros(usize),

    #[error("chat at index {0} hash does not match the recomputed window digest")]
    HashMismatch(usize),

    #[error("incoming history has length {incoming}, which is not longer than the current length {current}")]
    NotLonger { incoming: usize, current: usize },
}

/// Errors surfaced while building a [`crate::config::Config`] from parsed CLI
/// flags. IPv4 flags are typed as `Ipv4Addr` in [`crate::cli::Args`], so
/// clap itself rejects a malformed address before this type is ever built.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("--id is required unless --server is given")]
    MissingGroupIdentifier,
}
