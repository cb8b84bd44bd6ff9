//! Binary wire format: length-prefixed, streamed framing for [`Message`] and
//! [`Chat`] values, in big-endian network order.
//!
//! Serialization is total and by-value — it never streams, callers take the
//! returned bytes and write them atomically. Deserialization instead reads
//! directly off an [`tokio::io::AsyncRead`] one field at a time, so a short
//! read surfaces as a [`ProtocolError::Io`] rather than silently blocking on
//! a buffer that will never fill.

use crate::chat::{Chat, MD5_HASH_LEN, VERIFICATION_CODE_LEN};
use crate::error::ProtocolError;
use crate::msg::Message;
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const TAG_PEER_REQUEST: u8 = 0x01;
const TAG_PEER_LIST: u8 = 0x02;
const TAG_ARCHIVE_REQUEST: u8 = 0x03;
const TAG_ARCHIVE_RESPONSE: u8 = 0x04;
const TAG_NOTIFICATION: u8 = 0x05;

/// Serializes a [`Chat`] as `len(1) || text(len) || verification_code(16) || md5_hash(16)`.
pub fn serialize_chat(chat: &Chat) -> Vec<u8> {
    let mut out = chat.unhashed_prefix();
    out.extend_from_slice(&chat.md5_hash);
    out
}

async fn read_chat<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Chat, ProtocolError> {
    let len = reader.read_u8().await?;
    let mut text_buf = vec![0u8; len as usize];
    reader.read_exact(&mut text_buf).await?;
    let text = String::from_utf8(text_buf)?;

    let mut verification_code = [0u8; VERIFICATION_CODE_LEN];
    reader.read_exact(&mut verification_code).await?;

    let mut md5_hash = [0u8; MD5_HASH_LEN];
    reader.read_exact(&mut md5_hash).await?;

    Chat::new(text, verification_code, md5_hash)
}

/// Serializes a full [`Message`] frame, tag byte included.
pub fn serialize_message(message: &Message) -> Vec<u8> {
    match message {
        Message::PeerRequest => vec![TAG_PEER_REQUEST],
        Message::ArchiveRequest => vec![TAG_ARCHIVE_REQUEST],

        Message::PeerList { ips } => {
            // Bad IPs are dropped before the count is written, so the count
            // on the wire always matches the octets that follow.
            let octets: Vec<[u8; 4]> = ips
                .iter()
                .filter_map(|ip| ip.parse::<Ipv4Addr>().ok())
                .map(|ip| ip.octets())
                .collect();
            let mut out = Vec::with_capacity(1 + 4 + octets.len() * 4);
            out.push(TAG_PEER_LIST);
            out.extend_from_slice(&(octets.len() as u32).to_be_bytes());
            for quad in octets {
                out.extend_from_slice(&quad);
            }
            out
        }

        Message::ArchiveResponse { history } => {
            let chats: Vec<Vec<u8>> = history.iter().map(serialize_chat).collect();
            let total_len: usize = chats.iter().map(Vec::len).sum();
            let mut out = Vec::with_capacity(1 + 4 + total_len);
            out.push(TAG_ARCHIVE_RESPONSE);
            out.extend_from_slice(&(chats.len() as u32).to_be_bytes());
            for chat_bytes in chats {
                out.extend_from_slice(&chat_bytes);
            }
            out
        }

        Message::NotificationMessage { text } => {
            let bytes = text.as_bytes();
            let mut out = Vec::with_capacity(2 + bytes.len());
            out.push(TAG_NOTIFICATION);
            out.push(bytes.len() as u8);
            out.extend_from_slice(bytes);
            out
        }
    }
}

/// Writes a full [`Message`] frame and flushes it.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), ProtocolError> {
    writer.write_all(&serialize_message(message)).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads exactly one [`Message`] frame off the stream.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
    let tag = reader.read_u8().await?;
    match tag {
        TAG_PEER_REQUEST => Ok(Message::PeerRequest),
        TAG_ARCHIVE_REQUEST => Ok(Message::ArchiveRequest),

        TAG_PEER_LIST => {
            let count = reader.read_u32().await?;
            let mut ips = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut octets = [0u8; 4];
                reader.read_exact(&mut octets).await?;
                ips.push(Ipv4Addr::from(octets).to_string());
            }
            Ok(Message::PeerList { ips })
        }

        TAG_ARCHIVE_RESPONSE => {
            let count = reader.read_u32().await?;
            let mut history = Vec::with_capacity(count as usize);
            for _ in 0..count {
                history.push(read_chat(reader).await?);
            }
            Ok(Message::ArchiveResponse { history })
        }

        TAG_NOTIFICATION => {
            let len = reader.read_u8().await?;
            let mut buf = vec![0u8; len as usize];
            reader.read_exact(&mut buf).await?;
            let text = String::from_utf8(buf)?;
            Ok(Message::NotificationMessage { text })
        }

        other => Err(ProtocolError::UnknownTag(other)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn sample_chat() -> Chat {
        Chat::new("hello".into(), [7; VERIFICATION_CODE_LEN], [0; MD5_HASH_LEN]).unwrap()
    }

    #[test]
    fn chat_wire_size_is_33_plus_text_len() {
        let chat = sample_chat();
        assert_eq!(serialize_chat(&chat).len(), 33 + chat.text.len());
    }

    #[tokio::test]
    async fn chat_round_trips() {
        let chat = sample_chat();
        let bytes = serialize_chat(&chat);
        let mut cursor = std::io::Cursor::new(bytes);
        let decoded = read_chat(&mut cursor).await.unwrap();
        assert_eq!(decoded, chat);
    }

    #[tokio::test]
    async fn peer_request_round_trips() {
        let bytes = serialize_message(&Message::PeerRequest);
        let mut cursor = std::io::Cursor::new(bytes);
        assert_eq!(read_message(&mut cursor).await.unwrap(), Message::PeerRequest);
    }

    #[tokio::test]
    async fn archive_request_round_trips() {
        let bytes = serialize_message(&Message::ArchiveRequest);
        let mut cursor = std::io::Cursor::new(bytes);
        assert_eq!(
            read_message(&mut cursor).await.unwrap(),
            Message::ArchiveRequest
        );
    }

    #[tokio::test]
    async fn peer_list_round_trips() {
        let msg = Message::PeerList {
            ips: vec!["10.0.0.1".into(), "192.168.1.2".into()],
        };
        let bytes = serialize_message(&msg);
        let mut cursor = std::io::Cursor::new(bytes);
        assert_eq!(read_message(&mut cursor).await.unwrap(), msg);
    }

    #[test]
    fn peer_list_skips_unparseable_ips_and_count_matches() {
        let msg = Message::PeerList {
            ips: vec!["10.0.0.1".into(), "not-an-ip".into(), "8.8.8.8".into()],
        };
        let bytes = serialize_message(&msg);
        // tag(1) + count(4) + 2 * 4 octets
        assert_eq!(bytes.len(), 1 + 4 + 2 * 4);
        assert_eq!(&bytes[1..5], &2u32.to_be_bytes());
    }

    #[tokio::test]
    async fn archive_response_round_trips() {
        let msg = Message::ArchiveResponse {
            history: vec![sample_chat(), sample_chat()],
        };
        let bytes = serialize_message(&msg);
        let mut cursor = std::io::Cursor::new(bytes);
        assert_eq!(read_message(&mut cursor).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn notification_round_trips() {
        let msg = Message::NotificationMessage {
            text: "hi there".into(),
        };
        let bytes = serialize_message(&msg);
        let mut cursor = std::io::Cursor::new(bytes);
        assert_eq!(read_message(&mut cursor).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn unknown_tag_is_protocol_error() {
        let mut cursor = std::io::Cursor::new(vec![0xffu8]);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::UnknownTag(0xff))
        ));
    }

    #[tokio::test]
    async fn short_read_is_io_error() {
        let mut cursor = std::io::Cursor::new(vec![TAG_NOTIFICATION, 5, b'h', b'i']);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::Io(_))
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_is_protocol_error() {
        let mut bytes = vec![TAG_NOTIFICATION, 2];
        bytes.extend_from_slice(&[0xff, 0xfe]);
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[tokio::test]
    async fn write_message_writes_exactly_the_serialized_frame() {
        let msg = Message::NotificationMessage {
            text: "hi".into(),
        };
        let expected = serialize_message(&msg);
        let mut mock = tokio_test::io::Builder::new().write(&expected).build();
        write_message(&mut mock, &msg).await.unwrap();
    }

    fn arb_ipv4_string() -> impl Strategy<Value = String> {
        any::<[u8; 4]>().prop_map(|octets| Ipv4Addr::from(octets).to_string())
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            Just(Message::PeerRequest),
            Just(Message::ArchiveRequest),
            proptest::collection::vec(arb_ipv4_string(), 0..5)
                .prop_map(|ips| Message::PeerList { ips }),
            "[ -~]{0,255}".prop_map(|text| Message::NotificationMessage { text }),
        ]
    }

    proptest! {
        #[test]
        fn every_message_variant_round_trips(msg in arb_message()) {
            let bytes = serialize_message(&msg);
            let mut cursor = std::io::Cursor::new(bytes);
            let decoded = tokio_test::block_on(read_message(&mut cursor)).unwrap();
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn chat_wire_size_matches_the_fixed_overhead(text in "[ -~]{1,255}") {
            let chat = Chat::new(text.clone(), [3; VERIFICATION_CODE_LEN], [0; MD5_HASH_LEN]).unwrap();
            prop_assert_eq!(serialize_chat(&chat).len(), 33 + text.len());
        }
    }
}
