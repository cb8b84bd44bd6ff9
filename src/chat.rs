use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Maximum byte length of a [`Chat`]'s text, dictated by the one-byte length
/// prefix used on the wire (see [`crate::codec`]).
pub const TEXT_MAX_LEN: usize = 255;

/// Length in bytes of the mined nonce and of the MD5 digest.
pub const VERIFICATION_CODE_LEN: usize = 16;
pub const MD5_HASH_LEN: usize = 16;

/// Number of leading zero bytes a valid [`Chat::md5_hash`] must start with.
pub const LEADING_ZERO_BYTES: usize = 2;

/// Number of chats (including the one being hashed) folded into the rolling
/// MD5 window. See [`crate::chain`] for how this window is assembled.
pub const VALIDATION_WINDOW: usize = 20;

/// One unit of text on the chain, plus the nonce that made it mine-able and
/// the digest that nonce produced.
///
/// A `Chat` is only ever constructed by [`crate::chain::Blockchain::mine_chat`]
/// or by successful wire deserialization; it is never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub text: String,
    pub verification_code: [u8; VERIFICATION_CODE_LEN],
    pub md5_hash: [u8; MD5_HASH_LEN],
}

impl Chat {
    /// Builds a chat from its three fields, rejecting text that would not
    /// survive a round trip through the one-byte length prefix.
    pub fn new(
        text: String,
        verification_code: [u8; VERIFICATION_CODE_LEN],
        md5_hash: [u8; MD5_HASH_LEN],
    ) -> Result<Self, ProtocolError> {
        if text.len() > TEXT_MAX_LEN || text.is_empty() {
            return Err(ProtocolError::TextTooLong(text.len()));
        }
        Ok(Chat {
            text,
            verification_code,
            md5_hash,
        })
    }

    /// The bytes hashed to produce [`Chat::md5_hash`]: the one-byte length,
    /// the text, and the verification code — everything but the hash itself.
    pub fn unhashed_prefix(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.text.len() + VERIFICATION_CODE_LEN);
        out.push(self.text.len() as u8);
        out.extend_from_slice(self.text.as_bytes());
        out.extend_from_slice(&self.verification_code);
        out
    }

    /// Whether [`Chat::md5_hash`] starts with [`LEADING_ZERO_BYTES`] zero bytes.
    pub fn meets_target(&self) -> bool {
        self.md5_hash[..LEADING_ZERO_BYTES].iter().all(|b| *b == 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_oversized_text() {
        let text = "a".repeat(TEXT_MAX_LEN + 1);
        assert!(Chat::new(text, [0; 16], [0; 16]).is_err());
    }

    #[test]
    fn unhashed_prefix_excludes_hash() {
        let chat = Chat::new("hi".into(), [1; 16], [2; 16]).unwrap();
        let prefix = chat.unhashed_prefix();
        assert_eq!(prefix.len(), 1 + 2 + 16);
        assert!(!prefix.ends_with(&chat.md5_hash));
    }

    #[test]
    fn meets_target_checks_leading_bytes() {
        let mut chat = Chat::new("hi".into(), [0; 16], [0; 16]).unwrap();
        assert!(chat.meets_target());
        chat.md5_hash[0] = 1;
        assert!(!chat.meets_target());
    }

    proptest! {
        #[test]
        fn any_text_within_the_wire_limit_is_accepted(text in "[ -~]{1,255}") {
            prop_assert!(Chat::new(text, [0; 16], [0; 16]).is_ok());
        }

        #[test]
        fn any_text_over_the_wire_limit_is_rejected(extra in 1usize..64) {
            let text = "a".repeat(TEXT_MAX_LEN + extra);
            prop_assert!(Chat::new(text, [0; 16], [0; 16]).is_err());
        }

        #[test]
        fn meets_target_is_exactly_the_leading_two_zero_bytes(hash in any::<[u8; 16]>()) {
            let chat = Chat::new("x".into(), [0; 16], hash).unwrap();
            prop_assert_eq!(chat.meets_target(), hash[0] == 0 && hash[1] == 0);
        }
    }
}
