//! The CPU-bound proof-of-work search. Pure and rng-injectable so it can be
//! driven deterministically in tests; production call sites use
//! [`rand::thread_rng`] and run this on [`tokio::task::spawn_blocking`]
//! (see [`crate::chain::Blockchain::mine_chat`]).

use crate::chat::{Chat, LEADING_ZERO_BYTES, MD5_HASH_LEN, VERIFICATION_CODE_LEN};
use crate::codec::serialize_chat;
use md5::{Digest, Md5};
use rand::RngCore;

/// Trailing chats folded into the hash input when mining a new chat. One
/// less than [`crate::chat::VALIDATION_WINDOW`] because the chat being mined
/// is itself the 20th member of the validation window.
pub const MINING_PREVIOUS: usize = 19;

const LOG_INTERVAL: u64 = 2_000_000;

/// Searches for a 16-byte verification code whose MD5 digest (over the
/// trailing window plus the candidate chat) starts with
/// [`LEADING_ZERO_BYTES`] zero bytes. Loops until it finds one; the caller
/// is the only unit of cancellation.
pub fn mine_worker(text: &str, previous: &[Chat], rng: &mut impl RngCore) -> Chat {
    let mut previous_bytes = Vec::new();
    for chat in previous {
        previous_bytes.extend_from_slice(&serialize_chat(chat));
    }

    let mut attempts: u64 = 0;
    loop {
        let mut verification_code = [0u8; VERIFICATION_CODE_LEN];
        rng.fill_bytes(&mut verification_code);

        let candidate = Chat::new(text.to_string(), verification_code, [0; MD5_HASH_LEN])
            .expect("text length already validated before mining starts");

        let mut hasher = Md5::new();
        hasher.update(&previous_bytes);
        hasher.update(candidate.unhashed_prefix());
        let digest: [u8; MD5_HASH_LEN] = hasher.finalize().into();

        if digest[..LEADING_ZERO_BYTES].iter().all(|b| *b == 0) {
            return Chat {
                md5_hash: digest,
                ..candidate
            };
        }

        attempts += 1;
        if attempts % LOG_INTERVAL == 0 {
            tracing::debug!(attempts, "mining in progress");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn mined_chat_meets_target() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let chat = mine_worker("hello", &[], &mut rng);
        assert!(chat.meets_target());
        assert_eq!(chat.text, "hello");
    }

    #[test]
    fn deterministic_given_same_seed() {
        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        let a = mine_worker("same seed", &[], &mut rng_a);
        let b = mine_worker("same seed", &[], &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn folds_previous_chats_into_digest() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let first = mine_worker("genesis", &[], &mut rng);
        let second = mine_worker("next", std::slice::from_ref(&first), &mut rng);
        assert!(second.meets_target());
    }
}
