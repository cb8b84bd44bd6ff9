//! Thread-safe chain state: history validation, proof-of-work mining, and
//! atomic wholesale replacement ("longest valid chain wins").

use crate::chat::{Chat, VALIDATION_WINDOW};
use crate::codec::serialize_chat;
use crate::error::ValidationError;
use crate::mining::{mine_worker, MINING_PREVIOUS};
use md5::{Digest, Md5};
use tokio::sync::Mutex;

/// The node's local copy of the chain, guarded by a single mutex. Never
/// held across an `.await` that also touches the peer table or the
/// archive-responses table (see the lock-ordering rule in the design doc).
pub struct Blockchain {
    chats: Mutex<Vec<Chat>>,
}

impl Blockchain {
    /// A fresh chain starts empty; the empty chain is valid.
    pub fn new() -> Self {
        Blockchain {
            chats: Mutex::new(Vec::new()),
        }
    }

    /// An independent snapshot of the current chain.
    pub async fn get_chain(&self) -> Vec<Chat> {
        self.chats.lock().await.clone()
    }

    /// Validates every prefix of `history` against the rolling MD5 window,
    /// returning the first violation found.
    fn verify_history_detailed(history: &[Chat]) -> Result<(), ValidationError> {
        for i in 0..history.len() {
            let chat = &history[i];
            if !chat.meets_target() {
                return Err(ValidationError::MissingLeadingZeros(i));
            }

            let window_len = VALIDATION_WINDOW.min(i + 1);
            let window_start = i + 1 - window_len;

            let mut bytes = Vec::new();
            for earlier in &history[window_start..i] {
                bytes.extend_from_slice(&serialize_chat(earlier));
            }
            bytes.extend_from_slice(&chat.unhashed_prefix());

            let mut hasher = Md5::new();
            hasher.update(&bytes);
            let digest: [u8; 16] = hasher.finalize().into();
            if digest != chat.md5_hash {
                return Err(ValidationError::HashMismatch(i));
            }
        }
        Ok(())
    }

    /// Pure validity check over the rolling MD5 window. The empty history is
    /// always valid.
    pub fn verify_history(history: &[Chat]) -> bool {
        Self::verify_history_detailed(history).is_ok()
    }

    /// Replaces the chain wholesale iff `new_history` is both longer and
    /// valid. Rejections are silent to the caller (the connection stays
    /// open) but logged here.
    pub async fn replace_chain(&self, new_history: Vec<Chat>) -> bool {
        let mut guard = self.chats.lock().await;
        if new_history.len() <= guard.len() {
            let err = ValidationError::NotLonger {
                incoming: new_history.len(),
                current: guard.len(),
            };
            tracing::warn!(error = %err, "rejecting incoming chain history");
            return false;
        }
        if let Err(e) = Self::verify_history_detailed(&new_history) {
            tracing::warn!(error = %e, "rejecting incoming chain history");
            return false;
        }
        *guard = new_history;
        true
    }

    /// Mines a new chat atop the current chain and appends it.
    ///
    /// Optimistic-concurrency loop: the CPU-bound search runs on the
    /// blocking thread pool without holding the chain lock; if the chain
    /// moved under us while mining, the candidate is discarded and mining
    /// restarts against the new tip rather than being appended somewhere it
    /// was never hashed against.
    pub async fn mine_chat(&self, text: String) -> Chat {
        loop {
            let snapshot = self.get_chain().await;
            let start = snapshot.len().saturating_sub(MINING_PREVIOUS);
            let previous = snapshot[start..].to_vec();
            let text = text.clone();

            let mined = tokio::task::spawn_blocking(move || {
                let mut rng = rand::thread_rng();
                mine_worker(&text, &previous, &mut rng)
            })
            .await
            .expect("mining task panicked");

            let mut guard = self.chats.lock().await;
            if *guard == snapshot {
                guard.push(mined.clone());
                return mined;
            }
            // Chain was replaced while we were mining; retry against the new tip.
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Blockchain::new()
    }
}
