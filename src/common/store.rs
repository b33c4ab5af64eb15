//! In-memory nonce store.
use async_trait::async_trait;
use std::collections::{HashMap, hash_map::Entry};
use tokio::sync::Mutex;

use crate::{Nonce, NonceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonceState {
    Reserved,
    Stored,
}

/// Nonce store that keeps every redeemed nonce in memory.
///
/// Entries are never evicted, so memory grows with the number of redeemed
/// tokens. Suitable for a single process and a bounded key lifetime; use a
/// persistent store with a retention policy for anything larger.
#[derive(Default, Debug)]
pub struct InMemoryNonceStore {
    nonces: Mutex<HashMap<Nonce, NonceState>>,
}

impl InMemoryNonceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reserved and stored nonces.
    pub async fn len(&self) -> usize {
        self.nonces.lock().await.len()
    }

    /// Returns `true` if no nonce has been reserved or stored.
    pub async fn is_empty(&self) -> bool {
        self.nonces.lock().await.is_empty()
    }
}

#[async_trait]
impl NonceStore for InMemoryNonceStore {
    async fn contains(&self, nonce: &Nonce) -> bool {
        self.nonces.lock().await.contains_key(nonce)
    }

    async fn store(&self, nonce: &Nonce) {
        self.nonces.lock().await.insert(*nonce, NonceState::Stored);
    }

    async fn reserve(&self, nonce: &Nonce) -> bool {
        match self.nonces.lock().await.entry(*nonce) {
            Entry::Vacant(e) => {
                e.insert(NonceState::Reserved);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    async fn release(&self, nonce: &Nonce) {
        let mut nonces = self.nonces.lock().await;
        if nonces.get(nonce) == Some(&NonceState::Reserved) {
            nonces.remove(nonce);
        }
    }
}
