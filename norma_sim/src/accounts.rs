//! Deterministic account keys for the simulated chain.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// A funded account: its name and the key that signs its transactions.
#[derive(Clone)]
pub struct Account {
    pub name: String,
    pub key: SigningKey,
}

impl Account {
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account").field("name", &self.name).finish()
    }
}

/// Derives account signing keys from a master seed.
///
/// Keys are:
/// - Deterministic: the same seed and index always yield the same key
/// - Unique: each index gets a different key
/// - Isolated: allocating more accounts doesn't change earlier ones
pub struct DeterministicAccounts {
    master_seed: u64,

    /// Keys derived so far, by index
    key_cache: HashMap<u64, SigningKey>,

    /// Next index handed out by [`next_account`](Self::next_account)
    next_index: u64,
}

impl DeterministicAccounts {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            key_cache: HashMap::new(),
            next_index: 0,
        }
    }

    /// Returns the signing key of account `index`.
    ///
    /// The key is derived from `master_seed * φ + index * prime`.
    pub fn key(&mut self, index: u64) -> SigningKey {
        if let Some(key) = self.key_cache.get(&index) {
            return key.clone();
        }

        let seed = self
            .master_seed
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add(index.wrapping_mul(0x517cc1b727220a95));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let key = SigningKey::generate(&mut rng);

        self.key_cache.insert(index, key.clone());
        key
    }

    /// Allocates a fresh account, named after its owner and index.
    pub fn next_account(&mut self, owner: &str) -> Account {
        let index = self.next_index;
        self.next_index += 1;
        Account {
            name: format!("{owner}/{index}"),
            key: self.key(index),
        }
    }

    /// Number of accounts allocated so far.
    pub fn allocated(&self) -> u64 {
        self.next_index
    }
}
