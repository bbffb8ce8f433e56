//! Simulated ledger: signature and nonce checks plus per-application counters.
//!
//! The chain has no blocks and no consensus. A submitted transaction is
//! either accepted immediately, bumping its sender's nonce and the counter
//! of the target application, or rejected.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use norma_core::Transaction;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("Invalid signature from {0}")]
    InvalidSignature(String),

    #[error("Nonce mismatch for {account}: expected {expected}, got {got}")]
    NonceMismatch {
        account: String,
        expected: u64,
        got: u64,
    },
}

struct AccountState {
    key: VerifyingKey,
    next_nonce: u64,
}

#[derive(Default)]
struct ChainState {
    accounts: HashMap<String, AccountState>,
    applications: HashSet<String>,
    received: HashMap<String, u64>,
    rejected: u64,
}

/// Accepts signed, correctly sequenced transactions.
#[derive(Default)]
pub struct SimChain {
    state: Mutex<ChainState>,
}

impl SimChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Funds an account; its first transaction must carry nonce 0.
    pub fn register_account(&self, name: impl Into<String>, key: VerifyingKey) {
        self.state().accounts.insert(name.into(), AccountState { key, next_nonce: 0 });
    }

    /// Deploys an application contract.
    pub fn deploy(&self, application: impl Into<String>) {
        self.state().applications.insert(application.into());
    }

    pub fn is_deployed(&self, application: &str) -> bool {
        self.state().applications.contains(application)
    }

    /// Validates and applies a transaction.
    pub fn submit(&self, tx: &Transaction) -> Result<(), ChainError> {
        let mut state = self.state();
        let result = Self::apply(&mut state, tx);
        if result.is_err() {
            state.rejected += 1;
        }
        result
    }

    fn apply(state: &mut ChainState, tx: &Transaction) -> Result<(), ChainError> {
        if !state.applications.contains(&tx.to) {
            return Err(ChainError::UnknownApplication(tx.to.clone()));
        }
        let account = state
            .accounts
            .get_mut(&tx.from)
            .ok_or_else(|| ChainError::UnknownAccount(tx.from.clone()))?;

        let signature = Signature::from_slice(&tx.signature)
            .map_err(|_| ChainError::InvalidSignature(tx.from.clone()))?;
        let message = Transaction::signing_bytes(&tx.from, &tx.to, tx.nonce, &tx.payload);
        account
            .key
            .verify(&message, &signature)
            .map_err(|_| ChainError::InvalidSignature(tx.from.clone()))?;

        if tx.nonce != account.next_nonce {
            return Err(ChainError::NonceMismatch {
                account: tx.from.clone(),
                expected: account.next_nonce,
                got: tx.nonce,
            });
        }
        account.next_nonce += 1;
        *state.received.entry(tx.to.clone()).or_insert(0) += 1;
        Ok(())
    }

    /// Transactions accepted for an application.
    pub fn received(&self, application: &str) -> u64 {
        self.state().received.get(application).copied().unwrap_or(0)
    }

    pub fn rejected(&self) -> u64 {
        self.state().rejected
    }

    /// Next nonce expected from an account.
    pub fn nonce(&self, account: &str) -> Option<u64> {
        self.state().accounts.get(account).map(|a| a.next_nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::DeterministicAccounts;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed(key: &SigningKey, from: &str, to: &str, nonce: u64) -> Transaction {
        let payload = b"increment".to_vec();
        let signature = key.sign(&Transaction::signing_bytes(from, to, nonce, &payload));
        Transaction {
            from: from.to_string(),
            to: to.to_string(),
            nonce,
            payload,
            signature: signature.to_bytes().to_vec(),
        }
    }

    fn setup() -> (SimChain, SigningKey) {
        let chain = SimChain::new();
        let key = DeterministicAccounts::new(1).key(0);
        chain.register_account("alice", key.verifying_key());
        chain.deploy("counter");
        (chain, key)
    }

    #[test]
    fn test_accepts_sequenced_transactions() {
        let (chain, key) = setup();
        for nonce in 0..3 {
            chain.submit(&signed(&key, "alice", "counter", nonce)).unwrap();
        }
        assert_eq!(chain.received("counter"), 3);
        assert_eq!(chain.nonce("alice"), Some(3));
        assert_eq!(chain.rejected(), 0);
    }

    #[test]
    fn test_rejects_bad_nonce() {
        let (chain, key) = setup();
        let err = chain.submit(&signed(&key, "alice", "counter", 1)).unwrap_err();
        assert_eq!(
            err,
            ChainError::NonceMismatch {
                account: "alice".to_string(),
                expected: 0,
                got: 1
            }
        );
        assert_eq!(chain.rejected(), 1);
        assert_eq!(chain.received("counter"), 0);
    }

    #[test]
    fn test_rejects_foreign_signature() {
        let (chain, _) = setup();
        let mallory = DeterministicAccounts::new(2).key(0);
        let err = chain.submit(&signed(&mallory, "alice", "counter", 0)).unwrap_err();
        assert_eq!(err, ChainError::InvalidSignature("alice".to_string()));
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let (chain, key) = setup();
        let mut tx = signed(&key, "alice", "counter", 0);
        tx.payload = b"decrement".to_vec();
        assert!(matches!(chain.submit(&tx), Err(ChainError::InvalidSignature(_))));
    }

    #[test]
    fn test_rejects_unknown_targets() {
        let (chain, key) = setup();
        assert!(matches!(
            chain.submit(&signed(&key, "alice", "nope", 0)),
            Err(ChainError::UnknownApplication(_))
        ));
        assert!(matches!(
            chain.submit(&signed(&key, "bob", "counter", 0)),
            Err(ChainError::UnknownAccount(_))
        ));
        assert_eq!(chain.rejected(), 2);
    }
}
