//! The "counter" application: every transaction increments a counter.

use crate::accounts::{Account, DeterministicAccounts};
use crate::chain::SimChain;
use async_trait::async_trait;
use ed25519_dalek::Signer;
use norma_core::{LoadApplication, LoadError, RpcClient, Transaction, TransactionGenerator};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Payload of a counter increment.
pub const INCREMENT: &[u8] = b"increment";

/// Deploys a counter contract and hands out funded, signing generators.
pub struct CounterApplication {
    name: String,
    chain: Arc<SimChain>,
    accounts: Arc<Mutex<DeterministicAccounts>>,
}

impl CounterApplication {
    /// Deploys the contract under `name`.
    pub fn deploy(
        name: impl Into<String>,
        chain: Arc<SimChain>,
        accounts: Arc<Mutex<DeterministicAccounts>>,
    ) -> Self {
        let name = name.into();
        chain.deploy(name.clone());
        debug!("Counter {} deployed", name);
        Self { name, chain, accounts }
    }

    fn allocate_account(&self) -> Result<Account, LoadError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| LoadError::Generator("account registry poisoned".to_string()))?;
        Ok(accounts.next_account(&self.name))
    }
}

#[async_trait]
impl LoadApplication for CounterApplication {
    async fn create_generator(
        &self,
        _rpc: &Arc<dyn RpcClient>,
    ) -> Result<Box<dyn TransactionGenerator>, LoadError> {
        let account = self.allocate_account()?;
        self.chain.register_account(account.name.clone(), account.verifying_key());
        Ok(Box::new(CounterGenerator {
            account,
            target: self.name.clone(),
            nonce: 0,
        }))
    }

    async fn wait_until_deployed(&self, _rpc: &Arc<dyn RpcClient>) -> Result<(), LoadError> {
        if self.chain.is_deployed(&self.name) {
            Ok(())
        } else {
            Err(LoadError::NotDeployed(self.name.clone()))
        }
    }

    async fn received_transactions(&self, _rpc: &Arc<dyn RpcClient>) -> Result<u64, LoadError> {
        Ok(self.chain.received(&self.name))
    }
}

/// Signs increments from one account, with consecutive nonces.
pub struct CounterGenerator {
    account: Account,
    target: String,
    nonce: u64,
}

impl TransactionGenerator for CounterGenerator {
    fn generate_transaction(&mut self) -> Result<Transaction, LoadError> {
        let nonce = self.nonce;
        let message =
            Transaction::signing_bytes(&self.account.name, &self.target, nonce, INCREMENT);
        let signature = self.account.key.sign(&message);
        self.nonce += 1;

        Ok(Transaction {
            from: self.account.name.clone(),
            to: self.target.clone(),
            nonce,
            payload: INCREMENT.to_vec(),
            signature: signature.to_bytes().to_vec(),
        })
    }

    fn account(&self) -> &str {
        &self.account.name
    }
}
