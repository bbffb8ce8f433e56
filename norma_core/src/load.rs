//! Chain-specific load seams.
//!
//! A [`LoadApplication`] knows how to build transactions for one kind of
//! on-chain application. The controller asks it for one
//! [`TransactionGenerator`] per user; each generator owns a funded account
//! and produces correctly sequenced, signed transactions from it.

use crate::driver::{DriverError, RpcClient, Transaction};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by load applications and generators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Failed to create generator: {0}")]
    Generator(String),

    #[error("Failed to build transaction: {0}")]
    Transaction(String),

    #[error("Application not deployed: {0}")]
    NotDeployed(String),

    #[error("Failed to query application state: {0}")]
    Query(String),

    #[error("Clock error: {0}")]
    Clock(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Produces transactions for a single account.
pub trait TransactionGenerator: Send + 'static {
    fn generate_transaction(&mut self) -> Result<Transaction, LoadError>;

    /// The account transactions are sent from.
    fn account(&self) -> &str;
}

/// A chain-specific application type.
#[async_trait]
pub trait LoadApplication: Send + Sync + 'static {
    /// Creates a generator bound to a fresh funded account.
    async fn create_generator(
        &self,
        rpc: &Arc<dyn RpcClient>,
    ) -> Result<Box<dyn TransactionGenerator>, LoadError>;

    /// Blocks until the application contract can accept transactions.
    async fn wait_until_deployed(&self, rpc: &Arc<dyn RpcClient>) -> Result<(), LoadError>;

    /// Number of transactions the chain has processed for this application.
    async fn received_transactions(&self, rpc: &Arc<dyn RpcClient>) -> Result<u64, LoadError>;
}

/// Read-only view of an application's traffic, used by adaptive shapers.
pub trait LoadInfoSource: Send + Sync + 'static {
    fn sent_transactions(&self) -> Result<u64, LoadError>;

    fn received_transactions(&self) -> Result<u64, LoadError>;
}
