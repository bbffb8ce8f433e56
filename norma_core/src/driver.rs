//! Collaborator traits for the network under test.
//!
//! The executor only talks to the outside world through these seams. A
//! production deployment backs them with containers and RPC clients; the
//! `norma_sim` crate backs them with an in-process chain.
//!
//! # Lifecycle
//!
//! ```text
//! Network::create_node ──> Node ──> Network::remove_node ──> Node::stop ──> Node::cleanup
//! Network::create_application ──> Application::start ──> Application::stop
//! ```

use crate::scenario::Rate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by network, node and application implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Node could not be created, stopped or cleaned up
    #[error("Node error: {0}")]
    Node(String),

    /// Application could not be created, started or stopped
    #[error("Application error: {0}")]
    Application(String),

    /// Transaction submission failed
    #[error("Transaction rejected: {0}")]
    Transaction(String),

    /// RPC connection failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Operation on a handle that is no longer usable
    #[error("Already shut down: {0}")]
    ShutDown(String),
}

impl DriverError {
    pub fn node(msg: impl Into<String>) -> Self {
        Self::Node(msg.into())
    }

    pub fn application(msg: impl Into<String>) -> Self {
        Self::Application(msg.into())
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }
}

/// Configuration of a single node instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Instance name, `<group>-<index>`
    pub name: String,
    pub validator: bool,
}

/// Configuration of a single application instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Instance name, `<group>-<index>`
    pub name: String,
    /// Application type, e.g. "counter"
    pub app_type: String,
    /// Number of users, one worker and one account each
    pub users: usize,
    pub rate: Rate,
}

/// A signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender account
    pub from: String,
    /// Target application
    pub to: String,
    /// Per-account sequence number, starting at 0
    pub nonce: u64,
    pub payload: Vec<u8>,
    /// Signature over [`Transaction::signing_bytes`]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Canonical bytes covered by the signature.
    pub fn signing_bytes(from: &str, to: &str, nonce: u64, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(from.len() + to.len() + payload.len() + 10);
        bytes.extend_from_slice(from.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(to.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&nonce.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }
}

/// A connection to some node's RPC endpoint.
#[async_trait]
pub trait RpcClient: Send + Sync + 'static {
    fn endpoint(&self) -> String;

    /// Closes the connection. Idempotent.
    async fn close(&self);
}

/// A running node of the network under test.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    fn label(&self) -> String;

    fn is_running(&self) -> bool;

    async fn stop(&self) -> Result<(), DriverError>;

    /// Releases resources held by a stopped node.
    async fn cleanup(&self) -> Result<(), DriverError>;
}

/// A load-producing application deployed on the network.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    fn config(&self) -> &ApplicationConfig;

    /// Starts producing load. Fails when already started.
    async fn start(&self) -> Result<(), DriverError>;

    /// Stops producing load. A no-op when not running.
    async fn stop(&self) -> Result<(), DriverError>;

    fn number_of_users(&self) -> usize;

    /// Transactions submitted by one user.
    fn sent_transactions(&self, user: usize) -> Result<u64, DriverError>;

    fn total_sent_transactions(&self) -> u64;

    /// Transactions the network has accepted for this application.
    async fn received_transactions(&self) -> Result<u64, DriverError>;
}

/// The network under test.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    async fn create_node(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, DriverError>;

    /// Detaches a node from the network before it is stopped.
    async fn remove_node(&self, node: &Arc<dyn Node>) -> Result<(), DriverError>;

    async fn create_application(
        &self,
        config: &ApplicationConfig,
    ) -> Result<Arc<dyn Application>, DriverError>;

    async fn send_transaction(&self, tx: Transaction) -> Result<(), DriverError>;

    /// Connects to the RPC endpoint of some running node.
    async fn dial_random_rpc(&self) -> Result<Arc<dyn RpcClient>, DriverError>;

    /// Stops every node and application still active.
    async fn shutdown(&self) -> Result<(), DriverError>;
}
