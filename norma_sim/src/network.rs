//! Simulated network with fault injection.
//!
//! Nodes are plain in-memory handles; every node serves the same
//! [`SimChain`]. Applications are real [`ManagedApplication`]s, so load is
//! produced by the same controller and shapers used against live networks.

use crate::accounts::DeterministicAccounts;
use crate::application::CounterApplication;
use crate::chain::SimChain;
use async_trait::async_trait;
use norma_core::{
    Application, ApplicationConfig, ControllerConfig, ControllerStats, DriverError,
    ManagedApplication, Network, Node, NodeConfig, RpcClient, Transaction,
};
use norma_env::Clock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

/// Application types this network can deploy.
pub const SUPPORTED_APPLICATION_TYPES: &[&str] = &["counter"];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A call made on the network or one of its nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NetworkCall {
    CreateNode(String),
    RemoveNode(String),
    StopNode(String),
    CleanupNode(String),
    CreateApplication(String),
    DialRpc(String),
    Shutdown,
}

/// Shared, ordered record of [`NetworkCall`]s.
#[derive(Debug, Clone, Default)]
struct CallLog(Arc<Mutex<Vec<NetworkCall>>>);

impl CallLog {
    fn record(&self, call: NetworkCall) {
        lock(&self.0).push(call);
    }

    fn snapshot(&self) -> Vec<NetworkCall> {
        lock(&self.0).clone()
    }
}

// =============================================================================
// FAULT INJECTION
// =============================================================================

#[derive(Debug, Default)]
struct Faults {
    node_creation: HashSet<String>,
    node_stop: HashSet<String>,
    node_cleanup: HashSet<String>,
    application_creation: HashSet<String>,
    transactions: bool,
}

/// Network controller for fault injection. Clones control the same network.
#[derive(Debug, Clone, Default)]
pub struct SimNetworkController {
    faults: Arc<Mutex<Faults>>,
}

impl SimNetworkController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes creation of the named node fail.
    pub fn fail_node_creation(&self, name: impl Into<String>) {
        lock(&self.faults).node_creation.insert(name.into());
    }

    /// Makes stopping the named node fail.
    pub fn fail_node_stop(&self, name: impl Into<String>) {
        lock(&self.faults).node_stop.insert(name.into());
    }

    /// Makes cleaning up the named node fail.
    pub fn fail_node_cleanup(&self, name: impl Into<String>) {
        lock(&self.faults).node_cleanup.insert(name.into());
    }

    /// Makes creation of the named application fail.
    pub fn fail_application_creation(&self, name: impl Into<String>) {
        lock(&self.faults).application_creation.insert(name.into());
    }

    /// Makes every transaction submission fail while set.
    pub fn fail_transactions(&self, fail: bool) {
        lock(&self.faults).transactions = fail;
    }

    /// Removes all injected faults.
    pub fn heal_all(&self) {
        *lock(&self.faults) = Faults::default();
    }

    fn node_creation_fails(&self, name: &str) -> bool {
        lock(&self.faults).node_creation.contains(name)
    }

    fn node_stop_fails(&self, name: &str) -> bool {
        lock(&self.faults).node_stop.contains(name)
    }

    fn node_cleanup_fails(&self, name: &str) -> bool {
        lock(&self.faults).node_cleanup.contains(name)
    }

    fn application_creation_fails(&self, name: &str) -> bool {
        lock(&self.faults).application_creation.contains(name)
    }

    fn transactions_fail(&self) -> bool {
        lock(&self.faults).transactions
    }
}

// =============================================================================
// NODES AND RPC
// =============================================================================

/// An in-memory node.
pub struct SimNode {
    label: String,
    running: AtomicBool,
    faults: SimNetworkController,
    calls: CallLog,
}

#[async_trait]
impl Node for SimNode {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn stop(&self) -> Result<(), DriverError> {
        self.calls.record(NetworkCall::StopNode(self.label.clone()));
        if self.faults.node_stop_fails(&self.label) {
            return Err(DriverError::node(format!("injected stop failure on {}", self.label)));
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), DriverError> {
        self.calls.record(NetworkCall::CleanupNode(self.label.clone()));
        if self.faults.node_cleanup_fails(&self.label) {
            return Err(DriverError::node(format!("injected cleanup failure on {}", self.label)));
        }
        Ok(())
    }
}

/// A connection to a simulated node.
pub struct SimRpcClient {
    endpoint: String,
}

impl SimRpcClient {
    pub fn new(node: &str) -> Self {
        Self {
            endpoint: format!("sim://{node}"),
        }
    }
}

#[async_trait]
impl RpcClient for SimRpcClient {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn close(&self) {
        debug!("Closed connection to {}", self.endpoint);
    }
}

// =============================================================================
// NETWORK
// =============================================================================

/// Configuration of a [`SimNetwork`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimNetworkConfig {
    /// Seed for account keys and RPC endpoint selection
    pub seed: u64,
    /// Settings of every application's load controller
    pub controller: ControllerConfig,
}

impl Default for SimNetworkConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            controller: ControllerConfig::default(),
        }
    }
}

impl SimNetworkConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }
}

/// Traffic of one application over a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationReport {
    pub name: String,
    pub users: usize,
    /// Submissions accepted by the network
    pub sent: u64,
    /// Transactions the chain processed
    pub received: u64,
    /// Messages dropped because all workers were busy
    pub missed: u64,
    pub sent_per_user: Vec<u64>,
}

struct AppEntry {
    name: String,
    stats: ControllerStats,
    handle: Option<Arc<ManagedApplication>>,
}

#[derive(Default)]
struct NetworkState {
    /// Running nodes, in creation order
    nodes: Vec<Arc<SimNode>>,
    nodes_created: usize,
    applications: Vec<AppEntry>,
}

/// In-process network under test.
pub struct SimNetwork {
    config: SimNetworkConfig,
    chain: Arc<SimChain>,
    accounts: Arc<Mutex<DeterministicAccounts>>,
    controller: SimNetworkController,
    /// Clock applications pace their load on
    app_clock: Arc<dyn Clock>,
    rng: Mutex<ChaCha8Rng>,
    calls: CallLog,
    state: Mutex<NetworkState>,
    submitted: AtomicU64,
    self_ref: Weak<SimNetwork>,
}

impl SimNetwork {
    pub fn new(config: SimNetworkConfig, app_clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            chain: Arc::new(SimChain::new()),
            accounts: Arc::new(Mutex::new(DeterministicAccounts::new(config.seed))),
            controller: SimNetworkController::new(),
            app_clock,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.seed)),
            calls: CallLog::default(),
            state: Mutex::new(NetworkState::default()),
            submitted: AtomicU64::new(0),
            self_ref: self_ref.clone(),
            config,
        })
    }

    /// Fault injection handle for this network.
    pub fn controller(&self) -> SimNetworkController {
        self.controller.clone()
    }

    pub fn chain(&self) -> &Arc<SimChain> {
        &self.chain
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<NetworkCall> {
        self.calls.snapshot()
    }

    pub fn active_nodes(&self) -> usize {
        lock(&self.state).nodes.len()
    }

    pub fn nodes_created(&self) -> usize {
        lock(&self.state).nodes_created
    }

    /// Transactions handed to the chain, accepted or not.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Traffic of every application created so far.
    pub fn application_reports(&self) -> Vec<ApplicationReport> {
        lock(&self.state)
            .applications
            .iter()
            .map(|entry| {
                let snapshot = entry.stats.snapshot();
                ApplicationReport {
                    name: entry.name.clone(),
                    users: entry.stats.workers(),
                    sent: snapshot.total_sent,
                    received: self.chain.received(&entry.name),
                    missed: snapshot.missed,
                    sent_per_user: snapshot.sent_per_worker,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Network for SimNetwork {
    async fn create_node(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, DriverError> {
        self.calls.record(NetworkCall::CreateNode(config.name.clone()));
        if self.controller.node_creation_fails(&config.name) {
            return Err(DriverError::node(format!("injected creation failure on {}", config.name)));
        }

        let node = Arc::new(SimNode {
            label: config.name.clone(),
            running: AtomicBool::new(true),
            faults: self.controller.clone(),
            calls: self.calls.clone(),
        });
        let mut state = lock(&self.state);
        state.nodes.push(node.clone());
        state.nodes_created += 1;
        debug!("Node {} started ({} running)", config.name, state.nodes.len());
        Ok(node)
    }

    async fn remove_node(&self, node: &Arc<dyn Node>) -> Result<(), DriverError> {
        let label = node.label();
        self.calls.record(NetworkCall::RemoveNode(label.clone()));
        let mut state = lock(&self.state);
        let before = state.nodes.len();
        state.nodes.retain(|n| n.label != label);
        if state.nodes.len() == before {
            return Err(DriverError::node(format!("{label} is not part of the network")));
        }
        Ok(())
    }

    async fn create_application(
        &self,
        config: &ApplicationConfig,
    ) -> Result<Arc<dyn Application>, DriverError> {
        self.calls.record(NetworkCall::CreateApplication(config.name.clone()));
        if !SUPPORTED_APPLICATION_TYPES.contains(&config.app_type.as_str()) {
            return Err(DriverError::application(format!(
                "unsupported application type: {}",
                config.app_type
            )));
        }
        if self.controller.application_creation_fails(&config.name) {
            return Err(DriverError::application(format!(
                "injected creation failure on {}",
                config.name
            )));
        }
        let network: Arc<dyn Network> = Arc::new(NetworkRef(self.self_ref.clone()));
        let counter = CounterApplication::deploy(
            config.name.clone(),
            self.chain.clone(),
            self.accounts.clone(),
        );
        let app = ManagedApplication::create(
            config.clone(),
            Arc::new(counter),
            network,
            self.app_clock.clone(),
            self.config.controller.clone(),
        )
        .await
        .map_err(|e| DriverError::application(format!("{}: {}", config.name, e)))?;
        let app = Arc::new(app);

        lock(&self.state).applications.push(AppEntry {
            name: config.name.clone(),
            stats: app.stats(),
            handle: Some(app.clone()),
        });
        Ok(app)
    }

    async fn send_transaction(&self, tx: Transaction) -> Result<(), DriverError> {
        if self.controller.transactions_fail() {
            return Err(DriverError::transaction("injected submission failure"));
        }
        if self.active_nodes() == 0 {
            return Err(DriverError::rpc("no running node"));
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.chain
            .submit(&tx)
            .map_err(|e| DriverError::transaction(e.to_string()))
    }

    async fn dial_random_rpc(&self) -> Result<Arc<dyn RpcClient>, DriverError> {
        let label = {
            let state = lock(&self.state);
            if state.nodes.is_empty() {
                return Err(DriverError::rpc("no running node to dial"));
            }
            let index = lock(&self.rng).gen_range(0..state.nodes.len());
            state.nodes[index].label.clone()
        };
        let client = SimRpcClient::new(&label);
        self.calls.record(NetworkCall::DialRpc(client.endpoint()));
        Ok(Arc::new(client))
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        let (applications, nodes) = {
            let mut state = lock(&self.state);
            let applications: Vec<Arc<ManagedApplication>> = state
                .applications
                .iter_mut()
                .filter_map(|entry| entry.handle.take())
                .collect();
            (applications, std::mem::take(&mut state.nodes))
        };

        for app in applications {
            if let Err(e) = app.stop().await {
                warn!("Failed to stop application {}: {}", app.config().name, e);
            }
        }
        for node in nodes {
            if node.is_running() {
                if let Err(e) = node.stop().await {
                    warn!("Failed to stop node {}: {}", node.label, e);
                }
            }
            if let Err(e) = node.cleanup().await {
                warn!("Failed to clean up node {}: {}", node.label, e);
            }
        }

        self.calls.record(NetworkCall::Shutdown);
        info!(
            "Network shut down: {} transactions submitted, {} rejected",
            self.submitted(),
            self.chain.rejected()
        );
        Ok(())
    }
}

/// Handle applications use to reach their network.
///
/// The network owns its applications, so this must not keep it alive.
struct NetworkRef(Weak<SimNetwork>);

impl NetworkRef {
    fn get(&self) -> Result<Arc<SimNetwork>, DriverError> {
        self.0
            .upgrade()
            .ok_or_else(|| DriverError::ShutDown("network dropped".to_string()))
    }
}

#[async_trait]
impl Network for NetworkRef {
    async fn create_node(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, DriverError> {
        self.get()?.create_node(config).await
    }

    async fn remove_node(&self, node: &Arc<dyn Node>) -> Result<(), DriverError> {
        self.get()?.remove_node(node).await
    }

    async fn create_application(
        &self,
        config: &ApplicationConfig,
    ) -> Result<Arc<dyn Application>, DriverError> {
        self.get()?.create_application(config).await
    }

    async fn send_transaction(&self, tx: Transaction) -> Result<(), DriverError> {
        self.get()?.send_transaction(tx).await
    }

    async fn dial_random_rpc(&self) -> Result<Arc<dyn RpcClient>, DriverError> {
        self.get()?.dial_random_rpc().await
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.get()?.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norma_core::Rate;
    use norma_env::WallClock;
    use std::time::Duration;

    fn network() -> Arc<SimNetwork> {
        SimNetwork::new(SimNetworkConfig::default(), WallClock::shared())
    }

    fn node_config(name: &str) -> NodeConfig {
        NodeConfig {
            name: name.to_string(),
            validator: true,
        }
    }

    fn app_config(name: &str, rate: f64, users: usize) -> ApplicationConfig {
        ApplicationConfig {
            name: name.to_string(),
            app_type: "counter".to_string(),
            users,
            rate: Rate {
                constant: Some(rate),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_node_lifecycle_is_recorded() {
        let net = network();
        let node = net.create_node(&node_config("A-0")).await.unwrap();
        assert!(node.is_running());
        assert_eq!(net.active_nodes(), 1);

        net.remove_node(&node).await.unwrap();
        node.stop().await.unwrap();
        node.cleanup().await.unwrap();

        assert!(!node.is_running());
        assert_eq!(net.active_nodes(), 0);
        assert_eq!(net.nodes_created(), 1);
        assert_eq!(
            net.calls(),
            vec![
                NetworkCall::CreateNode("A-0".to_string()),
                NetworkCall::RemoveNode("A-0".to_string()),
                NetworkCall::StopNode("A-0".to_string()),
                NetworkCall::CleanupNode("A-0".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_removing_unknown_node_fails() {
        let net = network();
        let node = net.create_node(&node_config("A-0")).await.unwrap();
        net.remove_node(&node).await.unwrap();
        assert!(net.remove_node(&node).await.is_err());
    }

    #[tokio::test]
    async fn test_dial_requires_running_node() {
        let net = network();
        assert!(net.dial_random_rpc().await.is_err());

        net.create_node(&node_config("A-0")).await.unwrap();
        net.create_node(&node_config("A-1")).await.unwrap();
        for _ in 0..10 {
            let rpc = net.dial_random_rpc().await.unwrap();
            assert!(["sim://A-0", "sim://A-1"].contains(&rpc.endpoint().as_str()));
        }
    }

    #[tokio::test]
    async fn test_injected_node_faults() {
        let net = network();
        let faults = net.controller();
        faults.fail_node_creation("A-0");
        faults.fail_node_stop("A-1");
        faults.fail_node_cleanup("A-1");

        assert!(net.create_node(&node_config("A-0")).await.is_err());
        let node = net.create_node(&node_config("A-1")).await.unwrap();
        assert!(node.stop().await.is_err());
        assert!(node.cleanup().await.is_err());

        faults.heal_all();
        assert!(net.create_node(&node_config("A-0")).await.is_ok());
        assert!(node.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_application_creation_checks() {
        let net = network();
        let mut config = app_config("load-0", 1.0, 1);
        config.app_type = "uniswap".to_string();
        assert!(net.create_application(&config).await.is_err());

        // The controller needs a node to dial
        assert!(net.create_application(&app_config("load-0", 1.0, 1)).await.is_err());

        net.create_node(&node_config("A-0")).await.unwrap();
        net.controller().fail_application_creation("load-1");
        assert!(net.create_application(&app_config("load-1", 1.0, 1)).await.is_err());
        assert!(net.create_application(&app_config("load-2", 1.0, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_requires_node_and_no_fault() {
        let net = network();
        let tx = Transaction {
            from: "x".to_string(),
            to: "y".to_string(),
            nonce: 0,
            payload: vec![],
            signature: vec![],
        };
        assert_eq!(
            net.send_transaction(tx.clone()).await,
            Err(DriverError::rpc("no running node"))
        );

        net.create_node(&node_config("A-0")).await.unwrap();
        net.controller().fail_transactions(true);
        assert!(matches!(net.send_transaction(tx.clone()).await, Err(DriverError::Transaction(_))));

        net.controller().fail_transactions(false);
        // Reaches the chain, which rejects the unsigned transaction
        assert!(net.send_transaction(tx).await.is_err());
        assert_eq!(net.submitted(), 1);
        assert_eq!(net.chain().rejected(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_application_load_reaches_chain() {
        let net = network();
        net.create_node(&node_config("A-0")).await.unwrap();
        let app = net.create_application(&app_config("load-0", 10.0, 2)).await.unwrap();

        app.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        app.stop().await.unwrap();

        let reports = net.application_reports();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.users, 2);
        assert!((48..=52).contains(&report.sent), "sent {}", report.sent);
        assert_eq!(report.received, report.sent);
        assert_eq!(report.sent_per_user.iter().sum::<u64>(), report.sent);
        assert_eq!(net.chain().rejected(), 0);
        assert_eq!(app.received_transactions().await.unwrap(), report.sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let net = network();
        let node = net.create_node(&node_config("A-0")).await.unwrap();
        let app = net.create_application(&app_config("load-0", 10.0, 1)).await.unwrap();
        app.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        net.shutdown().await.unwrap();

        assert!(!node.is_running());
        assert_eq!(net.active_nodes(), 0);
        assert_eq!(net.calls().last(), Some(&NetworkCall::Shutdown));
        // Stopped apps produce no more load
        let sent = net.application_reports()[0].sent;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(net.application_reports()[0].sent, sent);
    }

    #[tokio::test]
    async fn test_applications_do_not_keep_network_alive() {
        let net = network();
        net.create_node(&node_config("A-0")).await.unwrap();
        let app = net.create_application(&app_config("load-0", 1.0, 1)).await.unwrap();

        let weak = Arc::downgrade(&net);
        drop(net);
        assert!(weak.upgrade().is_none());

        let err = app.received_transactions().await.unwrap_err();
        assert!(matches!(err, DriverError::ShutDown(_)), "{err}");
    }
}
