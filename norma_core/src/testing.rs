//! In-memory collaborators shared by the unit tests of this crate.

use crate::driver::{
    Application, ApplicationConfig, DriverError, Network, Node, NodeConfig, RpcClient, Transaction,
};
use crate::load::{LoadApplication, LoadError, TransactionGenerator};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered log of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct TestRpc {
    pub id: usize,
    pub closed: AtomicBool,
    log: CallLog,
}

#[async_trait]
impl RpcClient for TestRpc {
    fn endpoint(&self) -> String {
        format!("rpc-{}", self.id)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.log.push(format!("close rpc-{}", self.id));
    }
}

pub struct TestNode {
    name: String,
    running: AtomicBool,
    log: CallLog,
    fail_stop: bool,
}

#[async_trait]
impl Node for TestNode {
    fn label(&self) -> String {
        self.name.clone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn stop(&self) -> Result<(), DriverError> {
        self.log.push(format!("stop_node {}", self.name));
        if self.fail_stop {
            return Err(DriverError::node("stop failed"));
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), DriverError> {
        self.log.push(format!("cleanup_node {}", self.name));
        Ok(())
    }
}

pub struct TestApplication {
    config: ApplicationConfig,
    log: CallLog,
}

#[async_trait]
impl Application for TestApplication {
    fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    async fn start(&self) -> Result<(), DriverError> {
        self.log.push(format!("start_app {}", self.config.name));
        Ok(())
    }

    async fn stop(&self) -> Result<(), DriverError> {
        self.log.push(format!("stop_app {}", self.config.name));
        Ok(())
    }

    fn number_of_users(&self) -> usize {
        self.config.users
    }

    fn sent_transactions(&self, _user: usize) -> Result<u64, DriverError> {
        Ok(0)
    }

    fn total_sent_transactions(&self) -> u64 {
        0
    }

    async fn received_transactions(&self) -> Result<u64, DriverError> {
        Ok(0)
    }
}

/// Records every call; optionally fails or delays selected operations.
#[derive(Default)]
pub struct TestNetwork {
    pub log: CallLog,
    /// Node whose creation fails
    pub fail_create: Option<String>,
    /// Node whose stop fails
    pub fail_stop: Option<String>,
    /// Every n-th submission fails (0 = never)
    pub fail_every: u64,
    /// Time each submission takes
    pub send_delay: Option<Duration>,
    pub sent: AtomicU64,
    pub submissions: AtomicU64,
    pub(crate) dials: AtomicUsize,
}

impl TestNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for TestNetwork {
    async fn create_node(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, DriverError> {
        self.log.push(format!("create_node {}", config.name));
        if self.fail_create.as_deref() == Some(config.name.as_str()) {
            return Err(DriverError::node("boot failure"));
        }
        Ok(Arc::new(TestNode {
            name: config.name.clone(),
            running: AtomicBool::new(true),
            log: self.log.clone(),
            fail_stop: self.fail_stop.as_deref() == Some(config.name.as_str()),
        }))
    }

    async fn remove_node(&self, node: &Arc<dyn Node>) -> Result<(), DriverError> {
        self.log.push(format!("remove_node {}", node.label()));
        Ok(())
    }

    async fn create_application(
        &self,
        config: &ApplicationConfig,
    ) -> Result<Arc<dyn Application>, DriverError> {
        self.log.push(format!("create_app {}", config.name));
        Ok(Arc::new(TestApplication {
            config: config.clone(),
            log: self.log.clone(),
        }))
    }

    async fn send_transaction(&self, _tx: Transaction) -> Result<(), DriverError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(DriverError::transaction("nonce too low"));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dial_random_rpc(&self) -> Result<Arc<dyn RpcClient>, DriverError> {
        let id = self.dials.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("dial rpc-{id}"));
        Ok(Arc::new(TestRpc {
            id,
            closed: AtomicBool::new(false),
            log: self.log.clone(),
        }))
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.log.push("shutdown");
        Ok(())
    }
}

pub struct TestGenerator {
    account: String,
    nonce: u64,
    fail_every: u64,
}

impl TransactionGenerator for TestGenerator {
    fn generate_transaction(&mut self) -> Result<Transaction, LoadError> {
        let nonce = self.nonce;
        self.nonce += 1;
        if self.fail_every > 0 && (nonce + 1) % self.fail_every == 0 {
            return Err(LoadError::Transaction("out of funds".to_string()));
        }
        Ok(Transaction {
            from: self.account.clone(),
            to: "app".to_string(),
            nonce,
            payload: vec![],
            signature: vec![],
        })
    }

    fn account(&self) -> &str {
        &self.account
    }
}

/// Load application with a scriptable received-count probe.
#[derive(Default)]
pub struct TestLoadApp {
    pub generators: AtomicUsize,
    pub deployed_checks: AtomicUsize,
    /// Number of probe calls that fail before the first success
    pub probe_failures: AtomicUsize,
    pub probes: AtomicUsize,
    pub received: AtomicU64,
    /// Every n-th generated transaction fails (0 = never)
    pub generator_fail_every: u64,
}

impl TestLoadApp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl LoadApplication for TestLoadApp {
    async fn create_generator(
        &self,
        _rpc: &Arc<dyn RpcClient>,
    ) -> Result<Box<dyn TransactionGenerator>, LoadError> {
        let id = self.generators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestGenerator {
            account: format!("user-{id}"),
            nonce: 0,
            fail_every: self.generator_fail_every,
        }))
    }

    async fn wait_until_deployed(&self, _rpc: &Arc<dyn RpcClient>) -> Result<(), LoadError> {
        self.deployed_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn received_transactions(&self, _rpc: &Arc<dyn RpcClient>) -> Result<u64, LoadError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let failures = self.probe_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.probe_failures.store(failures - 1, Ordering::SeqCst);
            return Err(LoadError::Query("connection reset".to_string()));
        }
        Ok(self.received.load(Ordering::SeqCst))
    }
}
