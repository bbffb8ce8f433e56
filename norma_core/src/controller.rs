//! Load Controller - turns a traffic shape into submitted transactions.
//!
//! One controller drives one application instance:
//!
//! ```text
//!                 ┌──────────────┐  try_send   ┌─────────┐  recv   ┌──────────┐
//!   Shaper ──────>│ pacing loop  │────────────>│ trigger │────────>│ worker i │──> Network
//!   (count/wait)  └──────────────┘  (missed)   │ channel │         └──────────┘
//!                        │                     └─────────┘      (one per user)
//!                        └── probe received (≤ 1/s) ──> LoadInfoSource view
//! ```
//!
//! The pacing loop is the only sender of the bounded trigger channel and the
//! only owner of the shaper. Workers share the receiving end through an async
//! mutex; each owns one generator and thus one account, so nonces of an
//! account are always produced in order.

use crate::driver::{Network, RpcClient};
use crate::load::{LoadApplication, LoadError, LoadInfoSource, TransactionGenerator};
use crate::metrics::{ControllerStats, SentCounters};
use crate::shaper::Shaper;
use norma_env::{Clock, Time};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime settings of an [`AppController`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// How long shutdown waits for workers before aborting them
    pub shutdown_timeout: Duration,
    /// Re-dials attempted when the received-transactions probe fails
    pub received_retries: usize,
    /// Minimum time between two received-transactions probes
    pub probe_interval: Duration,
    /// Trigger channel capacity, `None` = number of workers
    pub channel_capacity: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
            received_retries: 5,
            probe_interval: Duration::from_secs(1),
            channel_capacity: None,
        }
    }
}

impl ControllerConfig {
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_received_retries(mut self, retries: usize) -> Self {
        self.received_retries = retries;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }
}

/// The shaper's view of this controller's traffic.
///
/// Sent counts are live; received counts are the last probed value. While
/// the latest probe failed the received count is reported as an error.
struct ProbeView {
    stats: ControllerStats,
    probe_failed: Arc<AtomicBool>,
}

impl LoadInfoSource for ProbeView {
    fn sent_transactions(&self) -> Result<u64, LoadError> {
        Ok(self.stats.total_sent())
    }

    fn received_transactions(&self) -> Result<u64, LoadError> {
        if self.probe_failed.load(Ordering::Relaxed) {
            return Err(LoadError::Query("received-transactions probe failed".to_string()));
        }
        Ok(self.stats.last_received())
    }
}

/// Emits transactions for one application at the pace set by a shaper.
pub struct AppController {
    name: String,
    app: Arc<dyn LoadApplication>,
    shaper: Box<dyn Shaper>,
    generators: Vec<Box<dyn TransactionGenerator>>,
    rpc: Arc<dyn RpcClient>,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
    stats: ControllerStats,
    probe_failed: Arc<AtomicBool>,
}

impl AppController {
    /// Prepares a controller: dials an RPC client if none is given, creates
    /// one generator per user and waits until the application is deployed.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        name: impl Into<String>,
        app: Arc<dyn LoadApplication>,
        shaper: Box<dyn Shaper>,
        num_users: usize,
        rpc: Option<Arc<dyn RpcClient>>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
    ) -> Result<Self, LoadError> {
        let name = name.into();
        let rpc = match rpc {
            Some(rpc) => rpc,
            None => network.dial_random_rpc().await?,
        };

        let num_users = num_users.max(1);
        let mut generators = Vec::with_capacity(num_users);
        for i in 0..num_users {
            generators.push(app.create_generator(&rpc).await?);
            debug!("[{}] Initialized {} of {} users", name, i + 1, num_users);
        }

        debug!("[{}] Waiting until the application is deployed", name);
        app.wait_until_deployed(&rpc).await?;
        info!("[{}] Application deployed with {} users", name, num_users);

        Ok(Self {
            name,
            app,
            shaper,
            generators,
            rpc,
            network,
            clock,
            config,
            stats: ControllerStats::new(num_users),
            probe_failed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn number_of_users(&self) -> usize {
        self.generators.len()
    }

    /// Live statistics; stays valid after the controller is consumed by [`run`](Self::run).
    pub fn stats(&self) -> ControllerStats {
        self.stats.clone()
    }

    /// Produces load until `cancel` fires, then shuts the worker pool down.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), LoadError> {
        let AppController {
            name,
            app,
            mut shaper,
            generators,
            mut rpc,
            network,
            clock,
            config,
            stats,
            probe_failed,
        } = self;

        let workers = generators.len();
        let capacity = config.channel_capacity.unwrap_or(workers).max(1);
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(capacity);
        let trigger_rx = Arc::new(Mutex::new(trigger_rx));

        let handles: Vec<JoinHandle<()>> = generators
            .into_iter()
            .enumerate()
            .map(|(id, generator)| {
                tokio::spawn(worker_loop(
                    id,
                    generator,
                    trigger_rx.clone(),
                    network.clone(),
                    stats.sent.clone(),
                ))
            })
            .collect();

        shaper.start(Arc::new(ProbeView {
            stats: stats.clone(),
            probe_failed: probe_failed.clone(),
        }));

        let mut prober = Prober {
            app,
            network: network.clone(),
            retries: config.received_retries,
        };

        let origin = clock.now();
        let mut last = Time::ZERO;
        let mut last_probe: Option<Time> = None;
        let mut pending = 0.0;
        let mut result = Ok(());

        info!("[{}] Load started with {} workers", name, workers);
        while !cancel.is_cancelled() {
            let now = clock.now() - origin;

            let probe_due = match last_probe {
                None => true,
                Some(at) => (now - at).to_duration() >= config.probe_interval,
            };
            if probe_due {
                last_probe = Some(now);
                match prober.received(&mut rpc).await {
                    Ok(received) => {
                        stats.received.store(received, Ordering::Relaxed);
                        probe_failed.store(false, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("[{}] Failed to fetch received transactions: {}", name, e);
                        probe_failed.store(true, Ordering::Relaxed);
                    }
                }
            }

            pending += shaper.messages_in_interval(last, now);
            last = now;

            while pending >= 1.0 {
                pending -= 1.0;
                if trigger_tx.try_send(()).is_err() {
                    stats.missed.fetch_add(1, Ordering::Relaxed);
                }
            }

            let wait = shaper.next_wait_time(now, pending).max(MIN_WAIT);
            let deadline = origin + now + wait;
            tokio::select! {
                _ = cancel.cancelled() => break,
                slept = clock.sleep_until(deadline) => {
                    if let Err(e) = slept {
                        result = Err(LoadError::Clock(e.to_string()));
                        break;
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        info!(
            "[{}] Load stopped: sent={} missed={}",
            name,
            stats.total_sent(),
            stats.missed()
        );

        // Closing the channel lets workers drain and exit.
        drop(trigger_tx);
        let mut handles = handles;
        let joined = tokio::time::timeout(config.shutdown_timeout, async {
            for handle in handles.iter_mut() {
                if let Err(e) = handle.await {
                    warn!("[{}] Worker terminated abnormally: {}", name, e);
                }
            }
        })
        .await;
        if joined.is_err() {
            warn!(
                "[{}] Workers did not stop within {:?}, aborting",
                name, config.shutdown_timeout
            );
            for handle in &handles {
                handle.abort();
            }
        }

        rpc.close().await;
        result
    }
}

/// Lower bound on pacing sleeps.
const MIN_WAIT: Duration = Duration::from_micros(1);

/// Received-transactions probe with re-dial on failure.
struct Prober {
    app: Arc<dyn LoadApplication>,
    network: Arc<dyn Network>,
    retries: usize,
}

impl Prober {
    async fn received(&mut self, rpc: &mut Arc<dyn RpcClient>) -> Result<u64, LoadError> {
        let mut retry = 0;
        loop {
            match self.app.received_transactions(rpc).await {
                Ok(received) => return Ok(received),
                Err(e) if retry >= self.retries => return Err(e),
                Err(e) => {
                    debug!("Probe failed ({}), re-dialing, attempt {}", e, retry + 1);
                    rpc.close().await;
                    *rpc = self.network.dial_random_rpc().await?;
                    retry += 1;
                }
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    mut generator: Box<dyn TransactionGenerator>,
    triggers: Arc<Mutex<mpsc::Receiver<()>>>,
    network: Arc<dyn Network>,
    sent: SentCounters,
) {
    loop {
        let trigger = triggers.lock().await.recv().await;
        if trigger.is_none() {
            break;
        }

        let tx = match generator.generate_transaction() {
            Ok(tx) => tx,
            Err(e) => {
                warn!(
                    "Worker {} ({}): failed to generate transaction: {}",
                    id,
                    generator.account(),
                    e
                );
                continue;
            }
        };
        match network.send_transaction(tx).await {
            Ok(()) => sent.increment(id),
            Err(e) => warn!(
                "Worker {} ({}): failed to send transaction: {}",
                id,
                generator.account(),
                e
            ),
        }
    }
    debug!("Worker {} stopped", id);
}
