//! Applications whose load is produced by an [`AppController`].

use crate::controller::{AppController, ControllerConfig};
use crate::driver::{Application, ApplicationConfig, DriverError, Network};
use crate::load::{LoadApplication, LoadError};
use crate::metrics::ControllerStats;
use crate::shaper;
use async_trait::async_trait;
use norma_env::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

enum State {
    Ready(AppController),
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<Result<(), LoadError>>,
    },
    Stopped,
}

/// An [`Application`] driven by a load controller.
///
/// `start` spawns the controller with a fresh cancellation token, `stop`
/// cancels it and waits for the worker pool to shut down. An application
/// runs at most once.
pub struct ManagedApplication {
    config: ApplicationConfig,
    app: Arc<dyn LoadApplication>,
    network: Arc<dyn Network>,
    stats: ControllerStats,
    state: Mutex<State>,
}

impl ManagedApplication {
    /// Builds the shaper for `config.rate` and prepares the controller.
    pub async fn create(
        config: ApplicationConfig,
        app: Arc<dyn LoadApplication>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        controller_config: ControllerConfig,
    ) -> Result<Self, LoadError> {
        let controller = AppController::new(
            config.name.clone(),
            app.clone(),
            shaper::from_rate(&config.rate),
            config.users,
            None,
            network.clone(),
            clock,
            controller_config,
        )
        .await?;

        Ok(Self {
            config,
            app,
            network,
            stats: controller.stats(),
            state: Mutex::new(State::Ready(controller)),
        })
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats.clone()
    }
}

#[async_trait]
impl Application for ManagedApplication {
    fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    async fn start(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        let controller = match std::mem::replace(&mut *state, State::Stopped) {
            State::Ready(controller) => controller,
            other => {
                *state = other;
                return Err(DriverError::application(format!(
                    "{} was already started",
                    self.config.name
                )));
            }
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(controller.run(cancel.clone()));
        *state = State::Running { cancel, handle };
        info!("Application {} started", self.config.name);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        let (cancel, handle) = match std::mem::replace(&mut *state, State::Stopped) {
            State::Running { cancel, handle } => (cancel, handle),
            other => {
                debug!("Application {} is not running", self.config.name);
                *state = other;
                return Ok(());
            }
        };

        cancel.cancel();
        let result = handle
            .await
            .map_err(|e| {
                DriverError::application(format!(
                    "{}: controller panicked: {}",
                    self.config.name, e
                ))
            })?;
        result.map_err(|e| DriverError::application(format!("{}: {}", self.config.name, e)))?;
        info!(
            "Application {} stopped after {} transactions",
            self.config.name,
            self.stats.total_sent()
        );
        Ok(())
    }

    fn number_of_users(&self) -> usize {
        self.stats.workers()
    }

    fn sent_transactions(&self, user: usize) -> Result<u64, DriverError> {
        self.stats.sent(user).ok_or_else(|| {
            DriverError::application(format!("{} has no user {}", self.config.name, user))
        })
    }

    fn total_sent_transactions(&self) -> u64 {
        self.stats.total_sent()
    }

    async fn received_transactions(&self) -> Result<u64, DriverError> {
        let rpc = self.network.dial_random_rpc().await?;
        let received = self.app.received_transactions(&rpc).await;
        rpc.close().await;
        received.map_err(|e| DriverError::application(format!("{}: {}", self.config.name, e)))
    }
}
