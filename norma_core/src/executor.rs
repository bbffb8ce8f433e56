//! Scenario Executor - discrete-event scheduling of a scenario run.
//! ===============================================================
//!
//! A scenario is compiled into timed events:
//!
//! ```text
//! t=start  create node A-0 ─┐                        t=end  remove + stop A-0 ──> cleanup A-0
//! t=start  create+start load-0                       t=end  stop load-0
//! t=D      shutdown (no-op, keeps the run alive until the end)
//! ```
//!
//! Events carry a tagged [`Action`] naming an arena slot instead of closing
//! over shared state; running an action may yield successor events. The run
//! loop pops the earliest event, waits for its time on the [`Clock`] and runs
//! it. Events due at the same instant run in the order they were queued.

use crate::driver::{Application, ApplicationConfig, DriverError, Network, Node, NodeConfig};
use crate::scenario::Scenario;
use crate::validation::ValidationErrors;
use norma_env::{Clock, EnvError, Time};
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delays above this are reported with the event.
const DELAY_REPORT_THRESHOLD: Duration = Duration::from_secs(1);

// =============================================================================
// ERRORS
// =============================================================================

/// Lifecycle step an action was performing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    CreateNode,
    RemoveNode,
    StopNode,
    CleanupNode,
    CreateApplication,
    StartApplication,
    StopApplication,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Phase::CreateNode => "creating node",
            Phase::RemoveNode => "removing node",
            Phase::StopNode => "stopping node",
            Phase::CleanupNode => "cleaning up node",
            Phase::CreateApplication => "creating application",
            Phase::StartApplication => "starting application",
            Phase::StopApplication => "stopping application",
        };
        write!(f, "{phase}")
    }
}

/// A failed lifecycle action, tagged with what was being done to whom.
#[derive(Debug, Error)]
#[error("[{target}] {phase} failed: {source}")]
pub struct LifecycleError {
    pub target: String,
    pub phase: Phase,
    #[source]
    pub source: DriverError,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid scenario:\n{0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Clock error: {0}")]
    Clock(#[from] EnvError),

    #[error("Aborted by user")]
    Aborted,
}

// =============================================================================
// EVENTS
// =============================================================================

/// What an event does. Indices refer to the executor's node and application arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// End of the scenario; does nothing
    Shutdown,
    CreateNode(usize),
    /// Detaches and stops a node, then schedules its cleanup
    StopNode(usize),
    CleanupNode(usize),
    /// Creates and starts an application
    StartApplication(usize),
    StopApplication(usize),
    /// Cheating attempt; logged only
    Cheat,
}

/// A single action due at (approximately) a given time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub time: Time,
    /// Short description for logging
    pub name: String,
    pub action: Action,
}

impl Event {
    pub fn new(time: Time, name: impl Into<String>, action: Action) -> Self {
        Self {
            time,
            name: name.into(),
            action,
        }
    }
}

struct Queued {
    seq: u64,
    event: Event,
}

impl Queued {
    fn key(&self) -> (Time, u64) {
        (self.event.time, self.seq)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Min-queue of events ordered by time, then by insertion order.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Queued>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Queued { seq, event }));
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.push(event);
        }
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(queued)| queued.event)
    }

    pub fn peek_time(&self) -> Option<Time> {
        self.heap.peek().map(|Reverse(queued)| queued.event.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// =============================================================================
// RUN LOG
// =============================================================================

/// One processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub name: String,
    pub scheduled: Time,
    pub processed: Time,
}

/// Everything the executor processed, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunLog {
    pub events: Vec<EventRecord>,
    /// Clock time when the queue ran empty
    pub final_time: Time,
}

impl RunLog {
    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    /// Largest lag between scheduled and processed time.
    pub fn max_delay(&self) -> Duration {
        self.events
            .iter()
            .map(|e| (e.processed - e.scheduled).to_duration())
            .max()
            .unwrap_or_default()
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

struct NodeSlot {
    config: NodeConfig,
    handle: Option<Arc<dyn Node>>,
}

struct AppSlot {
    config: ApplicationConfig,
    handle: Option<Arc<dyn Application>>,
}

/// Runs scenarios against a network.
pub struct Executor {
    clock: Arc<dyn Clock>,
    network: Arc<dyn Network>,
    nodes: Vec<NodeSlot>,
    apps: Vec<AppSlot>,
    queue: EventQueue,
}

impl Executor {
    /// Executes `scenario` on `network`, using `clock` as the time source.
    ///
    /// Fails before scheduling anything if the scenario is invalid. The first
    /// failing lifecycle action ends the run; cancelling `abort` ends it with
    /// [`ExecutorError::Aborted`] at the next wait.
    pub async fn run(
        clock: Arc<dyn Clock>,
        network: Arc<dyn Network>,
        scenario: &Scenario,
        abort: CancellationToken,
    ) -> Result<RunLog, ExecutorError> {
        scenario.check()?;

        let mut executor = Self::new(clock, network);
        executor.schedule(scenario);
        info!(
            "Scenario {}: {} events scheduled over {}s",
            scenario.name,
            executor.queue.len(),
            scenario.end_time()
        );
        executor.process(abort).await
    }

    fn new(clock: Arc<dyn Clock>, network: Arc<dyn Network>) -> Self {
        Self {
            clock,
            network,
            nodes: Vec::new(),
            apps: Vec::new(),
            queue: EventQueue::new(),
        }
    }

    /// Compiles a scenario into queued events.
    fn schedule(&mut self, scenario: &Scenario) {
        let end = scenario.end_time();
        self.queue.push(Event::new(end, "shutdown", Action::Shutdown));

        for group in &scenario.nodes {
            let (start, stop) = (group.start_time(), group.end_time(end));
            for i in 0..group.instances() {
                let name = format!("{}-{}", group.name, i);
                let slot = self.nodes.len();
                self.nodes.push(NodeSlot {
                    config: NodeConfig {
                        name: name.clone(),
                        validator: group.is_validator(),
                    },
                    handle: None,
                });
                self.queue.push(Event::new(
                    start,
                    format!("[{name}] Creating node"),
                    Action::CreateNode(slot),
                ));
                self.queue.push(Event::new(
                    stop,
                    format!("[{name}] Stopping node"),
                    Action::StopNode(slot),
                ));
            }
        }

        for group in &scenario.applications {
            let (start, stop) = (group.start_time(), group.end_time(end));
            for i in 0..group.instances() {
                let name = format!("{}-{}", group.name, i);
                let slot = self.apps.len();
                self.apps.push(AppSlot {
                    config: ApplicationConfig {
                        name: name.clone(),
                        app_type: group.app_type().to_string(),
                        users: group.users(),
                        rate: group.rate.clone(),
                    },
                    handle: None,
                });
                self.queue.push(Event::new(
                    start,
                    format!("[{name}] Starting application"),
                    Action::StartApplication(slot),
                ));
                self.queue.push(Event::new(
                    stop,
                    format!("[{name}] Stopping application"),
                    Action::StopApplication(slot),
                ));
            }
        }

        for cheat in &scenario.cheats {
            self.queue.push(Event::new(
                cheat.start_time(),
                format!("[{}] Attempting cheat", cheat.name),
                Action::Cheat,
            ));
        }
    }

    async fn process(mut self, abort: CancellationToken) -> Result<RunLog, ExecutorError> {
        let mut log = RunLog::default();

        // Network setup may have taken a while.
        self.clock.restart();

        while let Some(event) = self.queue.pop() {
            tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    info!("Received user abort, ending execution");
                    return Err(ExecutorError::Aborted);
                }
                slept = self.clock.sleep_until(event.time) => slept?,
            }

            let delay = self.clock.delay(event.time);
            if delay > DELAY_REPORT_THRESHOLD {
                info!(
                    "Processing '{}' at time {} (delay: {:.1}s)",
                    event.name,
                    event.time,
                    delay.as_secs_f64()
                );
            } else {
                info!("Processing '{}' at time {}", event.name, event.time);
            }
            log.events.push(EventRecord {
                name: event.name.clone(),
                scheduled: event.time,
                processed: self.clock.now(),
            });

            let successors = self.execute(&event).await?;
            self.queue.extend(successors);
        }

        log.final_time = self.clock.now();
        info!("Scenario completed at time {}", log.final_time);
        Ok(log)
    }

    /// Runs one action, returning its successor events.
    async fn execute(&mut self, event: &Event) -> Result<Vec<Event>, LifecycleError> {
        match event.action {
            Action::Shutdown => Ok(Vec::new()),

            Action::Cheat => {
                warn!("{}: cheats are not supported, nothing happens", event.name);
                Ok(Vec::new())
            }

            Action::CreateNode(slot) => {
                let node = &mut self.nodes[slot];
                let handle = self
                    .network
                    .create_node(&node.config)
                    .await
                    .map_err(|e| lifecycle(&node.config.name, Phase::CreateNode, e))?;
                node.handle = Some(handle);
                Ok(Vec::new())
            }

            Action::StopNode(slot) => {
                let node = &self.nodes[slot];
                let Some(handle) = node.handle.clone() else {
                    debug!("[{}] No node to stop", node.config.name);
                    return Ok(Vec::new());
                };
                let name = &node.config.name;
                self.network
                    .remove_node(&handle)
                    .await
                    .map_err(|e| lifecycle(name, Phase::RemoveNode, e))?;
                handle
                    .stop()
                    .await
                    .map_err(|e| lifecycle(name, Phase::StopNode, e))?;
                Ok(vec![Event::new(
                    event.time,
                    format!("[{name}] Cleaning up node"),
                    Action::CleanupNode(slot),
                )])
            }

            Action::CleanupNode(slot) => {
                let node = &mut self.nodes[slot];
                let Some(handle) = node.handle.take() else {
                    return Ok(Vec::new());
                };
                handle
                    .cleanup()
                    .await
                    .map_err(|e| lifecycle(&node.config.name, Phase::CleanupNode, e))?;
                Ok(Vec::new())
            }

            Action::StartApplication(slot) => {
                let app = &mut self.apps[slot];
                let name = app.config.name.clone();
                let handle = self
                    .network
                    .create_application(&app.config)
                    .await
                    .map_err(|e| lifecycle(&name, Phase::CreateApplication, e))?;
                app.handle = Some(handle.clone());
                handle
                    .start()
                    .await
                    .map_err(|e| lifecycle(&name, Phase::StartApplication, e))?;
                Ok(Vec::new())
            }

            Action::StopApplication(slot) => {
                let app = &self.apps[slot];
                let Some(handle) = app.handle.clone() else {
                    debug!("[{}] No application to stop", app.config.name);
                    return Ok(Vec::new());
                };
                handle
                    .stop()
                    .await
                    .map_err(|e| lifecycle(&app.config.name, Phase::StopApplication, e))?;
                Ok(Vec::new())
            }
        }
    }
}

fn lifecycle(target: &str, phase: Phase, source: DriverError) -> LifecycleError {
    LifecycleError {
        target: target.to_string(),
        phase,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ApplicationGroup, Cheat, NodeGroup, Rate};
    use crate::testing::TestNetwork;
    use norma_env::{SimClock, WallClock};
    use proptest::prelude::*;

    fn scenario(duration: f64) -> Scenario {
        Scenario {
            name: "test".to_string(),
            duration,
            nodes: vec![],
            applications: vec![],
            cheats: vec![],
        }
    }

    fn node(name: &str, instances: Option<i64>, start: Option<f64>, end: Option<f64>) -> NodeGroup {
        NodeGroup {
            name: name.to_string(),
            instances,
            start,
            end,
            ..Default::default()
        }
    }

    async fn run(network: &Arc<TestNetwork>, scenario: &Scenario) -> Result<RunLog, ExecutorError> {
        Executor::run(
            SimClock::shared(),
            network.clone(),
            scenario,
            CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_empty_scenario_runs_to_end() {
        let network = TestNetwork::new();
        let clock = SimClock::shared();
        let log = Executor::run(
            clock.clone(),
            network.clone(),
            &scenario(10.0),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(log.names(), vec!["shutdown"]);
        assert_eq!(log.final_time, Time::from_secs(10));
        assert_eq!(clock.now(), Time::from_secs(10));
        assert!(network.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_cheats_are_scheduled_and_logged() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, None, None));
        s.cheats.push(Cheat {
            name: "double-sign".to_string(),
            start: Some(4.0),
        });

        let log = run(&network, &s).await.unwrap();

        let cheat = log
            .events
            .iter()
            .find(|e| e.name == "[double-sign] Attempting cheat")
            .unwrap();
        assert_eq!(cheat.processed, Time::from_secs(4));
        assert_eq!(log.events.len(), 5);
        // Nothing reaches the network
        assert_eq!(network.log.count("create_node"), 1);
        assert_eq!(network.log.entries().len(), 4);
    }

    #[tokio::test]
    async fn test_single_node_lifecycle() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, Some(3.0), Some(7.0)));

        let log = run(&network, &s).await.unwrap();

        assert_eq!(
            network.log.entries(),
            vec!["create_node A-0", "remove_node A-0", "stop_node A-0", "cleanup_node A-0"]
        );
        assert_eq!(
            log.names(),
            vec![
                "[A-0] Creating node",
                "[A-0] Stopping node",
                "[A-0] Cleaning up node",
                "shutdown"
            ]
        );
        let times: Vec<Time> = log.events.iter().map(|e| e.processed).collect();
        assert_eq!(
            times,
            vec![Time::from_secs(3), Time::from_secs(7), Time::from_secs(7), Time::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_multiple_instances_are_named_by_index() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", Some(2), None, None));

        run(&network, &s).await.unwrap();

        assert_eq!(network.log.count("create_node A-"), 2);
        assert_eq!(network.log.count("create_node A-0"), 1);
        assert_eq!(network.log.count("create_node A-1"), 1);
        assert_eq!(network.log.count("cleanup_node A-"), 2);
    }

    #[tokio::test]
    async fn test_zero_instances_schedule_nothing() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", Some(0), None, None));

        let log = run(&network, &s).await.unwrap();

        assert_eq!(log.names(), vec!["shutdown"]);
        assert!(network.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_start_equals_end_creates_then_stops() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, Some(5.0), Some(5.0)));

        run(&network, &s).await.unwrap();

        assert_eq!(
            network.log.entries(),
            vec!["create_node A-0", "remove_node A-0", "stop_node A-0", "cleanup_node A-0"]
        );
    }

    #[tokio::test]
    async fn test_application_lifecycle() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, None, None));
        s.applications.push(ApplicationGroup {
            name: "load".to_string(),
            instances: Some(2),
            start: Some(2.0),
            end: Some(8.0),
            rate: Rate {
                constant: Some(10.0),
                ..Default::default()
            },
            ..Default::default()
        });

        run(&network, &s).await.unwrap();

        assert_eq!(
            network.log.entries(),
            vec![
                "create_node A-0",
                "create_app load-0",
                "start_app load-0",
                "create_app load-1",
                "start_app load-1",
                "stop_app load-0",
                "stop_app load-1",
                "remove_node A-0",
                "stop_node A-0",
                "cleanup_node A-0",
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_scenario_is_rejected_before_running() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, Some(20.0), None));

        let err = run(&network, &s).await.unwrap_err();

        assert!(matches!(err, ExecutorError::Invalid(_)));
        assert!(network.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_failing_create_aborts_with_wrapped_error() {
        let network = Arc::new(TestNetwork {
            fail_create: Some("A-1".to_string()),
            ..Default::default()
        });
        let mut s = scenario(10.0);
        s.nodes.push(node("A", Some(2), Some(1.0), None));

        let err = run(&network, &s).await.unwrap_err();

        match err {
            ExecutorError::Lifecycle(e) => {
                assert_eq!(e.target, "A-1");
                assert_eq!(e.phase, Phase::CreateNode);
                assert_eq!(e.source, DriverError::node("boot failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing after the failure was processed
        assert_eq!(network.log.entries(), vec!["create_node A-0", "create_node A-1"]);
    }

    #[tokio::test]
    async fn test_failing_stop_reports_phase() {
        let network = Arc::new(TestNetwork {
            fail_stop: Some("A-0".to_string()),
            ..Default::default()
        });
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, None, Some(4.0)));

        let err = run(&network, &s).await.unwrap_err();

        assert_eq!(err.to_string(), "[A-0] stopping node failed: Node error: stop failed");
    }

    #[tokio::test]
    async fn test_stop_without_handle_is_noop() {
        let network = TestNetwork::new();
        let mut executor = Executor::new(SimClock::shared(), network.clone());
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, None, None));
        s.applications.push(ApplicationGroup {
            name: "load".to_string(),
            ..Default::default()
        });
        executor.schedule(&s);

        for action in [Action::StopNode(0), Action::CleanupNode(0), Action::StopApplication(0)] {
            let successors = executor
                .execute(&Event::new(Time::ZERO, "stop", action))
                .await
                .unwrap();
            assert!(successors.is_empty());
        }
        assert!(network.log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_abort_before_start() {
        let network = TestNetwork::new();
        let mut s = scenario(10.0);
        s.nodes.push(node("A", None, None, None));
        let abort = CancellationToken::new();
        abort.cancel();

        let err = Executor::run(SimClock::shared(), network.clone(), &s, abort)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::Aborted));
        assert!(network.log.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_while_waiting_on_wall_clock() {
        let network = TestNetwork::new();
        let mut s = scenario(100.0);
        s.nodes.push(node("A", None, Some(1.0), None));
        let abort = CancellationToken::new();

        let handle = tokio::spawn({
            let network = network.clone();
            let abort = abort.clone();
            async move { Executor::run(WallClock::shared(), network, &s, abort).await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        abort.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ExecutorError::Aborted));
        // Created at t=1, never stopped
        assert_eq!(network.log.entries(), vec!["create_node A-0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_run_is_on_time() {
        let network = TestNetwork::new();
        let mut s = scenario(5.0);
        s.nodes.push(node("A", None, Some(1.0), Some(4.0)));

        let clock = WallClock::shared();
        let log = Executor::run(clock, network.clone(), &s, CancellationToken::new())
            .await
            .unwrap();

        assert!(log.final_time >= Time::from_secs(5));
        assert!(log.max_delay() < Duration::from_millis(10));
    }

    #[test]
    fn test_queue_orders_by_time_then_insertion() {
        let mut queue = EventQueue::new();
        queue.push(Event::new(Time::from_secs(2), "c", Action::Shutdown));
        queue.push(Event::new(Time::from_secs(1), "a", Action::Shutdown));
        queue.push(Event::new(Time::from_secs(2), "d", Action::Shutdown));
        queue.push(Event::new(Time::from_secs(1), "b", Action::Shutdown));

        assert_eq!(queue.peek_time(), Some(Time::from_secs(1)));
        let names: Vec<String> = std::iter::from_fn(|| queue.pop()).map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_queue_pops_in_time_order(times in prop::collection::vec(0i64..1_000, 0..64)) {
            let mut queue = EventQueue::new();
            for (i, t) in times.iter().enumerate() {
                queue.push(Event::new(Time::from_millis(*t), i.to_string(), Action::Shutdown));
            }
            let mut last: Option<(Time, usize)> = None;
            while let Some(event) = queue.pop() {
                let index: usize = event.name.parse().unwrap();
                if let Some((time, prev)) = last {
                    prop_assert!(time < event.time || (time == event.time && prev < index));
                }
                last = Some((event.time, index));
            }
        }

        #[test]
        fn prop_run_ends_at_duration(
            duration in 1u32..1_000,
            start in 0u32..1_000,
            len in 0u32..1_000,
        ) {
            let duration = duration as f64;
            let start = (start as f64).min(duration);
            let end = (start + len as f64).min(duration);
            let mut s = scenario(duration);
            s.nodes.push(node("A", Some(2), Some(start), Some(end)));

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let network = TestNetwork::new();
            let clock = SimClock::shared();
            let log = runtime
                .block_on(Executor::run(clock, network.clone(), &s, CancellationToken::new()))
                .unwrap();

            prop_assert_eq!(log.final_time, Time::from_secs_f64(duration));
            prop_assert_eq!(network.log.count("create_node"), 2);
            prop_assert_eq!(network.log.count("cleanup_node"), 2);
            for pair in log.events.windows(2) {
                prop_assert!(pair[0].processed <= pair[1].processed);
            }
        }
    }
}
