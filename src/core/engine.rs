// Dashboard engine: one task owning history, scheduler, and timer
//
// Commands arrive over an mpsc channel and every refresh is published on a
// watch channel. Only this task touches the store, so appends from different
// cycles can never interleave.

use crate::core::config::FeedConfig;
use crate::core::error::{FeedError, Result};
use crate::core::fetch::{Fetch, FetchResult};
use crate::core::history::HistoryStore;
use crate::core::scheduler::{FailureSignal, Scheduler, TimerAction};
use crate::core::synthetic::{synthesize, SyntheticSample};
use crate::core::validator::validate_payload;
use crate::core::view::{self, ConnectionStatus, CycleCounters, ViewUpdate};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `None` keeps the current interval.
    Start(Option<Duration>),
    Stop,
    Toggle,
    SetInterval(Duration),
    TriggerNow,
    Reset,
    SelectPage(usize),
    Dispose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleTrigger {
    Scheduled,
    Manual,
}

/// Cheap, cloneable control surface for a running engine.
#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    updates: watch::Receiver<ViewUpdate>,
}

impl DashboardHandle {
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| FeedError::EngineClosed)
    }

    pub fn start(&self) -> Result<()> {
        self.send(Command::Start(None))
    }

    pub fn start_with(&self, interval: Duration) -> Result<()> {
        self.send(Command::Start(Some(interval)))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(Command::Toggle)
    }

    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        self.send(Command::SetInterval(interval))
    }

    pub fn trigger_now(&self) -> Result<()> {
        self.send(Command::TriggerNow)
    }

    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    pub fn select_page(&self, index: usize) -> Result<()> {
        self.send(Command::SelectPage(index))
    }

    /// Cancels the timer and ends the engine task.
    pub fn dispose(&self) -> Result<()> {
        self.send(Command::Dispose)
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewUpdate> {
        self.updates.clone()
    }

    pub fn current(&self) -> ViewUpdate {
        self.updates.borrow().clone()
    }
}

struct DashboardCore {
    config: FeedConfig,
    store: HistoryStore,
    scheduler: Scheduler,
    ticker: Option<Interval>,
    counters: CycleCounters,
    status: ConnectionStatus,
    last_error: Option<FeedError>,
    synthetic: Option<SyntheticSample>,
    page_index: usize,
    started: Instant,
    rng: StdRng,
    updates: watch::Sender<ViewUpdate>,
}

impl DashboardCore {
    fn new(config: FeedConfig, rng: StdRng) -> (Self, watch::Receiver<ViewUpdate>) {
        let store = HistoryStore::new(config.history_capacity);
        let scheduler = Scheduler::new(config.poll_interval(), config.error_threshold);
        let started = Instant::now();
        let placeholder = Self::render(
            &config,
            &store,
            &scheduler,
            ConnectionStatus::Connecting,
            CycleCounters::default(),
            Duration::ZERO,
            0,
            Utc::now(),
        );
        let (updates, receiver) = watch::channel(placeholder);
        let core = Self {
            config,
            store,
            scheduler,
            ticker: None,
            counters: CycleCounters::default(),
            status: ConnectionStatus::Connecting,
            last_error: None,
            synthetic: None,
            page_index: 0,
            started,
            rng,
            updates,
        };
        (core, receiver)
    }

    /// Applies a control command. Returns true when a manual fetch was requested.
    fn apply(&mut self, command: Command) -> bool {
        debug!("Command: {:?}", command);
        let action = match command {
            Command::Start(interval) => {
                let interval = interval.unwrap_or(self.scheduler.interval());
                self.scheduler.start(interval)
            }
            Command::Stop => self.scheduler.stop(),
            Command::Toggle => self.scheduler.toggle(),
            Command::SetInterval(interval) => self.scheduler.set_interval(interval),
            Command::TriggerNow => return true,
            Command::Reset => {
                self.store.reset();
                self.page_index = 0;
                info!("Local history cleared");
                TimerAction::Keep
            }
            Command::SelectPage(index) => {
                self.page_index = index;
                TimerAction::Keep
            }
            Command::Dispose => {
                self.dispose();
                return false;
            }
        };
        self.apply_timer(action);
        self.publish(Utc::now());
        false
    }

    fn apply_timer(&mut self, action: TimerAction) {
        match action {
            TimerAction::Arm(period) => {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                self.ticker = Some(ticker);
                self.status = ConnectionStatus::Connecting;
                info!("Polling every {} ms", period.as_millis());
            }
            TimerAction::Cancel => {
                self.ticker = None;
                self.status = ConnectionStatus::Disconnected;
                info!("Polling stopped");
            }
            TimerAction::Keep => {}
        }
    }

    fn complete_cycle(&mut self, result: FetchResult, now: DateTime<Utc>) {
        match result.and_then(|payload| validate_payload(&payload)) {
            Ok(batch) => {
                let received = batch.len();
                let inserted = self.store.append(batch);
                if self.scheduler.record_success() {
                    info!("Feed recovered");
                } else if self.status != ConnectionStatus::Connected {
                    info!("Feed connected");
                }
                debug!(
                    "Cycle ok: {} received, {} new, {} retained",
                    received,
                    inserted,
                    self.store.len()
                );
                self.status = ConnectionStatus::Connected;
                self.last_error = None;
                self.synthetic = None;
            }
            Err(e) => {
                self.counters.errors += 1;
                self.last_error = Some(e.clone());
                match self.scheduler.record_failure() {
                    FailureSignal::Transient { streak } => {
                        warn!("Fetch cycle failed ({}/{}): {}", streak, self.scheduler.threshold(), e);
                        self.status = ConnectionStatus::Error;
                    }
                    FailureSignal::Persistent { streak } => {
                        if streak == self.scheduler.threshold() {
                            error!("Source considered down after {} failures: {}", streak, e);
                        } else {
                            warn!("Fetch cycle failed ({} in a row): {}", streak, e);
                        }
                        self.status = ConnectionStatus::Disconnected;
                        if self.config.synthetic_fallback {
                            self.synthetic = Some(synthesize(&mut self.rng, &self.store, now));
                        }
                    }
                }
            }
        }
        self.publish(now);
    }

    fn dispose(&mut self) {
        self.scheduler.stop();
        self.ticker = None;
        self.status = ConnectionStatus::Disconnected;
        self.publish(Utc::now());
    }

    fn publish(&mut self, now: DateTime<Utc>) {
        let mut update = Self::render(
            &self.config,
            &self.store,
            &self.scheduler,
            self.status,
            self.counters,
            self.started.elapsed(),
            self.page_index,
            now,
        );
        self.page_index = update.table.page_index;
        update.last_error = self.last_error.as_ref().map(ToString::to_string);
        update.last_error_kind = self.last_error.as_ref().map(FeedError::kind);
        update.synthetic = self.synthetic.clone();
        self.updates.send_replace(update);
    }

    #[allow(clippy::too_many_arguments)]
    fn render(
        config: &FeedConfig,
        store: &HistoryStore,
        scheduler: &Scheduler,
        status: ConnectionStatus,
        counters: CycleCounters,
        uptime: Duration,
        page_index: usize,
        now: DateTime<Utc>,
    ) -> ViewUpdate {
        let offset = config.label_offset();
        ViewUpdate {
            status,
            scheduler: scheduler.state(),
            latest: view::latest_snapshot(store),
            chart: view::chart_series(store, config.chart_window_size, offset),
            table: view::table_page(store, config.page_size, page_index, now, offset),
            stats: view::stats(store, scheduler, counters, uptime),
            last_error: None,
            last_error_kind: None,
            synthetic: None,
            generated_at: now,
        }
    }
}

enum Wake {
    Command(Option<Command>),
    Tick,
}

pub struct Dashboard<F: Fetch> {
    fetcher: Arc<F>,
    commands: mpsc::UnboundedReceiver<Command>,
    core: DashboardCore,
    manual_pending: bool,
}

impl<F: Fetch> Dashboard<F> {
    /// Validates the config and spawns the engine on the current runtime.
    /// Starts polling right away when `autoStart` is set.
    pub fn spawn(config: FeedConfig, fetcher: F) -> Result<(DashboardHandle, JoinHandle<()>)> {
        config.validate()?;
        let auto_start = config.auto_start;
        let (tx, rx) = mpsc::unbounded_channel();
        let (core, updates) = DashboardCore::new(config, StdRng::from_entropy());
        let handle = DashboardHandle {
            commands: tx,
            updates,
        };
        if auto_start {
            handle.start()?;
        }

        let engine = Dashboard {
            fetcher: Arc::new(fetcher),
            commands: rx,
            core,
            manual_pending: false,
        };
        Ok((handle, tokio::spawn(engine.run())))
    }

    async fn run(mut self) {
        info!("Dashboard engine started");
        loop {
            if std::mem::take(&mut self.manual_pending) {
                if !self.cycle(CycleTrigger::Manual).await {
                    break;
                }
                continue;
            }

            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => Wake::Command(command),
                _ = next_tick(&mut self.core.ticker) => Wake::Tick,
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Dispose)) => break,
                Wake::Command(Some(command)) => {
                    if self.core.apply(command) {
                        self.manual_pending = true;
                    }
                }
                Wake::Tick => {
                    if !self.cycle(CycleTrigger::Scheduled).await {
                        break;
                    }
                }
            }
        }
        self.core.dispose();
        info!("Dashboard engine stopped");
    }

    /// Runs one fetch while still serving commands. Returns false on dispose.
    async fn cycle(&mut self, trigger: CycleTrigger) -> bool {
        self.core.counters.requests += 1;
        debug!("{:?} fetch cycle #{}", trigger, self.core.counters.requests);

        let fetcher = Arc::clone(&self.fetcher);
        let fetch = fetcher.fetch_once();
        tokio::pin!(fetch);

        let mut stopped_in_flight = false;
        let result = loop {
            tokio::select! {
                biased;
                result = &mut fetch => break result,
                command = self.commands.recv() => match command {
                    None | Some(Command::Dispose) => return false,
                    Some(command) => {
                        let was_running = self.core.scheduler.is_running();
                        if self.core.apply(command) {
                            // coalesced, runs once this fetch finishes
                            self.manual_pending = true;
                        }
                        if was_running && !self.core.scheduler.is_running() {
                            stopped_in_flight = true;
                        }
                    }
                },
            }
        };

        // a later start during the same fetch makes the result wanted again
        if stopped_in_flight && !self.core.scheduler.is_running() {
            info!("Discarding fetch result, polling was stopped mid-request");
            return true;
        }
        self.core.complete_cycle(result, Utc::now());
        true
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::SchedulerState;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn config() -> FeedConfig {
        let mut config = FeedConfig::new("http://sensor.test/data/sensor-data.json");
        config.poll_interval_ms = 1_000;
        config.history_capacity = 50;
        config
    }

    fn network_error() -> FetchResult {
        Err(FeedError::network(Some(500), "HTTP 500"))
    }

    fn core() -> DashboardCore {
        DashboardCore::new(config(), StdRng::seed_from_u64(9)).0
    }

    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<VecDeque<FetchResult>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<FetchResult>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Fetch for ScriptedFetcher {
        fn fetch_once(&self) -> impl Future<Output = FetchResult> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(network_error);
            async move { next }
        }
    }

    #[derive(Default)]
    struct GatedFetcher {
        started: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    impl Fetch for GatedFetcher {
        fn fetch_once(&self) -> impl Future<Output = FetchResult> + Send {
            async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.started.notify_one();
                self.release.notified().await;
                Ok(json!([{"id": 1, "temperature": 20.0, "timestamp": 1700000000}]))
            }
        }
    }

    async fn wait_for(
        rx: &mut watch::Receiver<ViewUpdate>,
        pred: impl Fn(&ViewUpdate) -> bool,
    ) -> ViewUpdate {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                {
                    let view = rx.borrow_and_update();
                    if pred(&view) {
                        return view.clone();
                    }
                }
                rx.changed().await.expect("engine dropped its sender");
            }
        })
        .await
        .expect("timed out waiting for view update")
    }

    #[test]
    fn test_core_scenario_dedups_refetch() {
        let mut core = core();
        let now = Utc::now();
        core.complete_cycle(
            Ok(json!([{"id": 1, "temperature": 24.5, "humidity": 55.0, "timestamp": 1700000000}])),
            now,
        );
        core.complete_cycle(
            Ok(json!([
                {"id": 1, "temperature": 24.5, "humidity": 55.0, "timestamp": 1700000000},
                {"id": 2, "temperature": 25.0, "humidity": 54.0, "timestamp": 1700000030}
            ])),
            now,
        );

        let view = core.updates.borrow().clone();
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert_eq!(view.stats.retained, 2);
        assert_eq!(view.latest.reading.unwrap().id.unwrap().to_string(), "2");
    }

    #[test]
    fn test_core_persistent_failure_exactly_at_threshold() {
        let mut core = core();
        let now = Utc::now();

        core.complete_cycle(network_error(), now);
        core.complete_cycle(network_error(), now);
        let view = core.updates.borrow().clone();
        assert_eq!(view.status, ConnectionStatus::Error);
        assert!(view.synthetic.is_none());
        assert_eq!(view.stats.error_streak, 2);

        core.complete_cycle(network_error(), now);
        let view = core.updates.borrow().clone();
        assert_eq!(view.status, ConnectionStatus::Disconnected);
        assert!(view.synthetic.is_some());
        assert_eq!(view.stats.retained, 0);
        assert_eq!(view.last_error.as_deref(), Some("Network error: HTTP 500"));
        assert_eq!(view.last_error_kind, Some("network"));
    }

    #[test]
    fn test_core_shape_error_counts_as_failure() {
        let mut core = core();
        core.complete_cycle(Ok(json!("not a reading")), Utc::now());
        let view = core.updates.borrow().clone();
        assert_eq!(view.stats.error_streak, 1);
        assert!(view.last_error.unwrap().starts_with("Payload shape error"));
        assert_eq!(view.last_error_kind, Some("shape"));
    }

    #[test]
    fn test_core_success_clears_synthetic() {
        let mut core = core();
        let now = Utc::now();
        for _ in 0..3 {
            core.complete_cycle(network_error(), now);
        }
        core.complete_cycle(Ok(json!({"id": "x", "humidity": 40.0})), now);

        let view = core.updates.borrow().clone();
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert!(view.synthetic.is_none());
        assert!(view.last_error.is_none());
        assert!(view.last_error_kind.is_none());
        assert_eq!(view.stats.error_streak, 0);
        assert_eq!(view.stats.error_total, 3);
    }

    #[test]
    fn test_core_synthetic_disabled() {
        let mut config = config();
        config.synthetic_fallback = false;
        let (mut core, rx) = DashboardCore::new(config, StdRng::seed_from_u64(1));
        for _ in 0..5 {
            core.complete_cycle(network_error(), Utc::now());
        }
        assert!(rx.borrow().synthetic.is_none());
    }

    #[test]
    fn test_core_page_selection_clamped() {
        let mut core = core();
        let batch: Vec<_> = (1..=15).map(|i| json!({"id": i, "temperature": 20.0})).collect();
        core.complete_cycle(Ok(json!(batch)), Utc::now());
        core.page_index = 7;
        core.publish(Utc::now());
        let view = core.updates.borrow().clone();
        assert_eq!(view.table.page_index, 1);
        assert_eq!(view.table.rows.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately() {
        let fetcher = ScriptedFetcher::new(vec![Ok(json!([
            {"id": 1, "temperature": 24.5, "humidity": 55.0, "timestamp": 1700000000}
        ]))]);
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&fetcher)).unwrap();
        let mut rx = handle.subscribe();

        let view = wait_for(&mut rx, |v| v.stats.request_count == 1).await;
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert_eq!(view.scheduler, SchedulerState::Running);
        assert_eq!(view.latest.temperature.display, "24.5");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_failure_disconnects() {
        let fetcher = ScriptedFetcher::new(Vec::new());
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&fetcher)).unwrap();
        let mut rx = handle.subscribe();

        let view = wait_for(&mut rx, |v| v.stats.error_streak >= 3).await;
        assert_eq!(view.status, ConnectionStatus::Disconnected);
        assert!(view.synthetic.is_some());
        assert_eq!(view.stats.retained, 0);
        assert!(fetcher.calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_result() {
        let gate = Arc::new(GatedFetcher::default());
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&gate)).unwrap();
        let mut rx = handle.subscribe();

        gate.started.notified().await;
        handle.stop().unwrap();
        wait_for(&mut rx, |v| v.scheduler == SchedulerState::Stopped).await;
        gate.release.notify_one();

        tokio::time::sleep(Duration::from_secs(10)).await;
        let view = handle.current();
        assert_eq!(view.stats.retained, 0);
        assert_eq!(view.status, ConnectionStatus::Disconnected);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_during_fetch_keeps_result() {
        let gate = Arc::new(GatedFetcher::default());
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&gate)).unwrap();
        let mut rx = handle.subscribe();

        gate.started.notified().await;
        handle.stop().unwrap();
        wait_for(&mut rx, |v| v.scheduler == SchedulerState::Stopped).await;
        handle.start().unwrap();
        wait_for(&mut rx, |v| v.scheduler == SchedulerState::Running).await;
        gate.release.notify_one();

        let view = wait_for(&mut rx, |v| v.stats.retained == 1).await;
        assert_eq!(view.status, ConnectionStatus::Connected);
        assert_eq!(view.scheduler, SchedulerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let fetcher = ScriptedFetcher::new(Vec::new());
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&fetcher)).unwrap();
        let mut rx = handle.subscribe();

        wait_for(&mut rx, |v| v.stats.request_count >= 2).await;
        handle.stop().unwrap();
        wait_for(&mut rx, |v| v.scheduler == SchedulerState::Stopped).await;
        let calls = fetcher.calls();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_now_without_schedule() {
        let mut config = config();
        config.auto_start = false;
        let fetcher = ScriptedFetcher::new(vec![Ok(json!({"id": 5, "humidity": 61.0}))]);
        let (handle, _join) = Dashboard::spawn(config, Arc::clone(&fetcher)).unwrap();
        let mut rx = handle.subscribe();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fetcher.calls(), 0);

        handle.trigger_now().unwrap();
        let view = wait_for(&mut rx, |v| v.stats.request_count == 1).await;
        assert_eq!(view.scheduler, SchedulerState::Idle);
        assert_eq!(view.latest.humidity.display, "61.0");
        assert_eq!(view.latest.temperature.display, "--");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_history_but_not_totals() {
        let fetcher = ScriptedFetcher::new(vec![Ok(json!([{"id": 1, "temperature": 20.0}]))]);
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&fetcher)).unwrap();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |v| v.stats.retained == 1).await;

        handle.reset().unwrap();
        let view = wait_for(&mut rx, |v| v.stats.retained == 0).await;
        assert!(view.latest.reading.is_none());
        assert_eq!(view.stats.total_received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_interval_restarts_schedule() {
        let fetcher = ScriptedFetcher::new(Vec::new());
        let (handle, _join) = Dashboard::spawn(config(), Arc::clone(&fetcher)).unwrap();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |v| v.stats.request_count >= 1).await;

        handle.set_interval(Duration::from_secs(60)).unwrap();
        // restart fires one immediate fetch, then waits the new interval
        tokio::time::sleep(Duration::from_millis(10)).await;
        let count = handle.current().stats.request_count;
        assert!(count >= 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.current().stats.request_count, count);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(handle.current().stats.request_count, count + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_ends_engine() {
        let fetcher = ScriptedFetcher::new(Vec::new());
        let (handle, join) = Dashboard::spawn(config(), fetcher).unwrap();

        handle.dispose().unwrap();
        join.await.unwrap();
        assert_eq!(handle.current().scheduler, SchedulerState::Stopped);
        assert_eq!(handle.stop(), Err(FeedError::EngineClosed));
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let result = Dashboard::spawn(FeedConfig::default(), ScriptedFetcher::new(Vec::new()));
        assert!(matches!(result, Err(FeedError::Config(_))));
    }
}
