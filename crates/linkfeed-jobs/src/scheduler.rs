//! Update scheduler: keeps the post store fresh without hammering upstream.
//!
//! Producers (HTTP handlers and the periodic beat) only enqueue
//! [`RefreshRequest`] tokens. One worker task drains the queue and, for each
//! token, decides whether the data is stale enough to fetch. It alone owns
//! the last-fetch timestamp, the backoff state and the status sender.
//!
//! Every processed token bumps [`RefreshStatus::completed`], whether it
//! fetched, skipped or failed. Waiters subscribe to the status channel and
//! are released by the first cycle that started after they asked.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use linkfeed_core::{defaults, Error, LinkFetcher, PostRepository, Result};

/// Configuration for the update scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Minimum time between two real fetches. Also the beat period.
    pub throttle_interval: Duration,
    /// Pending refresh queue capacity. Enqueue waits while the queue is full.
    pub queue_capacity: usize,
    /// Deadline for one fetch-and-persist cycle.
    pub fetch_timeout: Duration,
    /// Backoff after the first consecutive failure.
    pub backoff_base: Duration,
    /// Upper bound on the backoff delay.
    pub backoff_max: Duration,
    /// Whether the periodic beat runs.
    pub beat_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            throttle_interval: Duration::from_secs(defaults::REFRESH_THROTTLE_SECS),
            queue_capacity: defaults::REFRESH_QUEUE_CAPACITY,
            fetch_timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECS),
            backoff_base: Duration::from_secs(defaults::REFRESH_BACKOFF_BASE_SECS),
            backoff_max: Duration::from_secs(defaults::REFRESH_BACKOFF_MAX_SECS),
            beat_enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REFRESH_THROTTLE_SECS` | `10` | Min seconds between fetches, beat period |
    /// | `REFRESH_QUEUE_CAPACITY` | `10000` | Pending refresh queue size |
    /// | `FETCH_TIMEOUT_SECS` | `20` | Fetch-and-persist deadline |
    /// | `REFRESH_BACKOFF_MAX_SECS` | `300` | Backoff ceiling after failures |
    /// | `REFRESH_BEAT_ENABLED` | `true` | Enable/disable the periodic beat |
    pub fn from_env() -> Self {
        let base = Self::default();

        let throttle_interval = env_secs("REFRESH_THROTTLE_SECS").unwrap_or(base.throttle_interval);
        let queue_capacity = std::env::var("REFRESH_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(base.queue_capacity)
            .max(1);
        let fetch_timeout = env_secs("FETCH_TIMEOUT_SECS").unwrap_or(base.fetch_timeout);
        let backoff_max = env_secs("REFRESH_BACKOFF_MAX_SECS").unwrap_or(base.backoff_max);
        let beat_enabled = std::env::var("REFRESH_BEAT_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Self {
            throttle_interval,
            queue_capacity,
            fetch_timeout,
            backoff_base: base.backoff_base,
            backoff_max,
            beat_enabled,
        }
    }

    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the backoff base delay and ceiling.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_beat_enabled(mut self, enabled: bool) -> Self {
        self.beat_enabled = enabled;
        self
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Backoff after `failures` consecutive failed cycles:
/// `base * 2^(failures - 1)`, capped at `max`. Zero when `failures` is zero.
pub fn backoff_delay(base: Duration, max: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    2u32.checked_pow(failures - 1)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(max, |delay| delay.min(max))
}

/// Token asking the worker for a refresh.
#[derive(Debug, Clone, Copy)]
pub struct RefreshRequest {
    enqueued_at: Instant,
}

impl RefreshRequest {
    pub fn now() -> Self {
        Self::at(Instant::now())
    }

    /// Token stamped with an explicit time, e.g. a beat tick's deadline.
    pub fn at(enqueued_at: Instant) -> Self {
        Self { enqueued_at }
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }
}

/// Why a cycle did not call upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The last successful fetch is younger than the throttle interval.
    Throttled,
    /// Still inside the backoff window of a failed fetch.
    BackingOff,
}

/// Result of one processed refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Fetched { fetched: usize, inserted: u64 },
    Skipped(SkipReason),
    Failed(String),
}

impl CycleOutcome {
    /// Short label for logs and health output.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Fetched { .. } => "fetched",
            CycleOutcome::Skipped(SkipReason::Throttled) => "throttled",
            CycleOutcome::Skipped(SkipReason::BackingOff) => "backing_off",
            CycleOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Fetched { fetched, inserted } => {
                write!(f, "fetched {} links, inserted {}", fetched, inserted)
            }
            CycleOutcome::Skipped(SkipReason::Throttled) => f.write_str("skipped: throttled"),
            CycleOutcome::Skipped(SkipReason::BackingOff) => f.write_str("skipped: backing off"),
            CycleOutcome::Failed(error) => write!(f, "failed: {}", error),
        }
    }
}

/// Snapshot published by the worker after each state change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
    /// Number of cycles the worker has begun.
    pub started: u64,
    /// Number of cycles the worker has finished.
    pub completed: u64,
    /// Outcome of the most recent finished cycle.
    pub last_outcome: Option<CycleOutcome>,
    /// Wall-clock time of the last successful fetch.
    pub last_fetch_at: Option<DateTime<Utc>>,
}

/// Cloneable producer handle.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    queue: mpsc::Sender<RefreshRequest>,
    status: watch::Receiver<RefreshStatus>,
}

impl RefreshTrigger {
    /// Enqueue a refresh token without waiting for it to be processed.
    ///
    /// Waits for queue space when the queue is full.
    pub async fn request_refresh(&self) -> Result<()> {
        self.queue
            .send(RefreshRequest::now())
            .await
            .map_err(|_| Error::SchedulerStopped)
    }

    /// Enqueue a refresh token and wait until a cycle that started after
    /// this call has completed. Returns the status published by that cycle
    /// (or a later one).
    pub async fn request_and_await_refresh(&self) -> Result<RefreshStatus> {
        let mut status = self.status.clone();
        let baseline = status.borrow_and_update().started;

        self.request_refresh().await?;

        let current = status
            .wait_for(|s| s.completed > baseline)
            .await
            .map_err(|_| Error::SchedulerStopped)?
            .clone();
        Ok(current)
    }

    /// Latest published status.
    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    /// Whether the worker is still accepting tokens.
    pub fn is_running(&self) -> bool {
        !self.queue.is_closed()
    }
}

/// Handle for controlling a running scheduler.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) also
/// stops both tasks, but does not wait for them.
pub struct SchedulerHandle {
    trigger: RefreshTrigger,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
    beat: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger.clone()
    }

    /// Stop the beat and the worker, aborting an in-flight cycle, and wait
    /// for both tasks to exit. Pending waiters fail with
    /// `Error::SchedulerStopped`.
    pub async fn shutdown(self) -> Result<()> {
        info!(subsystem = "scheduler", "Update scheduler shutting down");
        self.shutdown_tx.send_replace(true);

        let mut result = Ok(());
        if let Some(beat) = self.beat {
            if let Err(e) = beat.await {
                error!(subsystem = "scheduler", component = "beat", error = ?e, "Beat task panicked");
                result = Err(Error::Internal(format!("Beat task failed: {}", e)));
            }
        }
        if let Err(e) = self.worker.await {
            error!(subsystem = "scheduler", component = "worker", error = ?e, "Worker task panicked");
            result = Err(Error::Internal(format!("Worker task failed: {}", e)));
        }
        result
    }
}

/// Scheduler owning the fetch and persist collaborators.
pub struct UpdateScheduler {
    fetcher: Arc<dyn LinkFetcher>,
    posts: Arc<dyn PostRepository>,
    config: SchedulerConfig,
}

impl UpdateScheduler {
    pub fn new(
        fetcher: Arc<dyn LinkFetcher>,
        posts: Arc<dyn PostRepository>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            fetcher,
            posts,
            config,
        }
    }

    /// Spawn the worker and beat tasks and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(RefreshStatus::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            subsystem = "scheduler",
            throttle_ms = self.config.throttle_interval.as_millis() as u64,
            queue_capacity = self.config.queue_capacity,
            fetch_timeout_ms = self.config.fetch_timeout.as_millis() as u64,
            beat_enabled = self.config.beat_enabled,
            "Update scheduler started"
        );

        let beat = if self.config.beat_enabled && !self.config.throttle_interval.is_zero() {
            Some(tokio::spawn(run_beat(
                self.config.throttle_interval,
                queue_tx.clone(),
                shutdown_rx.clone(),
            )))
        } else {
            if self.config.beat_enabled {
                warn!(subsystem = "scheduler", component = "beat", "Throttle interval is zero, beat disabled");
            }
            None
        };

        let worker = Worker {
            fetcher: self.fetcher,
            posts: self.posts,
            config: self.config,
            queue: queue_rx,
            status: status_tx,
            shutdown: shutdown_rx,
            cycle: 0,
            last_fetch: None,
            failures: 0,
            backoff_until: None,
        };
        let worker = tokio::spawn(worker.run());

        SchedulerHandle {
            trigger: RefreshTrigger {
                queue: queue_tx,
                status: status_rx,
            },
            shutdown_tx,
            worker,
            beat,
        }
    }
}

/// Resolves once shutdown was requested or the handle was dropped.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn run_beat(
    period: Duration,
    queue: mpsc::Sender<RefreshRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => break,
            deadline = ticker.tick() => {
                debug!(subsystem = "scheduler", component = "beat", "Beat requesting refresh");
                // Tick deadline, not send time: beats stay one period apart.
                tokio::select! {
                    biased;
                    _ = stopped(&mut shutdown) => break,
                    sent = queue.send(RefreshRequest::at(deadline.into_std())) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    debug!(subsystem = "scheduler", component = "beat", "Beat stopped");
}

/// Single writer of the throttle timestamp, backoff and status.
struct Worker {
    fetcher: Arc<dyn LinkFetcher>,
    posts: Arc<dyn PostRepository>,
    config: SchedulerConfig,
    queue: mpsc::Receiver<RefreshRequest>,
    status: watch::Sender<RefreshStatus>,
    shutdown: watch::Receiver<bool>,
    cycle: u64,
    /// Enqueue time of the token that triggered the last successful fetch.
    last_fetch: Option<Instant>,
    failures: u32,
    backoff_until: Option<Instant>,
}

impl Worker {
    #[instrument(skip(self), fields(subsystem = "scheduler", component = "worker"))]
    async fn run(mut self) {
        loop {
            let request = tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => break,
                request = self.queue.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            if !self.process(request).await {
                break;
            }
        }
        info!("Update scheduler stopped");
    }

    /// Handle one token. Returns `false` when shutdown interrupted the cycle.
    async fn process(&mut self, request: RefreshRequest) -> bool {
        self.cycle += 1;
        let cycle = self.cycle;
        self.status.send_modify(|s| s.started = cycle);

        let queue_wait_ms = request.enqueued_at().elapsed().as_millis() as u64;
        let now = Instant::now();

        let outcome = if let Some(reason) = self.skip_reason(now, request.enqueued_at()) {
            debug!(cycle, queue_wait_ms, reason = ?reason, "Refresh skipped");
            CycleOutcome::Skipped(reason)
        } else {
            debug!(cycle, queue_wait_ms, "Data stale, fetching");
            match self.fetch_and_persist(cycle, request.enqueued_at()).await {
                Some(outcome) => outcome,
                None => return false,
            }
        };

        let last_fetch_at = (matches!(outcome, CycleOutcome::Fetched { .. })).then(Utc::now);
        self.status.send_modify(|s| {
            s.completed = cycle;
            s.last_outcome = Some(outcome);
            if last_fetch_at.is_some() {
                s.last_fetch_at = last_fetch_at;
            }
        });
        true
    }

    /// Throttling compares token timestamps, so a token enqueued while the
    /// previous fetch was running is coalesced onto it. Backoff uses the
    /// current time.
    fn skip_reason(&self, now: Instant, enqueued_at: Instant) -> Option<SkipReason> {
        if self.backoff_until.is_some_and(|until| now < until) {
            return Some(SkipReason::BackingOff);
        }
        match self.last_fetch {
            Some(last)
                if enqueued_at.saturating_duration_since(last) < self.config.throttle_interval =>
            {
                Some(SkipReason::Throttled)
            }
            _ => None,
        }
    }

    /// Run fetch + persist in its own task under the fetch timeout.
    /// Returns `None` if shutdown arrived first.
    async fn fetch_and_persist(&mut self, cycle: u64, enqueued_at: Instant) -> Option<CycleOutcome> {
        let start = Instant::now();
        let fetcher = self.fetcher.clone();
        let posts = self.posts.clone();
        let mut task = tokio::spawn(async move {
            let links = fetcher.fetch().await?;
            let inserted = posts.insert_ignoring_duplicates(&links).await?;
            Ok::<_, Error>((links.len(), inserted))
        });

        let result = tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => {
                task.abort();
                info!(cycle, "In-flight fetch aborted by shutdown");
                return None;
            }
            joined = tokio::time::timeout(self.config.fetch_timeout, &mut task) => match joined {
                Ok(Ok(Ok(counts))) => Ok(counts),
                Ok(Ok(Err(e))) => Err(e.to_string()),
                Ok(Err(e)) => {
                    error!(cycle, error = ?e, "Fetch task panicked");
                    Err(format!("Fetch task failed: {}", e))
                }
                Err(_) => {
                    task.abort();
                    Err(Error::Timeout(format!(
                        "fetch exceeded {}ms",
                        self.config.fetch_timeout.as_millis()
                    ))
                    .to_string())
                }
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok((fetched, inserted)) => {
                self.last_fetch = Some(enqueued_at);
                self.failures = 0;
                self.backoff_until = None;
                info!(cycle, fetched, inserted, duration_ms, "Fetch cycle completed");
                CycleOutcome::Fetched { fetched, inserted }
            }
            Err(error) => {
                self.failures = self.failures.saturating_add(1);
                let delay = backoff_delay(self.config.backoff_base, self.config.backoff_max, self.failures);
                self.backoff_until = Some(Instant::now() + delay);
                warn!(
                    cycle,
                    %error,
                    failures = self.failures,
                    backoff_ms = delay.as_millis() as u64,
                    duration_ms,
                    "Fetch cycle failed, backoff armed"
                );
                CycleOutcome::Failed(error)
            }
        };
        Some(outcome)
    }
}
