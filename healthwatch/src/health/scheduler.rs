//! Periodic health watch
//!
//! Each subscription owns one task that ticks on a fixed-rate timer, runs an
//! aggregated check per tick and pushes the result into the subscriber's
//! sink. The task ends when the subscription is cancelled, the receiving
//! side goes away, a check fails as a whole, or the scheduler shuts down.
//!
//! # Tick semantics
//!
//! Ticks are anchored to the subscription start (first tick at t=0) and do
//! not drift with check duration. Up to `max_in_flight` checks may run at
//! once for one subscription; a tick that finds the queue full is skipped.
//! Results are always delivered in tick order.
//!
//! # Example
//!
//! ```rust,ignore
//! let scheduler = WatchScheduler::new(service, WatchSettings::default());
//! let (handle, mut updates) = scheduler.watch(vec!["database".into()], 5).await?;
//!
//! while let Some(update) = updates.next().await {
//!     println!("{:?}", update?.overall_status);
//! }
//!
//! scheduler.shutdown().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use futures::stream::FuturesOrdered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::model::AggregateResult;
use super::service::HealthCheckService;
use crate::config::HealthConfig;
use crate::error::{Error, Result};

/// Receiving end of a watch: one item per tick, an `Err` is terminal
pub type WatchSink = mpsc::Sender<Result<AggregateResult>>;

/// Stream of watch updates handed to subscribers
pub type WatchUpdates = ReceiverStream<Result<AggregateResult>>;

/// Unique identifier for a watch subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by [`WatchScheduler::subscribe`]
///
/// Dropping the handle does not cancel the subscription; the subscription
/// also ends when the sink's receiver is dropped.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    interval: Duration,
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Subscription identifier
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Effective tick interval after normalization
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop ticking; an in-flight check finishes but is not delivered
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Shortest period a subscription may tick at
pub const MIN_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Interval used when a request asks for zero or less
    pub default_interval: Duration,
    /// Timeout hint passed to every tick's check
    pub check_timeout: Duration,
    /// Outbound queue depth for [`WatchScheduler::watch`]
    pub buffer: usize,
    /// Checks one subscription may have running at once
    pub max_in_flight: usize,
    /// How long shutdown waits for subscription tasks
    pub shutdown_grace: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for WatchSettings {
    fn from(config: &HealthConfig) -> Self {
        Self {
            default_interval: config.watch_default_interval().max(MIN_WATCH_INTERVAL),
            check_timeout: config.watch_check_timeout(),
            buffer: config.watch_buffer.max(1),
            max_in_flight: config.watch_max_in_flight.max(1),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Why a subscription task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Cancelled,
    Shutdown,
    Disconnected,
    Errored,
}

struct Subscription {
    components: Vec<String>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct Registry {
    accepting: bool,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

struct SchedulerInner {
    service: HealthCheckService,
    settings: WatchSettings,
    registry: Mutex<Registry>,
    root_token: CancellationToken,
}

/// Drives periodic checks for every active watch subscription
#[derive(Clone)]
pub struct WatchScheduler {
    inner: Arc<SchedulerInner>,
}

impl WatchScheduler {
    /// Create a scheduler running checks through `service`
    pub fn new(service: HealthCheckService, settings: WatchSettings) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                service,
                settings,
                registry: Mutex::new(Registry {
                    accepting: true,
                    subscriptions: HashMap::new(),
                }),
                root_token: CancellationToken::new(),
            }),
        }
    }

    /// Scheduler settings
    pub fn settings(&self) -> &WatchSettings {
        &self.inner.settings
    }

    /// Interval actually used for a requested number of seconds
    ///
    /// Never shorter than [`MIN_WATCH_INTERVAL`], whatever the settings say.
    pub fn effective_interval(&self, interval_secs: i64) -> Duration {
        u64::try_from(interval_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.inner.settings.default_interval)
            .max(MIN_WATCH_INTERVAL)
    }

    /// Start a subscription delivering into `sink`
    ///
    /// The first check runs immediately. Fails with [`Error::ShuttingDown`]
    /// once [`WatchScheduler::shutdown`] has been called.
    pub async fn subscribe(
        &self,
        components: Vec<String>,
        interval_secs: i64,
        sink: WatchSink,
    ) -> Result<SubscriptionHandle> {
        let interval = self.effective_interval(interval_secs);

        let mut registry = self.inner.registry.lock().await;
        if !registry.accepting {
            return Err(Error::ShuttingDown);
        }

        let id = SubscriptionId::new();
        let token = self.inner.root_token.child_token();

        // Spawned under the registry lock so the task cannot deregister
        // itself before it is registered
        let task = tokio::spawn(run_subscription(
            self.inner.clone(),
            id,
            components.clone(),
            interval,
            sink,
            token.clone(),
        ));

        tracing::info!(
            subscription_id = %id,
            components = ?components,
            interval_secs = interval.as_secs(),
            "Watch subscription started"
        );

        registry.subscriptions.insert(
            id,
            Subscription {
                components,
                token: token.clone(),
                task,
            },
        );

        Ok(SubscriptionHandle {
            id,
            interval,
            token,
        })
    }

    /// Start a subscription and return its update stream
    ///
    /// Dropping the stream cancels the subscription.
    pub async fn watch(
        &self,
        components: Vec<String>,
        interval_secs: i64,
    ) -> Result<(SubscriptionHandle, WatchUpdates)> {
        let (tx, rx) = mpsc::channel(self.inner.settings.buffer.max(1));
        let handle = self.subscribe(components, interval_secs, tx).await?;
        Ok((handle, ReceiverStream::new(rx)))
    }

    /// Cancel a subscription and release it
    ///
    /// Returns false if the subscription already ended.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.registry.lock().await.subscriptions.remove(&id);

        match removed {
            Some(subscription) => {
                subscription.token.cancel();
                tracing::info!(
                    subscription_id = %id,
                    components = ?subscription.components,
                    "Watch subscription cancelled"
                );
                true
            }
            None => false,
        }
    }

    /// Number of live subscriptions
    pub async fn active_subscriptions(&self) -> usize {
        self.inner.registry.lock().await.subscriptions.len()
    }

    /// Whether shutdown has started
    pub async fn is_shut_down(&self) -> bool {
        !self.inner.registry.lock().await.accepting
    }

    /// Stop accepting subscriptions and cancel every live one
    ///
    /// Waits up to the configured grace period for subscription tasks to
    /// finish their in-flight checks, then aborts the rest. Safe to call more
    /// than once.
    pub async fn shutdown(&self) {
        let drained: Vec<(SubscriptionId, Subscription)> = {
            let mut registry = self.inner.registry.lock().await;
            if !registry.accepting && registry.subscriptions.is_empty() {
                tracing::debug!("Watch scheduler already shut down");
                return;
            }
            registry.accepting = false;
            registry.subscriptions.drain().collect()
        };

        self.inner.root_token.cancel();

        if drained.is_empty() {
            tracing::info!("Watch scheduler stopped with no active subscriptions");
            return;
        }

        tracing::info!(
            subscription_count = drained.len(),
            "Watch scheduler stopping, cancelling all subscriptions..."
        );

        let mut tasks: Vec<(SubscriptionId, JoinHandle<()>)> = drained
            .into_iter()
            .map(|(id, subscription)| (id, subscription.task))
            .collect();

        let grace = self.inner.settings.shutdown_grace;
        let waiting = join_all(tasks.iter_mut().map(|(_, task)| task));
        let outcome = tokio::time::timeout(grace, waiting).await;

        match outcome {
            Ok(results) => {
                for ((id, _), result) in tasks.iter().zip(results) {
                    if let Err(e) = result {
                        tracing::warn!(
                            subscription_id = %id,
                            error = %e,
                            "Watch task failed during shutdown"
                        );
                    }
                }
                tracing::info!("All watch subscriptions stopped");
            }
            Err(_) => {
                for (id, task) in &tasks {
                    if !task.is_finished() {
                        tracing::warn!(
                            subscription_id = %id,
                            "Watch task shutdown timed out, aborting"
                        );
                        task.abort();
                    }
                }
            }
        }
    }
}

impl fmt::Debug for WatchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchScheduler")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

async fn run_subscription(
    inner: Arc<SchedulerInner>,
    id: SubscriptionId,
    components: Vec<String>,
    interval: Duration,
    sink: WatchSink,
    token: CancellationToken,
) {
    let termination = drive_ticks(&inner, id, &components, interval, &sink, &token).await;

    // Already gone if unsubscribe or shutdown got here first
    inner.registry.lock().await.subscriptions.remove(&id);
    token.cancel();

    match termination {
        Termination::Errored => {
            tracing::warn!(subscription_id = %id, "Watch subscription ended with an error")
        }
        other => {
            tracing::info!(subscription_id = %id, reason = ?other, "Watch subscription ended")
        }
    }
}

async fn drive_ticks(
    inner: &SchedulerInner,
    id: SubscriptionId,
    components: &[String],
    interval: Duration,
    sink: &WatchSink,
    token: &CancellationToken,
) -> Termination {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let max_in_flight = inner.settings.max_in_flight.max(1);
    let mut in_flight: FuturesOrdered<BoxFuture<'static, Result<AggregateResult>>> =
        FuturesOrdered::new();
    let mut tick: u64 = 0;

    let termination = loop {
        tokio::select! {
            biased;

            () = token.cancelled() => {
                break if inner.root_token.is_cancelled() {
                    Termination::Shutdown
                } else {
                    Termination::Cancelled
                };
            }
            () = sink.closed() => break Termination::Disconnected,
            Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                match outcome {
                    Ok(result) => {
                        tracing::debug!(
                            subscription_id = %id,
                            overall_status = %result.overall_status,
                            duration_ms = result.duration_ms,
                            "Delivering watch update"
                        );
                        match deliver(sink, token, Ok(result)).await {
                            Delivery::Delivered => {}
                            Delivery::Cancelled => continue,
                            Delivery::Disconnected => break Termination::Disconnected,
                        }
                    }
                    Err(e) => {
                        tracing::error!(subscription_id = %id, error = %e, "Watch check failed");
                        deliver(sink, token, Err(e)).await;
                        break Termination::Errored;
                    }
                }
            }
            _ = ticker.tick() => {
                tick += 1;
                if in_flight.len() >= max_in_flight {
                    tracing::debug!(
                        subscription_id = %id,
                        tick,
                        in_flight = in_flight.len(),
                        "Previous check still running, skipping tick"
                    );
                    continue;
                }
                in_flight.push_back(tick_check(
                    inner.service.clone(),
                    components.to_vec(),
                    inner.settings.check_timeout,
                ));
            }
        }
    };

    // Let running checks finish on cancellation; their results are dropped
    if matches!(termination, Termination::Cancelled | Termination::Shutdown) {
        while in_flight.next().await.is_some() {}
    }

    termination
}

fn tick_check(
    service: HealthCheckService,
    components: Vec<String>,
    timeout: Duration,
) -> BoxFuture<'static, Result<AggregateResult>> {
    async move {
        AssertUnwindSafe(service.try_check(&components, true, Some(timeout)))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(Error::Internal("watch check panicked".to_string())))
    }
    .boxed()
}

enum Delivery {
    Delivered,
    Cancelled,
    Disconnected,
}

/// Push one item unless the subscription was cancelled meanwhile
async fn deliver(
    sink: &WatchSink,
    token: &CancellationToken,
    item: Result<AggregateResult>,
) -> Delivery {
    if token.is_cancelled() {
        return Delivery::Cancelled;
    }

    tokio::select! {
        biased;

        () = token.cancelled() => Delivery::Cancelled,
        sent = sink.send(item) => match sent {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Disconnected,
        },
    }
}
