use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    HandleMessageContext, Multiplexer, Subscription, SubscriptionError, SubscriptionGroupSettings,
};
use crate::message::Message;
use crate::middleware::{
    LoggingMiddleware, MiddlewareChain, MonitoringMiddleware, PostProcessingMiddleware,
};
use crate::monitor::MonitorGuard;
use crate::serialization::SerializationRegistry;
use crate::transport::{QueueClient, RawMessage};

/// Pause after a poll that returned nothing, so a reader never spins on a
/// transport that answers an empty poll without suspending.
const EMPTY_POLL_IDLE: Duration = Duration::from_millis(10);

/// Lifecycle of a subscription group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupState {
    Stopped,
    Starting,
    Running,
    Draining,
}

/// A decoded message waiting in the buffer.
struct Received {
    queue: String,
    raw: RawMessage,
    message: Box<dyn Message>,
}

/// State shared by a group's readers and workers. Read-only once built.
struct Pipeline {
    settings: SubscriptionGroupSettings,
    chain: MiddlewareChain,
    client: Arc<dyn QueueClient>,
    registry: Arc<SerializationRegistry>,
    monitor: MonitorGuard,
}

struct Active {
    cancellation: CancellationToken,
    supervisor: JoinHandle<()>,
}

/// Scheduler owning a set of queues, a bounded buffer and a worker pool.
///
/// ```ignore
/// let group = SubscriptionGroup::new(subscription, client, registry, monitor);
/// group.start(&shutdown)?;
/// // ...
/// group.stop().await; // drains in-flight work
/// ```
pub struct SubscriptionGroup {
    pipeline: Arc<Pipeline>,
    state: Arc<watch::Sender<GroupState>>,
    active: Mutex<Option<Active>>,
}

impl SubscriptionGroup {
    /// Build a group whose chain is logging → monitoring → post-processing →
    /// the subscription's own middleware → handler.
    pub fn new(
        subscription: Subscription,
        client: Arc<dyn QueueClient>,
        registry: Arc<SerializationRegistry>,
        monitor: MonitorGuard,
    ) -> Self {
        let Subscription {
            settings,
            handlers,
            middleware,
        } = subscription;

        let chain = middleware.into_iter().fold(
            MiddlewareChain::new(Arc::new(handlers))
                .with(Arc::new(LoggingMiddleware))
                .with(Arc::new(MonitoringMiddleware::new(monitor.clone())))
                .with(Arc::new(PostProcessingMiddleware)),
            MiddlewareChain::with,
        );

        let (state, _) = watch::channel(GroupState::Stopped);
        Self {
            pipeline: Arc::new(Pipeline {
                settings,
                chain,
                client,
                registry,
                monitor,
            }),
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.pipeline.settings.name
    }

    pub fn settings(&self) -> &SubscriptionGroupSettings {
        &self.pipeline.settings
    }

    pub fn chain(&self) -> &MiddlewareChain {
        &self.pipeline.chain
    }

    pub fn state(&self) -> GroupState {
        *self.state.borrow()
    }

    /// Wait until the group reaches `state`.
    pub async fn wait_for_state(&self, state: GroupState) {
        let mut receiver = self.state.subscribe();
        loop {
            if *receiver.borrow_and_update() == state {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start one reader per queue and the worker pool.
    ///
    /// The group stops when `parent` or the group's own token is cancelled.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, parent: &CancellationToken) -> Result<(), SubscriptionError> {
        let mut active = self.active();
        let state = self.state();
        if state != GroupState::Stopped {
            return Err(SubscriptionError::AlreadyStarted {
                group: self.name().to_string(),
                state,
            });
        }

        let settings = &self.pipeline.settings;
        self.state.send_replace(GroupState::Starting);
        info!(
            group = %settings.name,
            queues = ?settings.queues,
            concurrency_limit = settings.concurrency_limit,
            buffer_capacity = settings.buffer_capacity,
            "Starting subscription group"
        );

        let cancellation = parent.child_token();
        let buffer = Arc::new(Multiplexer::new(
            settings.buffer_capacity,
            cancellation.clone(),
        ));

        let mut readers = JoinSet::new();
        for queue in &settings.queues {
            readers.spawn(read_queue(
                self.pipeline.clone(),
                queue.clone(),
                buffer.clone(),
                cancellation.clone(),
            ));
        }

        let mut workers = JoinSet::new();
        for worker in 0..settings.concurrency_limit {
            workers.spawn(dispatch(
                self.pipeline.clone(),
                worker,
                buffer.clone(),
                cancellation.clone(),
            ));
        }

        self.state.send_replace(GroupState::Running);
        let supervisor = tokio::spawn(supervise(
            settings.name.clone(),
            self.state.clone(),
            cancellation.clone(),
            buffer,
            readers,
            workers,
        ));

        *active = Some(Active {
            cancellation,
            supervisor,
        });
        Ok(())
    }

    /// Cancel the group and wait for in-flight dispatches to finish.
    pub async fn stop(&self) {
        let active = self.active().take();
        if let Some(active) = active {
            active.cancellation.cancel();
            if let Err(err) = active.supervisor.await {
                error!(group = %self.name(), error = %err, "Subscription group supervisor failed");
                self.state.send_replace(GroupState::Stopped);
            }
        }
        self.wait_for_state(GroupState::Stopped).await;
    }
}

impl std::fmt::Debug for SubscriptionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGroup")
            .field("settings", &self.pipeline.settings)
            .field("state", &self.state())
            .field("chain", &self.pipeline.chain)
            .finish()
    }
}

/// Waits for cancellation, then for every reader and worker to exit.
async fn supervise(
    group: String,
    state: Arc<watch::Sender<GroupState>>,
    cancellation: CancellationToken,
    buffer: Arc<Multiplexer<Received>>,
    mut readers: JoinSet<()>,
    mut workers: JoinSet<()>,
) {
    cancellation.cancelled().await;
    state.send_replace(GroupState::Draining);
    info!(group = %group, "Draining subscription group");

    while let Some(result) = readers.join_next().await {
        if let Err(err) = result {
            error!(group = %group, error = %err, "Queue reader task failed");
        }
    }
    while let Some(result) = workers.join_next().await {
        if let Err(err) = result {
            error!(group = %group, error = %err, "Dispatch worker task failed");
        }
    }

    let mut left_behind = 0usize;
    while buffer.try_pop().is_some() {
        left_behind += 1;
    }
    if left_behind > 0 {
        info!(
            group = %group,
            count = left_behind,
            "Left buffered messages undeleted for redelivery"
        );
    }

    state.send_replace(GroupState::Stopped);
    info!(group = %group, "Subscription group stopped");
}

/// Poll one queue until cancelled, pushing decoded messages into the buffer.
async fn read_queue(
    pipeline: Arc<Pipeline>,
    queue: String,
    buffer: Arc<Multiplexer<Received>>,
    cancellation: CancellationToken,
) {
    let settings = &pipeline.settings;
    debug!(group = %settings.name, queue = %queue, "Queue reader started");

    'polling: while !cancellation.is_cancelled() {
        let batch = match pipeline
            .client
            .poll(&queue, settings.prefetch, settings.receive_wait_time)
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    group = %settings.name,
                    queue = %queue,
                    error = %err,
                    transient = err.is_transient(),
                    "Polling queue failed"
                );
                tokio::select! {
                    _ = cancellation.cancelled() => {}
                    _ = tokio::time::sleep(settings.poll_error_backoff) => {}
                }
                continue;
            }
        };

        if batch.is_empty() {
            tokio::select! {
                _ = cancellation.cancelled() => {}
                _ = tokio::time::sleep(EMPTY_POLL_IDLE) => {}
            }
            continue;
        }

        for raw in batch {
            let message = match pipeline.registry.deserialize(&raw.body) {
                Ok(message) => message,
                Err(err) => {
                    error!(
                        group = %settings.name,
                        queue = %queue,
                        message_id = %raw.message_id,
                        error = %err,
                        "Could not decode message; leaving it for redelivery"
                    );
                    pipeline
                        .monitor
                        .handle_exception(err.message_type().unwrap_or("unknown"));
                    continue;
                }
            };

            let item = Received {
                queue: queue.clone(),
                raw,
                message,
            };
            if buffer.push(item).await.is_err() {
                debug!(
                    group = %settings.name,
                    queue = %queue,
                    "Buffer closed; rest of batch left for redelivery"
                );
                break 'polling;
            }
        }
    }

    debug!(group = %settings.name, queue = %queue, "Queue reader stopped");
}

/// Pop and dispatch items until cancelled. An item already taken is always
/// run to completion.
async fn dispatch(
    pipeline: Arc<Pipeline>,
    worker: usize,
    buffer: Arc<Multiplexer<Received>>,
    cancellation: CancellationToken,
) {
    let group = &pipeline.settings.name;
    debug!(group = %group, worker, "Dispatch worker started");

    loop {
        let item = tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            item = buffer.pop() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let context = HandleMessageContext::new(
            item.message,
            item.raw,
            item.queue,
            pipeline.client.clone(),
            cancellation.clone(),
        );
        pipeline.chain.execute(&context).await;
    }

    debug!(group = %group, worker, "Dispatch worker stopped");
}
