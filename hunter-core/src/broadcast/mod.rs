//! Pool event broadcaster.
//!
//! The broadcaster duplicates every message produced into it to all
//! registered pool consumers:
//!
//! 1. Startup code owns one [`BroadcasterCell`] and obtains the broadcaster
//!    through [`BroadcasterCell::get_or_create`].
//! 2. Each producer gets a [`Responder`] from
//!    [`EventBroadcaster::new_producer`]; a background task owns the
//!    responder's input.
//! 3. For every message, that task snapshots the consumer registry and
//!    attempts a non-blocking delivery to each consumer.
//!
//! Consumers are removed explicitly, by dropping their [`ConsumerLease`], or
//! when their receiver is found closed during fan-out.

mod responder;
mod sink;

pub use responder::{Responder, ResponderClosed};
pub use sink::{consumer_channel, ConsumerId, ConsumerReceiver, ConsumerSink, Delivery};

use crate::events::{shutdown_requested, ProducerMeta, ShutdownReceiver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Capacity of a producer's input. One slot is the closest tokio gets to an
/// unbuffered hand-off.
const PRODUCER_INPUT_BUFFER: usize = 1;

/// Holds the process's single broadcaster.
///
/// Owned by startup code; every caller of [`get_or_create`](Self::get_or_create)
/// observes the same instance.
pub struct BroadcasterCell<M> {
    cell: OnceLock<EventBroadcaster<M>>,
}

impl<M> BroadcasterCell<M>
where
    M: Clone + Send + 'static,
{
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the broadcaster, constructing it on first use.
    ///
    /// `shutdown_rx` bounds the lifetime of every fan-out task. It is only
    /// consulted by the first call.
    pub fn get_or_create(&self, shutdown_rx: &ShutdownReceiver) -> EventBroadcaster<M> {
        self.cell
            .get_or_init(|| {
                info!("Creating pool event broadcaster");
                EventBroadcaster::new(shutdown_rx.clone())
            })
            .clone()
    }

    pub fn get(&self) -> Option<EventBroadcaster<M>> {
        self.cell.get().cloned()
    }
}

impl<M> Default for BroadcasterCell<M>
where
    M: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Multiplexes produced messages to all registered consumers.
///
/// Cloning is cheap; clones share the same registry.
pub struct EventBroadcaster<M> {
    inner: Arc<BroadcasterInner<M>>,
}

struct BroadcasterInner<M> {
    shutdown_rx: ShutdownReceiver,
    consumers: Mutex<HashMap<ConsumerId, ConsumerEntry<M>>>,
    next_generation: AtomicU64,
}

struct ConsumerEntry<M> {
    generation: u64,
    sink: ConsumerSink<M>,
}

/// Summary of delivering one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

impl<M> EventBroadcaster<M>
where
    M: Clone + Send + 'static,
{
    fn new(shutdown_rx: ShutdownReceiver) -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                shutdown_rx,
                consumers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Install or overwrite the sink for `id`.
    ///
    /// Dropping the returned lease unregisters the consumer, unless a newer
    /// registration has replaced it in the meantime.
    pub fn register_consumer(&self, id: ConsumerId, sink: ConsumerSink<M>) -> ConsumerLease<M> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .inner
            .lock_consumers()
            .insert(id, ConsumerEntry { generation, sink })
            .is_some();

        debug!(consumer_id = id, replaced, "Registered pool consumer");

        ConsumerLease {
            id,
            generation,
            broadcaster: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Remove the consumer registered under `id`.
    pub fn unregister_consumer(&self, id: ConsumerId) -> bool {
        let removed = self.inner.lock_consumers().remove(&id).is_some();
        if removed {
            debug!(consumer_id = id, "Unregistered pool consumer");
        }
        removed
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.lock_consumers().len()
    }

    /// Create a responder whose messages are fanned out to all consumers.
    ///
    /// Spawns the producer's fan-out task, which ends when shutdown is
    /// signalled or the responder is dropped.
    pub fn new_producer(&self, meta: ProducerMeta) -> Responder<M> {
        let (input_tx, input_rx) = mpsc::channel(PRODUCER_INPUT_BUFFER);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(fan_out_loop(inner, meta.clone(), input_rx));
        Responder::new(meta, input_tx)
    }

    /// Deliver `message` to every consumer registered right now.
    pub fn fan_out(&self, message: M) -> FanOutReport {
        self.inner.fan_out(message)
    }
}

impl<M> Clone for EventBroadcaster<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> BroadcasterInner<M>
where
    M: Clone,
{
    fn lock_consumers(&self) -> MutexGuard<'_, HashMap<ConsumerId, ConsumerEntry<M>>> {
        // The map stays consistent even if a holder panicked.
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_if_current(&self, id: ConsumerId, generation: u64) -> bool {
        let mut consumers = self.lock_consumers();
        match consumers.get(&id) {
            Some(entry) if entry.generation == generation => {
                consumers.remove(&id);
                true
            }
            _ => false,
        }
    }

    fn fan_out(&self, message: M) -> FanOutReport {
        // Copy out under the lock, deliver without it.
        let snapshot: Vec<(ConsumerId, u64, ConsumerSink<M>)> = self
            .lock_consumers()
            .iter()
            .map(|(id, entry)| (*id, entry.generation, entry.sink.clone()))
            .collect();

        let mut report = FanOutReport::default();
        for (id, generation, sink) in snapshot {
            match sink.try_deliver(message.clone()) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Full => {
                    trace!(consumer_id = id, "Pool consumer full, dropping message");
                    report.dropped += 1;
                }
                Delivery::Closed => {
                    if self.remove_if_current(id, generation) {
                        debug!(consumer_id = id, "Pruned disconnected pool consumer");
                        report.pruned += 1;
                    }
                }
            }
        }
        report
    }
}

async fn fan_out_loop<M>(
    inner: Arc<BroadcasterInner<M>>,
    meta: ProducerMeta,
    mut input_rx: mpsc::Receiver<M>,
) where
    M: Clone + Send + 'static,
{
    debug!(producer = %meta, "Broadcast producer started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown_requested(inner.shutdown_rx.clone()) => {
                debug!(producer = %meta, "Broadcast producer received shutdown signal");
                break;
            }

            message = input_rx.recv() => {
                let Some(message) = message else {
                    debug!(producer = %meta, "Broadcast producer input closed");
                    break;
                };
                let report = inner.fan_out(message);
                trace!(
                    producer = %meta,
                    delivered = report.delivered,
                    dropped = report.dropped,
                    pruned = report.pruned,
                    "Fanned out message"
                );
            }
        }
    }
}

/// Keeps a consumer registered for as long as it is held.
#[must_use = "dropping the lease unregisters the consumer"]
pub struct ConsumerLease<M> {
    id: ConsumerId,
    generation: u64,
    broadcaster: Option<Weak<BroadcasterInner<M>>>,
}

impl<M> ConsumerLease<M> {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Keep the registration for the lifetime of the broadcaster.
    pub fn detach(mut self) {
        self.broadcaster = None;
    }
}

impl<M> Drop for ConsumerLease<M> {
    fn drop(&mut self) {
        let Some(inner) = self.broadcaster.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        let mut consumers = inner.consumers.lock().unwrap_or_else(PoisonError::into_inner);
        if consumers
            .get(&self.id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            consumers.remove(&self.id);
            debug!(consumer_id = self.id, "Pool consumer lease released");
        }
    }
}
