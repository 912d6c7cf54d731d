//! Bounded per-consumer queues with a non-blocking delivery contract.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier a pool client registers under.
pub type ConsumerId = u64;

/// Receiver half handed to the consumer.
pub type ConsumerReceiver<M> = mpsc::Receiver<M>;

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was queued for the consumer.
    Delivered,
    /// The consumer's queue was full; the message was dropped for it.
    Full,
    /// The consumer's receiver is gone.
    Closed,
}

/// Outbound queue of one consumer.
///
/// [`try_deliver`](ConsumerSink::try_deliver) never waits: a full queue drops
/// the message for this consumer only. Producers rely on this to never be
/// slowed down by a lagging consumer.
#[derive(Debug)]
pub struct ConsumerSink<M> {
    tx: mpsc::Sender<M>,
}

impl<M> ConsumerSink<M> {
    /// Attempt to enqueue `message` without blocking.
    pub fn try_deliver(&self, message: M) -> Delivery {
        match self.tx.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<M> Clone for ConsumerSink<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Create a consumer queue holding at most `capacity` undelivered messages.
///
/// A zero capacity is raised to one.
pub fn consumer_channel<M>(capacity: usize) -> (ConsumerSink<M>, ConsumerReceiver<M>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ConsumerSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_deliver_reports_full_and_closed() {
        let (sink, mut rx) = consumer_channel::<u32>(1);

        assert_eq!(sink.try_deliver(1), Delivery::Delivered);
        assert_eq!(sink.try_deliver(2), Delivery::Full);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(sink.try_deliver(3), Delivery::Delivered);

        drop(rx);
        assert!(sink.is_closed());
        assert_eq!(sink.try_deliver(4), Delivery::Closed);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let (sink, _rx) = consumer_channel::<u32>(0);
        assert_eq!(sink.try_deliver(1), Delivery::Delivered);
    }
}
