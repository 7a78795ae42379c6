//! Channel primitives shared by the relay hops.
//!
//! Every send in the pipeline is fire-and-forget: a destination that is not alive yields a
//! [`RelayError`] the caller logs and moves past. Nothing here retries or queues on behalf of a
//! missing receiver.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Trait implemented by payload types that can be carried on a channel.
pub trait Payload: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Nobody is listening right now; a later send may succeed.
    #[error("destination unreachable")]
    Unreachable,
    /// The destination was torn down for good and will not come back.
    #[error("channel closed")]
    Closed,
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Non-blocking, non-throwing send.
pub trait TrySend<M>: Send + Sync {
    fn try_send(&self, message: M) -> Result<(), RelayError>;
}

/// Ordered single-queue unicast sender. The queue is unbounded so a slow consumer never
/// stalls the producing context.
pub struct Mailbox<M> {
    sender: mpsc::UnboundedSender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> std::fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<M> Mailbox<M> {
    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn same_queue(&self, other: &Mailbox<M>) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl<M> TrySend<M> for Mailbox<M>
where
    M: Send,
{
    fn try_send(&self, message: M) -> Result<(), RelayError> {
        self.sender
            .send(message)
            .map_err(|_| RelayError::Unreachable)
    }
}

/// Create a mailbox and the receiver that drains it.
pub fn mailbox<M>() -> (Mailbox<M>, mpsc::UnboundedReceiver<M>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Mailbox { sender }, receiver)
}

/// Same-process broadcast medium: every current subscriber gets its own ordered, unbounded
/// queue and sees every message in send order. Subscribers whose receiver is gone are pruned
/// on the next send.
pub struct FanOut<M> {
    subscribers: Mutex<Vec<Mailbox<M>>>,
}

impl<M> Default for FanOut<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> FanOut<M>
where
    M: Payload,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<M> {
        let (sender, receiver) = mailbox();
        self.subscribers.lock().push(sender);
        receiver
    }
}

impl<M> TrySend<M> for FanOut<M>
where
    M: Payload,
{
    fn try_send(&self, message: M) -> Result<(), RelayError> {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| subscriber.try_send(message.clone()).is_ok());
        if subscribers.is_empty() {
            Err(RelayError::Unreachable)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn fan_out_without_subscribers_is_unreachable() {
        let bus = FanOut::<u32>::new();
        assert_eq!(bus.try_send(1), Err(RelayError::Unreachable));

        let mut rx = bus.subscribe();
        bus.try_send(2).expect("subscriber present");
        bus.try_send(3).expect("subscriber present");
        assert_eq!(rx.recv().await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), 3);

        drop(rx);
        assert_eq!(bus.try_send(4), Err(RelayError::Unreachable));
    }

    #[tokio::test]
    async fn fan_out_keeps_every_message_of_a_burst() {
        let bus = FanOut::<usize>::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        for n in 0..5_000 {
            bus.try_send(n).unwrap();
        }
        for n in 0..5_000 {
            assert_eq!(first.recv().await, Some(n));
            assert_eq!(second.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn mailbox_preserves_order_and_reports_dropped_receiver() {
        let (tx, mut rx) = mailbox::<&'static str>();
        tx.try_send("a").unwrap();
        tx.try_send("b").unwrap();
        let first = timeout(Duration::from_millis(200), rx.recv()).await.unwrap();
        let second = timeout(Duration::from_millis(200), rx.recv()).await.unwrap();
        assert_eq!((first, second), (Some("a"), Some("b")));

        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.try_send("c"), Err(RelayError::Unreachable));
    }

    #[test]
    fn mailbox_clones_share_a_queue() {
        let (a, _rx) = mailbox::<u8>();
        let (c, _other) = mailbox::<u8>();
        let b = a.clone();
        assert!(a.same_queue(&b));
        assert!(!a.same_queue(&c));
    }
}
