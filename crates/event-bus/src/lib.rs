use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use soulexplorer_core_types::SoulError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), SoulError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus. Publishing with no subscribers is an error for
/// `publish`, but `emit` treats it as a silent drop so it can be called from
/// signal handlers that do not care who is listening.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Synchronous fire-and-forget publish. Returns how many subscribers saw it.
    pub fn emit(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(dropped)) => {
                trace!(event = ?dropped, "event dropped: no subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), SoulError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| SoulError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum Ping {
        One,
        Two,
    }

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let bus = InMemoryBus::<Ping>::new(4);
        let mut rx = bus.subscribe();
        bus.publish(Ping::One).await.unwrap();
        assert_eq!(bus.emit(Ping::Two), 1);
        assert_eq!(rx.recv().await.unwrap(), Ping::One);
        assert_eq!(rx.recv().await.unwrap(), Ping::Two);
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_silent() {
        let bus = InMemoryBus::<Ping>::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.emit(Ping::One), 0);
        assert!(bus.publish(Ping::One).await.is_err());
    }
}
