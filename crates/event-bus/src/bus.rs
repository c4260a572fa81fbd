use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::Result;

/// A published message as seen by listeners.
///
/// Every listener of a topic receives a clone of the same allocation.
pub type Message = Arc<[u8]>;

/// A listener registered on a topic.
pub type MessageHandler = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure into a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message| f(message).boxed())
}

/// Core trait for event transports.
///
/// Delivery is at-most-once per listener with no ordering guarantee, either
/// across listeners of one topic or across topics. Implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a message to every listener currently subscribed to `topic`.
    ///
    /// Returns once the message has been handed to the transport; it never
    /// waits for listeners to finish. Publishing to a topic without
    /// listeners succeeds and drops the message.
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()>;

    /// Registers a listener for all future publishes on `topic`.
    async fn subscribe(&self, topic: &str, handler: MessageHandler);
}

#[async_trait]
impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()> {
        (**self).publish(topic, message).await
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) {
        (**self).subscribe(topic, handler).await
    }
}
