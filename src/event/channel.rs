use crossbeam::channel::{bounded, Receiver, SendError, Sender};
use thiserror::Error;

/// The consumer end was dropped; the message could not be delivered.
#[derive(Error, Debug)]
#[error("event channel is closed")]
pub struct PublishError;

pub struct EventPublisher<E>(Sender<E>);
pub struct EventConsumer<E>(Receiver<E>);

/// Bounded multi-producer single-consumer pipeline. The channel closes when
/// every publisher clone has been dropped; the consumer observes closure as
/// end-of-stream.
pub fn channel<E>(capacity: usize) -> (EventPublisher<E>, EventConsumer<E>) {
    let (s, r) = bounded(capacity);
    (EventPublisher(s), EventConsumer(r))
}

impl<E> EventPublisher<E> {
    /// Blocks while the channel is full.
    pub fn publish(&self, event: E) -> Result<(), PublishError> {
        self.0.send(event).map_err(|SendError(_)| PublishError)
    }
}

impl<E> Clone for EventPublisher<E> {
    fn clone(&self) -> Self {
        EventPublisher(self.0.clone())
    }
}

impl<E> AsRef<Receiver<E>> for EventConsumer<E> {
    fn as_ref(&self) -> &Receiver<E> {
        &self.0
    }
}

impl<E> EventConsumer<E> {
    /// Drains the channel until every publisher is gone, collecting what
    /// was received.
    pub fn drain(self) -> Vec<E> {
        self.0.iter().collect()
    }
}
