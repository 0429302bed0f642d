mod channel;

pub use channel::{channel, EventConsumer, EventPublisher, PublishError};

/// Bound of the producer→batcher channel. Producers block when the batcher
/// falls this far behind, which throttles child IO reads against a slow
/// store.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
