//! # Subscriber trait
//!
//! Each subscriber gets a dedicated worker loop fed by a bounded queue owned by
//! the [`SubscriberSet`](crate::SubscriberSet). A slow subscriber only delays
//! itself; when its queue overflows, events for it are dropped and a
//! `SubscriberOverflow` event is published instead.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
