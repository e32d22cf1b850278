use inventory_core::lock::Lock;
use inventory_core::model::OutboxEvent;

use crate::error::ConsumerError;

/// One committed change handed to the replicator, with the lock it is
/// processed under.
pub trait Delivery: Send + Sync {
    fn event(&self) -> &OutboxEvent;

    fn lock(&self) -> &Lock;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxDelivery {
    offset: u64,
    event: OutboxEvent,
    lock: Lock,
}

impl OutboxDelivery {
    pub fn new(offset: u64, event: OutboxEvent, lock: Lock) -> Self {
        Self {
            offset,
            event,
            lock,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Delivery for OutboxDelivery {
    fn event(&self) -> &OutboxEvent {
        &self.event
    }

    fn lock(&self) -> &Lock {
        &self.lock
    }
}

/// Ordered, at-least-once source of deliveries.
///
/// `next` must be cancel safe: dropping its future before it resolves may not
/// lose a delivery.
pub trait EventSource: Send {
    type Delivery: Delivery;

    fn next(&mut self) -> impl Future<Output = Result<Self::Delivery, ConsumerError>> + Send;

    /// Commits the delivery's offset.
    fn ack(
        &mut self,
        delivery: &Self::Delivery,
    ) -> impl Future<Output = Result<(), ConsumerError>> + Send;

    /// Leaves the offset uncommitted so the delivery is seen again.
    fn nack(
        &mut self,
        delivery: &Self::Delivery,
    ) -> impl Future<Output = Result<(), ConsumerError>> + Send;
}
