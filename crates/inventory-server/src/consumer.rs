use std::sync::Arc;

use inventory_authz::RelationsReplicator;
use inventory_core::model::TransactionId;
use inventory_storage::{Store, Transaction};
use tokio::sync::watch;

use crate::audit;
use crate::broadcast::ReplicationBroadcast;
use crate::delivery::{Delivery, EventSource};
use crate::error::ConsumerError;
use crate::metrics::Metrics;
use crate::service::{RelationReplicationService, ReplicationOutcome};

pub const DEFAULT_MAX_TX_RETRIES: u32 = 3;

/// Single-delivery-at-a-time replication loop.
///
/// Each delivery runs in its own transaction. A successful delivery is
/// acknowledged after commit, a fencing failure is handed back to the source
/// for redelivery, and any other failure stops the loop.
pub struct ReplicationConsumer<S, R, E> {
    store: S,
    service: RelationReplicationService<R>,
    source: E,
    broadcast: Option<ReplicationBroadcast>,
    metrics: Arc<Metrics>,
    max_tx_retries: u32,
}

impl<S, R, E> ReplicationConsumer<S, R, E>
where
    S: Store,
    R: RelationsReplicator,
    E: EventSource,
{
    pub fn new(
        store: S,
        service: RelationReplicationService<R>,
        source: E,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            service,
            source,
            broadcast: None,
            metrics,
            max_tx_retries: DEFAULT_MAX_TX_RETRIES,
        }
    }

    pub fn with_broadcast(mut self, broadcast: ReplicationBroadcast) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Extra attempts for a delivery whose transaction hit a storage conflict.
    pub fn with_max_tx_retries(mut self, retries: u32) -> Self {
        self.max_tx_retries = retries;
        self
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    pub fn into_source(self) -> E {
        self.source
    }

    /// Processes deliveries until `shutdown` flips to true or its sender is
    /// dropped, then returns [`ConsumerError::Cancelled`]. Shutdown is only
    /// observed between deliveries.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConsumerError> {
        loop {
            if *shutdown.borrow() {
                return Err(ConsumerError::Cancelled);
            }

            let delivery = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Err(ConsumerError::Cancelled);
                    }
                    continue;
                }
                delivery = self.source.next() => delivery?,
            };

            self.handle(&delivery).await?;
        }
    }

    pub async fn handle(&mut self, delivery: &E::Delivery) -> Result<(), ConsumerError> {
        let event = delivery.event();
        tracing::info!(
            operation = %event.operation,
            tx_id = %event.tx_id,
            key = %event.key(),
            "processing delivery"
        );

        match self.process(delivery).await {
            Ok(outcome) => {
                self.record(&outcome);
                self.source.ack(delivery).await?;
                self.notify(&event.tx_id);
                Ok(())
            }
            Err(err) if err.is_fencing_failed() => {
                tracing::warn!(
                    error = %err,
                    tx_id = %event.tx_id,
                    "fencing failed, delivery will be redelivered"
                );
                audit::audit_fencing_failed(delivery.lock().lock_id(), event.key(), &event.tx_id);
                self.metrics.record_fencing_failure();
                self.source.nack(delivery).await
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    tx_id = %event.tx_id,
                    key = %event.key(),
                    "replication failed"
                );
                self.metrics.record_fatal_error();
                Err(err)
            }
        }
    }

    async fn process(&self, delivery: &E::Delivery) -> Result<ReplicationOutcome, ConsumerError> {
        let mut attempt = 0;
        loop {
            match self.process_once(delivery).await {
                Err(err) if err.is_conflict() && attempt < self.max_tx_retries => {
                    attempt += 1;
                    self.metrics.record_conflict_retry();
                    tracing::debug!(attempt, error = %err, "retrying after storage conflict");
                }
                result => return result,
            }
        }
    }

    async fn process_once(
        &self,
        delivery: &E::Delivery,
    ) -> Result<ReplicationOutcome, ConsumerError> {
        let mut tx = self.store.begin().await?;
        let outcome = match self.service.replicate(&mut tx, delivery).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                return Err(err.into());
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    fn record(&self, outcome: &ReplicationOutcome) {
        self.metrics.record_processed();
        match outcome {
            ReplicationOutcome::NoChange => self.metrics.record_no_change(),
            ReplicationOutcome::Replicated {
                creates,
                deletes,
                token_persisted,
                ..
            } => {
                self.metrics.record_tuples(*creates, *deletes);
                if *token_persisted {
                    self.metrics.record_token_persisted();
                }
            }
        }
    }

    // Waiters are best effort; a missing listener never fails the delivery.
    fn notify(&self, tx_id: &TransactionId) {
        if let Some(broadcast) = &self.broadcast
            && let Err(err) = broadcast.signal(tx_id)
        {
            tracing::debug!(error = %err, tx_id = %tx_id, "replication signal not delivered");
        }
    }
}
