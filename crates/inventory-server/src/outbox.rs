use std::time::Duration;

use inventory_authz::Authorizer;
use inventory_core::lock::Lock;
use inventory_storage::OutboxReader;

use crate::audit;
use crate::delivery::{EventSource, OutboxDelivery};
use crate::error::ConsumerError;

/// Event source over the store's outbox log for one partition.
///
/// Delivery follows consumer-group offset semantics: the read offset runs
/// ahead of the committed offset, `ack` commits, and `nack` rewinds to the
/// last committed offset and takes the partition lock again.
#[derive(Debug)]
pub struct OutboxEventSource<O, A> {
    reader: O,
    authorizer: A,
    lock_id: String,
    lock: Option<Lock>,
    offset: u64,
    committed: u64,
    poll_interval: Duration,
}

impl<O: OutboxReader, A: Authorizer> OutboxEventSource<O, A> {
    pub fn new(reader: O, authorizer: A, lock_id: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            reader,
            authorizer,
            lock_id: lock_id.into(),
            lock: None,
            offset: 0,
            committed: 0,
            poll_interval,
        }
    }

    /// Resumes from a previously committed offset.
    pub fn with_committed_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self.committed = offset;
        self
    }

    pub fn committed_offset(&self) -> u64 {
        self.committed
    }

    pub fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    /// Takes the partition lock, fencing off any previous owner.
    pub async fn acquire(&mut self) -> Result<&Lock, ConsumerError> {
        let lock = self.authorizer.acquire_lock(&self.lock_id).await?;
        audit::audit_lock_acquired(lock.lock_id());
        Ok(self.lock.insert(lock))
    }
}

impl<O, A> EventSource for OutboxEventSource<O, A>
where
    O: OutboxReader,
    A: Authorizer,
{
    type Delivery = OutboxDelivery;

    async fn next(&mut self) -> Result<OutboxDelivery, ConsumerError> {
        let lock = match &self.lock {
            Some(lock) => lock.clone(),
            None => self.acquire().await?.clone(),
        };

        loop {
            let mut batch = self.reader.read_outbox(self.offset, 1).await?;
            if let Some((offset, event)) = batch.pop() {
                self.offset = offset + 1;
                return Ok(OutboxDelivery::new(offset, event, lock));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&mut self, delivery: &OutboxDelivery) -> Result<(), ConsumerError> {
        self.committed = self.committed.max(delivery.offset() + 1);
        Ok(())
    }

    async fn nack(&mut self, delivery: &OutboxDelivery) -> Result<(), ConsumerError> {
        tracing::info!(
            offset = delivery.offset(),
            committed = self.committed,
            lock_id = %self.lock_id,
            "rewinding to committed offset"
        );
        self.offset = self.committed;
        self.acquire().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_authz::ReferenceAuthorizer;
    use inventory_core::model::{
        ApiHref, JsonObject, OperationType, ReporterMetadata, ReporterResourceId,
        ReporterResourceKey, Resource, ResourceId, ResourceReport, TransactionId,
    };
    use inventory_storage::{InMemoryStore, ResourceRepository, Store, Transaction};
    use serde_json::json;

    use crate::delivery::Delivery;

    async fn publish(store: &InMemoryStore, local_id: &str) {
        let data = |value: serde_json::Value| -> JsonObject { value.as_object().unwrap().clone() };
        let report = ResourceReport {
            key: ReporterResourceKey::parse(local_id, "hbi", "host", "instance-a").unwrap(),
            metadata: ReporterMetadata::new(ApiHref::new("https://api.example.com/h").unwrap()),
            reporter_data: data(json!({"satellite_id": "sat-1"})),
            common_data: data(json!({"workspace_id": "ws-1"})),
        };
        let resource =
            Resource::create(ResourceId::generate(), ReporterResourceId::generate(), report)
                .unwrap();
        let mut txn = store.begin().await.unwrap();
        txn.save(
            resource,
            OperationType::Created,
            &TransactionId::new(format!("tx-{local_id}")).unwrap(),
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();
    }

    fn source(
        store: &InMemoryStore,
        authz: &ReferenceAuthorizer,
    ) -> OutboxEventSource<InMemoryStore, ReferenceAuthorizer> {
        OutboxEventSource::new(
            store.clone(),
            authz.clone(),
            "inventory-replicator/0",
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn first_delivery_acquires_the_lock() {
        let store = InMemoryStore::new();
        let authz = ReferenceAuthorizer::new();
        publish(&store, "h1").await;
        let mut source = source(&store, &authz);

        let delivery = source.next().await.unwrap();

        assert_eq!(delivery.offset(), 0);
        assert_eq!(delivery.lock().lock_id(), "inventory-replicator/0");
        assert!(!delivery.lock().lock_token().is_empty());
        assert_eq!(authz.version(), 2);
    }

    #[tokio::test]
    async fn ack_commits_and_advances() {
        let store = InMemoryStore::new();
        let authz = ReferenceAuthorizer::new();
        publish(&store, "h1").await;
        publish(&store, "h2").await;
        let mut source = source(&store, &authz);

        let first = source.next().await.unwrap();
        source.ack(&first).await.unwrap();
        let second = source.next().await.unwrap();

        assert_eq!(source.committed_offset(), 1);
        assert_eq!(second.offset(), 1);
        assert_eq!(second.event().key().local_resource_id.as_str(), "h2");
    }

    #[tokio::test]
    async fn nack_redelivers_under_a_new_lock() {
        let store = InMemoryStore::new();
        let authz = ReferenceAuthorizer::new();
        publish(&store, "h1").await;
        let mut source = source(&store, &authz);

        let first = source.next().await.unwrap();
        source.nack(&first).await.unwrap();
        let again = source.next().await.unwrap();

        assert_eq!(again.offset(), first.offset());
        assert_eq!(again.event(), first.event());
        assert_ne!(again.lock().lock_token(), first.lock().lock_token());
        assert_eq!(source.committed_offset(), 0);
    }

    #[tokio::test]
    async fn next_waits_for_new_events() {
        let store = InMemoryStore::new();
        let authz = ReferenceAuthorizer::new();
        let mut source = source(&store, &authz);

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publish(&writer, "late").await;
        });

        let delivery = tokio::time::timeout(Duration::from_secs(2), source.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.event().key().local_resource_id.as_str(), "late");
    }

    #[tokio::test]
    async fn resumes_from_committed_offset() {
        let store = InMemoryStore::new();
        let authz = ReferenceAuthorizer::new();
        publish(&store, "h1").await;
        publish(&store, "h2").await;
        let mut source = source(&store, &authz).with_committed_offset(1);

        let delivery = source.next().await.unwrap();
        assert_eq!(delivery.offset(), 1);
    }
}
