use inventory_core::model::{
    OperationType, ReporterResourceId, ReporterResourceKey, Resource, ResourceId, ResourceReport,
    TransactionId,
};
use inventory_storage::{ResourceRepository, Store, Transaction};

use crate::error::ResourceServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(OperationType),
    /// The transaction id was already processed.
    Duplicate,
    /// The reporter's view was already tombstoned.
    Unchanged,
}

/// Write side of the inventory: records reports and deletes so their outbox
/// events can be replicated.
#[derive(Debug, Clone)]
pub struct ResourceService<S> {
    store: S,
}

impl<S: Store> ResourceService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates the resource on first report, otherwise updates it. Reporting
    /// a tombstoned key starts a new generation.
    pub async fn report(
        &self,
        report: ResourceReport,
        tx_id: &TransactionId,
    ) -> Result<WriteOutcome, ResourceServiceError> {
        let mut tx = self.store.begin().await?;
        if tx.contains_event_for_transaction_id(tx_id).await? {
            tx.rollback().await?;
            return Ok(WriteOutcome::Duplicate);
        }

        let (resource, operation) = match tx.find_resource_by_keys(&report.key).await? {
            Some(mut resource) => {
                resource.report(report)?;
                (resource, OperationType::Updated)
            }
            None => {
                let resource = Resource::create(
                    ResourceId::generate(),
                    ReporterResourceId::generate(),
                    report,
                )?;
                (resource, OperationType::Created)
            }
        };

        tx.save(resource, operation, tx_id).await?;
        tx.commit().await?;
        Ok(WriteOutcome::Applied(operation))
    }

    pub async fn delete(
        &self,
        key: &ReporterResourceKey,
        tx_id: &TransactionId,
    ) -> Result<WriteOutcome, ResourceServiceError> {
        let mut tx = self.store.begin().await?;
        if tx.contains_event_for_transaction_id(tx_id).await? {
            tx.rollback().await?;
            return Ok(WriteOutcome::Duplicate);
        }

        let mut resource = tx
            .find_resource_by_keys(key)
            .await?
            .ok_or_else(|| ResourceServiceError::NotFound(key.to_string()))?;
        resource.delete(key)?;
        if resource.changes().is_empty() {
            tx.rollback().await?;
            return Ok(WriteOutcome::Unchanged);
        }

        tx.save(resource, OperationType::Deleted, tx_id).await?;
        tx.commit().await?;
        Ok(WriteOutcome::Applied(OperationType::Deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_core::model::{ApiHref, Generation, JsonObject, ReporterMetadata, Version};
    use inventory_storage::{InMemoryStore, OutboxReader};
    use serde_json::json;

    fn key() -> ReporterResourceKey {
        ReporterResourceKey::parse("host-1", "hbi", "host", "instance-a").unwrap()
    }

    fn report(workspace: &str) -> ResourceReport {
        let data = |value: serde_json::Value| -> JsonObject { value.as_object().unwrap().clone() };
        ResourceReport {
            key: key(),
            metadata: ReporterMetadata::new(ApiHref::new("https://api.example.com/h/1").unwrap()),
            reporter_data: data(json!({"satellite_id": "sat-1"})),
            common_data: data(json!({"workspace_id": workspace})),
        }
    }

    fn tx_id(id: &str) -> TransactionId {
        TransactionId::new(id).unwrap()
    }

    async fn operations(store: &InMemoryStore) -> Vec<OperationType> {
        store
            .read_outbox(0, 100)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, event)| event.operation)
            .collect()
    }

    #[tokio::test]
    async fn first_report_creates_then_updates() {
        let store = InMemoryStore::new();
        let service = ResourceService::new(store.clone());

        let first = service.report(report("ws-1"), &tx_id("tx-1")).await.unwrap();
        let second = service.report(report("ws-2"), &tx_id("tx-2")).await.unwrap();

        assert_eq!(first, WriteOutcome::Applied(OperationType::Created));
        assert_eq!(second, WriteOutcome::Applied(OperationType::Updated));
        assert_eq!(
            operations(&store).await,
            vec![OperationType::Created, OperationType::Updated]
        );
    }

    #[tokio::test]
    async fn repeated_transaction_id_is_skipped() {
        let store = InMemoryStore::new();
        let service = ResourceService::new(store.clone());

        service.report(report("ws-1"), &tx_id("tx-1")).await.unwrap();
        let again = service.report(report("ws-2"), &tx_id("tx-1")).await.unwrap();

        assert_eq!(again, WriteOutcome::Duplicate);
        assert_eq!(store.outbox_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_unknown_key_is_not_found() {
        let service = ResourceService::new(InMemoryStore::new());

        let err = service.delete(&key(), &tx_id("tx-1")).await.unwrap_err();
        assert!(matches!(err, ResourceServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_delete_is_unchanged() {
        let store = InMemoryStore::new();
        let service = ResourceService::new(store.clone());
        service.report(report("ws-1"), &tx_id("tx-1")).await.unwrap();

        let first = service.delete(&key(), &tx_id("tx-2")).await.unwrap();
        let second = service.delete(&key(), &tx_id("tx-3")).await.unwrap();

        assert_eq!(first, WriteOutcome::Applied(OperationType::Deleted));
        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(store.outbox_len().unwrap(), 2);
    }

    #[tokio::test]
    async fn report_after_delete_starts_new_generation() {
        let store = InMemoryStore::new();
        let service = ResourceService::new(store.clone());
        service.report(report("ws-1"), &tx_id("tx-1")).await.unwrap();
        service.delete(&key(), &tx_id("tx-2")).await.unwrap();

        service.report(report("ws-1"), &tx_id("tx-3")).await.unwrap();

        let tx = store.begin().await.unwrap();
        let resource = tx.find_resource_by_keys(&key()).await.unwrap().unwrap();
        let rr = resource.reporter_resource(&key()).unwrap();
        assert!(!rr.is_tombstoned());
        assert_eq!(rr.generation(), Generation::new(1));
        assert_eq!(rr.representation_version(), Version::new(2));
    }
}
