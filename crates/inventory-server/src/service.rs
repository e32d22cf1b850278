use inventory_authz::RelationsReplicator;
use inventory_core::consistency::ConsistencyToken;
use inventory_core::model::{OperationType, ReporterResourceKey, TransactionId};
use inventory_core::schema::SchemaService;
use inventory_core::tuple::RelationsTuple;
use inventory_storage::ResourceRepository;

use crate::audit;
use crate::delivery::Delivery;
use crate::error::ReplicationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// The diff was empty; the backend was not called and nothing was saved.
    NoChange,
    Replicated {
        creates: usize,
        deletes: usize,
        consistency_token: ConsistencyToken,
        token_persisted: bool,
    },
}

/// Moves one committed resource change into the relations backend.
///
/// Runs inside the caller's transaction: it reads representations and may
/// save the returned consistency token, but never commits.
#[derive(Debug, Clone)]
pub struct RelationReplicationService<R> {
    replicator: R,
    schema: SchemaService,
}

impl<R: RelationsReplicator> RelationReplicationService<R> {
    pub fn new(replicator: R, schema: SchemaService) -> Self {
        Self { replicator, schema }
    }

    pub fn replicator(&self) -> &R {
        &self.replicator
    }

    pub fn schema(&self) -> &SchemaService {
        &self.schema
    }

    pub async fn replicate<T: ResourceRepository>(
        &self,
        tx: &mut T,
        delivery: &impl Delivery,
    ) -> Result<ReplicationOutcome, ReplicationError> {
        let event = delivery.event();
        let key = event.key();
        let operation = event.operation;

        let (current, previous) = match operation {
            OperationType::Deleted => {
                let latest = tx.find_latest_representations(key).await;
                (None, latest.map_err(|source| fetch_error(key, source))?)
            }
            OperationType::Created | OperationType::Updated => tx
                .find_current_and_previous_versioned_representations(
                    key,
                    event.tuple_event.common_version(),
                    operation,
                )
                .await
                .map_err(|source| fetch_error(key, source))?,
        };

        let tuples = self
            .schema
            .calculate_tuples_for_resource(current.as_ref(), previous.as_ref(), key)
            .map_err(|source| ReplicationError::CalculateTuples {
                key: key.to_string(),
                source,
            })?;
        if tuples.is_empty() {
            tracing::debug!(key = %key, operation = %operation, "no relation changes");
            return Ok(ReplicationOutcome::NoChange);
        }

        let (creates, deletes) = tuples.into_parts();
        let (creates, deletes): (Vec<RelationsTuple>, Vec<RelationsTuple>) = match operation {
            OperationType::Created => (creates.unwrap_or_default(), Vec::new()),
            OperationType::Updated => (creates.unwrap_or_default(), deletes.unwrap_or_default()),
            OperationType::Deleted => (Vec::new(), deletes.unwrap_or_default()),
        };
        if creates.is_empty() && deletes.is_empty() {
            return Ok(ReplicationOutcome::NoChange);
        }

        let token = self
            .replicator
            .replicate_tuples(&creates, &deletes, delivery.lock())
            .await
            .map_err(|source| ReplicationError::ExecuteRelations {
                key: key.to_string(),
                source,
            })?;
        audit::audit_tuples_replicated(key, &event.tx_id, creates.len(), deletes.len(), &token);

        // A deleted resource may already be gone, so its token is never written back.
        let token_persisted = operation != OperationType::Deleted
            && !token.is_zero()
            && persist_token(tx, key, &token, &event.tx_id).await?;

        Ok(ReplicationOutcome::Replicated {
            creates: creates.len(),
            deletes: deletes.len(),
            consistency_token: token,
            token_persisted,
        })
    }
}

fn fetch_error(
    key: &ReporterResourceKey,
    source: inventory_storage::StorageError,
) -> ReplicationError {
    ReplicationError::FetchRepresentations {
        key: key.to_string(),
        source,
    }
}

/// Returns false when the resource disappeared in the meantime.
async fn persist_token<T: ResourceRepository>(
    tx: &mut T,
    key: &ReporterResourceKey,
    token: &ConsistencyToken,
    tx_id: &TransactionId,
) -> Result<bool, ReplicationError> {
    let update_error = |source| ReplicationError::UpdateConsistencyToken {
        key: key.to_string(),
        source,
    };

    let Some(mut resource) = tx.find_resource_by_keys(key).await.map_err(update_error)? else {
        tracing::debug!(key = %key, "resource gone before token update");
        return Ok(false);
    };
    resource.set_consistency_token(token.clone());
    let resource_id = resource.id();
    tx.save(resource, OperationType::Updated, tx_id)
        .await
        .map_err(update_error)?;

    audit::audit_consistency_token_persisted(&resource_id, key, token);
    Ok(true)
}
