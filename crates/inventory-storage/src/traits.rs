use inventory_core::model::{
    OperationType, OutboxEvent, ReporterResourceKey, Representations, Resource, TransactionId,
    ValidationError, Version,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("no representations found for key {0}")]
    RepresentationsNotFound(String),
    #[error("duplicate representation: {0}")]
    DuplicateRepresentation(String),
    #[error("representation out of step with its reporter resource: {0}")]
    VersionMismatch(String),
    #[error("resource {0} was modified by a concurrent transaction")]
    Conflict(String),
    #[error("invalid stored representation: {0}")]
    Validation(#[from] ValidationError),
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

/// Resource persistence seen through one transaction.
pub trait ResourceRepository: Send + Sync {
    /// Representations at `current_version` and at the version before it.
    ///
    /// `Created` has no previous state. A missing `current_version` yields
    /// neither side.
    fn find_current_and_previous_versioned_representations(
        &self,
        key: &ReporterResourceKey,
        current_version: Option<Version>,
        operation: OperationType,
    ) -> impl Future<
        Output = Result<(Option<Representations>, Option<Representations>), StorageError>,
    > + Send;

    fn find_latest_representations(
        &self,
        key: &ReporterResourceKey,
    ) -> impl Future<Output = Result<Option<Representations>, StorageError>> + Send;

    /// `None` when no reporter resource exists for the key.
    fn find_resource_by_keys(
        &self,
        key: &ReporterResourceKey,
    ) -> impl Future<Output = Result<Option<Resource>, StorageError>> + Send;

    /// Appends the aggregate's staged representations, publishes one outbox
    /// event per change and updates the latest-only pointers.
    fn save(
        &mut self,
        resource: Resource,
        operation: OperationType,
        tx_id: &TransactionId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn contains_event_for_transaction_id(
        &self,
        tx_id: &TransactionId,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

pub trait Transaction: ResourceRepository {
    fn commit(self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait Store: Send + Sync {
    type Tx: Transaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StorageError>> + Send;
}

/// Committed outbox events addressed by offset.
pub trait OutboxReader: Send + Sync {
    fn read_outbox(
        &self,
        from_offset: u64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<(u64, OutboxEvent)>, StorageError>> + Send;
}
