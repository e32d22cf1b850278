use inventory_authz::{AuthzError, ReplicateError};
use inventory_core::model::ResourceError;
use inventory_core::schema::SchemaError;
use inventory_storage::StorageError;

/// Failure of one replication, tagged with the step that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplicationError {
    #[error("failed to fetch representations for {key}: {source}")]
    FetchRepresentations {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to calculate tuples for {key}: {source}")]
    CalculateTuples {
        key: String,
        #[source]
        source: SchemaError,
    },

    #[error("failed to replicate tuples for {key}: {source}")]
    ExecuteRelations {
        key: String,
        #[source]
        source: ReplicateError,
    },

    #[error("failed to update consistency token for {key}: {source}")]
    UpdateConsistencyToken {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl ReplicationError {
    /// The write was fenced off by a newer lock owner. Redeliver after
    /// re-acquiring the lock; do not commit the offset.
    pub fn is_fencing_failed(&self) -> bool {
        matches!(
            self,
            ReplicationError::ExecuteRelations {
                source: ReplicateError::FencingFailed { .. },
                ..
            }
        )
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            ReplicationError::FetchRepresentations { source, .. }
            | ReplicationError::UpdateConsistencyToken { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsumerError {
    #[error("consumer cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("replication error: {0}")]
    Replication(#[from] ReplicationError),

    #[error("authorization backend error: {0}")]
    Authz(#[from] AuthzError),
}

impl ConsumerError {
    pub fn is_fencing_failed(&self) -> bool {
        matches!(self, ConsumerError::Replication(err) if err.is_fencing_failed())
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            ConsumerError::Storage(err) => err.is_conflict(),
            ConsumerError::Replication(err) => err.is_conflict(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("authorization backend error: {0}")]
    Authz(#[from] AuthzError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceServiceError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("resource not found for key {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fenced() -> ReplicationError {
        ReplicationError::ExecuteRelations {
            key: "hbi/host:h1@a".to_string(),
            source: ReplicateError::FencingFailed {
                lock_id: "inventory/0".to_string(),
            },
        }
    }

    #[test]
    fn replication_error_names_step_and_key() {
        let err = ReplicationError::FetchRepresentations {
            key: "hbi/host:h1@a".to_string(),
            source: StorageError::RepresentationsNotFound("hbi/host:h1@a".to_string()),
        };

        let message = err.to_string();
        assert!(
            message.contains("fetch representations") && message.contains("hbi/host:h1@a"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn fencing_failure_is_detected_through_wrapping() {
        assert!(fenced().is_fencing_failed());
        assert!(ConsumerError::from(fenced()).is_fencing_failed());
    }

    #[test]
    fn backend_failure_is_not_fencing() {
        let err = ReplicationError::ExecuteRelations {
            key: "k".to_string(),
            source: ReplicateError::Backend(AuthzError::Unavailable("down".to_string())),
        };
        assert!(!err.is_fencing_failed());
        assert!(err.to_string().contains("down"));
    }

    #[test]
    fn storage_conflicts_are_retryable() {
        let err = ReplicationError::UpdateConsistencyToken {
            key: "k".to_string(),
            source: StorageError::Conflict("r1".to_string()),
        };
        assert!(err.is_conflict());
        assert!(ConsumerError::Replication(err).is_conflict());
        assert!(ConsumerError::Storage(StorageError::Conflict("r1".to_string())).is_conflict());
        assert!(!ConsumerError::Cancelled.is_conflict());
    }

    #[test]
    fn schema_failure_keeps_reason() {
        let err = ReplicationError::CalculateTuples {
            key: "k".to_string(),
            source: SchemaError::Calculation {
                resource_type: "host".to_string(),
                reason: "bad relation".to_string(),
            },
        };
        assert!(err.to_string().contains("bad relation"));
        assert!(!err.is_conflict());
    }
}
