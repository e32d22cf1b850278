use inventory_core::consistency::ConsistencyToken;
use inventory_core::lock::Lock;
use inventory_core::tuple::{RelationsTuple, RelationsTupleFilter};

use crate::traits::{Authorizer, AuthzError, WriteTuplesRequest};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicateError {
    /// The presented lock token is no longer current. Safe to retry after
    /// re-acquiring the lock.
    #[error("fencing check failed for lock '{lock_id}'")]
    FencingFailed { lock_id: String },
    #[error("relations backend error: {0}")]
    Backend(#[source] AuthzError),
}

impl From<AuthzError> for ReplicateError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::PreconditionFailed { lock_id } => ReplicateError::FencingFailed { lock_id },
            other => ReplicateError::Backend(other),
        }
    }
}

/// Applies tuple changes to the relations backend under a fencing lock.
///
/// An empty `creates` or `deletes` slice means that side is not requested.
pub trait RelationsReplicator: Send + Sync {
    fn replicate_tuples(
        &self,
        creates: &[RelationsTuple],
        deletes: &[RelationsTuple],
        lock: &Lock,
    ) -> impl Future<Output = Result<ConsistencyToken, ReplicateError>> + Send;
}

/// [`RelationsReplicator`] over any [`Authorizer`]. Creates and deletes go out
/// in one write so they apply together.
#[derive(Debug, Clone)]
pub struct AuthorizerReplicator<A> {
    authorizer: A,
}

impl<A: Authorizer> AuthorizerReplicator<A> {
    pub fn new(authorizer: A) -> Self {
        Self { authorizer }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }
}

impl<A: Authorizer> RelationsReplicator for AuthorizerReplicator<A> {
    async fn replicate_tuples(
        &self,
        creates: &[RelationsTuple],
        deletes: &[RelationsTuple],
        lock: &Lock,
    ) -> Result<ConsistencyToken, ReplicateError> {
        if creates.is_empty() && deletes.is_empty() {
            return Ok(ConsistencyToken::default());
        }

        let request = WriteTuplesRequest {
            creates: creates.to_vec(),
            deletes: deletes.iter().map(RelationsTupleFilter::exact).collect(),
            fencing: (!lock.is_zero()).then(|| lock.clone()),
        };

        match self.authorizer.write_tuples(request).await {
            Ok(token) => {
                tracing::debug!(
                    creates = creates.len(),
                    deletes = deletes.len(),
                    consistency_token = %token,
                    "tuples replicated"
                );
                Ok(token)
            }
            Err(err) => {
                tracing::warn!(lock_id = lock.lock_id(), error = %err, "tuple replication failed");
                Err(err.into())
            }
        }
    }
}
