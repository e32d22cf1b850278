use inventory_core::consistency::ConsistencyToken;
use inventory_core::lock::Lock;
use inventory_core::tuple::{
    ObjectType, RelationsResource, RelationsSubject, RelationsTuple, RelationsTupleFilter,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("fencing precondition failed for lock '{lock_id}'")]
    PreconditionFailed { lock_id: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("authorization backend unavailable: {0}")]
    Unavailable(String),
    #[error("internal authorization error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteTuplesRequest {
    pub creates: Vec<RelationsTuple>,
    pub deletes: Vec<RelationsTupleFilter>,
    /// Lock whose current token must match for the write to apply.
    pub fencing: Option<Lock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub resource: RelationsResource,
    pub relation: String,
    pub subject: RelationsSubject,
    pub consistency_token: ConsistencyToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResponse {
    pub allowed: bool,
    pub consistency_token: ConsistencyToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckBulkItem {
    pub resource: RelationsResource,
    pub relation: String,
    pub subject: RelationsSubject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckBulkRequest {
    pub items: Vec<CheckBulkItem>,
    pub consistency_token: ConsistencyToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckBulkResponse {
    pub pairs: Vec<(CheckBulkItem, bool)>,
    pub consistency_token: ConsistencyToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResourcesRequest {
    /// Empty namespace or name matches any.
    pub resource_type: ObjectType,
    pub relation: String,
    pub subject: RelationsSubject,
    pub consistency_token: ConsistencyToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResourcesResponse {
    pub resources: Vec<RelationsResource>,
    pub consistency_token: ConsistencyToken,
}

/// Capabilities required from a relationship backend.
///
/// Reads presenting a consistency token must observe state at least as fresh
/// as the write that issued it. `check_for_update` always reads current state.
pub trait Authorizer: Send + Sync {
    /// Applies creates and deletes as one atomic mutation.
    fn write_tuples(
        &self,
        request: WriteTuplesRequest,
    ) -> impl Future<Output = Result<ConsistencyToken, AuthzError>> + Send;

    fn check(
        &self,
        request: &CheckRequest,
    ) -> impl Future<Output = Result<CheckResponse, AuthzError>> + Send;

    fn check_for_update(
        &self,
        request: &CheckRequest,
    ) -> impl Future<Output = Result<CheckResponse, AuthzError>> + Send;

    fn check_bulk(
        &self,
        request: &CheckBulkRequest,
    ) -> impl Future<Output = Result<CheckBulkResponse, AuthzError>> + Send;

    fn lookup_resources(
        &self,
        request: &LookupResourcesRequest,
    ) -> impl Future<Output = Result<LookupResourcesResponse, AuthzError>> + Send;

    /// Replaces any token held for `lock_id` with a fresh one.
    fn acquire_lock(&self, lock_id: &str) -> impl Future<Output = Result<Lock, AuthzError>> + Send;

    fn health(&self) -> impl Future<Output = Result<(), AuthzError>> + Send;
}
