use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use inventory_core::consistency::ConsistencyToken;
use inventory_core::lock::Lock;
use inventory_core::tuple::{
    ObjectType, RelationsResource, RelationsSubject, RelationsTuple, RelationsTupleFilter,
};
use uuid::Uuid;

use crate::traits::{
    Authorizer, AuthzError, CheckBulkRequest, CheckBulkResponse, CheckRequest, CheckResponse,
    LookupResourcesRequest, LookupResourcesResponse, WriteTuplesRequest,
};

const INITIAL_VERSION: u64 = 1;

const LOCK_NAMESPACE: &str = "kessel";
const LOCK_TYPE: &str = "lock";
const LOCK_RELATION: &str = "version";
const LOCK_VERSION_TYPE: &str = "lockversion";

type TupleSet = BTreeSet<RelationsTuple>;

fn lock_tuple(lock_id: &str, token: &str) -> RelationsTuple {
    RelationsTuple::new(
        RelationsResource::new(ObjectType::new(LOCK_NAMESPACE, LOCK_TYPE), lock_id),
        LOCK_RELATION,
        RelationsSubject::direct(RelationsResource::new(
            ObjectType::new(LOCK_NAMESPACE, LOCK_VERSION_TYPE),
            token,
        )),
    )
}

fn lock_filter(lock_id: &str) -> RelationsTupleFilter {
    RelationsTupleFilter {
        resource_namespace: Some(LOCK_NAMESPACE.to_string()),
        resource_type: Some(LOCK_TYPE.to_string()),
        resource_id: Some(lock_id.to_string()),
        relation: Some(LOCK_RELATION.to_string()),
        ..Default::default()
    }
}

#[derive(Debug)]
struct AuthorizerState {
    version: u64,
    tuples: TupleSet,
    snapshots: BTreeMap<u64, TupleSet>,
}

impl AuthorizerState {
    fn new() -> Self {
        Self {
            version: INITIAL_VERSION,
            tuples: TupleSet::new(),
            snapshots: BTreeMap::new(),
        }
    }

    fn current_token(&self) -> ConsistencyToken {
        ConsistencyToken::from_version(self.version)
    }

    /// Oldest retained-or-current state whose version is at least the token's.
    fn tuples_for_token(&self, token: &ConsistencyToken) -> &TupleSet {
        let requested = token.as_version();
        match self.snapshots.range(requested..).next() {
            Some((version, tuples)) if *version < self.version => tuples,
            _ => &self.tuples,
        }
    }

    fn check_fencing(&self, fencing: Option<&Lock>) -> Result<(), AuthzError> {
        let Some(lock) = fencing else {
            return Ok(());
        };
        if self
            .tuples
            .contains(&lock_tuple(lock.lock_id(), lock.lock_token()))
        {
            Ok(())
        } else {
            Err(AuthzError::PreconditionFailed {
                lock_id: lock.lock_id().to_string(),
            })
        }
    }

    fn apply(&mut self, creates: Vec<RelationsTuple>, deletes: &[RelationsTupleFilter]) -> u64 {
        for filter in deletes {
            self.tuples.retain(|tuple| !filter.matches(tuple));
        }
        self.tuples.extend(creates);
        self.version += 1;
        self.version
    }
}

/// In-process relationship backend with a monotonic version counter and
/// explicitly retained snapshots.
///
/// Every mutation advances the version by one and returns the post-mutation
/// version as its consistency token. Reads presenting token `T` are served
/// from the oldest retained snapshot at version `>= T`, or from current state
/// when none qualifies.
#[derive(Debug, Clone)]
pub struct ReferenceAuthorizer {
    state: Arc<RwLock<AuthorizerState>>,
}

impl Default for ReferenceAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceAuthorizer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AuthorizerState::new())),
        }
    }

    // Every mutation completes before its guard drops, so a poisoned lock
    // still guards consistent state.
    fn read(&self) -> RwLockReadGuard<'_, AuthorizerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthorizerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn version(&self) -> u64 {
        self.read().version
    }

    /// Grants `rbac/principal:<subject_id>` the relation on a resource.
    pub fn grant(
        &self,
        subject_id: &str,
        relation: &str,
        namespace: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> ConsistencyToken {
        let tuple = RelationsTuple::new(
            RelationsResource::new(ObjectType::new(namespace, resource_type), resource_id),
            relation,
            RelationsSubject::direct(RelationsResource::new(
                ObjectType::new("rbac", "principal"),
                subject_id,
            )),
        );
        ConsistencyToken::from_version(self.write().apply(vec![tuple], &[]))
    }

    pub fn create_tuples(
        &self,
        tuples: Vec<RelationsTuple>,
        fencing: Option<&Lock>,
    ) -> Result<ConsistencyToken, AuthzError> {
        let mut state = self.write();
        state.check_fencing(fencing)?;
        Ok(ConsistencyToken::from_version(state.apply(tuples, &[])))
    }

    pub fn delete_tuples(
        &self,
        filters: &[RelationsTupleFilter],
        fencing: Option<&Lock>,
    ) -> Result<ConsistencyToken, AuthzError> {
        if filters.iter().any(RelationsTupleFilter::is_empty) {
            return Err(AuthzError::InvalidRequest(
                "delete filter must have at least one field set".to_string(),
            ));
        }
        let mut state = self.write();
        state.check_fencing(fencing)?;
        Ok(ConsistencyToken::from_version(state.apply(Vec::new(), filters)))
    }

    /// Retains the current tuple set under the current version and returns it.
    pub fn retain_current_snapshot(&self) -> u64 {
        let mut state = self.write();
        let snapshot = state.tuples.clone();
        let version = state.version;
        state.snapshots.insert(version, snapshot);
        version
    }

    pub fn release_snapshot(&self, version: u64) {
        self.write().snapshots.remove(&version);
    }

    pub fn clear_snapshots(&self) {
        self.write().snapshots.clear();
    }

    pub fn retained_versions(&self) -> Vec<u64> {
        self.read().snapshots.keys().copied().collect()
    }

    /// Drops all tuples, snapshots and locks and restarts at the initial version.
    pub fn reset(&self) {
        *self.write() = AuthorizerState::new();
    }

    fn has_tuple(tuples: &TupleSet, request: &CheckRequest) -> bool {
        tuples.contains(&RelationsTuple::new(
            request.resource.clone(),
            &request.relation,
            request.subject.clone(),
        ))
    }
}

impl Authorizer for ReferenceAuthorizer {
    async fn write_tuples(&self, request: WriteTuplesRequest) -> Result<ConsistencyToken, AuthzError> {
        if request.deletes.iter().any(RelationsTupleFilter::is_empty) {
            return Err(AuthzError::InvalidRequest(
                "delete filter must have at least one field set".to_string(),
            ));
        }
        let mut state = self.write();
        state.check_fencing(request.fencing.as_ref())?;
        let version = state.apply(request.creates, &request.deletes);
        Ok(ConsistencyToken::from_version(version))
    }

    async fn check(&self, request: &CheckRequest) -> Result<CheckResponse, AuthzError> {
        let state = self.read();
        let tuples = state.tuples_for_token(&request.consistency_token);
        Ok(CheckResponse {
            allowed: Self::has_tuple(tuples, request),
            consistency_token: state.current_token(),
        })
    }

    async fn check_for_update(&self, request: &CheckRequest) -> Result<CheckResponse, AuthzError> {
        let state = self.read();
        Ok(CheckResponse {
            allowed: Self::has_tuple(&state.tuples, request),
            consistency_token: state.current_token(),
        })
    }

    async fn check_bulk(&self, request: &CheckBulkRequest) -> Result<CheckBulkResponse, AuthzError> {
        let state = self.read();
        let tuples = state.tuples_for_token(&request.consistency_token);
        let pairs = request
            .items
            .iter()
            .map(|item| {
                let tuple = RelationsTuple::new(
                    item.resource.clone(),
                    &item.relation,
                    item.subject.clone(),
                );
                (item.clone(), tuples.contains(&tuple))
            })
            .collect();
        Ok(CheckBulkResponse {
            pairs,
            consistency_token: state.current_token(),
        })
    }

    async fn lookup_resources(
        &self,
        request: &LookupResourcesRequest,
    ) -> Result<LookupResourcesResponse, AuthzError> {
        let state = self.read();
        let tuples = state.tuples_for_token(&request.consistency_token);
        let wanted = &request.resource_type;
        let relation = request.relation.to_lowercase();

        let resources: BTreeSet<RelationsResource> = tuples
            .iter()
            .filter(|t| wanted.namespace.is_empty() || t.resource.object_type.namespace == wanted.namespace)
            .filter(|t| wanted.name.is_empty() || t.resource.object_type.name == wanted.name)
            .filter(|t| t.relation == relation && t.subject == request.subject)
            .map(|t| t.resource.clone())
            .collect();

        Ok(LookupResourcesResponse {
            resources: resources.into_iter().collect(),
            consistency_token: state.current_token(),
        })
    }

    async fn acquire_lock(&self, lock_id: &str) -> Result<Lock, AuthzError> {
        if lock_id.is_empty() {
            return Err(AuthzError::InvalidRequest(
                "lock id must not be empty".to_string(),
            ));
        }
        let token = Uuid::new_v4().to_string();
        let mut state = self.write();
        state.apply(vec![lock_tuple(lock_id, &token)], &[lock_filter(lock_id)]);
        tracing::debug!(lock_id, version = state.version, "lock acquired");
        Ok(Lock::new(lock_id, token))
    }

    async fn health(&self) -> Result<(), AuthzError> {
        Ok(())
    }
}
