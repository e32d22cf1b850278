use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use inventory_core::consistency::ConsistencyToken;
use inventory_core::model::{
    CommonRepresentation, Generation, OperationType, OutboxEvent, ReporterRepresentation,
    ReporterResource, ReporterResourceKey, Representations, Resource, ResourceId, ResourceType,
    TransactionId, TupleEvent, Version,
};

use crate::traits::{OutboxReader, ResourceRepository, StorageError, Store, Transaction};

/// Case-folded reporter key used to index the tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct KeyIndex {
    local_resource_id: String,
    reporter_type: String,
    resource_type: String,
    reporter_instance_id: String,
}

impl From<&ReporterResourceKey> for KeyIndex {
    fn from(key: &ReporterResourceKey) -> Self {
        Self {
            local_resource_id: key.local_resource_id.as_str().to_lowercase(),
            reporter_type: key.reporter_type.as_str().to_lowercase(),
            resource_type: key.resource_type.as_str().to_lowercase(),
            reporter_instance_id: key.reporter_instance_id.as_str().to_lowercase(),
        }
    }
}

type ReporterHistoryKey = (KeyIndex, Version, Generation);
type CommonHistoryKey = (ResourceId, Version);

#[derive(Debug, Clone)]
struct StoredResource {
    resource_type: ResourceType,
    common_version: Version,
    consistency_token: ConsistencyToken,
    revision: u64,
}

/// Pointer tables plus the append-only history they point into.
#[derive(Debug, Clone, Default)]
struct Tables {
    resources: HashMap<ResourceId, StoredResource>,
    reporter_resources: HashMap<KeyIndex, ReporterResource>,
    reporter_representations: BTreeMap<ReporterHistoryKey, ReporterRepresentation>,
    common_representations: BTreeMap<CommonHistoryKey, CommonRepresentation>,
    processed_transactions: HashSet<TransactionId>,
}

impl Tables {
    fn resource_by_key(&self, key: &ReporterResourceKey) -> Option<Resource> {
        let resource_id = self
            .reporter_resources
            .get(&KeyIndex::from(key))?
            .resource_id();
        let stored = self.resources.get(&resource_id)?;

        let mut reporter_resources: Vec<ReporterResource> = self
            .reporter_resources
            .iter()
            .filter(|(_, rr)| rr.resource_id() == resource_id)
            .map(|(_, rr)| rr.clone())
            .collect();
        reporter_resources.sort_by_key(|rr| KeyIndex::from(rr.key()));

        Some(Resource::restore(
            resource_id,
            stored.resource_type.clone(),
            stored.common_version,
            stored.consistency_token.clone(),
            reporter_resources,
        ))
    }

    fn reporter_history(
        &self,
        index: &KeyIndex,
    ) -> impl DoubleEndedIterator<Item = &ReporterRepresentation> {
        let start = (index.clone(), Version::new(0), Generation::new(0));
        let end = (
            index.clone(),
            Version::new(u64::MAX),
            Generation::new(u64::MAX),
        );
        self.reporter_representations
            .range(start..=end)
            .map(|(_, rep)| rep)
    }

    fn common_history(
        &self,
        resource_id: ResourceId,
    ) -> impl DoubleEndedIterator<Item = &CommonRepresentation> {
        self.common_representations
            .range((resource_id, Version::new(0))..=(resource_id, Version::new(u64::MAX)))
            .map(|(_, rep)| rep)
    }

    /// Common data at `version` joined with this reporter's representation
    /// reconciled against that version.
    fn representations_at(
        &self,
        index: &KeyIndex,
        resource_id: ResourceId,
        version: Version,
    ) -> Result<Option<Representations>, StorageError> {
        let common = self
            .common_representations
            .get(&(resource_id, version))
            .map(CommonRepresentation::versioned_data);
        let reporter = self
            .reporter_history(index)
            .rev()
            .find(|rep| rep.common_version() == version)
            .and_then(ReporterRepresentation::versioned_data);

        if common.is_none() && reporter.is_none() {
            return Ok(None);
        }
        Ok(Some(Representations::new(common, reporter)?))
    }

    fn latest_representations(
        &self,
        index: &KeyIndex,
        resource_id: ResourceId,
    ) -> Result<Option<Representations>, StorageError> {
        let common = self
            .common_history(resource_id)
            .next_back()
            .map(CommonRepresentation::versioned_data);
        let reporter = self
            .reporter_history(index)
            .next_back()
            .and_then(ReporterRepresentation::versioned_data);

        if common.is_none() && reporter.is_none() {
            return Ok(None);
        }
        Ok(Some(Representations::new(common, reporter)?))
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    outbox: Vec<OutboxEvent>,
}

fn lock(inner: &Mutex<Inner>) -> Result<MutexGuard<'_, Inner>, StorageError> {
    inner
        .lock()
        .map_err(|_| StorageError::Internal("store mutex poisoned".to_string()))
}

/// Two-tier in-memory resource store.
///
/// History records are append-only and never mutated; pointer records are
/// replaced on save. Transactions work on a private copy and commit with an
/// optimistic per-resource revision check.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox_len(&self) -> Result<u64, StorageError> {
        Ok(lock(&self.inner)?.outbox.len() as u64)
    }
}

impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, StorageError> {
        let working = lock(&self.inner)?.tables.clone();
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.inner),
            working,
            base_revisions: HashMap::new(),
            appended_reporter: Vec::new(),
            appended_common: Vec::new(),
            processed: Vec::new(),
            outbox: Vec::new(),
        })
    }
}

impl OutboxReader for InMemoryStore {
    async fn read_outbox(
        &self,
        from_offset: u64,
        limit: usize,
    ) -> Result<Vec<(u64, OutboxEvent)>, StorageError> {
        let inner = lock(&self.inner)?;
        let start = usize::try_from(from_offset)
            .map_err(|_| StorageError::Internal(format!("offset {from_offset} out of range")))?;
        Ok(inner
            .outbox
            .iter()
            .enumerate()
            .skip(start)
            .take(limit)
            .map(|(offset, event)| (offset as u64, event.clone()))
            .collect())
    }
}

#[derive(Debug)]
pub struct InMemoryTransaction {
    shared: Arc<Mutex<Inner>>,
    working: Tables,
    base_revisions: HashMap<ResourceId, Option<u64>>,
    appended_reporter: Vec<ReporterHistoryKey>,
    appended_common: Vec<CommonHistoryKey>,
    processed: Vec<TransactionId>,
    outbox: Vec<OutboxEvent>,
}

impl InMemoryTransaction {
    fn check_change(
        &self,
        resource: &Resource,
        rep: &ReporterRepresentation,
        is_latest_for_key: bool,
    ) -> Result<(), StorageError> {
        let rr = resource.reporter_resource(rep.key()).ok_or_else(|| {
            StorageError::VersionMismatch(format!("no reporter resource for {}", rep.key()))
        })?;

        let in_step = if is_latest_for_key {
            rep.version() == rr.representation_version() && rep.generation() == rr.generation()
        } else {
            rep.version() < rr.representation_version() && rep.generation() <= rr.generation()
        };
        if !in_step {
            return Err(StorageError::VersionMismatch(format!(
                "{} at version {} generation {}, pointer at version {} generation {}",
                rep.key(),
                rep.version(),
                rep.generation(),
                rr.representation_version(),
                rr.generation()
            )));
        }

        let index = KeyIndex::from(rep.key());
        if let Some(stored) = self.working.reporter_resources.get(&index)
            && stored.resource_id() != resource.id()
        {
            return Err(StorageError::Conflict(format!(
                "{} already belongs to resource {}",
                rep.key(),
                stored.resource_id()
            )));
        }
        if self
            .working
            .reporter_representations
            .contains_key(&(index, rep.version(), rep.generation()))
        {
            return Err(StorageError::DuplicateRepresentation(format!(
                "{} version {} generation {}",
                rep.key(),
                rep.version(),
                rep.generation()
            )));
        }
        Ok(())
    }
}

impl ResourceRepository for InMemoryTransaction {
    async fn find_current_and_previous_versioned_representations(
        &self,
        key: &ReporterResourceKey,
        current_version: Option<Version>,
        operation: OperationType,
    ) -> Result<(Option<Representations>, Option<Representations>), StorageError> {
        let Some(version) = current_version else {
            return Ok((None, None));
        };
        let index = KeyIndex::from(key);
        let rr = self
            .working
            .reporter_resources
            .get(&index)
            .ok_or_else(|| StorageError::RepresentationsNotFound(key.to_string()))?;
        let resource_id = rr.resource_id();

        let current = self
            .working
            .representations_at(&index, resource_id, version)?;
        let previous = match (operation, version.previous()) {
            (OperationType::Created, _) | (_, None) => None,
            (_, Some(previous)) => self
                .working
                .representations_at(&index, resource_id, previous)?,
        };
        Ok((current, previous))
    }

    async fn find_latest_representations(
        &self,
        key: &ReporterResourceKey,
    ) -> Result<Option<Representations>, StorageError> {
        let index = KeyIndex::from(key);
        let Some(rr) = self.working.reporter_resources.get(&index) else {
            return Ok(None);
        };
        self.working
            .latest_representations(&index, rr.resource_id())
    }

    async fn find_resource_by_keys(
        &self,
        key: &ReporterResourceKey,
    ) -> Result<Option<Resource>, StorageError> {
        Ok(self.working.resource_by_key(key))
    }

    async fn save(
        &mut self,
        mut resource: Resource,
        operation: OperationType,
        tx_id: &TransactionId,
    ) -> Result<(), StorageError> {
        let changes = resource.take_changes();
        let resource_id = resource.id();

        for (i, change) in changes.iter().enumerate() {
            let key = change.reporter_representation.key();
            let is_latest = changes[i + 1..]
                .iter()
                .all(|later| !later.reporter_representation.key().matches(key));
            self.check_change(&resource, &change.reporter_representation, is_latest)?;
            if let Some(common) = &change.common_representation
                && self
                    .working
                    .common_representations
                    .contains_key(&(resource_id, common.version()))
            {
                return Err(StorageError::DuplicateRepresentation(format!(
                    "common representation {resource_id} version {}",
                    common.version()
                )));
            }
        }

        let base = self.working.resources.get(&resource_id).map(|s| s.revision);
        self.base_revisions.entry(resource_id).or_insert(base);

        for change in &changes {
            let rep = &change.reporter_representation;
            let history_key = (KeyIndex::from(rep.key()), rep.version(), rep.generation());
            self.working
                .reporter_representations
                .insert(history_key.clone(), rep.clone());
            self.appended_reporter.push(history_key);

            if let Some(common) = &change.common_representation {
                let common_key = (resource_id, common.version());
                self.working
                    .common_representations
                    .insert(common_key, common.clone());
                self.appended_common.push(common_key);
            }

            self.outbox.push(OutboxEvent {
                operation: change.operation,
                tx_id: tx_id.clone(),
                resource_id,
                resource_type: resource.resource_type().clone(),
                tuple_event: TupleEvent::new(
                    rep.key().clone(),
                    Some(change.common_version),
                    Some(rep.version()),
                )?,
            });
        }

        for rr in resource.reporter_resources() {
            self.working
                .reporter_resources
                .insert(KeyIndex::from(rr.key()), rr.clone());
        }
        self.working.resources.insert(
            resource_id,
            StoredResource {
                resource_type: resource.resource_type().clone(),
                common_version: resource.common_version(),
                consistency_token: resource.consistency_token().clone(),
                revision: base.unwrap_or(0),
            },
        );

        if !changes.is_empty() && self.working.processed_transactions.insert(tx_id.clone()) {
            self.processed.push(tx_id.clone());
        }

        tracing::debug!(
            resource_id = %resource_id,
            operation = %operation,
            tx_id = %tx_id,
            changes = changes.len(),
            "resource staged"
        );
        Ok(())
    }

    async fn contains_event_for_transaction_id(
        &self,
        tx_id: &TransactionId,
    ) -> Result<bool, StorageError> {
        Ok(self.working.processed_transactions.contains(tx_id))
    }
}

impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<(), StorageError> {
        let mut inner = lock(&self.shared)?;

        for (resource_id, base) in &self.base_revisions {
            let current = inner.tables.resources.get(resource_id).map(|s| s.revision);
            if current != *base {
                return Err(StorageError::Conflict(resource_id.to_string()));
            }
            if base.is_none() {
                let claimed = self
                    .working
                    .reporter_resources
                    .iter()
                    .filter(|(_, rr)| rr.resource_id() == *resource_id);
                for (index, _) in claimed {
                    if let Some(existing) = inner.tables.reporter_resources.get(index)
                        && existing.resource_id() != *resource_id
                    {
                        return Err(StorageError::Conflict(resource_id.to_string()));
                    }
                }
            }
        }

        let tables = &mut inner.tables;
        for (resource_id, base) in &self.base_revisions {
            if let Some(stored) = self.working.resources.get(resource_id) {
                let mut stored = stored.clone();
                stored.revision = base.map_or(1, |r| r + 1);
                tables.resources.insert(*resource_id, stored);
            }
            for (index, rr) in &self.working.reporter_resources {
                if rr.resource_id() == *resource_id {
                    tables.reporter_resources.insert(index.clone(), rr.clone());
                }
            }
        }
        for key in &self.appended_reporter {
            if let Some(rep) = self.working.reporter_representations.get(key) {
                tables
                    .reporter_representations
                    .insert(key.clone(), rep.clone());
            }
        }
        for key in &self.appended_common {
            if let Some(rep) = self.working.common_representations.get(key) {
                tables.common_representations.insert(*key, rep.clone());
            }
        }
        tables
            .processed_transactions
            .extend(self.processed.iter().cloned());

        let published = self.outbox.len();
        inner.outbox.extend(self.outbox);

        tracing::debug!(
            resources = self.base_revisions.len(),
            published,
            "transaction committed"
        );
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        tracing::debug!(
            resources = self.base_revisions.len(),
            "transaction rolled back"
        );
        Ok(())
    }
}
