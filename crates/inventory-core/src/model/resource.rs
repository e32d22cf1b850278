use crate::consistency::ConsistencyToken;

use super::event::OperationType;
use super::ids::{ReporterResourceId, ReporterResourceKey, ResourceId, ResourceType, Version};
use super::reporter_resource::ReporterResource;
use super::representation::{
    CommonRepresentation, JsonObject, ReporterMetadata, ReporterRepresentation,
};
use super::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no reporter resource for key {0}")]
    ReporterResourceNotFound(ReporterResourceKey),
}

/// One reporter's submission for a resource.
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub key: ReporterResourceKey,
    pub metadata: ReporterMetadata,
    pub reporter_data: JsonObject,
    pub common_data: JsonObject,
}

/// Representations staged by an aggregate operation, waiting to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct RepresentationChange {
    pub operation: OperationType,
    pub reporter_representation: ReporterRepresentation,
    pub common_representation: Option<CommonRepresentation>,
    pub common_version: Version,
}

/// Reconciled resource aggregate.
///
/// Operations mutate the latest-only pointers and stage the immutable history
/// records they produced; saving the aggregate appends the staged records.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: ResourceId,
    resource_type: ResourceType,
    common_version: Version,
    consistency_token: ConsistencyToken,
    reporter_resources: Vec<ReporterResource>,
    changes: Vec<RepresentationChange>,
}

impl Resource {
    pub fn create(
        id: ResourceId,
        reporter_resource_id: ReporterResourceId,
        report: ResourceReport,
    ) -> Result<Self, ResourceError> {
        let reporter_resource = ReporterResource::new(
            reporter_resource_id,
            report.key.clone(),
            id,
            report.metadata.clone(),
        );
        let mut resource = Self {
            id,
            resource_type: report.key.resource_type.clone(),
            common_version: Version::INITIAL,
            consistency_token: ConsistencyToken::default(),
            reporter_resources: vec![reporter_resource],
            changes: Vec::new(),
        };
        resource.stage_report(0, OperationType::Created, report)?;
        Ok(resource)
    }

    /// Rebuilds a persisted aggregate with no staged changes.
    pub fn restore(
        id: ResourceId,
        resource_type: ResourceType,
        common_version: Version,
        consistency_token: ConsistencyToken,
        reporter_resources: Vec<ReporterResource>,
    ) -> Self {
        Self {
            id,
            resource_type,
            common_version,
            consistency_token,
            reporter_resources,
            changes: Vec::new(),
        }
    }

    pub fn report(&mut self, report: ResourceReport) -> Result<(), ResourceError> {
        let index = self.reporter_index(&report.key)?;
        self.common_version = self.common_version.next();
        self.reporter_resources[index].update(report.metadata.clone());
        self.stage_report(index, OperationType::Updated, report)
    }

    /// Tombstones the reporter's view. Deleting an already tombstoned key is a no-op.
    pub fn delete(&mut self, key: &ReporterResourceKey) -> Result<(), ResourceError> {
        let index = self.reporter_index(key)?;
        let reporter_resource = &mut self.reporter_resources[index];
        if reporter_resource.is_tombstoned() {
            return Ok(());
        }
        reporter_resource.delete();

        let representation = ReporterRepresentation::tombstone(
            reporter_resource.key().clone(),
            reporter_resource.representation_version(),
            reporter_resource.generation(),
            reporter_resource.metadata().clone(),
            self.common_version,
        );
        self.changes.push(RepresentationChange {
            operation: OperationType::Deleted,
            reporter_representation: representation,
            common_representation: None,
            common_version: self.common_version,
        });
        Ok(())
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn common_version(&self) -> Version {
        self.common_version
    }

    pub fn consistency_token(&self) -> &ConsistencyToken {
        &self.consistency_token
    }

    pub fn set_consistency_token(&mut self, token: ConsistencyToken) {
        self.consistency_token = token;
    }

    pub fn reporter_resources(&self) -> &[ReporterResource] {
        &self.reporter_resources
    }

    pub fn reporter_resource(&self, key: &ReporterResourceKey) -> Option<&ReporterResource> {
        self.reporter_resources.iter().find(|rr| rr.key().matches(key))
    }

    pub fn changes(&self) -> &[RepresentationChange] {
        &self.changes
    }

    pub fn take_changes(&mut self) -> Vec<RepresentationChange> {
        std::mem::take(&mut self.changes)
    }

    fn reporter_index(&self, key: &ReporterResourceKey) -> Result<usize, ResourceError> {
        self.reporter_resources
            .iter()
            .position(|rr| rr.key().matches(key))
            .ok_or_else(|| ResourceError::ReporterResourceNotFound(key.clone()))
    }

    fn stage_report(
        &mut self,
        index: usize,
        operation: OperationType,
        report: ResourceReport,
    ) -> Result<(), ResourceError> {
        let reporter_resource = &self.reporter_resources[index];
        let common = CommonRepresentation::new(
            self.id,
            self.common_version,
            report.common_data,
            report.key.reporter_type.clone(),
            report.key.reporter_instance_id.clone(),
        )?;
        let representation = ReporterRepresentation::new(
            reporter_resource.key().clone(),
            reporter_resource.representation_version(),
            reporter_resource.generation(),
            report.reporter_data,
            report.metadata,
            self.common_version,
        );
        self.changes.push(RepresentationChange {
            operation,
            reporter_representation: representation,
            common_representation: Some(common),
            common_version: self.common_version,
        });
        Ok(())
    }
}
