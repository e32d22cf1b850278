use serde::{Deserialize, Serialize};

use super::ids::{Generation, ReporterResourceId, ReporterResourceKey, ResourceId, Version};
use super::representation::ReporterMetadata;

/// Latest-only pointer for one reporter key.
///
/// History lives in the immutable [`ReporterRepresentation`](super::ReporterRepresentation)
/// records; this record only tracks where that history currently ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterResource {
    id: ReporterResourceId,
    key: ReporterResourceKey,
    resource_id: ResourceId,
    metadata: ReporterMetadata,
    representation_version: Version,
    generation: Generation,
    tombstone: bool,
}

impl ReporterResource {
    pub fn new(
        id: ReporterResourceId,
        key: ReporterResourceKey,
        resource_id: ResourceId,
        metadata: ReporterMetadata,
    ) -> Self {
        Self {
            id,
            key,
            resource_id,
            metadata,
            representation_version: Version::INITIAL,
            generation: Generation::INITIAL,
            tombstone: false,
        }
    }

    pub fn id(&self) -> ReporterResourceId {
        self.id
    }

    pub fn key(&self) -> &ReporterResourceKey {
        &self.key
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn metadata(&self) -> &ReporterMetadata {
        &self.metadata
    }

    pub fn representation_version(&self) -> Version {
        self.representation_version
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_tombstoned(&self) -> bool {
        self.tombstone
    }

    /// Records a new report. Reporting a tombstoned key starts a new generation.
    pub fn update(&mut self, metadata: ReporterMetadata) {
        self.representation_version = self.representation_version.next();
        if self.tombstone {
            self.generation = self.generation.next();
            self.tombstone = false;
        }
        self.metadata = metadata;
    }

    pub fn delete(&mut self) {
        self.representation_version = self.representation_version.next();
        self.tombstone = true;
    }
}
