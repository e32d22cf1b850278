use serde::{Deserialize, Serialize};

use super::ids::{
    ApiHref, ConsoleHref, Generation, ReporterInstanceId, ReporterResourceKey, ReporterType,
    ReporterVersion, ResourceId, Version,
};
use super::validation::ValidationError;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

pub const WORKSPACE_ID_FIELD: &str = "workspace_id";

/// Href and version metadata attached to every reporter representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterMetadata {
    pub api_href: ApiHref,
    pub console_href: Option<ConsoleHref>,
    pub reporter_version: Option<ReporterVersion>,
}

impl ReporterMetadata {
    pub fn new(api_href: ApiHref) -> Self {
        Self {
            api_href,
            console_href: None,
            reporter_version: None,
        }
    }

    pub fn with_console_href(mut self, console_href: ConsoleHref) -> Self {
        self.console_href = Some(console_href);
        self
    }

    pub fn with_reporter_version(mut self, reporter_version: ReporterVersion) -> Self {
        self.reporter_version = Some(reporter_version);
        self
    }
}

/// Immutable snapshot of what one reporter submitted at `(version, generation)`.
///
/// The payload is absent exactly when the representation is a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterRepresentation {
    key: ReporterResourceKey,
    version: Version,
    generation: Generation,
    data: Option<JsonObject>,
    metadata: ReporterMetadata,
    common_version: Version,
}

impl ReporterRepresentation {
    pub fn new(
        key: ReporterResourceKey,
        version: Version,
        generation: Generation,
        data: JsonObject,
        metadata: ReporterMetadata,
        common_version: Version,
    ) -> Self {
        Self {
            key,
            version,
            generation,
            data: Some(data),
            metadata,
            common_version,
        }
    }

    pub fn tombstone(
        key: ReporterResourceKey,
        version: Version,
        generation: Generation,
        metadata: ReporterMetadata,
        common_version: Version,
    ) -> Self {
        Self {
            key,
            version,
            generation,
            data: None,
            metadata,
            common_version,
        }
    }

    pub fn key(&self) -> &ReporterResourceKey {
        &self.key
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn data(&self) -> Option<&JsonObject> {
        self.data.as_ref()
    }

    pub fn metadata(&self) -> &ReporterMetadata {
        &self.metadata
    }

    pub fn common_version(&self) -> Version {
        self.common_version
    }

    pub fn is_tombstone(&self) -> bool {
        self.data.is_none()
    }

    /// Payload paired with its version, or `None` for a tombstone.
    pub fn versioned_data(&self) -> Option<VersionedData> {
        self.data
            .as_ref()
            .filter(|data| !data.is_empty())
            .map(|data| VersionedData {
                data: data.clone(),
                version: self.version,
            })
    }
}

/// Reconciled cross-reporter view of a resource at one common version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonRepresentation {
    resource_id: ResourceId,
    version: Version,
    data: JsonObject,
    reported_by_reporter_type: ReporterType,
    reported_by_reporter_instance: ReporterInstanceId,
}

impl CommonRepresentation {
    pub fn new(
        resource_id: ResourceId,
        version: Version,
        data: JsonObject,
        reported_by_reporter_type: ReporterType,
        reported_by_reporter_instance: ReporterInstanceId,
    ) -> Result<Self, ValidationError> {
        if data.is_empty() {
            return Err(ValidationError::EmptyData {
                field: "common_representation",
            });
        }
        Ok(Self {
            resource_id,
            version,
            data,
            reported_by_reporter_type,
            reported_by_reporter_instance,
        })
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn data(&self) -> &JsonObject {
        &self.data
    }

    pub fn reported_by_reporter_type(&self) -> &ReporterType {
        &self.reported_by_reporter_type
    }

    pub fn reported_by_reporter_instance(&self) -> &ReporterInstanceId {
        &self.reported_by_reporter_instance
    }

    pub fn versioned_data(&self) -> VersionedData {
        VersionedData {
            data: self.data.clone(),
            version: self.version,
        }
    }
}

/// Non-empty payload joined with the version it was recorded at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedData {
    data: JsonObject,
    version: Version,
}

impl VersionedData {
    /// A version without a payload is not a representation.
    pub fn new(data: JsonObject, version: Version) -> Result<Self, ValidationError> {
        if data.is_empty() {
            return Err(ValidationError::EmptyData {
                field: "versioned_data",
            });
        }
        Ok(Self { data, version })
    }

    pub fn data(&self) -> &JsonObject {
        &self.data
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

/// Common and/or reporter state at one point in time, used as a diff input.
#[derive(Debug, Clone, PartialEq)]
pub struct Representations {
    common: Option<VersionedData>,
    reporter: Option<VersionedData>,
}

impl Representations {
    pub fn new(
        common: Option<VersionedData>,
        reporter: Option<VersionedData>,
    ) -> Result<Self, ValidationError> {
        if common.is_none() && reporter.is_none() {
            return Err(ValidationError::NoRepresentations);
        }
        Ok(Self { common, reporter })
    }

    /// Builds from independently optional halves, rejecting a payload without
    /// its version or a version without its payload.
    pub fn from_parts(
        common_data: Option<JsonObject>,
        common_version: Option<Version>,
        reporter_data: Option<JsonObject>,
        reporter_version: Option<Version>,
    ) -> Result<Self, ValidationError> {
        let common = pair("common", common_data, common_version)?;
        let reporter = pair("reporter", reporter_data, reporter_version)?;
        Self::new(common, reporter)
    }

    pub fn common(&self) -> Option<&VersionedData> {
        self.common.as_ref()
    }

    pub fn reporter(&self) -> Option<&VersionedData> {
        self.reporter.as_ref()
    }

    pub fn common_data(&self) -> Option<&JsonObject> {
        self.common.as_ref().map(VersionedData::data)
    }

    pub fn common_version(&self) -> Option<Version> {
        self.common.as_ref().map(VersionedData::version)
    }

    pub fn reporter_data(&self) -> Option<&JsonObject> {
        self.reporter.as_ref().map(VersionedData::data)
    }

    pub fn reporter_version(&self) -> Option<Version> {
        self.reporter.as_ref().map(VersionedData::version)
    }

    /// `workspace_id` from the common data; empty when absent or not a string.
    pub fn workspace_id(&self) -> &str {
        self.common_data()
            .and_then(|data| data.get(WORKSPACE_ID_FIELD))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }
}

fn pair(
    side: &'static str,
    data: Option<JsonObject>,
    version: Option<Version>,
) -> Result<Option<VersionedData>, ValidationError> {
    let data = data.filter(|d| !d.is_empty());
    match (data, version) {
        (Some(data), Some(version)) => VersionedData::new(data, version).map(Some),
        (None, None) => Ok(None),
        _ => Err(ValidationError::UnpairedVersion { side }),
    }
}
