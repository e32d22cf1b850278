use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{ReporterResourceKey, ResourceId, ResourceType, Version};
use super::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Created,
    Updated,
    Deleted,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Created => "created",
            OperationType::Updated => "updated",
            OperationType::Deleted => "deleted",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(OperationType::Created),
            "updated" => Ok(OperationType::Updated),
            "deleted" => Ok(OperationType::Deleted),
            _ => Err(ValidationError::UnknownOperation(s.to_string())),
        }
    }
}

/// Identifier of the upstream transaction that produced a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "transaction_id",
            });
        }
        Ok(Self(value))
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TransactionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TransactionId> for String {
    fn from(value: TransactionId) -> Self {
        value.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
struct RawTupleEvent {
    key: ReporterResourceKey,
    common_version: Option<Version>,
    reporter_representation_version: Option<Version>,
}

/// Pointer from an outbox event to the representations it was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTupleEvent")]
pub struct TupleEvent {
    key: ReporterResourceKey,
    common_version: Option<Version>,
    reporter_representation_version: Option<Version>,
}

impl TupleEvent {
    pub fn new(
        key: ReporterResourceKey,
        common_version: Option<Version>,
        reporter_representation_version: Option<Version>,
    ) -> Result<Self, ValidationError> {
        if common_version.is_none() && reporter_representation_version.is_none() {
            return Err(ValidationError::EmptyTupleEvent);
        }
        Ok(Self {
            key,
            common_version,
            reporter_representation_version,
        })
    }

    pub fn key(&self) -> &ReporterResourceKey {
        &self.key
    }

    pub fn common_version(&self) -> Option<Version> {
        self.common_version
    }

    pub fn reporter_representation_version(&self) -> Option<Version> {
        self.reporter_representation_version
    }
}

impl TryFrom<RawTupleEvent> for TupleEvent {
    type Error = ValidationError;

    fn try_from(raw: RawTupleEvent) -> Result<Self, Self::Error> {
        Self::new(
            raw.key,
            raw.common_version,
            raw.reporter_representation_version,
        )
    }
}

/// A committed resource change as published through the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub operation: OperationType,
    pub tx_id: TransactionId,
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
    pub tuple_event: TupleEvent,
}

impl OutboxEvent {
    pub fn key(&self) -> &ReporterResourceKey {
        self.tuple_event.key()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
