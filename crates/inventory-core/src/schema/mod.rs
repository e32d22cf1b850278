mod relations;

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{ReporterResourceKey, Representations, ResourceType};
use crate::tuple::TuplesToReplicate;

pub use relations::{FieldRelation, FieldRelationSchema};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("tuple calculation failed for resource type '{resource_type}': {reason}")]
    Calculation {
        resource_type: String,
        reason: String,
    },
}

/// Computes the tuple changes that move the backend from `previous` to `current`.
pub trait TupleSchema: Send + Sync {
    fn calculate_tuples(
        &self,
        current: Option<&Representations>,
        previous: Option<&Representations>,
        key: &ReporterResourceKey,
    ) -> Result<TuplesToReplicate, SchemaError>;
}

/// Resource-type specific schemas. Lookups ignore case.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<dyn TupleSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource_type: &ResourceType, schema: Arc<dyn TupleSchema>) {
        self.schemas
            .insert(resource_type.as_str().to_lowercase(), schema);
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<&Arc<dyn TupleSchema>> {
        self.schemas.get(&resource_type.as_str().to_lowercase())
    }

    pub fn remove(&mut self, resource_type: &ResourceType) -> bool {
        self.schemas
            .remove(&resource_type.as_str().to_lowercase())
            .is_some()
    }

    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

/// Tuple diff entry point. Resource types without a registered schema use
/// the workspace relation.
#[derive(Debug, Clone)]
pub struct SchemaService {
    registry: SchemaRegistry,
    default_schema: FieldRelationSchema,
}

impl SchemaService {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            default_schema: FieldRelationSchema::workspace(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn calculate_tuples_for_resource(
        &self,
        current: Option<&Representations>,
        previous: Option<&Representations>,
        key: &ReporterResourceKey,
    ) -> Result<TuplesToReplicate, SchemaError> {
        match self.registry.get(&key.resource_type) {
            Some(schema) => schema.calculate_tuples(current, previous, key),
            None => Ok(self.default_schema.diff(current, previous, key)),
        }
    }
}

impl Default for SchemaService {
    fn default() -> Self {
        Self::new(SchemaRegistry::new())
    }
}
