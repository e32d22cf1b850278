use crate::model::{ReporterResourceKey, Representations, WORKSPACE_ID_FIELD};
use crate::tuple::{
    ObjectType, RelationsResource, RelationsSubject, RelationsTuple, TuplesToReplicate,
    WORKSPACE_NAMESPACE, WORKSPACE_RELATION, WORKSPACE_TYPE,
};

use super::{SchemaError, TupleSchema};

/// Maps a string field of the common data to a relation on the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRelation {
    pub field: String,
    pub relation: String,
    pub subject_type: ObjectType,
}

impl FieldRelation {
    pub fn new(
        field: impl Into<String>,
        relation: impl Into<String>,
        subject_type: ObjectType,
    ) -> Self {
        Self {
            field: field.into(),
            relation: relation.into(),
            subject_type,
        }
    }

    fn value<'a>(&self, representations: Option<&'a Representations>) -> &'a str {
        representations
            .and_then(Representations::common_data)
            .and_then(|data| data.get(&self.field))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }

    fn tuple(&self, subject_id: &str, key: &ReporterResourceKey) -> RelationsTuple {
        RelationsTuple::new(
            RelationsResource::new(
                ObjectType::new(key.reporter_type.as_str(), key.resource_type.as_str()),
                key.local_resource_id.as_str(),
            ),
            &self.relation,
            RelationsSubject::direct(RelationsResource::new(
                self.subject_type.clone(),
                subject_id,
            )),
        )
    }
}

/// Field-to-relation diff.
///
/// For each mapping: equal non-empty values on both sides produce nothing;
/// otherwise the current value is created and the previous value deleted,
/// skipping empty values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRelationSchema {
    relations: Vec<FieldRelation>,
}

impl FieldRelationSchema {
    pub fn new(relations: Vec<FieldRelation>) -> Self {
        Self { relations }
    }

    /// `workspace_id` → `workspace` on `rbac/workspace`.
    pub fn workspace() -> Self {
        Self::new(vec![FieldRelation::new(
            WORKSPACE_ID_FIELD,
            WORKSPACE_RELATION,
            ObjectType::new(WORKSPACE_NAMESPACE, WORKSPACE_TYPE),
        )])
    }

    pub fn relations(&self) -> &[FieldRelation] {
        &self.relations
    }

    pub(crate) fn diff(
        &self,
        current: Option<&Representations>,
        previous: Option<&Representations>,
        key: &ReporterResourceKey,
    ) -> TuplesToReplicate {
        let mut creates = Vec::new();
        let mut deletes = Vec::new();

        for relation in &self.relations {
            let current_value = relation.value(current);
            let previous_value = relation.value(previous);

            if !current_value.is_empty() && current_value == previous_value {
                continue;
            }
            if !current_value.is_empty() {
                creates.push(relation.tuple(current_value, key));
            }
            if !previous_value.is_empty() {
                deletes.push(relation.tuple(previous_value, key));
            }
        }

        let creates = (!creates.is_empty()).then_some(creates);
        let deletes = (!deletes.is_empty()).then_some(deletes);
        TuplesToReplicate::new(creates, deletes).unwrap_or_default()
    }
}

impl TupleSchema for FieldRelationSchema {
    fn calculate_tuples(
        &self,
        current: Option<&Representations>,
        previous: Option<&Representations>,
        key: &ReporterResourceKey,
    ) -> Result<TuplesToReplicate, SchemaError> {
        Ok(self.diff(current, previous, key))
    }
}
