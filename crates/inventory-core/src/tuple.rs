use std::fmt;

use crate::model::{ReporterResourceKey, ValidationError};

pub const WORKSPACE_RELATION: &str = "workspace";
pub const WORKSPACE_NAMESPACE: &str = "rbac";
pub const WORKSPACE_TYPE: &str = "workspace";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectType {
    pub namespace: String,
    pub name: String,
}

impl ObjectType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into().to_lowercase(),
            name: name.into().to_lowercase(),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationsResource {
    pub object_type: ObjectType,
    pub id: String,
}

impl RelationsResource {
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        Self {
            object_type,
            id: id.into(),
        }
    }

    /// The backend object a reporter's resource is known as.
    pub fn from_key(key: &ReporterResourceKey) -> Self {
        Self::new(
            ObjectType::new(key.reporter_type.as_str(), key.resource_type.as_str()),
            key.local_resource_id.as_str(),
        )
    }
}

impl fmt::Display for RelationsResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationsSubject {
    pub subject: RelationsResource,
    pub relation: Option<String>,
}

impl RelationsSubject {
    pub fn direct(subject: RelationsResource) -> Self {
        Self {
            subject,
            relation: None,
        }
    }

    pub fn userset(subject: RelationsResource, relation: impl Into<String>) -> Self {
        Self {
            subject,
            relation: Some(relation.into().to_lowercase()),
        }
    }
}

impl fmt::Display for RelationsSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subject)?;
        if let Some(ref rel) = self.relation {
            write!(f, "#{rel}")?;
        }
        Ok(())
    }
}

/// Relationship fact destined for the authorization backend.
///
/// Namespaces, type names and relations are lower-cased on construction;
/// object ids are kept as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationsTuple {
    pub resource: RelationsResource,
    pub relation: String,
    pub subject: RelationsSubject,
}

impl RelationsTuple {
    pub fn new(
        resource: RelationsResource,
        relation: impl Into<String>,
        subject: RelationsSubject,
    ) -> Self {
        Self {
            resource,
            relation: relation.into().to_lowercase(),
            subject,
        }
    }

    /// `<reporter>/<type>:<local id>#workspace@rbac/workspace:<workspace id>`
    pub fn workspace(workspace_id: &str, key: &ReporterResourceKey) -> Self {
        let resource = RelationsResource::from_key(key);
        let subject = RelationsSubject::direct(RelationsResource::new(
            ObjectType::new(WORKSPACE_NAMESPACE, WORKSPACE_TYPE),
            workspace_id,
        ));
        Self::new(resource, WORKSPACE_RELATION, subject)
    }
}

impl fmt::Display for RelationsTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.resource, self.relation, self.subject)
    }
}

/// Tuple selector used by backend deletes; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationsTupleFilter {
    pub resource_namespace: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub relation: Option<String>,
    pub subject_namespace: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
}

impl RelationsTupleFilter {
    pub fn exact(tuple: &RelationsTuple) -> Self {
        Self {
            resource_namespace: Some(tuple.resource.object_type.namespace.clone()),
            resource_type: Some(tuple.resource.object_type.name.clone()),
            resource_id: Some(tuple.resource.id.clone()),
            relation: Some(tuple.relation.clone()),
            subject_namespace: Some(tuple.subject.subject.object_type.namespace.clone()),
            subject_type: Some(tuple.subject.subject.object_type.name.clone()),
            subject_id: Some(tuple.subject.subject.id.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, tuple: &RelationsTuple) -> bool {
        let fields = [
            (&self.resource_namespace, &tuple.resource.object_type.namespace),
            (&self.resource_type, &tuple.resource.object_type.name),
            (&self.resource_id, &tuple.resource.id),
            (&self.relation, &tuple.relation),
            (
                &self.subject_namespace,
                &tuple.subject.subject.object_type.namespace,
            ),
            (&self.subject_type, &tuple.subject.subject.object_type.name),
            (&self.subject_id, &tuple.subject.subject.id),
        ];
        fields
            .into_iter()
            .all(|(wanted, actual)| wanted.as_ref().is_none_or(|w| w == actual))
    }
}

/// Tuple changes computed for one delivery.
///
/// Both sides absent is the no-op sentinel; a present side is never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuplesToReplicate {
    creates: Option<Vec<RelationsTuple>>,
    deletes: Option<Vec<RelationsTuple>>,
}

impl TuplesToReplicate {
    pub fn new(
        creates: Option<Vec<RelationsTuple>>,
        deletes: Option<Vec<RelationsTuple>>,
    ) -> Result<Self, ValidationError> {
        if creates.is_none() && deletes.is_none() {
            return Err(ValidationError::NoTuples);
        }
        if creates.as_ref().is_some_and(Vec::is_empty) {
            return Err(ValidationError::EmptyData {
                field: "tuples_to_create",
            });
        }
        if deletes.as_ref().is_some_and(Vec::is_empty) {
            return Err(ValidationError::EmptyData {
                field: "tuples_to_delete",
            });
        }
        Ok(Self { creates, deletes })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_none() && self.deletes.is_none()
    }

    pub fn creates(&self) -> Option<&[RelationsTuple]> {
        self.creates.as_deref()
    }

    pub fn deletes(&self) -> Option<&[RelationsTuple]> {
        self.deletes.as_deref()
    }

    pub fn into_parts(self) -> (Option<Vec<RelationsTuple>>, Option<Vec<RelationsTuple>>) {
        (self.creates, self.deletes)
    }
}
