pub mod event;
pub mod ids;
pub mod reporter_resource;
pub mod representation;
pub mod resource;
pub mod validation;

pub use event::{OperationType, OutboxEvent, TransactionId, TupleEvent};
pub use ids::{
    ApiHref, ConsoleHref, Generation, LocalResourceId, ReporterInstanceId, ReporterResourceId,
    ReporterResourceKey, ReporterType, ReporterVersion, ResourceId, ResourceType, Version,
};
pub use reporter_resource::ReporterResource;
pub use representation::{
    CommonRepresentation, JsonObject, ReporterMetadata, ReporterRepresentation, Representations,
    VersionedData, WORKSPACE_ID_FIELD,
};
pub use resource::{RepresentationChange, Resource, ResourceError, ResourceReport};
pub use validation::ValidationError;
