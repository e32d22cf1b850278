pub mod reference;
pub mod replicator;
pub mod traits;

pub use reference::ReferenceAuthorizer;
pub use replicator::{AuthorizerReplicator, RelationsReplicator, ReplicateError};
pub use traits::{
    Authorizer, AuthzError, CheckBulkItem, CheckBulkRequest, CheckBulkResponse, CheckRequest,
    CheckResponse, LookupResourcesRequest, LookupResourcesResponse, WriteTuplesRequest,
};
