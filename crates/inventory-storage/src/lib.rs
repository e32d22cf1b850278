pub mod memory;
pub mod traits;

pub use memory::{InMemoryStore, InMemoryTransaction};
pub use traits::{OutboxReader, ResourceRepository, StorageError, Store, Transaction};
