pub mod consistency;
pub mod lock;
pub mod model;
pub mod schema;
pub mod tuple;
