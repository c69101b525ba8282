//! Repository and relation resolver over the storage boundary.

mod repository;
pub mod resolver;
pub use repository::Repository;
