//! Static schema: entity declarations, declaration checks and the resolved relation model.

pub mod entities;
pub mod model;
pub mod types;
pub mod validator;

pub use model::{Relation, Relations, SchemaModel, ToMany, ToOne};
pub use types::{ColumnDef, ColumnDefault, ColumnKind, EntityDef};
pub use validator::validate;
