//! Resolved schema model: entities indexed by table and the relation map derived from
//! their foreign keys, built once at startup.

use super::entities::ENTITIES;
use super::types::{ColumnDef, EntityDef};
use super::validator::validate;
use crate::error::{AppError, SchemaError};
use std::collections::HashMap;

/// Outbound foreign key of a table: `column` holds the id of a `referenced_table` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToOne {
    pub field: &'static str,
    pub column: &'static str,
    pub referenced_table: &'static str,
}

/// Inbound foreign key: rows of `referencing_table` point at us through `column`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToMany {
    pub field: &'static str,
    pub column: &'static str,
    pub referencing_table: &'static str,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relations {
    pub to_one: Vec<ToOne>,
    pub to_many: Vec<ToMany>,
}

/// Outcome of resolving a populate name against a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    ToOne(ToOne),
    ToMany(ToMany),
}

#[derive(Debug)]
pub struct SchemaModel {
    pub schema_name: String,
    ordered: Vec<&'static EntityDef>,
    entity_by_table: HashMap<&'static str, &'static EntityDef>,
    relations_by_table: HashMap<&'static str, Relations>,
}

impl SchemaModel {
    /// Build from the declared entities. Fails when declarations are inconsistent.
    pub fn build(schema_name: impl Into<String>) -> Result<Self, SchemaError> {
        Self::from_entities(schema_name, ENTITIES)
    }

    pub fn from_entities(
        schema_name: impl Into<String>,
        entities: &[&'static EntityDef],
    ) -> Result<Self, SchemaError> {
        validate(entities)?;
        let entity_by_table: HashMap<_, _> = entities.iter().map(|e| (e.table, *e)).collect();
        let mut relations_by_table: HashMap<&'static str, Relations> =
            entities.iter().map(|e| (e.table, Relations::default())).collect();

        for entity in entities {
            for (col, target) in entity.foreign_keys() {
                if let Some(rel) = relations_by_table.get_mut(entity.table) {
                    rel.to_one.push(ToOne {
                        field: col.field,
                        column: col.column,
                        referenced_table: target,
                    });
                }
                if let Some(rel) = relations_by_table.get_mut(target) {
                    rel.to_many.push(ToMany {
                        field: col.field,
                        column: col.column,
                        referencing_table: entity.table,
                    });
                }
            }
        }

        Ok(SchemaModel {
            schema_name: schema_name.into(),
            ordered: entities.to_vec(),
            entity_by_table,
            relations_by_table,
        })
    }

    pub fn entity(&self, table: &str) -> Option<&'static EntityDef> {
        self.entity_by_table.get(table).copied()
    }

    pub fn require(&self, table: &str) -> Result<&'static EntityDef, AppError> {
        self.entity(table)
            .ok_or_else(|| AppError::SchemaMismatch(format!("unknown table '{}'", table)))
    }

    /// Entities in declaration order, referenced tables first.
    pub fn entities(&self) -> impl Iterator<Item = &'static EntityDef> + '_ {
        self.ordered.iter().copied()
    }

    /// Outbound and inbound foreign keys of `table`; empty for unknown tables.
    pub fn relations_of(&self, table: &str) -> Relations {
        self.relations_by_table.get(table).cloned().unwrap_or_default()
    }

    /// Resolve a populate name. A to-one match (FK field or column) wins over a
    /// to-many match (referencing table name or its result key).
    pub fn relation(&self, table: &str, name: &str) -> Option<Relation> {
        let rels = self.relations_by_table.get(table)?;
        if let Some(one) = rels
            .to_one
            .iter()
            .find(|r| r.field == name || r.column == name)
        {
            return Some(Relation::ToOne(one.clone()));
        }
        rels.to_many
            .iter()
            .find(|r| {
                r.referencing_table == name
                    || self
                        .entity(r.referencing_table)
                        .map(|e| e.key == name)
                        .unwrap_or(false)
            })
            .map(|r| Relation::ToMany(r.clone()))
    }

    /// Look up a column of `entity` by its API field name.
    pub fn field<'e>(&self, entity: &'e EntityDef, field: &str) -> Result<&'e ColumnDef, AppError> {
        entity.column_by_field(field).ok_or_else(|| {
            AppError::SchemaMismatch(format!("unknown field '{}' on '{}'", field, entity.table))
        })
    }
}
