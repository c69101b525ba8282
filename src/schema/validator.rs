//! Declaration checks: unique tables and names, resolvable foreign keys.

use super::types::EntityDef;
use crate::error::SchemaError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub fn validate(entities: &[&EntityDef]) -> Result<(), SchemaError> {
    let ident = identifier_pattern();
    let mut tables = HashSet::new();
    let mut keys = HashSet::new();
    for e in entities {
        if !ident.is_match(e.table) {
            return Err(SchemaError::InvalidIdentifier(e.table.to_string()));
        }
        if !tables.insert(e.table) {
            return Err(SchemaError::Duplicate {
                kind: "table",
                name: e.table.to_string(),
            });
        }
        if !keys.insert(e.key) {
            return Err(SchemaError::Duplicate {
                kind: "entity key",
                name: e.key.to_string(),
            });
        }
    }

    for e in entities {
        let mut fields = HashSet::new();
        let mut columns = HashSet::new();
        for c in e.columns {
            if !ident.is_match(c.column) {
                return Err(SchemaError::InvalidIdentifier(format!("{}.{}", e.table, c.column)));
            }
            if !fields.insert(c.field) {
                return Err(SchemaError::Duplicate {
                    kind: "field",
                    name: format!("{}.{}", e.table, c.field),
                });
            }
            if !columns.insert(c.column) {
                return Err(SchemaError::Duplicate {
                    kind: "column",
                    name: format!("{}.{}", e.table, c.column),
                });
            }
        }
        if !e.columns.iter().any(|c| c.is_id()) {
            return Err(SchemaError::MissingReference {
                kind: "primary key",
                id: e.table.to_string(),
            });
        }
        for (col, target) in e.foreign_keys() {
            if !tables.contains(target) {
                return Err(SchemaError::MissingReference {
                    kind: "table",
                    id: format!("{} (from {}.{})", target, e.table, col.column),
                });
            }
        }
        for key in e.unique_keys {
            if let Some(missing) = key.iter().find(|k| !columns.contains(*k)) {
                return Err(SchemaError::MissingReference {
                    kind: "unique key column",
                    id: format!("{}.{}", e.table, missing),
                });
            }
        }
    }
    Ok(())
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static identifier pattern"));

/// Lowercase SQL identifier, as used for schema, table and column names.
pub fn identifier_pattern() -> &'static Regex {
    &IDENTIFIER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::entities::ENTITIES;
    use crate::schema::types::{ColumnDef, ID};

    #[test]
    fn declared_entities_are_consistent() {
        validate(ENTITIES).unwrap();
    }

    static DANGLING: EntityDef = EntityDef {
        table: "dangling",
        key: "dangling",
        columns: &[ID, ColumnDef::foreign("ghost", "ghost")],
        unique_keys: &[],
    };

    #[test]
    fn foreign_key_to_undeclared_table_is_rejected() {
        let err = validate(&[&DANGLING]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingReference { kind: "table", .. }));
    }

    static LOOSE_KEY: EntityDef = EntityDef {
        table: "loose",
        key: "loose",
        columns: &[ID],
        unique_keys: &[&["id", "missing"]],
    };

    #[test]
    fn unique_key_on_undeclared_column_is_rejected() {
        let err = validate(&[&LOOSE_KEY]).unwrap_err();
        assert!(matches!(err, SchemaError::MissingReference { kind: "unique key column", .. }));
    }
}
