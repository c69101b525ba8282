//! Entity and column declarations. Field names follow the API convention (camelCase),
//! column names follow the storage convention (snake_case); the mapping is explicit per column.

/// Storage type of a column. Drives SQL casts, DDL and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Surrogate key, BIGSERIAL.
    Id,
    BigInt,
    Float,
    Bool,
    Text,
    Date,
    Timestamp,
}

impl ColumnKind {
    /// PostgreSQL type used in placeholders casts (`$1::bigint`).
    pub fn pg_cast(&self) -> &'static str {
        match self {
            ColumnKind::Id | ColumnKind::BigInt => "bigint",
            ColumnKind::Float => "double precision",
            ColumnKind::Bool => "boolean",
            ColumnKind::Text => "text",
            ColumnKind::Date => "date",
            ColumnKind::Timestamp => "timestamptz",
        }
    }

    /// PostgreSQL type used in CREATE TABLE.
    pub fn pg_ddl(&self) -> &'static str {
        match self {
            ColumnKind::Id => "BIGSERIAL",
            ColumnKind::BigInt => "BIGINT",
            ColumnKind::Float => "DOUBLE PRECISION",
            ColumnKind::Bool => "BOOLEAN",
            ColumnKind::Text => "TEXT",
            ColumnKind::Date => "DATE",
            ColumnKind::Timestamp => "TIMESTAMPTZ",
        }
    }
}

/// Value used by the storage when an insert omits the column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnDefault {
    Int(i64),
    Bool(bool),
    Now,
}

impl ColumnDefault {
    pub fn sql(&self) -> String {
        match self {
            ColumnDefault::Int(n) => n.to_string(),
            ColumnDefault::Bool(b) => b.to_string(),
            ColumnDefault::Now => "NOW()".into(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub field: &'static str,
    pub column: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
    /// Table whose `id` this column references.
    pub references: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(field: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        ColumnDef {
            field,
            column,
            kind,
            nullable: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    /// Foreign key to `table.id`. Field and column share the name, as in the stored schema.
    pub const fn foreign(name: &'static str, table: &'static str) -> Self {
        ColumnDef::new(name, name, ColumnKind::BigInt).references(table)
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub const fn references(mut self, table: &'static str) -> Self {
        self.references = Some(table);
        self
    }

    pub fn is_id(&self) -> bool {
        self.kind == ColumnKind::Id
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.is_id()
    }
}

pub const ID: ColumnDef = ColumnDef::new("id", "id", ColumnKind::Id);
pub const CREATED_AT: ColumnDef =
    ColumnDef::new("createdAt", "created_at", ColumnKind::Timestamp).default(ColumnDefault::Now);
pub const UPDATED_AT: ColumnDef =
    ColumnDef::new("updatedAt", "updated_at", ColumnKind::Timestamp).default(ColumnDefault::Now);

#[derive(Debug)]
pub struct EntityDef {
    /// Storage table name.
    pub table: &'static str,
    /// Name used for the entity in results (`walletBackup`, `walletBackupList`).
    pub key: &'static str,
    pub columns: &'static [ColumnDef],
    /// Multi-column unique keys, by column name.
    pub unique_keys: &'static [&'static [&'static str]],
}

impl EntityDef {
    pub fn column_by_field(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn column_by_name(&self, column: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.column == column)
    }

    pub fn primary_key(&self) -> &ColumnDef {
        self.columns.iter().find(|c| c.is_id()).unwrap_or(&ID)
    }

    /// Name of the index backing a multi-column unique key.
    pub fn unique_key_name(&self, key: &[&str]) -> String {
        format!("uq_{}_{}", self.table, key.join("_"))
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&ColumnDef, &'static str)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.map(|t| (c, t)))
    }
}
