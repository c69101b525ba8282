//! Apply the static model to the database: CREATE SCHEMA, one CREATE TABLE per entity with
//! named foreign keys, then unique indexes for multi-column keys and indexes on foreign-key
//! columns. Every statement is idempotent.

use crate::error::AppError;
use crate::schema::{EntityDef, SchemaModel};
use sqlx::PgPool;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// DDL for `model`, in execution order.
pub fn ddl_statements(model: &SchemaModel) -> Vec<String> {
    let schema = quote(&model.schema_name);
    let mut out = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", schema)];
    for entity in model.entities() {
        out.push(create_table(&schema, entity));
    }
    for entity in model.entities() {
        for key in entity.unique_keys {
            let cols: Vec<String> = key.iter().map(|c| quote(c)).collect();
            out.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote(&entity.unique_key_name(key)),
                schema,
                quote(entity.table),
                cols.join(", ")
            ));
        }
        for (col, _) in entity.foreign_keys() {
            out.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {}.{} ({})",
                quote(&format!("idx_{}_{}", entity.table, col.column)),
                schema,
                quote(entity.table),
                quote(col.column)
            ));
        }
    }
    out
}

fn create_table(schema: &str, entity: &EntityDef) -> String {
    let mut col_defs: Vec<String> = Vec::new();
    for c in entity.columns {
        let mut def = format!("{} {}", quote(c.column), c.kind.pg_ddl());
        if c.is_id() {
            def.push_str(" PRIMARY KEY");
        } else if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = c.default {
            def.push_str(" DEFAULT ");
            def.push_str(&d.sql());
        }
        if c.unique {
            def.push_str(" UNIQUE");
        }
        col_defs.push(def);
    }
    for (col, target) in entity.foreign_keys() {
        col_defs.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}.{} ({})",
            quote(&format!("fk_{}_{}", entity.table, col.column)),
            quote(col.column),
            schema,
            quote(target),
            quote("id")
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n  {}\n)",
        schema,
        quote(entity.table),
        col_defs.join(",\n  ")
    )
}

pub async fn apply_migrations(pool: &PgPool, model: &SchemaModel) -> Result<(), AppError> {
    for sql in ddl_statements(model) {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await?;
    }
    tracing::info!(schema = %model.schema_name, tables = model.entities().count(), "schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_follow_declaration_order_with_named_foreign_keys() {
        let model = SchemaModel::build("monarch").unwrap();
        let ddl = ddl_statements(&model);
        assert_eq!(ddl[0], "CREATE SCHEMA IF NOT EXISTS \"monarch\"");

        let pos = |table: &str| {
            let needle = format!("CREATE TABLE IF NOT EXISTS \"monarch\".\"{}\" (", table);
            ddl.iter().position(|s| s.starts_with(&needle)).unwrap()
        };
        assert!(pos("account") < pos("wallet"));
        assert!(pos("transaction") < pos("payment"));

        let wallet = &ddl[pos("wallet")];
        assert!(wallet.contains("\"balance\" BIGINT NOT NULL DEFAULT 0"));
        assert!(wallet.contains(
            "CONSTRAINT \"fk_wallet_account\" FOREIGN KEY (\"account\") REFERENCES \"monarch\".\"account\" (\"id\")"
        ));
        assert!(ddl[pos("user")].contains("\"google_id\" TEXT,"));
        assert!(ddl
            .iter()
            .any(|s| s == "CREATE INDEX IF NOT EXISTS \"idx_payment_wallet\" ON \"monarch\".\"payment\" (\"wallet\")"));
    }

    #[test]
    fn backup_is_unique_per_user_and_date() {
        let model = SchemaModel::build("monarch").unwrap();
        let ddl = ddl_statements(&model);
        assert!(ddl.iter().any(|s| s
            == "CREATE UNIQUE INDEX IF NOT EXISTS \"uq_backup_user_date\" ON \"monarch\".\"backup\" (\"user\", \"date\")"));
    }
}
