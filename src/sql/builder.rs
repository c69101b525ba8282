//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and COUNT from declared entities
//! and resolved select plans.

use crate::query::{Condition, Op, Order, SelectPlan};
use crate::record::Map;
use crate::schema::{ColumnKind, EntityDef};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from declarations).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder with an explicit cast so text, integer and null binds all land on the column type.
    fn placeholder(&mut self, kind: ColumnKind, v: Value) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, kind.pg_cast())
    }
}

fn column_list(entity: &EntityDef) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(c.column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn condition_sql(q: &mut QueryBuf, cond: &Condition) -> String {
    match cond {
        Condition::Compare { column, op, value: Value::Null, .. } => match op {
            Op::Eq => format!("{} IS NULL", quoted(column)),
            Op::Ne => format!("{} IS NOT NULL", quoted(column)),
            _ => "1 = 0".to_string(),
        },
        Condition::Compare { column, kind, op, value } => {
            let ph = q.placeholder(*kind, value.clone());
            format!("{} {} {}", quoted(column), op.sql(), ph)
        }
        Condition::In { values, .. } if values.is_empty() => "1 = 0".to_string(),
        Condition::In { column, kind, values } => {
            let phs: Vec<String> = values.iter().map(|v| q.placeholder(*kind, v.clone())).collect();
            format!("{} IN ({})", quoted(column), phs.join(", "))
        }
        Condition::Between { column, kind, low, high } => {
            let lo = q.placeholder(*kind, low.clone());
            let hi = q.placeholder(*kind, high.clone());
            format!("{} BETWEEN {} AND {}", quoted(column), lo, hi)
        }
    }
}

/// SELECT with conditions joined by AND, ORDER BY the plan keys, optional LIMIT and row lock.
pub fn select(schema: &str, plan: &SelectPlan) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, plan.entity.table);
    let where_parts: Vec<String> = plan.conditions.iter().map(|c| condition_sql(&mut q, c)).collect();
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = if plan.order.is_empty() {
        String::new()
    } else {
        let keys: Vec<String> = plan
            .order
            .iter()
            .map(|(col, order)| {
                let dir = match order {
                    Order::Asc => "ASC",
                    Order::Desc => "DESC",
                };
                format!("{} {}", quoted(col), dir)
            })
            .collect();
        format!(" ORDER BY {}", keys.join(", "))
    };
    let limit_clause = plan.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let lock_clause = if plan.lock { " FOR UPDATE" } else { "" };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        column_list(plan.entity),
        table,
        where_clause,
        order_clause,
        limit_clause,
        lock_clause
    );
    q
}

/// INSERT: columns present in `values` (keyed by column name); omitted columns take the
/// table default. Returns the full row.
pub fn insert(schema: &str, entity: &EntityDef, values: &Map) -> QueryBuf {
    insert_with(schema, entity, values, "")
}

/// INSERT that yields no row when it would violate a unique key.
pub fn insert_if_absent(schema: &str, entity: &EntityDef, values: &Map) -> QueryBuf {
    insert_with(schema, entity, values, " ON CONFLICT DO NOTHING")
}

fn insert_with(schema: &str, entity: &EntityDef, values: &Map, on_conflict: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in entity.columns {
        let Some(val) = values.get(c.column) else { continue };
        if c.is_id() && val.is_null() {
            continue;
        }
        placeholders.push(q.placeholder(c.kind, val.clone()));
        cols.push(quoted(c.column));
    }
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES{} RETURNING {}",
            table,
            on_conflict,
            column_list(entity)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}){} RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            on_conflict,
            column_list(entity)
        )
    };
    q
}

/// UPDATE by id: SET only declared columns present in `values`. `updated_at` is refreshed
/// unless the caller sets it.
pub fn update(schema: &str, entity: &EntityDef, id: i64, values: &Map) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);
    let pk = entity.primary_key();
    let mut sets = Vec::new();
    for c in entity.columns {
        if c.is_id() {
            continue;
        }
        let Some(val) = values.get(c.column) else { continue };
        let rhs = q.placeholder(c.kind, val.clone());
        sets.push(format!("{} = {}", quoted(c.column), rhs));
    }
    if entity.column_by_name("updated_at").is_some() && !values.contains_key("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    if sets.is_empty() {
        let ph = q.placeholder(pk.kind, Value::from(id));
        q.sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            column_list(entity),
            table,
            quoted(pk.column),
            ph
        );
        return q;
    }
    let ph = q.placeholder(pk.kind, Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        quoted(pk.column),
        ph,
        column_list(entity)
    );
    q
}

/// DELETE by id, returning the removed row.
pub fn delete(schema: &str, entity: &EntityDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table);
    let pk = entity.primary_key();
    let ph = q.placeholder(pk.kind, Value::from(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        table,
        quoted(pk.column),
        ph,
        column_list(entity)
    );
    q
}

pub fn count(schema: &str, entity: &EntityDef) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(schema, entity.table));
    q
}
