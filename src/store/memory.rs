//! In-process backend. Values are normalized to the declared column kind on write, with
//! defaults, not-null, unique and foreign-key checks applied as the database would. A unit
//! of work holds the store lock and edits a private copy of the tables, swapped in on commit.

use super::{Executor, Store, UnitOfWork};
use crate::error::AppError;
use crate::query::{Condition, Op, Order, SelectPlan};
use crate::record::Map;
use crate::schema::{ColumnDefault, ColumnKind, EntityDef};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn acquire(&self) -> Result<Box<dyn Executor>, AppError> {
        Ok(Box::new(MemoryConn {
            tables: self.tables.clone(),
        }))
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnit { guard, work }))
    }
}

struct MemoryConn {
    tables: Arc<Mutex<Tables>>,
}

#[async_trait]
impl Executor for MemoryConn {
    async fn select(&mut self, plan: &SelectPlan) -> Result<Vec<Map>, AppError> {
        self.tables.lock().await.select(plan)
    }

    async fn insert(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Map, AppError> {
        self.tables.lock().await.insert(entity, values)
    }

    async fn insert_if_absent(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Option<Map>, AppError> {
        self.tables.lock().await.insert_if_absent(entity, values)
    }

    async fn update(&mut self, entity: &'static EntityDef, id: i64, values: &Map) -> Result<Option<Map>, AppError> {
        self.tables.lock().await.update(entity, id, values)
    }

    async fn delete(&mut self, entity: &'static EntityDef, id: i64) -> Result<Option<Map>, AppError> {
        self.tables.lock().await.delete(entity, id)
    }

    async fn count(&mut self, entity: &'static EntityDef) -> Result<i64, AppError> {
        Ok(self.tables.lock().await.count(entity))
    }

    async fn ping(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

struct MemoryUnit {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl Executor for MemoryUnit {
    async fn select(&mut self, plan: &SelectPlan) -> Result<Vec<Map>, AppError> {
        self.work.select(plan)
    }

    async fn insert(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Map, AppError> {
        self.work.insert(entity, values)
    }

    async fn insert_if_absent(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Option<Map>, AppError> {
        self.work.insert_if_absent(entity, values)
    }

    async fn update(&mut self, entity: &'static EntityDef, id: i64, values: &Map) -> Result<Option<Map>, AppError> {
        self.work.update(entity, id, values)
    }

    async fn delete(&mut self, entity: &'static EntityDef, id: i64) -> Result<Option<Map>, AppError> {
        self.work.delete(entity, id)
    }

    async fn count(&mut self, entity: &'static EntityDef) -> Result<i64, AppError> {
        Ok(self.work.count(entity))
    }

    async fn ping(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    fn conn(&mut self) -> &mut dyn Executor {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryUnit { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct Tables {
    rows: HashMap<&'static str, BTreeMap<i64, Map>>,
    sequences: HashMap<&'static str, i64>,
    /// Entities written so far; used to find referencing rows on delete.
    defs: HashMap<&'static str, &'static EntityDef>,
}

impl Tables {
    fn select(&self, plan: &SelectPlan) -> Result<Vec<Map>, AppError> {
        tracing::debug!(table = plan.entity.table, conditions = plan.conditions.len(), "memory select");
        let mut out = Vec::new();
        if let Some(rows) = self.rows.get(plan.entity.table) {
            for row in rows.values() {
                if matches_all(row, &plan.conditions)? {
                    out.push(row.clone());
                }
            }
        }
        out.sort_by(|a, b| compare_rows(plan.entity, a, b, &plan.order));
        if let Some(n) = plan.limit {
            out.truncate(n as usize);
        }
        Ok(out)
    }

    fn insert(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Map, AppError> {
        let (id, row) = self.new_row(entity, values)?;
        self.check_row(entity, &row, id)?;
        Ok(self.store_row(entity, id, row))
    }

    fn insert_if_absent(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Option<Map>, AppError> {
        let (id, row) = self.new_row(entity, values)?;
        if self.unique_violation(entity, &row, id).is_some() {
            return Ok(None);
        }
        self.check_row(entity, &row, id)?;
        Ok(Some(self.store_row(entity, id, row)))
    }

    /// Row with defaults applied and its id. Consumes a sequence value like the database does.
    fn new_row(&mut self, entity: &'static EntityDef, values: &Map) -> Result<(i64, Map), AppError> {
        reject_unknown_columns(entity, values)?;
        let now = now_string();
        let mut row = Map::new();
        for c in entity.columns {
            let given = values.get(c.column).filter(|v| !(c.is_id() && v.is_null()));
            let v = match given {
                Some(v) => coerce(c.kind, v)?,
                None if c.is_id() => {
                    let seq = self.sequences.entry(entity.table).or_insert(0);
                    *seq += 1;
                    Value::from(*seq)
                }
                None => match c.default {
                    Some(ColumnDefault::Int(n)) => Value::from(n),
                    Some(ColumnDefault::Bool(b)) => Value::Bool(b),
                    Some(ColumnDefault::Now) => Value::String(now.clone()),
                    None => Value::Null,
                },
            };
            row.insert(c.column.to_string(), v);
        }
        let id = row_id(entity, &row)?;
        if self.rows.get(entity.table).map_or(false, |t| t.contains_key(&id)) {
            return Err(AppError::Storage(format!(
                "duplicate key value violates unique constraint \"{}_pkey\"",
                entity.table
            )));
        }
        Ok((id, row))
    }

    fn store_row(&mut self, entity: &'static EntityDef, id: i64, row: Map) -> Map {
        self.defs.insert(entity.table, entity);
        self.rows.entry(entity.table).or_default().insert(id, row.clone());
        row
    }

    fn update(&mut self, entity: &'static EntityDef, id: i64, values: &Map) -> Result<Option<Map>, AppError> {
        reject_unknown_columns(entity, values)?;
        let Some(mut row) = self.rows.get(entity.table).and_then(|t| t.get(&id)).cloned() else {
            return Ok(None);
        };
        for c in entity.columns {
            if c.is_id() {
                continue;
            }
            if let Some(v) = values.get(c.column) {
                row.insert(c.column.to_string(), coerce(c.kind, v)?);
            }
        }
        if entity.column_by_name("updated_at").is_some() && !values.contains_key("updated_at") {
            row.insert("updated_at".into(), Value::String(now_string()));
        }
        self.check_row(entity, &row, id)?;
        self.rows.entry(entity.table).or_default().insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete(&mut self, entity: &'static EntityDef, id: i64) -> Result<Option<Map>, AppError> {
        if !self.rows.get(entity.table).map_or(false, |t| t.contains_key(&id)) {
            return Ok(None);
        }
        for def in self.defs.values() {
            for (col, target) in def.foreign_keys() {
                if target != entity.table {
                    continue;
                }
                let referenced = self
                    .rows
                    .get(def.table)
                    .map_or(false, |t| t.values().any(|r| r.get(col.column).and_then(Value::as_i64) == Some(id)));
                if referenced {
                    return Err(AppError::Storage(format!(
                        "update or delete on table \"{}\" violates foreign key constraint \"fk_{}_{}\"",
                        entity.table, def.table, col.column
                    )));
                }
            }
        }
        Ok(self.rows.get_mut(entity.table).and_then(|t| t.remove(&id)))
    }

    fn count(&self, entity: &EntityDef) -> i64 {
        self.rows.get(entity.table).map_or(0, |t| t.len() as i64)
    }

    /// Name of the unique constraint `row` would break if stored under `id`. Keys with a
    /// null part never clash.
    fn unique_violation(&self, entity: &EntityDef, row: &Map, id: i64) -> Option<String> {
        let Some(existing) = self.rows.get(entity.table) else {
            return None;
        };
        let clashes = |cols: &[&str]| {
            let key: Option<Vec<&Value>> = cols.iter().map(|c| row.get(*c).filter(|v| !v.is_null())).collect();
            key.map_or(false, |key| {
                existing
                    .iter()
                    .any(|(other, r)| *other != id && cols.iter().zip(&key).all(|(c, v)| r.get(*c) == Some(*v)))
            })
        };
        for c in entity.columns.iter().filter(|c| c.unique) {
            if clashes(&[c.column]) {
                return Some(format!("{}_{}_key", entity.table, c.column));
            }
        }
        entity
            .unique_keys
            .iter()
            .find(|key| clashes(key))
            .map(|key| entity.unique_key_name(key))
    }

    /// Not-null, unique and foreign-key checks for a row about to be stored under `id`.
    fn check_row(&self, entity: &EntityDef, row: &Map, id: i64) -> Result<(), AppError> {
        if let Some(constraint) = self.unique_violation(entity, row, id) {
            return Err(AppError::Storage(format!(
                "duplicate key value violates unique constraint \"{}\"",
                constraint
            )));
        }
        for c in entity.columns {
            let v = row.get(c.column).unwrap_or(&Value::Null);
            if v.is_null() {
                if !c.nullable {
                    return Err(AppError::Storage(format!(
                        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
                        c.column, entity.table
                    )));
                }
                continue;
            }
            if let Some(target) = c.references {
                let exists = v
                    .as_i64()
                    .map_or(false, |fk| self.rows.get(target).map_or(false, |t| t.contains_key(&fk)));
                if !exists {
                    return Err(AppError::Storage(format!(
                        "insert or update on table \"{}\" violates foreign key constraint \"fk_{}_{}\"",
                        entity.table, entity.table, c.column
                    )));
                }
            }
        }
        Ok(())
    }
}

fn reject_unknown_columns(entity: &EntityDef, values: &Map) -> Result<(), AppError> {
    match values.keys().find(|k| entity.column_by_name(k).is_none()) {
        Some(k) => Err(AppError::Storage(format!(
            "column \"{}\" of relation \"{}\" does not exist",
            k, entity.table
        ))),
        None => Ok(()),
    }
}

fn row_id(entity: &EntityDef, row: &Map) -> Result<i64, AppError> {
    row.get(entity.primary_key().column)
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::Storage(format!("row of \"{}\" has no id", entity.table)))
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn invalid(kind: ColumnKind, v: &Value) -> AppError {
    AppError::Storage(format!("invalid input syntax for type {}: {}", kind.pg_cast(), v))
}

/// Normalize a value to the representation a column of `kind` stores.
fn coerce(kind: ColumnKind, v: &Value) -> Result<Value, AppError> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let out = match kind {
        ColumnKind::Id | ColumnKind::BigInt => match v {
            Value::Number(n) => n.as_i64().map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        ColumnKind::Float => match v {
            Value::Number(n) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
            Value::String(s) => s.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
            _ => None,
        },
        ColumnKind::Bool => match v {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => s.parse::<bool>().ok().map(Value::Bool),
            _ => None,
        },
        ColumnKind::Text => match v {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        ColumnKind::Date => v.as_str().and_then(parse_date).map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ColumnKind::Timestamp => v
            .as_str()
            .and_then(parse_timestamp)
            .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true))),
    };
    out.ok_or_else(|| invalid(kind, v))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|t| t.date_naive()))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Ordering of two non-null stored values of the same kind.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn cell<'a>(row: &'a Map, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches_all(row: &Map, conditions: &[Condition]) -> Result<bool, AppError> {
    for cond in conditions {
        if !matches(row, cond)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches(row: &Map, cond: &Condition) -> Result<bool, AppError> {
    Ok(match cond {
        Condition::Compare { column, op, value: Value::Null, .. } => match op {
            Op::Eq => cell(row, column).is_null(),
            Op::Ne => !cell(row, column).is_null(),
            _ => false,
        },
        Condition::Compare { column, kind, op, value } => {
            let wanted = coerce(*kind, value)?;
            match compare_values(cell(row, column), &wanted) {
                Some(ord) => match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Ne => ord != Ordering::Equal,
                    Op::Gt => ord == Ordering::Greater,
                    Op::Lt => ord == Ordering::Less,
                    Op::Ge => ord != Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                },
                None => false,
            }
        }
        Condition::In { column, kind, values } => {
            let have = cell(row, column);
            let mut hit = false;
            for v in values {
                let wanted = coerce(*kind, v)?;
                if compare_values(have, &wanted) == Some(Ordering::Equal) {
                    hit = true;
                    break;
                }
            }
            hit
        }
        Condition::Between { column, kind, low, high } => {
            let have = cell(row, column);
            let low = coerce(*kind, low)?;
            let high = coerce(*kind, high)?;
            matches!(compare_values(have, &low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare_values(have, &high), Some(Ordering::Less | Ordering::Equal))
        }
    })
}

/// Nulls sort last ascending and first descending, as PostgreSQL does.
fn compare_rows(entity: &EntityDef, a: &Map, b: &Map, order: &[(&'static str, Order)]) -> Ordering {
    for (column, dir) in order {
        let (x, y) = (cell(a, column), cell(b, column));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = match dir {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    let pk = entity.primary_key().column;
    compare_values(cell(a, pk), cell(b, pk)).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::schema::entities::{ACCOUNT, BACKUP, CURRENCY, GROUP, ROLE, USER, USER_CURRENCY};
    use serde_json::json;

    fn map(v: Value) -> Map {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    async fn seed_user(conn: &mut dyn Executor) -> i64 {
        let role = conn.insert(&ROLE, &map(json!({ "tag": "owner" }))).await.unwrap();
        let user = conn
            .insert(
                &USER,
                &map(json!({
                    "email": "ana@example.com", "name": "Ana", "surname": "Diaz",
                    "birthday": "1990-04-02", "role": role["id"]
                })),
            )
            .await
            .unwrap();
        user["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn insert_fills_defaults_and_normalizes() {
        let store = MemoryStore::new();
        let mut conn = store.acquire().await.unwrap();
        let user = seed_user(conn.as_mut()).await;
        let row = conn
            .insert(
                &USER,
                &map(json!({
                    "email": "b@example.com", "name": "B", "surname": "C",
                    "birthday": "2000-01-05T10:00:00Z", "role": 1
                })),
            )
            .await
            .unwrap();
        assert_eq!(user, 1);
        assert_eq!(row["id"], json!(2));
        assert_eq!(row["active"], json!(true));
        assert_eq!(row["google_id"], Value::Null);
        assert_eq!(row["birthday"], json!("2000-01-05"));
        assert!(row["created_at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn constraint_violations_are_storage_faults() {
        let store = MemoryStore::new();
        let mut conn = store.acquire().await.unwrap();
        let missing_fk = conn.insert(&GROUP, &map(json!({ "name": "Home", "user": 42 }))).await;
        assert!(matches!(missing_fk, Err(AppError::Storage(_))));

        let missing_name = conn.insert(&GROUP, &map(json!({ "user": 1 }))).await;
        assert!(matches!(missing_name, Err(AppError::Storage(_))));

        conn.insert(&CURRENCY, &map(json!({ "iso": "USD", "country_iso": "US" }))).await.unwrap();
        let dup = conn.insert(&CURRENCY, &map(json!({ "iso": "USD", "country_iso": "EC" }))).await;
        assert!(matches!(dup, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn backup_is_unique_per_user_and_date() {
        let store = MemoryStore::new();
        let mut conn = store.acquire().await.unwrap();
        let user = seed_user(conn.as_mut()).await;
        let values = map(json!({ "user": user, "date": "2026-09-30" }));

        let first = conn.insert_if_absent(&BACKUP, &values).await.unwrap();
        assert!(first.is_some());
        assert_eq!(conn.insert_if_absent(&BACKUP, &values).await.unwrap(), None);
        assert!(matches!(conn.insert(&BACKUP, &values).await, Err(AppError::Storage(_))));

        let next_month = map(json!({ "user": user, "date": "2026-10-31" }));
        assert!(conn.insert_if_absent(&BACKUP, &next_month).await.unwrap().is_some());
        assert_eq!(conn.count(&BACKUP).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_of_referenced_row_is_rejected() {
        let store = MemoryStore::new();
        let mut conn = store.acquire().await.unwrap();
        let user = seed_user(conn.as_mut()).await;
        let group = conn.insert(&GROUP, &map(json!({ "name": "Home", "user": user }))).await.unwrap();
        assert!(conn.delete(&USER, user).await.is_err());
        let gone = conn.delete(&GROUP, group["id"].as_i64().unwrap()).await.unwrap();
        assert_eq!(gone.map(|g| g["name"].clone()), Some(json!("Home")));
        assert_eq!(conn.delete(&GROUP, 99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropped_unit_of_work_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            seed_user(tx.conn()).await;
        }
        let mut conn = store.acquire().await.unwrap();
        assert_eq!(conn.count(&USER).await.unwrap(), 0);

        let mut tx = store.begin().await.unwrap();
        seed_user(tx.conn()).await;
        tx.commit().await.unwrap();
        assert_eq!(conn.count(&USER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn select_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        let mut conn = store.acquire().await.unwrap();
        let user = seed_user(conn.as_mut()).await;
        let usd = conn.insert(&CURRENCY, &map(json!({ "iso": "USD", "country_iso": "US" }))).await.unwrap();
        let uc = conn
            .insert(&USER_CURRENCY, &map(json!({ "user": user, "currency": usd["id"] })))
            .await
            .unwrap();
        for name in ["b", "c", "a"] {
            conn.insert(&ACCOUNT, &map(json!({ "name": name, "currency": uc["id"] })))
                .await
                .unwrap();
        }
        let q = Query::new()
            .filter("name", Op::Ne, "c")
            .sort("name", Order::Asc)
            .limit(5);
        let rows = conn.select(&SelectPlan::from_query(&ACCOUNT, &q).unwrap()).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("b")]);

        let q = Query::new().is_in("id", [json!(3), json!("1")]).sort("id", Order::Desc);
        let rows = conn.select(&SelectPlan::from_query(&ACCOUNT, &q).unwrap()).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(1)]);
    }
}
