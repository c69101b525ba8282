//! Relation resolver. Attaches related rows to parents according to populate requests,
//! recursing into each request's own descriptor.
//!
//! Requests without a limit are resolved with one `IN (...)` select per relation and
//! grouped per parent in the child query's order. Requests with a limit run once per
//! parent so the limit applies to each parent separately. Batched `IN (...)` lists are split
//! into chunks of [`IN_CHUNK`] ids to stay under the bind-parameter limit.

use super::repository::Repository;
use crate::error::AppError;
use crate::query::{Populate, Query, SelectPlan};
use crate::record::{Related, Row};
use crate::schema::{EntityDef, Relation, SchemaModel, ToMany, ToOne};
use crate::store::Executor;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const IN_CHUNK: usize = 1000;

/// Result key for a relation: `name` for single results, `nameList` otherwise.
pub fn result_key(name: &str, query: &Query) -> String {
    if query.is_single() {
        name.to_string()
    } else {
        format!("{}List", name)
    }
}

/// Check nested populate descriptors against the schema without touching storage, so an
/// unknown field fails the same way whether or not any parent row exists.
pub fn check(model: &SchemaModel, entity: &'static EntityDef, requests: &[Populate]) -> Result<(), AppError> {
    for req in requests {
        let target = match model.relation(entity.table, &req.name) {
            Some(Relation::ToOne(rel)) => model.require(rel.referenced_table)?,
            Some(Relation::ToMany(rel)) => model.require(rel.referencing_table)?,
            None => continue,
        };
        SelectPlan::from_query(target, &req.query)?;
        check(model, target, &req.query.populate)?;
    }
    Ok(())
}

/// Populate `rows` of `entity` in place. Names that match no relation are skipped.
pub fn populate<'a>(
    model: &'a SchemaModel,
    entity: &'static EntityDef,
    conn: &'a mut dyn Executor,
    rows: &'a mut [Row],
    requests: &'a [Populate],
) -> BoxFuture<'a, Result<(), AppError>> {
    Box::pin(async move {
        if rows.is_empty() {
            return Ok(());
        }
        for req in requests {
            match model.relation(entity.table, &req.name) {
                Some(Relation::ToOne(rel)) => to_one(model, &mut *conn, rows, &rel, req).await?,
                Some(Relation::ToMany(rel)) => to_many(model, &mut *conn, rows, &rel, req).await?,
                None => {
                    tracing::debug!(table = entity.table, relation = %req.name, "unknown populate name skipped");
                }
            }
        }
        Ok(())
    })
}

async fn to_one(
    model: &SchemaModel,
    conn: &mut dyn Executor,
    rows: &mut [Row],
    rel: &ToOne,
    req: &Populate,
) -> Result<(), AppError> {
    let target = model.require(rel.referenced_table)?;
    let repo = Repository::of(model, target);
    let key = result_key(rel.field, &req.query);

    let mut ids: Vec<i64> = rows.iter().filter_map(|r| r.i64(rel.field)).collect();
    ids.sort_unstable();
    ids.dedup();

    // Each parent references at most one row, so a positive limit never cuts a parent's result.
    let mut query = req.query.clone();
    let empty = query.limit == Some(0);
    query.limit = None;
    query.populate.clear();
    let mut fetched = Vec::new();
    if !empty {
        for chunk in ids.chunks(IN_CHUNK) {
            let chunk_query = query.clone().is_in("id", chunk.iter().copied());
            fetched.extend(repo.select(&mut *conn, &chunk_query).await?);
        }
    }
    populate(model, target, &mut *conn, &mut fetched, &req.query.populate).await?;
    let by_id: HashMap<i64, Row> = fetched.into_iter().filter_map(|r| r.id().map(|id| (id, r))).collect();

    for row in rows.iter_mut() {
        let hit = row.i64(rel.field).and_then(|id| by_id.get(&id)).cloned();
        let related = if req.query.is_single() {
            Related::One(hit.map(Box::new))
        } else {
            Related::Many(hit.into_iter().collect())
        };
        row.relations.insert(key.clone(), related);
    }
    Ok(())
}

async fn to_many(
    model: &SchemaModel,
    conn: &mut dyn Executor,
    rows: &mut [Row],
    rel: &ToMany,
    req: &Populate,
) -> Result<(), AppError> {
    let child = model.require(rel.referencing_table)?;
    let repo = Repository::of(model, child);
    let key = result_key(child.key, &req.query);

    if req.query.limit.is_some() {
        for row in rows.iter_mut() {
            let Some(id) = row.id() else { continue };
            let mut query = req.query.clone();
            query.populate.clear();
            let mut children = repo.select(&mut *conn, &query.eq(rel.field, id)).await?;
            populate(model, child, &mut *conn, &mut children, &req.query.populate).await?;
            row.relations.insert(key.clone(), wrap(children, &req.query));
        }
        return Ok(());
    }

    let ids: Vec<i64> = rows.iter().filter_map(Row::id).collect();
    let mut query = req.query.clone();
    query.populate.clear();
    // Parents never span chunks, so each parent's children keep the query order.
    let mut children = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let chunk_query = query.clone().is_in(rel.field, chunk.iter().copied());
        children.extend(repo.select(&mut *conn, &chunk_query).await?);
    }
    populate(model, child, &mut *conn, &mut children, &req.query.populate).await?;

    let mut by_parent: HashMap<i64, Vec<Row>> = HashMap::new();
    for c in children {
        if let Some(parent) = c.get(rel.field).and_then(Value::as_i64) {
            by_parent.entry(parent).or_default().push(c);
        }
    }
    for row in rows.iter_mut() {
        let group = row.id().and_then(|id| by_parent.remove(&id)).unwrap_or_default();
        row.relations.insert(key.clone(), wrap(group, &req.query));
    }
    Ok(())
}

fn wrap(rows: Vec<Row>, query: &Query) -> Related {
    if query.is_single() {
        Related::One(rows.into_iter().next().map(Box::new))
    } else {
        Related::Many(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_suffix_unless_single() {
        assert_eq!(result_key("payment", &Query::new()), "paymentList");
        assert_eq!(result_key("payment", &Query::new().limit(3)), "paymentList");
        assert_eq!(result_key("category", &Query::new().limit(1)), "category");
    }
}
