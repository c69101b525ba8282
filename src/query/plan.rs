//! Storage-level select plan: descriptor fields resolved to columns. Both store backends
//! execute the same plan, so field validation happens once here.

use super::descriptor::{Op, Order, Query};
use crate::error::AppError;
use crate::schema::{ColumnKind, EntityDef};
use serde_json::Value;

pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare {
        column: &'static str,
        kind: ColumnKind,
        op: Op,
        value: Value,
    },
    In {
        column: &'static str,
        kind: ColumnKind,
        values: Vec<Value>,
    },
    Between {
        column: &'static str,
        kind: ColumnKind,
        low: Value,
        high: Value,
    },
}

#[derive(Clone, Debug)]
pub struct SelectPlan {
    pub entity: &'static EntityDef,
    pub conditions: Vec<Condition>,
    /// Always ends with the primary key so results are deterministic.
    pub order: Vec<(&'static str, Order)>,
    pub limit: Option<u32>,
    /// Take row locks on the selected rows for the rest of the unit of work.
    pub lock: bool,
}

impl SelectPlan {
    /// Resolve `query` against `entity`. Unknown fields are a schema mismatch.
    /// Populate requests are not part of the plan.
    pub fn from_query(entity: &'static EntityDef, query: &Query) -> Result<Self, AppError> {
        let column = |field: &str| {
            entity.column_by_field(field).ok_or_else(|| {
                AppError::SchemaMismatch(format!("unknown field '{}' on '{}'", field, entity.table))
            })
        };

        let mut conditions = Vec::new();
        for f in &query.filters {
            let c = column(&f.field)?;
            conditions.push(Condition::Compare {
                column: c.column,
                kind: c.kind,
                op: f.op,
                value: f.value.clone(),
            });
        }
        for set in &query.within {
            let c = column(&set.field)?;
            conditions.push(Condition::In {
                column: c.column,
                kind: c.kind,
                values: set.values.clone(),
            });
        }
        for r in &query.between {
            let c = column(&r.field)?;
            conditions.push(Condition::Between {
                column: c.column,
                kind: c.kind,
                low: r.from.clone(),
                high: r.to.clone(),
            });
        }

        let mut order = Vec::new();
        for s in &query.sort {
            let c = column(&s.field)?;
            order.push((c.column, s.order));
        }
        let pk = entity.primary_key().column;
        if !order.iter().any(|(c, _)| *c == pk) {
            let tie = order.first().map(|(_, o)| *o).unwrap_or(Order::Asc);
            order.push((pk, tie));
        }

        Ok(SelectPlan {
            entity,
            conditions,
            order,
            limit: query.limit.map(|n| n.min(MAX_LIMIT)),
            lock: false,
        })
    }

    pub fn for_update(mut self) -> Self {
        self.lock = true;
        self
    }
}
