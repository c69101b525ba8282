//! Declarative query descriptors: filters, membership tests, ranges, sort, limit and
//! nested populate requests. Field names use the API convention.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Op {
    pub fn sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Ge => ">=",
            Op::Le => "<=",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(rename = "operator")]
    pub op: Op,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InSet {
    pub field: String,
    #[serde(rename = "arr")]
    pub values: Vec<Value>,
}

/// Inclusive range on one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub field: String,
    pub from: Value,
    pub to: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub order: Order,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Populate {
    #[serde(rename = "field")]
    pub name: String,
    #[serde(default, rename = "conditions")]
    pub query: Query,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, rename = "where")]
    pub filters: Vec<Filter>,
    #[serde(default, rename = "isIn")]
    pub within: Vec<InSet>,
    #[serde(default)]
    pub between: Vec<Range>,
    #[serde(default)]
    pub sort: Vec<Sort>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub populate: Vec<Populate>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    /// Query for one row by id.
    pub fn by_id(id: i64) -> Self {
        Query::new().eq("id", id).limit(1)
    }

    pub fn filter(mut self, field: &str, op: Op, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, Op::Eq, value)
    }

    pub fn is_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.within.push(InSet {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn between(mut self, field: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.between.push(Range {
            field: field.to_string(),
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn sort(mut self, field: &str, order: Order) -> Self {
        self.sort.push(Sort {
            field: field.to_string(),
            order,
        });
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn populate(mut self, name: &str, query: Query) -> Self {
        self.populate.push(Populate {
            name: name.to_string(),
            query,
        });
        self
    }

    /// `limit = 1` turns results into a single optional row.
    pub fn is_single(&self) -> bool {
        self.limit == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_shape() {
        let q: Query = serde_json::from_value(json!({
            "where": [{ "field": "date", "operator": ">", "value": "2026-08-31" }],
            "isIn": [{ "field": "account", "arr": [1, 2] }],
            "sort": [{ "field": "date", "order": "desc" }],
            "populate": [
                { "field": "payment", "conditions": { "where": [{ "field": "wallet", "operator": "=", "value": 3 }] } },
                { "field": "category", "conditions": { "limit": 1 } }
            ]
        }))
        .unwrap();
        assert_eq!(q.filters[0].op, Op::Gt);
        assert_eq!(q.within[0].values, vec![json!(1), json!(2)]);
        assert_eq!(q.sort[0].order, Order::Desc);
        assert_eq!(q.populate.len(), 2);
        assert!(q.populate[1].query.is_single());
        assert!(!q.is_single());
    }

    #[test]
    fn sort_order_defaults_to_ascending() {
        let s: Sort = serde_json::from_value(json!({ "field": "name" })).unwrap();
        assert_eq!(s.order, Order::Asc);
    }
}
