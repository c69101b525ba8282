//! Typed result tree returned by the repository: scalar fields plus populated relations.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Map = serde_json::Map<String, Value>;

/// One entity row. `fields` are keyed by API field name; `relations` by populate key
/// (`category`, `paymentList`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub fields: Map,
    pub relations: BTreeMap<String, Related>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Related {
    One(Option<Box<Row>>),
    Many(Vec<Row>),
}

/// Result of `find`: a single optional row when the descriptor asks for `limit = 1`,
/// a list otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum Found {
    One(Option<Row>),
    Many(Vec<Row>),
}

impl Row {
    pub fn new(fields: Map) -> Self {
        Row {
            fields,
            relations: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn id(&self) -> Option<i64> {
        self.i64("id")
    }

    pub fn i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }

    /// Populated to-one relation, if resolved and present.
    pub fn one(&self, key: &str) -> Option<&Row> {
        match self.relations.get(key) {
            Some(Related::One(Some(row))) => Some(row),
            _ => None,
        }
    }

    /// Populated list relation; empty when missing.
    pub fn many(&self, key: &str) -> &[Row] {
        match self.relations.get(key) {
            Some(Related::Many(rows)) => rows,
            _ => &[],
        }
    }

    /// Scalar fields as a typed model.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    /// Nested JSON object. A relation replaces a scalar field of the same name.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        for (key, rel) in &self.relations {
            out.insert(key.clone(), rel.to_json());
        }
        Value::Object(out)
    }
}

impl Related {
    pub fn to_json(&self) -> Value {
        match self {
            Related::One(Some(row)) => row.to_json(),
            Related::One(None) => Value::Null,
            Related::Many(rows) => Value::Array(rows.iter().map(Row::to_json).collect()),
        }
    }
}

impl Found {
    pub fn into_one(self) -> Option<Row> {
        match self {
            Found::One(row) => row,
            Found::Many(rows) => rows.into_iter().next(),
        }
    }

    pub fn into_many(self) -> Vec<Row> {
        match self {
            Found::One(row) => row.into_iter().collect(),
            Found::Many(rows) => rows,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Found::One(Some(row)) => row.to_json(),
            Found::One(None) => Value::Null,
            Found::Many(rows) => Value::Array(rows.iter().map(Row::to_json).collect()),
        }
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Serialize for Found {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
