//! Remote documents and collection selectors.
//!
//! The remote store holds schemaless JSON-like documents. Typed values are
//! decoded from them with [`FromDocument`] and encoded back with
//! [`IntoFields`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DecodeError, EncodeError};

/// The field map of a document.
pub type Fields = Map<String, Value>;

/// A document as delivered by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned document id.
    pub id: String,
    /// Document contents.
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Decode a typed value from a document.
pub trait FromDocument: Sized {
    fn from_document(doc: &Document) -> Result<Self, DecodeError>;
}

/// Encode a typed value into document fields (without the id).
pub trait IntoFields {
    fn into_fields(&self) -> Result<Fields, EncodeError>;
}

/// Serialize `value` into document fields. The value must serialize to an
/// object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, EncodeError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(EncodeError(format!("expected an object, got {}", other))),
        Err(e) => Err(EncodeError(e.to_string())),
    }
}

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a document satisfies this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// Identifies the documents a feed or query covers, and their order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSelector {
    pub collection: String,
    pub filter: Option<FieldFilter>,
    /// Documents order by `(order_by value, id)`; by id alone when `None`.
    pub order_by: Option<String>,
}

impl CollectionSelector {
    /// Every document of a collection, ordered by id.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filter: None,
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Whether a document of `collection` belongs to this selection.
    pub fn selects(&self, collection: &str, doc: &Document) -> bool {
        self.collection == collection && self.filter.as_ref().map_or(true, |f| f.matches(doc))
    }

    /// Compare two selected documents in feed order.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        if let Some(field) = &self.order_by {
            let ord = compare_values(a.get(field), b.get(field));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

/// Total order over field values: missing/null, then booleans, numbers,
/// strings, arrays, objects.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
