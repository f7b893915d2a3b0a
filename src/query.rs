//! Query DSL: a pure data tree constructed by combinators. Rendering to an
//! Index's native query form is that adapter's responsibility — this
//! module never touches storage or the network.

use serde_json::{json, Value as JsonValue};

use crate::key::{Value, ValueType};

/// A single-field predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    LessThan(Value),
    LessOrEqual(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Exists(bool),
    HasType(ValueType),
}

/// A query: a conjunction of field predicates, composable with logical
/// combinators. `Field` nodes map a field name to a predicate; `Raw` nodes
/// escape the DSL entirely (a native filter document owned by the caller),
/// matching `spec.md`'s allowance for the Index to accept the predicate
/// shapes its own engine understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Match-all (the empty query).
    All,
    Field(String, Predicate),
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
    Nor(Vec<Query>),
}

impl Query {
    pub fn field(name: impl Into<String>, predicate: Predicate) -> Query {
        Query::Field(name.into(), predicate)
    }

    /// Logical AND. Mirrors the original DSL's `Operator.__and__`: two
    /// predicates against the *same* field combine into an explicit
    /// conjunction node rather than silently overwriting one another.
    pub fn and(self, other: Query) -> Query {
        match (self, other) {
            (Query::And(mut lhs), Query::And(rhs)) => {
                lhs.extend(rhs);
                Query::And(lhs)
            }
            (Query::And(mut lhs), rhs) => {
                lhs.push(rhs);
                Query::And(lhs)
            }
            (lhs, Query::And(mut rhs)) => {
                rhs.insert(0, lhs);
                Query::And(rhs)
            }
            (lhs, rhs) => Query::And(vec![lhs, rhs]),
        }
    }

    pub fn or(self, other: Query) -> Query {
        match (self, other) {
            (Query::Or(mut lhs), Query::Or(rhs)) => {
                lhs.extend(rhs);
                Query::Or(lhs)
            }
            (lhs, rhs) => Query::Or(vec![lhs, rhs]),
        }
    }

    pub fn not(self) -> Query {
        Query::Not(Box::new(self))
    }

    pub fn nor(self, other: Query) -> Query {
        Query::Nor(vec![self, other])
    }
}

/// Render `query` into a generic, Mongo-operator-shaped filter document
/// (`$eq`/`$gt`/`$in`/`$and`/...), the form an `Index` adapter backed by an
/// actual document store would hand to its wire protocol. Mirrors the raw
/// query the original builds in `Index.find` (each field mapped to either
/// a literal value or an operator's own value), generalized from a flat
/// field-to-operator mapping into a recursive walk since [`Query`] is a
/// full combinator tree rather than a single-level dict.
///
/// [`crate::index::memory::MemoryIndex`] never calls this — it evaluates
/// the [`Query`] tree directly in-process — this exists for adapters that
/// only understand a raw filter document.
pub fn render_to_document(query: &Query) -> JsonValue {
    match query {
        Query::All => json!({}),
        Query::Field(name, predicate) => json!({ name.clone(): render_predicate(predicate) }),
        Query::And(nodes) => json!({ "$and": nodes.iter().map(render_to_document).collect::<Vec<_>>() }),
        Query::Or(nodes) => json!({ "$or": nodes.iter().map(render_to_document).collect::<Vec<_>>() }),
        Query::Not(inner) => json!({ "$not": render_to_document(inner) }),
        Query::Nor(nodes) => json!({ "$nor": nodes.iter().map(render_to_document).collect::<Vec<_>>() }),
    }
}

fn render_predicate(predicate: &Predicate) -> JsonValue {
    match predicate {
        Predicate::Equal(v) => render_value(v),
        Predicate::NotEqual(v) => json!({ "$ne": render_value(v) }),
        Predicate::GreaterThan(v) => json!({ "$gt": render_value(v) }),
        Predicate::GreaterOrEqual(v) => json!({ "$gte": render_value(v) }),
        Predicate::LessThan(v) => json!({ "$lt": render_value(v) }),
        Predicate::LessOrEqual(v) => json!({ "$lte": render_value(v) }),
        Predicate::In(values) => json!({ "$in": values.iter().map(render_value).collect::<Vec<_>>() }),
        Predicate::NotIn(values) => json!({ "$nin": values.iter().map(render_value).collect::<Vec<_>>() }),
        Predicate::Exists(b) => json!({ "$exists": b }),
        Predicate::HasType(t) => json!({ "$type": format!("{:?}", t) }),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn render_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Str(s) => json!(s),
        Value::Bytes(b) => json!(hex(b)),
        Value::Timestamp(ms) => json!(ms),
        Value::Regex(pattern) => json!(pattern),
        Value::Array(items) => json!(items.iter().map(render_value).collect::<Vec<_>>()),
        Value::Document(doc) => {
            let fields: serde_json::Map<String, JsonValue> = doc
                .iter()
                .map(|(k, v)| (k.clone(), render_value(v)))
                .collect();
            JsonValue::Object(fields)
        }
        Value::ObjectId(id) => json!(hex(id)),
        Value::Decimal(s) => json!(s),
    }
}
