//! An in-process reference [`DocumentStoreIndex`], mirroring the
//! original's two-collection layout with `BTreeMap`s instead of a document
//! store. Intended for single-process use (tests, embedding, a
//! `LocalStorage`-only deployment) — `spec.md` leaves a real wire client
//! for an external document store's query engine explicitly out of scope.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::Result;
use crate::key::{canonical, Key, Value};
use crate::query::{Predicate, Query};

use super::{DocumentStoreIndex, Entry};

#[derive(Default)]
struct State {
    next_key_id: u64,
    key_ids: BTreeMap<Vec<u8>, u64>,
    keys: BTreeMap<u64, Key>,
    // (storage_name, key_id) -> storage_path
    data: BTreeMap<(String, u64), String>,
}

pub struct MemoryIndex {
    state: Mutex<State>,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        MemoryIndex {
            state: Mutex::new(State::default()),
        }
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStoreIndex for MemoryIndex {
    fn key_id(&self, key: &Key) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let encoded = canonical(key);
        if let Some(id) = state.key_ids.get(&encoded) {
            return Ok(*id);
        }
        let id = state.next_key_id;
        state.next_key_id += 1;
        state.key_ids.insert(encoded, id);
        state.keys.insert(id, key.clone());
        Ok(id)
    }

    fn storage_path(&self, storage_name: &str, key_id: u64) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.data.get(&(storage_name.to_string(), key_id)).cloned())
    }

    fn upsert(&self, storage_name: &str, key_id: u64, storage_path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .data
            .insert((storage_name.to_string(), key_id), storage_path.to_string());
        Ok(())
    }

    fn delete(&self, storage_name: &str, key_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.data.remove(&(storage_name.to_string(), key_id));
        Ok(())
    }

    fn find(&self, storage_name: &str, query: &Query) -> Result<Vec<Entry>> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for ((name, key_id), storage_path) in &state.data {
            if name != storage_name {
                continue;
            }
            let key = match state.keys.get(key_id) {
                Some(key) => key,
                None => continue,
            };
            if matches(key, query) {
                out.push(Entry {
                    key_id: *key_id,
                    key: key.clone(),
                    storage_path: storage_path.clone(),
                });
            }
        }
        Ok(out)
    }
}

fn matches(key: &Key, query: &Query) -> bool {
    match query {
        Query::All => true,
        Query::Field(name, predicate) => eval_predicate(key.get(name), predicate),
        Query::And(nodes) => nodes.iter().all(|node| matches(key, node)),
        Query::Or(nodes) => nodes.iter().any(|node| matches(key, node)),
        Query::Not(inner) => !matches(key, inner),
        Query::Nor(nodes) => !nodes.iter().any(|node| matches(key, node)),
    }
}

fn eval_predicate(value: Option<&Value>, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Exists(want) => value.is_some() == *want,
        Predicate::HasType(ty) => value.map(|v| v.type_tag() == *ty).unwrap_or(false),
        Predicate::Equal(target) => value == Some(target),
        Predicate::NotEqual(target) => value != Some(target),
        Predicate::In(targets) => value.map(|v| targets.contains(v)).unwrap_or(false),
        Predicate::NotIn(targets) => value.map(|v| !targets.contains(v)).unwrap_or(true),
        Predicate::GreaterThan(target) => order(value, target) == Some(Ordering::Greater),
        Predicate::GreaterOrEqual(target) => {
            matches!(order(value, target), Some(Ordering::Greater) | Some(Ordering::Equal))
        }
        Predicate::LessThan(target) => order(value, target) == Some(Ordering::Less),
        Predicate::LessOrEqual(target) => {
            matches!(order(value, target), Some(Ordering::Less) | Some(Ordering::Equal))
        }
    }
}

/// Ordering between a document's field value and a predicate's operand.
/// Comparisons only make sense between values of the same shape; anything
/// else (missing field, mismatched types) is `None` and every ordered
/// predicate treats that as non-matching, matching the original DSL's
/// "incomparable means excluded" behavior.
fn order(value: Option<&Value>, target: &Value) -> Option<Ordering> {
    match (value?, target) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
