//! Typed access to the engine's attribute maps

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Attribute map as exchanged with the engine
pub type Attributes = Map<String, Value>;

/// Read helpers shared by resource data and nested blocks.
///
/// Empty strings read as absent, matching how the engine represents an
/// unset optional string.
pub trait AttrReader {
    fn raw(&self, key: &str) -> Option<&Value>;

    fn get_str(&self, key: &str) -> Option<&str> {
        self.raw(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get_str(key).map(str::to_string)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.raw(key).and_then(Value::as_i64)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.raw(key).and_then(Value::as_bool)
    }

    /// Members of a list or set of strings, empty members dropped
    fn get_strings(&self, key: &str) -> Vec<String> {
        match self.raw(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn get_string_set(&self, key: &str) -> BTreeSet<String> {
        self.get_strings(key).into_iter().collect()
    }

    fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        match self.raw(key) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Single nested block
    fn get_block(&self, key: &str) -> Option<&Attributes> {
        match self.raw(key) {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Array(items)) => items.first().and_then(Value::as_object),
            _ => None,
        }
    }
}

impl AttrReader for Attributes {
    fn raw(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !v.is_null())
    }
}

/// Working copy of one resource during an operation
///
/// `attrs` starts as the desired (or stored) attributes and is overwritten by
/// Read; `prior` holds the last known state so Update can ask what changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: String,
    prior: Attributes,
    attrs: Attributes,
}

impl ResourceData {
    /// Data for a Create from desired attributes
    pub fn new(desired: Attributes) -> Self {
        Self {
            id: String::new(),
            prior: Attributes::new(),
            attrs: desired,
        }
    }

    /// Data for Read/Delete/Exists from stored state
    pub fn from_state(id: impl Into<String>, state: Attributes) -> Self {
        Self {
            id: id.into(),
            prior: state.clone(),
            attrs: state,
        }
    }

    /// Data for an Update: stored state vs desired attributes.
    ///
    /// Attributes the engine computes but the desired map omits are carried
    /// over from the prior state.
    pub fn for_update(id: impl Into<String>, prior: Attributes, desired: Attributes) -> Self {
        let mut attrs = prior.clone();
        attrs.extend(desired);
        Self {
            id: id.into(),
            prior,
            attrs,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
        let id = self.id.clone();
        self.attrs.insert("id".to_string(), Value::String(id));
    }

    /// Mark the resource as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// Set `key`, or null it when `value` is absent
    pub fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        let value = value.map(Into::into).unwrap_or(Value::Null);
        self.attrs.insert(key.to_string(), value);
    }

    pub fn set_strings<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        self.attrs.insert(key.to_string(), Value::Array(items));
    }

    pub fn set_string_map(&mut self, key: &str, map: &BTreeMap<String, String>) {
        let object = map
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.attrs.insert(key.to_string(), Value::Object(object));
    }

    pub fn remove(&mut self, key: &str) {
        self.attrs.remove(key);
    }

    /// Last known state
    pub fn prior(&self) -> &Attributes {
        &self.prior
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    pub fn into_attributes(self) -> Attributes {
        self.attrs
    }

    /// Whether `key` differs between the prior and current attributes.
    ///
    /// Null and missing are the same; arrays compare as sets.
    pub fn has_change(&self, key: &str) -> bool {
        !values_equal(self.prior.raw(key), self.attrs.raw(key))
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// `(old, new)` values of `key`
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        (self.prior.raw(key), self.attrs.raw(key))
    }

    /// Commit the current attributes as the new prior state
    pub fn commit(&mut self) {
        self.prior = self.attrs.clone();
    }
}

impl AttrReader for ResourceData {
    fn raw(&self, key: &str) -> Option<&Value> {
        self.attrs.raw(key)
    }
}

/// Semantic equality of two attribute values: null, missing, `""` and `[]`
/// are all unset, and arrays are unordered.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (normalize(a), normalize(b)) {
        (None, None) => true,
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            let x: BTreeSet<String> = x.iter().map(Value::to_string).collect();
            let y: BTreeSet<String> = y.iter().map(Value::to_string).collect();
            x == y
        }
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn normalize(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        Some(Value::Object(o)) if o.is_empty() => None,
        other => other,
    }
}
