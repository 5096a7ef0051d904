//! Declarative attribute schemas
//!
//! Every resource kind describes its attributes with a [`Schema`]: type,
//! presence, force-new, defaults, validators and cross-attribute rules. The
//! provider uses it to validate configurations, fill defaults, compute plans
//! and pick per-operation timeouts.

pub mod validators;

pub use validators::Validator;

use crate::data::{AttrReader, Attributes, values_equal};
use crate::error::{ProviderError, Result};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    String,
    Int,
    Bool,
    StringList,
    StringSet,
    StringMap,
    /// Single nested block
    Block(Vec<Attribute>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Set by the provider only
    Computed,
    /// Set by the user, or by the provider when the user leaves it out
    OptionalComputed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSuppress {
    CaseInsensitive,
    /// JSON documents where the desired one is a subset of the stored one,
    /// since the remote echoes back its defaults
    JsonSubset,
}

impl DiffSuppress {
    fn equal(&self, old: Option<&Value>, new: Option<&Value>) -> bool {
        match self {
            DiffSuppress::CaseInsensitive => match (old.and_then(Value::as_str), new.and_then(Value::as_str)) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => values_equal(old, new),
            },
            DiffSuppress::JsonSubset => {
                let parse = |v: Option<&Value>| {
                    v.and_then(Value::as_str)
                        .and_then(|s| serde_json::from_str::<Value>(s).ok())
                };
                match (parse(old), parse(new)) {
                    (Some(old), Some(new)) => json_contains(&old, &new),
                    _ => values_equal(old, new),
                }
            }
        }
    }
}

fn json_contains(outer: &Value, inner: &Value) -> bool {
    match (outer, inner) {
        (Value::Object(outer), Value::Object(inner)) => inner
            .iter()
            .all(|(k, v)| outer.get(k).is_some_and(|o| json_contains(o, v))),
        (outer, inner) => outer == inner,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttrType,
    pub presence: Presence,
    pub force_new: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub validators: Vec<Validator>,
    pub conflicts_with: Vec<&'static str>,
    pub required_with: Vec<&'static str>,
    pub diff_suppress: Option<DiffSuppress>,
    pub max_items: Option<usize>,
}

impl Attribute {
    fn new(name: &'static str, kind: AttrType) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
            force_new: false,
            sensitive: false,
            default: None,
            validators: Vec::new(),
            conflicts_with: Vec::new(),
            required_with: Vec::new(),
            diff_suppress: None,
            max_items: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, AttrType::String)
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, AttrType::Int)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, AttrType::Bool)
    }

    pub fn string_list(name: &'static str) -> Self {
        Self::new(name, AttrType::StringList)
    }

    pub fn string_set(name: &'static str) -> Self {
        Self::new(name, AttrType::StringSet)
    }

    pub fn string_map(name: &'static str) -> Self {
        Self::new(name, AttrType::StringMap)
    }

    pub fn block(name: &'static str, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttrType::Block(attributes)).max_items(1)
    }

    /// Repeatable nested block
    pub fn block_list(name: &'static str, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttrType::Block(attributes))
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.presence = Presence::OptionalComputed;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn conflicts_with(mut self, names: &[&'static str]) -> Self {
        self.conflicts_with.extend_from_slice(names);
        self
    }

    pub fn required_with(mut self, names: &[&'static str]) -> Self {
        self.required_with.extend_from_slice(names);
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.diff_suppress = Some(DiffSuppress::CaseInsensitive);
        self
    }

    pub fn json_subset(mut self) -> Self {
        self.diff_suppress = Some(DiffSuppress::JsonSubset);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn is_computed_only(&self) -> bool {
        self.presence == Presence::Computed
    }

    fn check_type(&self, value: &Value) -> std::result::Result<(), String> {
        let ok = match &self.kind {
            AttrType::String => value.is_string(),
            AttrType::Int => value.is_i64() || value.is_u64(),
            AttrType::Bool => value.is_boolean(),
            AttrType::StringList | AttrType::StringSet => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            AttrType::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            AttrType::Block(_) => value.is_object() || value.is_array(),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{}: expected {}", self.name, self.kind.describe()))
        }
    }
}

impl AttrType {
    fn describe(&self) -> &'static str {
        match self {
            AttrType::String => "a string",
            AttrType::Int => "an integer",
            AttrType::Bool => "a boolean",
            AttrType::StringList => "a list of strings",
            AttrType::StringSet => "a set of strings",
            AttrType::StringMap => "a map of strings",
            AttrType::Block(_) => "a block",
        }
    }
}

/// Reconciler operation, used to pick a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Create,
    Read,
    Update,
    Delete,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "create",
            Op::Read => "read",
            Op::Update => "update",
            Op::Delete => "delete",
        }
    }
}

/// Per-operation timeouts; unset entries fall back to the provider timeout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl Timeouts {
    /// Same timeout for every operation
    pub fn all(timeout: Duration) -> Self {
        Self {
            create: Some(timeout),
            read: Some(timeout),
            update: Some(timeout),
            delete: Some(timeout),
        }
    }

    pub fn get(&self, op: Op) -> Option<Duration> {
        match op {
            Op::Create => self.create,
            Op::Read => self.read,
            Op::Update => self.update,
            Op::Delete => self.delete,
        }
    }
}

/// One attribute that differs between prior state and desired attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttrChange {
    pub name: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub requires_replace: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    pub changes: Vec<AttrChange>,
    pub requires_replace: bool,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changed(&self, name: &str) -> bool {
        self.changes.iter().any(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// State layout version, bumped when stored attributes need migrating
    pub version: u32,
    pub attributes: Vec<Attribute>,
    pub timeouts: Timeouts,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            version: 0,
            attributes,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn timeout(&self, op: Op, fallback: Duration) -> Duration {
        self.timeouts.get(op).unwrap_or(fallback)
    }

    /// Names of sensitive attributes, for log redaction
    pub fn sensitive(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
    }

    /// Check user-supplied attributes; every problem is reported at once.
    pub fn validate(&self, attrs: &Attributes) -> Result<()> {
        let mut problems = Vec::new();
        validate_level(&self.attributes, attrs, "", &mut problems);

        for name in attrs.keys() {
            if name != "id" && self.attribute(name).is_none() {
                problems.push(format!("{}: unsupported attribute", name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::Invalid(problems.join("; ")))
        }
    }

    /// Fill declared defaults for attributes the user left out, nested
    /// blocks included.
    pub fn apply_defaults(&self, attrs: &mut Attributes) {
        apply_defaults_level(&self.attributes, attrs);
    }

    /// Null out user-settable attributes the desired map leaves out, so an
    /// update sees them as removed rather than carried over from state
    pub fn clear_omitted(&self, desired: &mut Attributes) {
        for attr in &self.attributes {
            if matches!(attr.presence, Presence::Optional | Presence::Required) {
                desired.entry(attr.name).or_insert(Value::Null);
            }
        }
    }

    /// Compare stored state against desired attributes.
    ///
    /// Computed attributes never diff; optional-computed ones only when the
    /// user sets them.
    pub fn diff(&self, prior: &Attributes, desired: &Attributes) -> Diff {
        let mut desired = desired.clone();
        self.apply_defaults(&mut desired);

        let mut diff = Diff::default();
        for attr in &self.attributes {
            let (old, new) = match &attr.kind {
                AttrType::Block(nested) => (
                    prior.raw(attr.name).map(|v| user_view(nested, v)),
                    desired.raw(attr.name).map(|v| user_view(nested, v)),
                ),
                _ => (prior.raw(attr.name).cloned(), desired.raw(attr.name).cloned()),
            };
            let (old, new) = (old.as_ref(), new.as_ref());

            match attr.presence {
                Presence::Computed => continue,
                Presence::OptionalComputed if new.is_none() => continue,
                _ => {}
            }

            let equal = match attr.diff_suppress {
                Some(suppress) => suppress.equal(old, new),
                None => values_equal(old, new),
            };
            if equal {
                continue;
            }

            diff.requires_replace |= attr.force_new;
            diff.changes.push(AttrChange {
                name: attr.name.to_string(),
                old: old.cloned(),
                new: new.cloned(),
                requires_replace: attr.force_new,
            });
        }
        diff
    }
}

/// A block value without its computed or unset members, so provider
/// bookkeeping never shows up as drift
fn user_view(nested: &[Attribute], value: &Value) -> Value {
    let sorted = |v: &Value| match v {
        Value::Array(items) => {
            let mut items = items.clone();
            items.sort_by_key(Value::to_string);
            Value::Array(items)
        }
        other => other.clone(),
    };
    let strip = |block: &Value| match block {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, v)| {
                    !values_equal(Some(v), None)
                        && !nested
                        .iter()
                        .any(|a| a.name == k.as_str() && a.is_computed_only())
                })
                .map(|(k, v)| (k.clone(), sorted(v)))
                .collect(),
        ),
        other => other.clone(),
    };
    match value {
        Value::Array(items) => Value::Array(items.iter().map(strip).collect()),
        other => strip(other),
    }
}

fn is_set(attrs: &Attributes, name: &str) -> bool {
    !values_equal(attrs.raw(name), None)
}

fn validate_level(attributes: &[Attribute], attrs: &Attributes, prefix: &str, problems: &mut Vec<String>) {
    for attr in attributes {
        let path = format!("{}{}", prefix, attr.name);
        let value = attrs.raw(attr.name);
        let set = is_set(attrs, attr.name);

        if !set {
            if attr.presence == Presence::Required {
                problems.push(format!("{}: required attribute is missing", path));
            }
            continue;
        }
        if attr.is_computed_only() {
            problems.push(format!("{}: attribute is computed and cannot be set", path));
            continue;
        }

        let Some(value) = value else { continue };
        if let Err(e) = attr.check_type(value) {
            problems.push(format!("{}{}", prefix, e));
            continue;
        }

        let members: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        if let Some(max) = attr.max_items {
            if members.len() > max {
                problems.push(format!("{}: at most {} item(s) allowed", path, max));
            }
        }

        match &attr.kind {
            AttrType::Block(nested) => {
                for member in &members {
                    match member.as_object() {
                        Some(block) => validate_level(nested, block, &format!("{}.", path), problems),
                        None => problems.push(format!("{}: expected a block", path)),
                    }
                }
            }
            AttrType::StringMap => {}
            _ => {
                for validator in &attr.validators {
                    for member in &members {
                        if let Err(e) = validator.check(&path, member) {
                            problems.push(e);
                        }
                    }
                }
            }
        }

        for other in &attr.conflicts_with {
            if is_set(attrs, other) {
                problems.push(format!("{}: conflicts with {}{}", path, prefix, other));
            }
        }
        for other in &attr.required_with {
            if !is_set(attrs, other) {
                problems.push(format!("{}: requires {}{} to be set", path, prefix, other));
            }
        }
    }
}

fn apply_defaults_level(attributes: &[Attribute], attrs: &mut Attributes) {
    for attr in attributes {
        if let AttrType::Block(nested) = &attr.kind {
            match attrs.get_mut(attr.name) {
                Some(Value::Object(block)) => apply_defaults_level(nested, block),
                Some(Value::Array(items)) => {
                    for item in items.iter_mut() {
                        if let Value::Object(block) = item {
                            apply_defaults_level(nested, block);
                        }
                    }
                }
                _ => {}
            }
            continue;
        }

        if let Some(default) = &attr.default {
            if attrs.raw(attr.name).is_none() {
                attrs.insert(attr.name.to_string(), default.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Attribute::string("name").required().force_new(),
            Attribute::string("size").required().case_insensitive(),
            Attribute::int("disk_size").default(10).validate(Validator::IntRange(10, 50_000)),
            Attribute::string("start_ip").validate(Validator::Ipv4).required_with(&["end_ip"]),
            Attribute::string("end_ip").validate(Validator::Ipv4).required_with(&["start_ip"]),
            Attribute::string("cidr").validate(Validator::Cidr).conflicts_with(&["user_security_group"]),
            Attribute::string("user_security_group"),
            Attribute::string_set("ports").validate(Validator::Regex(validators::PORT_RANGE_PATTERN, "N or M-N")),
            Attribute::string("state").optional_computed(),
            Attribute::string("ip_address").computed(),
            Attribute::block(
                "healthcheck",
                vec![
                    Attribute::string("mode").required().validate(Validator::OneOf(&["tcp", "http", "https"])),
                    Attribute::int("interval").default(10),
                ],
            ),
        ])
        .with_timeouts(Timeouts {
            create: Some(Duration::from_secs(300)),
            ..Default::default()
        })
    }

    #[test]
    fn test_validate_accepts_good_config() {
        let config = attrs(json!({
            "name": "web",
            "size": "Medium",
            "start_ip": "10.0.0.10",
            "end_ip": "10.0.0.20",
            "cidr": "10.0.0.0/8",
            "ports": ["22", "8000-8100"],
            "healthcheck": {"mode": "TCP"}
        }));
        schema().validate(&config).unwrap();
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = attrs(json!({
            "size": 3,
            "disk_size": 5,
            "start_ip": "10.0.0.10",
            "cidr": "10.0.0.0/8",
            "user_security_group": "web",
            "ports": ["ssh"],
            "ip_address": "192.0.2.1",
            "healthcheck": [{"mode": "icmp"}, {"mode": "tcp"}],
            "bogus": true
        }));
        let message = schema().validate(&config).unwrap_err().to_string();

        for expected in [
            "name: required attribute is missing",
            "size: expected a string",
            "disk_size: 5 is out of range",
            "start_ip: requires end_ip",
            "cidr: conflicts with user_security_group",
            "ports: \"ssh\" must be N or M-N",
            "ip_address: attribute is computed",
            "healthcheck: at most 1 item(s)",
            "healthcheck.mode: \"icmp\" must be one of",
            "bogus: unsupported attribute",
        ] {
            assert!(message.contains(expected), "{} not in {}", expected, message);
        }
    }

    #[test]
    fn test_apply_defaults_reaches_blocks() {
        let mut config = attrs(json!({"name": "web", "healthcheck": {"mode": "tcp"}}));
        schema().apply_defaults(&mut config);
        assert_eq!(config["disk_size"], json!(10));
        assert_eq!(config["healthcheck"]["interval"], json!(10));
    }

    #[test]
    fn test_diff_honours_suppression_and_computed() {
        let prior = attrs(json!({
            "name": "web",
            "size": "Medium",
            "disk_size": 10,
            "state": "Running",
            "ip_address": "192.0.2.1",
            "ports": ["22", "80"]
        }));
        let desired = attrs(json!({"name": "web", "size": "MEDIUM", "ports": ["80", "22"]}));
        assert!(schema().diff(&prior, &desired).is_empty());

        let desired = attrs(json!({"name": "web", "size": "Large", "disk_size": 20, "state": "Stopped"}));
        let diff = schema().diff(&prior, &desired);
        assert!(diff.changed("size"));
        assert!(diff.changed("disk_size"));
        assert!(diff.changed("state"));
        assert!(diff.changed("ports"));
        assert!(!diff.requires_replace);

        let desired = attrs(json!({"name": "api", "size": "Medium", "ports": ["22", "80"]}));
        let diff = schema().diff(&prior, &desired);
        assert!(diff.requires_replace);
        assert_eq!(diff.changes.len(), 1);
    }

    #[test]
    fn test_timeouts_fall_back() {
        let fallback = Duration::from_secs(60);
        assert_eq!(schema().timeout(Op::Create, fallback), Duration::from_secs(300));
        assert_eq!(schema().timeout(Op::Delete, fallback), fallback);
        assert_eq!(Timeouts::all(fallback).get(Op::Read), Some(fallback));
    }
}
