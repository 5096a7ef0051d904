//! Translation helpers between attribute maps and API records

pub mod ports;
pub mod rules;
pub mod tags;
pub mod user_data;

pub use ports::PortRange;
pub use rules::{AtomicRule, RuleSource, RuleTarget};
pub use tags::TagDiff;

use chrono::{DateTime, SecondsFormat, Utc};
use exoscale_client::IdRef;

/// Split an import ID of the form `id@zone`
pub fn split_zone(id: &str) -> (&str, Option<&str>) {
    match id.rsplit_once('@') {
        Some((id, zone)) if !zone.is_empty() => (id, Some(zone)),
        _ => (id, None),
    }
}

pub fn id_refs<I, S>(ids: I) -> Vec<IdRef>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(IdRef::new).collect()
}

pub fn ref_ids(refs: &[IdRef]) -> Vec<String> {
    refs.iter().map(|r| r.id.clone()).collect()
}

/// `None` for an empty string
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// RFC 3339 form of a remote timestamp, whole seconds in UTC
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
