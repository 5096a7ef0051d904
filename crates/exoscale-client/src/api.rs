//! The single client surface reconcilers program against

use crate::compute::ComputeApi;
use crate::dbaas::DatabaseApi;
use crate::dns::DnsApi;
use crate::error::{ApiError, Result};
use crate::iam::IamApi;
use crate::instance_pool::InstancePoolApi;
use crate::network::NetworkApi;
use crate::nlb::LoadBalancerApi;
use crate::security::SecurityApi;

/// Every API family in one trait object
///
/// [`Client`](crate::Client) implements it against the live platform; tests
/// substitute an in-memory implementation.
pub trait Api:
    ComputeApi
    + InstancePoolApi
    + NetworkApi
    + SecurityApi
    + DnsApi
    + LoadBalancerApi
    + DatabaseApi
    + IamApi
    + Send
    + Sync
{
}

impl<T> Api for T where
    T: ComputeApi
        + InstancePoolApi
        + NetworkApi
        + SecurityApi
        + DnsApi
        + LoadBalancerApi
        + DatabaseApi
        + IamApi
        + Send
        + Sync
{
}

/// Pick the item whose ID equals `needle`, or else the single item whose
/// name does.
///
/// `key` yields `(id, name)` for an item.
pub fn find_one<T, F>(items: Vec<T>, kind: &'static str, needle: &str, key: F) -> Result<T>
where
    F: Fn(&T) -> (&str, &str),
{
    let mut by_name = Vec::new();
    for item in items {
        let (id, name) = key(&item);
        if id == needle {
            return Ok(item);
        }
        if name == needle {
            by_name.push(item);
        }
    }

    match by_name.len() {
        0 => Err(ApiError::NotFound(format!("{} {}", kind, needle))),
        1 => Ok(by_name.remove(0)),
        count => Err(ApiError::Ambiguous {
            kind,
            name: needle.to_string(),
            count,
        }),
    }
}
