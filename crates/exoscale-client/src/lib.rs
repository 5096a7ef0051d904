//! Exoscale API client
//!
//! One typed surface over the three Exoscale API families:
//!
//! - **v2**: zonal REST endpoints (`https://{environment}-{zone}.exoscale.com/v2`),
//!   signed with `EXO2-HMAC-SHA256`; mutations return an operation that is
//!   polled to completion before the call returns.
//! - **v1**: the legacy command API for compute instances, NICs, volumes and
//!   tags; asynchronous commands are polled through `queryAsyncJobResult`.
//! - **DNS**: domains and records behind an `X-DNS-Token` header.
//!
//! Callers program against the [`Api`] trait; [`Client`] implements it.

pub mod api;
pub mod client;
pub mod compute;
pub mod config;
pub mod dbaas;
pub mod dns;
pub mod error;
pub mod iam;
pub mod instance_pool;
pub mod network;
pub mod nlb;
pub mod poll;
pub mod security;
pub mod signer;

pub use api::{Api, find_one};
pub use client::{Client, IdRef, Operation};
pub use config::{ClientConfig, Credentials, PollConfig};
pub use error::{ApiError, Result};

/// Brings every API trait into scope
pub mod prelude {
    pub use crate::api::Api;
    pub use crate::compute::ComputeApi;
    pub use crate::dbaas::DatabaseApi;
    pub use crate::dns::DnsApi;
    pub use crate::iam::IamApi;
    pub use crate::instance_pool::InstancePoolApi;
    pub use crate::network::NetworkApi;
    pub use crate::nlb::LoadBalancerApi;
    pub use crate::security::SecurityApi;
}
