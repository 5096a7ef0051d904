//! Exoscale provider
//!
//! Reconciles declarative resource descriptions against the Exoscale
//! platform: every resource kind exposes Create, Read, Update, Delete,
//! Exists and Import over typed attribute maps, driven by a declarative
//! [`Schema`](schema::Schema).
//!
//! # Example
//!
//! ```no_run
//! use exoscale_provider::{Provider, ProviderConfig};
//! use serde_json::json;
//!
//! # async fn run() -> exoscale_provider::Result<()> {
//! let provider = Provider::configure(ProviderConfig::from_env()?)?;
//! let desired = json!({"name": "web", "description": "web tier"});
//! let state = provider
//!     .create("exoscale_security_group", desired.as_object().cloned().unwrap_or_default())
//!     .await?;
//! println!("created {}", state.id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod data_sources;
pub mod error;
pub mod import;
pub mod mapper;
pub mod migrate;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod state;
pub mod templates;

pub use config::{ProviderConfig, RawConfig};
pub use data::{AttrReader, Attributes, ResourceData};
pub use error::{ErrorKind, ProviderError, Result};
pub use plan::{ActionType, Plan};
pub use provider::Provider;
pub use resource::{Context, Resource};
pub use state::ResourceState;
