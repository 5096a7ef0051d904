//! The reconciler contract every resource kind implements

use crate::config::ProviderConfig;
use crate::data::{AttrReader, Attributes, ResourceData};
use crate::error::Result;
use crate::schema::Schema;
use async_trait::async_trait;
use exoscale_client::{Api, ApiError};
use std::future::Future;
use std::sync::Arc;

/// Shared handles passed to every reconciler call
#[derive(Clone)]
pub struct Context {
    api: Arc<dyn Api>,
    config: Arc<ProviderConfig>,
}

impl Context {
    pub fn new(api: Arc<dyn Api>, config: Arc<ProviderConfig>) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &dyn Api {
        self.api.as_ref()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Endpoint zone for resources that are not zonal
    pub fn default_zone(&self) -> &str {
        &self.config.zone
    }

    /// The resource's `zone` attribute, or the provider default
    pub fn zone_of(&self, d: &ResourceData) -> String {
        d.get_string("zone")
            .unwrap_or_else(|| self.config.zone.clone())
    }

    /// Names of every zone the account can use
    pub async fn zones(&self) -> Result<Vec<String>> {
        Ok(self
            .api
            .list_zones()
            .await?
            .into_iter()
            .map(|z| z.name)
            .collect())
    }

    /// Run `lookup` in `zone`, or in every zone until one finds the resource.
    pub async fn find_in_zones<T, F, Fut>(&self, zone: Option<&str>, lookup: F) -> Result<(String, T)>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = exoscale_client::Result<T>>,
    {
        if let Some(zone) = zone {
            return Ok((zone.to_string(), lookup(zone.to_string()).await?));
        }

        for zone in self.zones().await? {
            match lookup(zone.clone()).await {
                Ok(found) => return Ok((zone, found)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApiError::NotFound("resource in any zone".to_string()).into())
    }
}

/// Create/Read/Update/Delete/Exists/Import for one resource kind.
///
/// Read clears the ID when the remote resource is gone; Delete treats a
/// missing resource as deleted; Create and Update end with a Read.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Engine-facing type name, e.g. `exoscale_compute`
    fn kind(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()>;

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()>;

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()>;

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()>;

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool>;

    /// Locate a resource from a user-supplied import ID
    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let mut d = ResourceData::from_state(id, Attributes::new());
        self.read(ctx, &mut d).await?;
        if d.is_gone() {
            return Err(ApiError::NotFound(format!("{} {}", self.kind(), id)).into());
        }
        Ok(d)
    }

    /// Rewrite attributes stored under an older schema version
    fn upgrade_state(&self, _version: u32, attrs: Attributes) -> Result<Attributes> {
        Ok(attrs)
    }
}

/// Value of a lookup, or `None` after clearing the ID when it is gone
pub fn or_gone<T>(d: &mut ResourceData, result: exoscale_client::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            tracing::info!("{} no longer exists, removing from state", d.id());
            d.clear_id();
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Outcome of a cheap existence check
pub fn exists_from<T>(result: exoscale_client::Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Deleting something already gone is success
pub fn deleted(d: &mut ResourceData, result: exoscale_client::Result<()>) -> Result<()> {
    match result {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} already deleted", d.id());
        }
        Err(e) => return Err(e.into()),
    }
    d.clear_id();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_gone_clears_id() {
        let mut d = ResourceData::from_state("abc", Attributes::new());
        let found: Option<()> = or_gone(&mut d, Err(ApiError::NotFound("abc".to_string()))).unwrap();
        assert!(found.is_none());
        assert!(d.is_gone());

        let mut d = ResourceData::from_state("abc", Attributes::new());
        assert!(or_gone::<()>(&mut d, Err(ApiError::Conflict("busy".to_string()))).is_err());
        assert!(!d.is_gone());
    }

    #[test]
    fn test_exists_and_deleted() {
        assert!(exists_from(Ok(())).unwrap());
        assert!(!exists_from::<()>(Err(ApiError::NotFound("x".to_string()))).unwrap());
        assert!(exists_from::<()>(Err(ApiError::Transport("x".to_string()))).is_err());

        let mut d = ResourceData::from_state("abc", Attributes::new());
        deleted(&mut d, Err(ApiError::NotFound("abc".to_string()))).unwrap();
        assert!(d.is_gone());
    }
}
