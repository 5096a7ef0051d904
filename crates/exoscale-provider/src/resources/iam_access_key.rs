//! `exoscale_iam_access_key`
//!
//! Every attribute is immutable and the secret is only returned by Create,
//! so keys cannot be imported.

use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema};
use async_trait::async_trait;
use exoscale_client::iam::{AccessKey, AccessKeyRequest, AccessKeyResource};

pub struct IamAccessKeyResource;

fn apply(d: &mut ResourceData, key: &AccessKey) {
    d.set("name", key.name.as_str());
    d.set("key", key.key.as_str());
    d.set_opt("type", key.kind.clone());
    d.set_opt("version", key.version.clone());
    d.set_strings("operations", key.operations.iter().map(String::as_str));
    d.set_strings("resources", key.resources.iter().map(ToString::to_string));
    d.set_strings("tags", key.tags.iter().map(String::as_str));
}

#[async_trait]
impl Resource for IamAccessKeyResource {
    fn kind(&self) -> &'static str {
        "exoscale_iam_access_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").force_new(),
            Attribute::string("name").required().force_new(),
            Attribute::string_set("operations").optional_computed().force_new(),
            Attribute::string_set("resources").optional_computed().force_new(),
            Attribute::string_set("tags").optional_computed().force_new(),
            Attribute::string("key").computed(),
            Attribute::string("secret").computed().sensitive(),
            Attribute::string("type").computed(),
            Attribute::string("version").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let resources = d
            .get_strings("resources")
            .iter()
            .map(|r| r.parse::<AccessKeyResource>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let req = AccessKeyRequest {
            name: d.get_string("name").unwrap_or_default(),
            operations: d.get_strings("operations"),
            resources,
            tags: d.get_strings("tags"),
        };
        let key = ctx.api().create_access_key(&ctx.zone_of(d), &req).await?;
        d.set_id(key.key.as_str());
        d.set_opt("secret", key.secret.clone());

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().get_access_key(&zone, &id).await;
        if let Some(key) = or_gone(d, result)? {
            apply(d, &key);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().revoke_access_key(&zone, &id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_access_key(&ctx.zone_of(d), d.id()).await)
    }

    async fn import(&self, _ctx: &Context, id: &str) -> Result<ResourceData> {
        Err(ProviderError::invalid(format!(
            "{} {}: access keys cannot be imported, their secret is only known at creation",
            self.kind(),
            id
        )))
    }
}
