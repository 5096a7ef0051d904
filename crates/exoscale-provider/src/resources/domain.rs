//! `exoscale_domain`

use crate::data::{AttrReader, ResourceData};
use crate::error::Result;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::dns::Domain;

pub struct DomainResource;

pub(crate) fn apply(d: &mut ResourceData, domain: &Domain) {
    d.set("name", domain.name.as_str());
    d.set_opt("token", domain.token.clone());
    d.set_opt("state", domain.state.clone());
    d.set("auto_renew", domain.auto_renew);
    d.set_opt("expires_on", domain.expires_on.clone());
}

#[async_trait]
impl Resource for DomainResource {
    fn kind(&self) -> &'static str {
        "exoscale_domain"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("name")
                .required()
                .force_new()
                .validate(Validator::NotEmpty),
            Attribute::string("token").computed().sensitive(),
            Attribute::string("state").computed(),
            Attribute::bool("auto_renew").computed(),
            Attribute::string("expires_on").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.get_string("name").unwrap_or_default();
        let domain = ctx.api().create_domain(&name).await?;
        d.set_id(domain.name.as_str());

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.id().to_string();
        let result = ctx.api().get_domain(&name).await;
        if let Some(domain) = or_gone(d, result)? {
            apply(d, &domain);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.id().to_string();
        let result = ctx.api().delete_domain(&name).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_domain(d.id()).await)
    }
}
