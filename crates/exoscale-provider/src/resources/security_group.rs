//! `exoscale_security_group`

use crate::data::{AttrReader, ResourceData};
use crate::error::Result;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema};
use async_trait::async_trait;
use exoscale_client::security::SecurityGroup;

pub struct SecurityGroupResource;

fn apply(d: &mut ResourceData, group: &SecurityGroup) {
    d.set("name", group.name.as_str());
    d.set_opt("description", group.description.clone());
}

#[async_trait]
impl Resource for SecurityGroupResource {
    fn kind(&self) -> &'static str {
        "exoscale_security_group"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("name").required().force_new(),
            Attribute::string("description").force_new(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.get_string("name").unwrap_or_default();
        let description = d.get_string("description");

        let group = ctx
            .api()
            .create_security_group(ctx.default_zone(), &name, description.as_deref())
            .await?;
        d.set_id(group.id);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let result = ctx.api().get_security_group(ctx.default_zone(), &id).await;
        if let Some(group) = or_gone(d, result)? {
            apply(d, &group);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let result = ctx
            .api()
            .delete_security_group(ctx.default_zone(), &id)
            .await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_security_group(ctx.default_zone(), d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let group = ctx
            .api()
            .find_security_group(ctx.default_zone(), id)
            .await?;
        let mut d = ResourceData::new(Default::default());
        d.set_id(group.id.as_str());
        apply(&mut d, &group);
        d.commit();
        Ok(d)
    }
}
