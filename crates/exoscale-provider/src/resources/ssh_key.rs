//! `exoscale_ssh_key`
//!
//! Supplying `public_key` registers it; leaving it out makes the platform
//! generate a pair, and the private key is only observable in the Create
//! response.

use crate::data::{AttrReader, ResourceData};
use crate::error::Result;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema};
use async_trait::async_trait;

pub struct SshKeyResource;

#[async_trait]
impl Resource for SshKeyResource {
    fn kind(&self) -> &'static str {
        "exoscale_ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("name").required().force_new(),
            Attribute::string("public_key").force_new(),
            Attribute::string("fingerprint").computed(),
            Attribute::string("private_key").computed().sensitive(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.get_string("name").unwrap_or_default();

        match d.get_string("public_key") {
            Some(public_key) => {
                ctx.api()
                    .register_ssh_key(ctx.default_zone(), &name, &public_key)
                    .await?;
            }
            None => {
                let pair = ctx.api().create_ssh_key_pair(&name).await?;
                d.set_opt("private_key", pair.privatekey);
            }
        }
        d.set_id(name.as_str());

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.id().to_string();
        let result = ctx.api().get_ssh_key(ctx.default_zone(), &name).await;
        if let Some(key) = or_gone(d, result)? {
            d.set("name", key.name);
            d.set("fingerprint", key.fingerprint);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let name = d.id().to_string();
        let result = ctx.api().delete_ssh_key(ctx.default_zone(), &name).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_ssh_key(ctx.default_zone(), d.id()).await)
    }
}
