//! `exoscale_nlb`

use crate::data::{AttrReader, ResourceData};
use crate::error::Result;
use crate::mapper::{split_zone, timestamp};
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema};
use async_trait::async_trait;
use exoscale_client::nlb::{LoadBalancer, LoadBalancerRequest};

pub struct NlbResource;

fn apply(d: &mut ResourceData, zone: &str, nlb: &LoadBalancer) {
    d.set("zone", zone);
    d.set("name", nlb.name.as_str());
    d.set_opt("description", nlb.description.clone());
    d.set_opt("ip_address", nlb.ip.clone());
    d.set_opt("state", nlb.state.clone());
    d.set_opt("created_at", nlb.created_at.as_ref().map(timestamp));
    d.set_strings("services", nlb.services.iter().map(|s| s.id.as_str()));
    d.set_string_map("labels", &nlb.labels);
}

fn request(d: &ResourceData) -> LoadBalancerRequest {
    LoadBalancerRequest {
        name: d.get_string("name"),
        description: Some(d.get_string("description").unwrap_or_default()),
        labels: Some(d.get_string_map("labels")),
    }
}

#[async_trait]
impl Resource for NlbResource {
    fn kind(&self) -> &'static str {
        "exoscale_nlb"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("name").required(),
            Attribute::string("description"),
            Attribute::string_map("labels"),
            Attribute::string("ip_address").computed(),
            Attribute::string("state").computed(),
            Attribute::string("created_at").computed(),
            Attribute::string_set("services").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let nlb = ctx.api().create_load_balancer(&zone, &request(d)).await?;
        d.set_id(nlb.id);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().get_load_balancer(&zone, &id).await;
        if let Some(nlb) = or_gone(d, result)? {
            apply(d, &zone, &nlb);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        if d.has_changes(&["name", "description", "labels"]) {
            let zone = ctx.zone_of(d);
            ctx.api()
                .update_load_balancer(&zone, d.id(), &request(d))
                .await?;
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().delete_load_balancer(&zone, &id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_load_balancer(&ctx.zone_of(d), d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (needle, zone) = split_zone(id);
        let (zone, nlb) = ctx
            .find_in_zones(zone, |zone| async move {
                ctx.api().find_load_balancer(&zone, needle).await
            })
            .await?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(nlb.id.as_str());
        apply(&mut d, &zone, &nlb);
        d.commit();
        Ok(d)
    }
}
