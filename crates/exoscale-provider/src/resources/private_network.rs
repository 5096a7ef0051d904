//! `exoscale_private_network`

use crate::data::{AttrReader, ResourceData};
use crate::error::Result;
use crate::mapper::split_zone;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::network::{PrivateNetwork, PrivateNetworkRequest};

pub struct PrivateNetworkResource;

fn apply(d: &mut ResourceData, zone: &str, network: &PrivateNetwork) {
    d.set("zone", zone);
    d.set("name", network.name.as_str());
    d.set_opt("description", network.description.clone());
    d.set_opt("start_ip", network.start_ip.clone());
    d.set_opt("end_ip", network.end_ip.clone());
    d.set_opt("netmask", network.netmask.clone());
    d.set_string_map("labels", &network.labels);
}

fn request(d: &ResourceData) -> PrivateNetworkRequest {
    PrivateNetworkRequest {
        name: d.get_string("name"),
        description: d.get_string("description"),
        start_ip: d.get_string("start_ip"),
        end_ip: d.get_string("end_ip"),
        netmask: d.get_string("netmask"),
        labels: Some(d.get_string_map("labels")),
    }
}

/// Update payload: an omitted field leaves the remote value alone, so a
/// field the user removed is sent as an empty string
fn update_request(d: &ResourceData) -> PrivateNetworkRequest {
    let cleared = |key: &str| match d.get_string(key) {
        None if d.has_change(key) => Some(String::new()),
        value => value,
    };
    // the managed range goes as a whole
    let range_changed = d.has_changes(&["start_ip", "end_ip", "netmask"]);
    let range = |key: &str| match d.get_string(key) {
        None if range_changed => Some(String::new()),
        value => value,
    };
    PrivateNetworkRequest {
        description: cleared("description"),
        start_ip: range("start_ip"),
        end_ip: range("end_ip"),
        netmask: range("netmask"),
        ..request(d)
    }
}

#[async_trait]
impl Resource for PrivateNetworkResource {
    fn kind(&self) -> &'static str {
        "exoscale_private_network"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("name").required(),
            Attribute::string("description"),
            Attribute::string("start_ip")
                .validate(Validator::Ipv4)
                .required_with(&["end_ip", "netmask"]),
            Attribute::string("end_ip")
                .validate(Validator::Ipv4)
                .required_with(&["start_ip", "netmask"]),
            Attribute::string("netmask")
                .validate(Validator::Ipv4)
                .required_with(&["start_ip", "end_ip"]),
            Attribute::string_map("labels"),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let network = ctx
            .api()
            .create_private_network(&zone, &request(d))
            .await?;
        d.set_id(network.id);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().get_private_network(&zone, &id).await;
        if let Some(network) = or_gone(d, result)? {
            apply(d, &zone, &network);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        if d.has_changes(&["name", "description", "start_ip", "end_ip", "netmask", "labels"]) {
            let zone = ctx.zone_of(d);
            ctx.api()
                .update_private_network(&zone, d.id(), &update_request(d))
                .await?;
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().delete_private_network(&zone, &id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_private_network(&ctx.zone_of(d), d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (needle, zone) = split_zone(id);
        let (zone, network) = ctx
            .find_in_zones(zone, |zone| async move {
                ctx.api().find_private_network(&zone, needle).await
            })
            .await?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(network.id.as_str());
        apply(&mut d, &zone, &network);
        d.commit();
        Ok(d)
    }
}
