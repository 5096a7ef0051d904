//! `exoscale_instance_pool`
//!
//! Plain attribute updates and resizing are separate API calls: Update sends
//! the former first, then scales. Create and Update both wait for the pool
//! to settle before reading it back.

use crate::data::{AttrReader, ResourceData};
use crate::error::Result;
use crate::mapper::{id_refs, non_empty, ref_ids, split_zone, user_data};
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Timeouts, Validator};
use async_trait::async_trait;
use exoscale_client::IdRef;
use exoscale_client::instance_pool::{InstancePool, InstancePoolRequest, NameRef};
use exoscale_client::poll::{Poll, poll_until};
use serde_json::{Value, json};
use std::time::Duration;

pub struct InstancePoolResource;

async fn wait_converged(ctx: &Context, zone: &str, id: &str) -> Result<InstancePool> {
    let what = format!("instance pool {}", id);
    let pool = poll_until(&ctx.config().poll(), &what, || async move {
        let pool = ctx.api().get_instance_pool(zone, id).await?;
        Ok(if pool.is_converged() {
            Poll::Ready(pool)
        } else {
            Poll::Pending
        })
    })
    .await?;
    Ok(pool)
}

/// Request carrying every user attribute; `instance_type` must already be
/// resolved to an ID
fn request(d: &ResourceData, instance_type_id: Option<String>, gzip: bool) -> Result<InstancePoolRequest> {
    let user_data = match d.get_str("user_data") {
        Some(raw) => Some(user_data::encode(raw, gzip)?.value),
        None => None,
    };

    Ok(InstancePoolRequest {
        name: d.get_string("name"),
        description: Some(d.get_string("description").unwrap_or_default()),
        size: d.get_i64("size"),
        disk_size: d.get_i64("disk_size"),
        instance_type: instance_type_id.map(IdRef::new),
        template: d.get_string("template_id").map(IdRef::new),
        ssh_key: d.get_string("key_pair").map(|name| NameRef { name }),
        instance_prefix: d.get_string("instance_prefix"),
        user_data,
        ipv6_enabled: d.get_bool("ipv6"),
        deploy_target: d.get_string("deploy_target_id").map(IdRef::new),
        anti_affinity_groups: Some(id_refs(d.get_strings("affinity_group_ids"))),
        security_groups: Some(id_refs(d.get_strings("security_group_ids"))),
        private_networks: Some(id_refs(d.get_strings("network_ids"))),
        elastic_ips: Some(id_refs(d.get_strings("elastic_ip_ids"))),
        labels: Some(d.get_string_map("labels")),
    })
}

fn apply(d: &mut ResourceData, zone: &str, pool: &InstancePool) -> Result<()> {
    d.set("zone", zone);
    d.set("name", pool.name.as_str());
    d.set_opt("description", non_empty(pool.description.clone()));
    d.set("size", pool.size);
    d.set("disk_size", pool.disk_size);
    d.set("state", pool.state.as_str());
    d.set_opt("template_id", pool.template.as_ref().map(|t| t.id.clone()));
    d.set_opt("key_pair", pool.ssh_key.as_ref().map(|k| k.name.clone()));
    d.set_opt("instance_prefix", pool.instance_prefix.clone());
    d.set("ipv6", pool.ipv6_enabled);
    d.set_opt("deploy_target_id", pool.deploy_target.as_ref().map(|t| t.id.clone()));
    d.set_strings("affinity_group_ids", ref_ids(&pool.anti_affinity_groups));
    d.set_strings("security_group_ids", ref_ids(&pool.security_groups));
    d.set_strings("network_ids", ref_ids(&pool.private_networks));
    d.set_strings("elastic_ip_ids", ref_ids(&pool.elastic_ips));
    d.set_strings("virtual_machines", ref_ids(&pool.instances));
    d.set_string_map("labels", &pool.labels);

    let already_encoded = d.get_str("user_data").is_some_and(user_data::is_base64);
    let user_data = match &pool.user_data {
        Some(encoded) => Some(user_data::for_state(encoded, already_encoded)?),
        None => None,
    };
    d.set_opt("user_data", user_data);
    Ok(())
}

#[async_trait]
impl Resource for InstancePoolResource {
    fn kind(&self) -> &'static str {
        "exoscale_instance_pool"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("name").required(),
            Attribute::string("description"),
            Attribute::string("instance_type")
                .required()
                .case_insensitive()
                .validate(Validator::Regex(r"^[a-zA-Z0-9-]+\.[a-zA-Z0-9-]+$", "family.size")),
            Attribute::string("template_id").required(),
            Attribute::int("size")
                .required()
                .validate(Validator::IntRange(1, 1000)),
            Attribute::int("disk_size")
                .optional_computed()
                .validate(Validator::IntRange(10, 50_000)),
            Attribute::string("key_pair"),
            Attribute::string("user_data"),
            Attribute::string("instance_prefix").optional_computed(),
            Attribute::bool("ipv6").default(false),
            Attribute::string("deploy_target_id"),
            Attribute::string_set("affinity_group_ids").force_new(),
            Attribute::string_set("security_group_ids"),
            Attribute::string_set("network_ids"),
            Attribute::string_set("elastic_ip_ids"),
            Attribute::string_map("labels"),
            Attribute::string("state").computed(),
            Attribute::string_set("virtual_machines").computed(),
            Attribute::block_list(
                "instances",
                vec![
                    Attribute::string("id"),
                    Attribute::string("name"),
                    Attribute::string("ipv4_address"),
                    Attribute::string("ipv6_address"),
                ],
            )
            .computed(),
        ])
        .with_timeouts(Timeouts::all(Duration::from_secs(5 * 60)))
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let instance_type = d.get_string("instance_type").unwrap_or_default();
        let instance_type = ctx.api().find_instance_type(&zone, &instance_type).await?;

        let req = request(d, Some(instance_type.id), ctx.config().gzip_user_data)?;
        let pool = ctx.api().create_instance_pool(&zone, &req).await?;
        d.set_id(pool.id.as_str());

        wait_converged(ctx, &zone, &pool.id).await?;
        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().get_instance_pool(&zone, &id).await;
        let Some(pool) = or_gone(d, result)? else {
            return Ok(());
        };
        apply(d, &zone, &pool)?;

        if let Some(instance_type) = &pool.instance_type {
            let known = d.get_string("instance_type");
            let types = ctx.api().list_instance_types(&zone).await?;
            if let Some(t) = types.iter().find(|t| t.id == instance_type.id) {
                let name = t.qualified_name();
                // keep the user's spelling when it only differs in case
                let keep = known.is_some_and(|k| k.eq_ignore_ascii_case(&name));
                if !keep {
                    d.set("instance_type", name);
                }
            }
        }

        let mut instances = Vec::new();
        for member in &pool.instances {
            match ctx.api().get_instance(&zone, &member.id).await {
                Ok(instance) => instances.push(json!({
                    "id": instance.id,
                    "name": instance.name,
                    "ipv4_address": instance.public_ip,
                    "ipv6_address": instance.ipv6_address,
                })),
                Err(e) if e.is_not_found() => {
                    tracing::debug!("pool member {} vanished while reading", member.id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        d.set("instances", Value::Array(instances));
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();

        let changed = [
            "name",
            "description",
            "instance_type",
            "template_id",
            "disk_size",
            "key_pair",
            "user_data",
            "instance_prefix",
            "ipv6",
            "deploy_target_id",
            "security_group_ids",
            "network_ids",
            "elastic_ip_ids",
            "labels",
        ];
        if d.has_changes(&changed) {
            let instance_type_id = if d.has_change("instance_type") {
                let name = d.get_string("instance_type").unwrap_or_default();
                Some(ctx.api().find_instance_type(&zone, &name).await?.id)
            } else {
                None
            };
            let mut req = request(d, instance_type_id, ctx.config().gzip_user_data)?;
            // resizing goes through the scale call
            req.size = None;
            ctx.api().update_instance_pool(&zone, &id, &req).await?;
        }

        if d.has_change("size") {
            let size = d.get_i64("size").unwrap_or(1);
            tracing::info!("scaling instance pool {} to {}", id, size);
            ctx.api().scale_instance_pool(&zone, &id, size).await?;
        }

        wait_converged(ctx, &zone, &id).await?;
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().delete_instance_pool(&zone, &id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_instance_pool(&ctx.zone_of(d), d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (id, zone) = split_zone(id);
        let (zone, pool) = ctx
            .find_in_zones(zone, |zone| async move {
                ctx.api().get_instance_pool(&zone, id).await
            })
            .await?;

        let mut d = ResourceData::new(Default::default());
        d.set("zone", zone.as_str());
        d.set_id(pool.id.as_str());
        self.read(ctx, &mut d).await?;
        d.commit();
        Ok(d)
    }
}
