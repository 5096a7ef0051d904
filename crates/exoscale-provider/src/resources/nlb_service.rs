//! `exoscale_nlb_service`

use crate::data::{AttrReader, Attributes, ResourceData};
use crate::error::{ProviderError, Result};
use crate::mapper::split_zone;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::IdRef;
use exoscale_client::nlb::{Healthcheck, LoadBalancerService, LoadBalancerServiceRequest};
use serde_json::{Value, json};

pub struct NlbServiceResource;

fn healthcheck_schema() -> Vec<Attribute> {
    vec![
        Attribute::string("mode")
            .default("tcp")
            .validate(Validator::OneOf(&["tcp", "http", "https"])),
        Attribute::int("port")
            .required()
            .validate(Validator::IntRange(1, 65535)),
        Attribute::string("uri"),
        Attribute::int("interval").default(10),
        Attribute::int("timeout").default(5),
        Attribute::int("retries").default(1),
        Attribute::string("tls_sni"),
    ]
}

fn healthcheck_request(block: &Attributes) -> Healthcheck {
    Healthcheck {
        mode: block.get_str("mode").unwrap_or("tcp").to_lowercase(),
        port: block.get_i64("port").unwrap_or_default(),
        uri: block.get_string("uri"),
        interval: block.get_i64("interval"),
        timeout: block.get_i64("timeout"),
        retries: block.get_i64("retries"),
        tls_sni: block.get_string("tls_sni"),
    }
}

fn healthcheck_state(hc: &Healthcheck) -> Value {
    json!({
        "mode": hc.mode,
        "port": hc.port,
        "uri": hc.uri,
        "interval": hc.interval,
        "timeout": hc.timeout,
        "retries": hc.retries,
        "tls_sni": hc.tls_sni,
    })
}

fn apply(d: &mut ResourceData, zone: &str, nlb_id: &str, svc: &LoadBalancerService) {
    d.set("zone", zone);
    d.set("nlb_id", nlb_id);
    d.set("name", svc.name.as_str());
    d.set_opt("description", svc.description.clone());
    d.set("protocol", svc.protocol.as_str());
    d.set("port", svc.port);
    d.set("target_port", svc.target_port);
    d.set("strategy", svc.strategy.as_str());
    d.set_opt("instance_pool_id", svc.instance_pool.as_ref().map(|p| p.id.clone()));
    d.set_opt("healthcheck", svc.healthcheck.as_ref().map(healthcheck_state));
    d.set_opt("state", svc.state.clone());
}

fn request(d: &ResourceData) -> Result<LoadBalancerServiceRequest> {
    let healthcheck = d
        .get_block("healthcheck")
        .map(healthcheck_request)
        .ok_or_else(|| ProviderError::invalid("healthcheck block is required"))?;

    Ok(LoadBalancerServiceRequest {
        name: d.get_string("name"),
        description: Some(d.get_string("description").unwrap_or_default()),
        protocol: d.get_str("protocol").map(str::to_lowercase),
        port: d.get_i64("port"),
        target_port: d.get_i64("target_port"),
        strategy: d.get_string("strategy"),
        instance_pool: d.get_string("instance_pool_id").map(IdRef::new),
        healthcheck: Some(healthcheck),
    })
}

#[async_trait]
impl Resource for NlbServiceResource {
    fn kind(&self) -> &'static str {
        "exoscale_nlb_service"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("nlb_id").required().force_new(),
            Attribute::string("name").required(),
            Attribute::string("description"),
            Attribute::string("instance_pool_id").required().force_new(),
            Attribute::string("protocol")
                .default("tcp")
                .case_insensitive()
                .validate(Validator::OneOf(&["tcp", "udp"])),
            Attribute::int("port")
                .required()
                .validate(Validator::IntRange(1, 65535)),
            Attribute::int("target_port")
                .required()
                .validate(Validator::IntRange(1, 65535)),
            Attribute::string("strategy")
                .default("round-robin")
                .validate(Validator::OneOf(&["round-robin", "source-hash"])),
            Attribute::block("healthcheck", healthcheck_schema()).required(),
            Attribute::string("state").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let nlb_id = d.get_string("nlb_id").unwrap_or_default();
        let svc = ctx
            .api()
            .add_load_balancer_service(&zone, &nlb_id, &request(d)?)
            .await?;
        d.set_id(svc.id);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let nlb_id = d.get_string("nlb_id").unwrap_or_default();
        let id = d.id().to_string();
        let result = ctx
            .api()
            .get_load_balancer_service(&zone, &nlb_id, &id)
            .await;
        if let Some(svc) = or_gone(d, result)? {
            apply(d, &zone, &nlb_id, &svc);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        if d.has_changes(&["name", "description", "protocol", "port", "target_port", "strategy", "healthcheck"]) {
            let zone = ctx.zone_of(d);
            let nlb_id = d.get_string("nlb_id").unwrap_or_default();
            ctx.api()
                .update_load_balancer_service(&zone, &nlb_id, d.id(), &request(d)?)
                .await?;
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let nlb_id = d.get_string("nlb_id").unwrap_or_default();
        let id = d.id().to_string();
        let result = ctx
            .api()
            .delete_load_balancer_service(&zone, &nlb_id, &id)
            .await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        let nlb_id = d.get_string("nlb_id").unwrap_or_default();
        exists_from(
            ctx.api()
                .get_load_balancer_service(&ctx.zone_of(d), &nlb_id, d.id())
                .await,
        )
    }

    /// `<nlb-id>/<service-id>[@zone]`
    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (ids, zone) = split_zone(id);
        let (nlb_id, service_id) = ids.split_once('/').ok_or_else(|| {
            ProviderError::invalid(format!(
                "import ID {:?} must look like <nlb-id>/<service-id>[@zone]",
                id
            ))
        })?;

        let (zone, svc) = ctx
            .find_in_zones(zone, |zone| async move {
                ctx.api()
                    .get_load_balancer_service(&zone, nlb_id, service_id)
                    .await
            })
            .await?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(svc.id.as_str());
        apply(&mut d, &zone, nlb_id, &svc);
        d.commit();
        Ok(d)
    }
}
