//! `exoscale_elastic_ip`

use crate::data::{AttrReader, Attributes, ResourceData};
use crate::error::{ProviderError, Result};
use crate::mapper::split_zone;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::network::{ElasticIp, ElasticIpHealthcheck, ElasticIpRequest};
use serde_json::{Value, json};

pub struct ElasticIpResource;

const MODES: &[&str] = &["tcp", "http", "https"];

fn healthcheck_schema() -> Vec<Attribute> {
    vec![
        Attribute::string("mode")
            .required()
            .validate(Validator::OneOf(MODES)),
        Attribute::int("port")
            .required()
            .validate(Validator::IntRange(1, 65535)),
        Attribute::string("uri"),
        Attribute::int("interval")
            .default(10)
            .validate(Validator::IntRange(5, 300)),
        Attribute::int("timeout")
            .default(3)
            .validate(Validator::IntRange(2, 60)),
        Attribute::int("strikes_fail")
            .default(2)
            .validate(Validator::IntRange(1, 20)),
        Attribute::int("strikes_ok")
            .default(3)
            .validate(Validator::IntRange(1, 20)),
        Attribute::string("tls_sni"),
        Attribute::bool("tls_skip_verify").default(false),
    ]
}

/// Cross-field rules of the healthcheck block
pub fn check_healthcheck(block: &Attributes) -> Result<()> {
    let mode = block.get_str("mode").unwrap_or("tcp").to_lowercase();
    let interval = block.get_i64("interval").unwrap_or(10);
    let timeout = block.get_i64("timeout").unwrap_or(3);

    if timeout >= interval {
        return Err(ProviderError::invalid(format!(
            "healthcheck.timeout ({}) must be lower than healthcheck.interval ({})",
            timeout, interval
        )));
    }

    let uri = block.get_str("uri");
    match mode.as_str() {
        "tcp" if uri.is_some() => {
            return Err(ProviderError::invalid(
                "healthcheck.uri is not supported in tcp mode",
            ));
        }
        "http" | "https" if uri.is_none() => {
            return Err(ProviderError::invalid(format!(
                "healthcheck.uri is required in {} mode",
                mode
            )));
        }
        _ => {}
    }

    if mode != "https"
        && (block.get_str("tls_sni").is_some() || block.get_bool("tls_skip_verify") == Some(true))
    {
        return Err(ProviderError::invalid(
            "healthcheck.tls_sni and healthcheck.tls_skip_verify are only valid in https mode",
        ));
    }

    Ok(())
}

/// Once enabled, TLS options can only be reset by recreating the address
fn check_tls_transition(old: Option<&Attributes>, new: Option<&Attributes>) -> Result<()> {
    let Some(old) = old else { return Ok(()) };
    let new_sni = new.and_then(|n| n.get_str("tls_sni"));
    let new_skip = new.and_then(|n| n.get_bool("tls_skip_verify")).unwrap_or(false);

    if old.get_str("tls_sni").is_some() && new_sni.is_none() {
        return Err(ProviderError::invalid(
            "healthcheck.tls_sni cannot be reset to an empty value once set",
        ));
    }
    if old.get_bool("tls_skip_verify") == Some(true) && !new_skip {
        return Err(ProviderError::invalid(
            "healthcheck.tls_skip_verify cannot be reset to false once enabled",
        ));
    }
    Ok(())
}

fn healthcheck_request(block: &Attributes) -> ElasticIpHealthcheck {
    ElasticIpHealthcheck {
        mode: block.get_str("mode").unwrap_or("tcp").to_lowercase(),
        port: block.get_i64("port").unwrap_or_default(),
        uri: block.get_string("uri"),
        interval: block.get_i64("interval"),
        timeout: block.get_i64("timeout"),
        strikes_ok: block.get_i64("strikes_ok"),
        strikes_fail: block.get_i64("strikes_fail"),
        tls_sni: block.get_string("tls_sni"),
        tls_skip_verify: block.get_bool("tls_skip_verify"),
    }
}

fn healthcheck_state(hc: &ElasticIpHealthcheck) -> Value {
    json!({
        "mode": hc.mode,
        "port": hc.port,
        "uri": hc.uri,
        "interval": hc.interval,
        "timeout": hc.timeout,
        "strikes_ok": hc.strikes_ok,
        "strikes_fail": hc.strikes_fail,
        "tls_sni": hc.tls_sni,
        "tls_skip_verify": hc.tls_skip_verify.unwrap_or(false),
    })
}

fn apply(d: &mut ResourceData, zone: &str, eip: &ElasticIp) {
    d.set("zone", zone);
    d.set("ip_address", eip.ip.as_str());
    d.set_opt("address_family", eip.addressfamily.clone());
    d.set_opt("cidr", eip.cidr.clone());
    d.set_opt("description", eip.description.clone());
    d.set_opt("healthcheck", eip.healthcheck.as_ref().map(healthcheck_state));
    d.set_string_map("labels", &eip.labels);
}

#[async_trait]
impl Resource for ElasticIpResource {
    fn kind(&self) -> &'static str {
        "exoscale_elastic_ip"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("address_family")
                .default("inet4")
                .force_new()
                .validate(Validator::OneOf(&["inet4", "inet6"])),
            Attribute::string("description"),
            Attribute::block("healthcheck", healthcheck_schema()),
            Attribute::string_map("labels"),
            Attribute::string("ip_address").computed(),
            Attribute::string("cidr").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let healthcheck = match d.get_block("healthcheck") {
            Some(block) => {
                check_healthcheck(block)?;
                Some(healthcheck_request(block))
            }
            None => None,
        };

        let zone = ctx.zone_of(d);
        let req = ElasticIpRequest {
            addressfamily: d.get_string("address_family"),
            description: d.get_string("description"),
            healthcheck,
            labels: Some(d.get_string_map("labels")),
        };
        let eip = ctx.api().create_elastic_ip(&zone, &req).await?;
        d.set_id(eip.id);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().get_elastic_ip(&zone, &id).await;
        if let Some(eip) = or_gone(d, result)? {
            apply(d, &zone, &eip);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let mut req = ElasticIpRequest::default();
        let mut reset_healthcheck = false;

        if d.has_change("healthcheck") {
            let old = d.prior().get_block("healthcheck");
            let new = d.get_block("healthcheck");
            check_tls_transition(old, new)?;
            match new {
                Some(block) => {
                    check_healthcheck(block)?;
                    req.healthcheck = Some(healthcheck_request(block));
                }
                None => reset_healthcheck = true,
            }
        }
        if d.has_change("description") {
            req.description = Some(d.get_string("description").unwrap_or_default());
        }
        if d.has_change("labels") {
            req.labels = Some(d.get_string_map("labels"));
        }

        if req != ElasticIpRequest::default() {
            ctx.api().update_elastic_ip(&zone, d.id(), &req).await?;
        }
        if reset_healthcheck {
            ctx.api()
                .reset_elastic_ip_field(&zone, d.id(), "healthcheck")
                .await?;
        }

        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone = ctx.zone_of(d);
        let id = d.id().to_string();
        let result = ctx.api().delete_elastic_ip(&zone, &id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_elastic_ip(&ctx.zone_of(d), d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (needle, zone) = split_zone(id);
        let (zone, eip) = ctx
            .find_in_zones(zone, |zone| async move {
                ctx.api().find_elastic_ip(&zone, needle).await
            })
            .await?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(eip.id.as_str());
        apply(&mut d, &zone, &eip);
        d.commit();
        Ok(d)
    }
}
