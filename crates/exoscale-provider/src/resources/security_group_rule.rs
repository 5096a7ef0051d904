//! `exoscale_security_group_rule`
//!
//! A single rule inside a security group. Every attribute forces
//! replacement; the local ID is the remote rule ID and the parent group ID
//! is kept in `security_group_id`.

use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::mapper::rules::{DIRECTIONS, PROTOCOLS, canonical_protocol, has_ports, is_icmp};
use crate::resource::{Context, Resource, deleted, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::ApiError;
use exoscale_client::security::{GroupRef, Icmp, SecurityGroup, SecurityGroupRule, SecurityGroupRuleRequest};

pub struct SecurityGroupRuleResource;

/// Import ID of a rule: `<group-id>/<rule-id>`
pub fn import_id(group_id: &str, rule_id: &str) -> String {
    format!("{}/{}", group_id, rule_id)
}

/// Shape rules that the schema alone cannot express
fn check_shape(d: &ResourceData) -> Result<()> {
    let protocol = d.get_str("protocol").unwrap_or("TCP");
    let has_cidr = d.get_str("cidr").is_some();
    let has_group = d.get_str("user_security_group_id").is_some() || d.get_str("user_security_group").is_some();
    let has_port = d.get_i64("start_port").is_some() || d.get_i64("end_port").is_some();
    let has_icmp = d.get_i64("icmp_type").is_some() || d.get_i64("icmp_code").is_some();

    if has_cidr == has_group {
        return Err(ProviderError::invalid(
            "exactly one of cidr, user_security_group_id or user_security_group must be set",
        ));
    }
    if has_port && has_icmp {
        return Err(ProviderError::invalid(
            "start_port/end_port and icmp_type/icmp_code are mutually exclusive",
        ));
    }
    if has_icmp && !is_icmp(protocol) {
        return Err(ProviderError::invalid(format!(
            "icmp_type/icmp_code are only valid with ICMP protocols, not {}",
            protocol
        )));
    }
    if has_port && !has_ports(protocol) {
        return Err(ProviderError::invalid(format!(
            "start_port/end_port are only valid with TCP or UDP, not {}",
            protocol
        )));
    }
    Ok(())
}

async fn resolve_group(ctx: &Context, d: &ResourceData, id_key: &str, name_key: &str) -> Result<Option<SecurityGroup>> {
    let needle = match (d.get_str(id_key), d.get_str(name_key)) {
        (Some(id), _) => id,
        (None, Some(name)) => name,
        (None, None) => return Ok(None),
    };
    Ok(Some(
        ctx.api()
            .find_security_group(ctx.default_zone(), needle)
            .await?,
    ))
}

fn apply(d: &mut ResourceData, group: &SecurityGroup, rule: &SecurityGroupRule, user_group_name: Option<String>) {
    d.set("security_group_id", group.id.as_str());
    d.set("security_group", group.name.as_str());
    d.set("type", rule.flow_direction.to_uppercase());
    let protocol = canonical_protocol(&rule.protocol)
        .map(str::to_string)
        .unwrap_or_else(|_| rule.protocol.to_uppercase());
    d.set("protocol", protocol);
    d.set_opt("description", rule.description.clone());
    d.set_opt("cidr", rule.network.clone());
    d.set_opt("start_port", rule.start_port);
    d.set_opt("end_port", rule.end_port);
    d.set_opt("icmp_type", rule.icmp.as_ref().and_then(|i| i.kind));
    d.set_opt("icmp_code", rule.icmp.as_ref().and_then(|i| i.code));

    let user_group_id = rule.security_group.as_ref().and_then(|g| g.id.clone());
    d.set_opt("user_security_group_id", user_group_id);
    d.set_opt("user_security_group", user_group_name);
}

/// Name of the group a rule points at, looked up when the rule only
/// carries its ID
async fn user_group_name(ctx: &Context, rule: &SecurityGroupRule) -> Result<Option<String>> {
    match &rule.security_group {
        Some(GroupRef { name: Some(name), .. }) => Ok(Some(name.clone())),
        Some(GroupRef { id: Some(id), .. }) => {
            match ctx.api().get_security_group(ctx.default_zone(), id).await {
                Ok(group) => Ok(Some(group.name)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.into()),
            }
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl Resource for SecurityGroupRuleResource {
    fn kind(&self) -> &'static str {
        "exoscale_security_group_rule"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("security_group_id")
                .optional_computed()
                .force_new()
                .conflicts_with(&["security_group"]),
            Attribute::string("security_group").optional_computed().force_new(),
            Attribute::string("type")
                .required()
                .force_new()
                .case_insensitive()
                .validate(Validator::OneOf(DIRECTIONS)),
            Attribute::string("protocol")
                .default("TCP")
                .force_new()
                .case_insensitive()
                .validate(Validator::OneOf(PROTOCOLS)),
            Attribute::string("description").force_new(),
            Attribute::string("cidr")
                .force_new()
                .validate(Validator::Cidr)
                .conflicts_with(&["user_security_group_id", "user_security_group"]),
            Attribute::string("user_security_group_id")
                .optional_computed()
                .force_new()
                .conflicts_with(&["user_security_group"]),
            Attribute::string("user_security_group").optional_computed().force_new(),
            Attribute::int("start_port")
                .force_new()
                .validate(Validator::IntRange(1, 65535))
                .conflicts_with(&["icmp_type", "icmp_code"]),
            Attribute::int("end_port")
                .force_new()
                .validate(Validator::IntRange(1, 65535))
                .conflicts_with(&["icmp_type", "icmp_code"]),
            Attribute::int("icmp_type")
                .force_new()
                .validate(Validator::IntRange(-1, 255)),
            Attribute::int("icmp_code")
                .force_new()
                .validate(Validator::IntRange(-1, 255)),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        check_shape(d)?;

        let group = resolve_group(ctx, d, "security_group_id", "security_group")
            .await?
            .ok_or_else(|| ProviderError::invalid("one of security_group_id or security_group must be set"))?;
        let user_group = resolve_group(ctx, d, "user_security_group_id", "user_security_group").await?;

        let protocol = canonical_protocol(d.get_str("protocol").unwrap_or("TCP"))?;
        let start_port = d.get_i64("start_port");
        let icmp = match (d.get_i64("icmp_type"), d.get_i64("icmp_code")) {
            (None, None) => None,
            (kind, code) => Some(Icmp { kind, code }),
        };

        let req = SecurityGroupRuleRequest {
            description: d.get_string("description"),
            flow_direction: d.get_str("type").unwrap_or("INGRESS").to_lowercase(),
            protocol: protocol.to_lowercase(),
            start_port,
            end_port: d.get_i64("end_port").or(start_port),
            icmp,
            network: d.get_string("cidr"),
            security_group: user_group.map(|g| GroupRef {
                id: Some(g.id),
                name: None,
            }),
        };

        let rule = ctx
            .api()
            .add_security_group_rule(ctx.default_zone(), &group.id, &req)
            .await?;
        d.set("security_group_id", group.id.as_str());
        d.set_id(rule.id);

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let group_id = d.get_string("security_group_id").unwrap_or_default();
        let result = ctx.api().get_security_group(ctx.default_zone(), &group_id).await;
        let Some(group) = or_gone(d, result)? else {
            return Ok(());
        };

        let Some(rule) = group.rule(d.id()).cloned() else {
            tracing::info!("rule {} no longer exists in {}, removing from state", d.id(), group.name);
            d.clear_id();
            return Ok(());
        };
        let user_group = user_group_name(ctx, &rule).await?;
        apply(d, &group, &rule, user_group);
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let group_id = d.get_string("security_group_id").unwrap_or_default();
        let id = d.id().to_string();
        let result = ctx
            .api()
            .delete_security_group_rule(ctx.default_zone(), &group_id, &id)
            .await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        let group_id = d.get_string("security_group_id").unwrap_or_default();
        match ctx.api().get_security_group(ctx.default_zone(), &group_id).await {
            Ok(group) => Ok(group.rule(d.id()).is_some()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (group_id, rule_id) = id.split_once('/').ok_or_else(|| {
            ProviderError::invalid(format!("import ID {:?} must look like <group-id>/<rule-id>", id))
        })?;

        let group = ctx
            .api()
            .find_security_group(ctx.default_zone(), group_id)
            .await?;
        let rule = group
            .rule(rule_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("rule {} in security group {}", rule_id, group.name)))?;
        let user_group = user_group_name(ctx, &rule).await?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(rule.id.as_str());
        apply(&mut d, &group, &rule, user_group);
        d.commit();
        Ok(d)
    }
}
