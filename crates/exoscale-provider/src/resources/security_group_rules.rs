//! `exoscale_security_group_rules`
//!
//! Aggregate `ingress`/`egress` blocks, each expanding into many atomic
//! rules. The block's `ids` set records the local identifier of every rule
//! it created; Update works on set differences of those identifiers.

use crate::data::{AttrReader, Attributes, ResourceData};
use crate::error::{ProviderError, Result};
use crate::mapper::rules::{PROTOCOLS, expand, is_icmp};
use crate::mapper::{AtomicRule, PortRange, RuleSource, RuleTarget};
use crate::migrate;
use crate::resource::{Context, Resource, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator, validators};
use async_trait::async_trait;
use exoscale_client::security::SecurityGroup;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct SecurityGroupRulesResource;

pub const SCHEMA_VERSION: u32 = 1;

const BLOCKS: &[(&str, &str)] = &[("ingress", "INGRESS"), ("egress", "EGRESS")];

fn rule_block() -> Vec<Attribute> {
    vec![
        Attribute::string("protocol")
            .default("TCP")
            .case_insensitive()
            .validate(Validator::OneOf(PROTOCOLS)),
        Attribute::string("description"),
        Attribute::int("icmp_type").validate(Validator::IntRange(-1, 255)),
        Attribute::int("icmp_code").validate(Validator::IntRange(-1, 255)),
        Attribute::string_set("ports")
            .validate(Validator::Regex(validators::PORT_RANGE_PATTERN, "N or M-N")),
        Attribute::string_set("cidr_list").validate(Validator::Cidr),
        Attribute::string_set("user_security_group_list"),
        Attribute::string_set("ids").computed(),
    ]
}

/// One desired block, parsed
struct Block {
    protocol: String,
    description: Option<String>,
    rules: Vec<AtomicRule>,
}

impl Block {
    fn parse(block: &Attributes) -> Result<Self> {
        let protocol = block.get_str("protocol").unwrap_or("TCP").to_string();

        let mut sources: Vec<RuleSource> = block
            .get_strings("cidr_list")
            .into_iter()
            .map(RuleSource::Cidr)
            .collect();
        sources.extend(
            block
                .get_strings("user_security_group_list")
                .into_iter()
                .map(RuleSource::Group),
        );
        if sources.is_empty() {
            return Err(ProviderError::invalid(
                "rule block needs at least one entry in cidr_list or user_security_group_list",
            ));
        }

        let ports = block
            .get_strings("ports")
            .iter()
            .map(|p| p.parse::<PortRange>())
            .collect::<Result<Vec<_>>>()?;
        let icmp = match (block.get_i64("icmp_type"), block.get_i64("icmp_code")) {
            (None, None) => None,
            (kind, code) => Some((kind.unwrap_or(-1), code.unwrap_or(-1))),
        };
        if icmp.is_some() && !is_icmp(&protocol) {
            return Err(ProviderError::invalid(format!(
                "icmp_type/icmp_code are only valid with ICMP protocols, not {}",
                protocol
            )));
        }
        if !ports.is_empty() && icmp.is_some() {
            return Err(ProviderError::invalid("ports and icmp_type/icmp_code are mutually exclusive"));
        }

        Ok(Self {
            rules: expand(&protocol, &sources, &ports, icmp)?,
            protocol,
            description: block.get_string("description"),
        })
    }

    fn keys(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .map(|r| match_key(&r.to_string(), self.description.as_deref()))
            .collect()
    }
}

/// Rule key of a local identifier: everything after the remote ID
fn key_of(local_id: &str) -> Option<&str> {
    local_id.split_once('_').map(|(_, key)| key)
}

fn remote_of(local_id: &str) -> &str {
    local_id.split_once('_').map_or(local_id, |(remote, _)| remote)
}

/// Matching key of a rule: its local key plus the description of the block
/// that owns it, so a new description recreates the rule
fn match_key(rule_key: &str, description: Option<&str>) -> String {
    format!("{}|{}", rule_key, description.unwrap_or_default())
}

/// Local identifiers stored in the prior state, with the description of the
/// block each one belongs to
fn prior_rules(d: &ResourceData, name: &str) -> BTreeMap<String, Option<String>> {
    let blocks: Vec<&Attributes> = match d.prior().raw(name) {
        Some(Value::Array(blocks)) => blocks.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(block)) => vec![block],
        _ => Vec::new(),
    };
    blocks
        .into_iter()
        .flat_map(|b| {
            let description = b.get_string("description");
            b.get_strings("ids")
                .into_iter()
                .map(move |id| (id, description.clone()))
        })
        .collect()
}

fn block_ids(d: &ResourceData, name: &str) -> BTreeSet<String> {
    match d.attributes().raw(name) {
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|b| b.get_strings("ids"))
            .collect(),
        Some(Value::Object(block)) => block.get_string_set("ids"),
        _ => BTreeSet::new(),
    }
}

fn desired_blocks(d: &ResourceData, name: &str) -> Vec<Attributes> {
    match d.raw(name) {
        Some(Value::Array(blocks)) => blocks.iter().filter_map(Value::as_object).cloned().collect(),
        Some(Value::Object(block)) => vec![block.clone()],
        _ => Vec::new(),
    }
}

/// Rebuild one block's user-facing attributes from the rules it still owns
fn block_state(mut block: Attributes, ids: &[String]) -> Value {
    let rules: Vec<AtomicRule> = ids
        .iter()
        .filter_map(|id| AtomicRule::parse_local_id(id).map(|(_, r)| r))
        .collect();

    if !rules.is_empty() {
        let mut cidrs = BTreeSet::new();
        let mut groups = BTreeSet::new();
        let mut ports = BTreeSet::new();
        for rule in &rules {
            match &rule.source {
                RuleSource::Cidr(c) => cidrs.insert(c.clone()),
                RuleSource::Group(g) => groups.insert(g.clone()),
            };
            match rule.target {
                RuleTarget::Ports(p) => {
                    ports.insert(p.to_string());
                }
                RuleTarget::Icmp { kind, code } => {
                    block.insert("icmp_type".to_string(), json!(kind));
                    block.insert("icmp_code".to_string(), json!(code));
                }
                RuleTarget::Any => {}
            }
        }
        block.insert("protocol".to_string(), json!(rules[0].protocol));
        block.insert("cidr_list".to_string(), json!(cidrs));
        block.insert("user_security_group_list".to_string(), json!(groups));
        if !ports.is_empty() {
            block.insert("ports".to_string(), json!(ports));
        }
    }
    block.insert("ids".to_string(), json!(ids));
    Value::Object(block)
}

async fn group_ids_by_name(ctx: &Context, names: impl Iterator<Item = &str>) -> Result<HashMap<String, String>> {
    let mut ids = HashMap::new();
    for name in names {
        if !ids.contains_key(name) {
            let group = ctx.api().find_security_group(ctx.default_zone(), name).await?;
            ids.insert(name.to_string(), group.id);
        }
    }
    Ok(ids)
}

/// Create the rules of `wanted` that are missing from `existing`, delete the
/// ones no longer wanted, and store the resulting blocks.
async fn reconcile(
    ctx: &Context,
    d: &mut ResourceData,
    group_id: &str,
    block_name: &str,
    direction: &str,
    existing: BTreeMap<String, Option<String>>,
) -> Result<()> {
    let blocks = desired_blocks(d, block_name)
        .iter()
        .map(|b| Block::parse(b).map(|parsed| (b.clone(), parsed)))
        .collect::<Result<Vec<_>>>()?;

    let wanted: BTreeSet<String> = blocks.iter().flat_map(|(_, b)| b.keys()).collect();
    let mut by_key: BTreeMap<String, String> = BTreeMap::new();

    for (id, description) in &existing {
        let key = key_of(id).map(|k| match_key(k, description.as_deref()));
        match key {
            Some(key) if wanted.contains(&key) && !by_key.contains_key(&key) => {
                by_key.insert(key, id.clone());
            }
            _ => {
                tracing::debug!("deleting {} rule {}", direction, id);
                let result = ctx
                    .api()
                    .delete_security_group_rule(ctx.default_zone(), group_id, remote_of(id))
                    .await;
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    let group_names = blocks
        .iter()
        .flat_map(|(_, b)| b.rules.iter())
        .filter_map(|r| match &r.source {
            RuleSource::Group(name) => Some(name.as_str()),
            RuleSource::Cidr(_) => None,
        });
    let group_ids = group_ids_by_name(ctx, group_names).await?;

    let mut states = Vec::new();
    for (raw, block) in &blocks {
        let mut ids = Vec::new();
        for rule in &block.rules {
            let key = match_key(&rule.to_string(), block.description.as_deref());
            if let Some(id) = by_key.get(&key) {
                ids.push(id.clone());
                continue;
            }

            let user_group = match &rule.source {
                RuleSource::Group(name) => group_ids.get(name).cloned(),
                RuleSource::Cidr(_) => None,
            };
            let req = rule.to_request(direction, block.description.clone(), user_group);
            tracing::debug!("adding {} rule {} ({})", direction, rule, block.protocol);
            let created = ctx
                .api()
                .add_security_group_rule(ctx.default_zone(), group_id, &req)
                .await?;
            let id = rule.local_id(&created.id);
            by_key.insert(key, id.clone());
            ids.push(id);
        }
        states.push(block_state(raw.clone(), &ids));
    }

    d.set(block_name, Value::Array(states));
    Ok(())
}

async fn resolve_group(ctx: &Context, d: &ResourceData) -> Result<SecurityGroup> {
    let needle = d
        .get_str("security_group_id")
        .or_else(|| d.get_str("security_group"))
        .ok_or_else(|| ProviderError::invalid("one of security_group_id or security_group must be set"))?;
    Ok(ctx
        .api()
        .find_security_group(ctx.default_zone(), needle)
        .await?)
}

/// Blocks for every rule of a group, grouped by direction, protocol,
/// description and ICMP fields
fn blocks_from_group(group: &SecurityGroup, group_name: impl Fn(&str) -> Option<String>) -> BTreeMap<&'static str, Vec<Value>> {
    let mut grouped: BTreeMap<(&'static str, String, Option<String>), Vec<String>> = BTreeMap::new();
    for rule in &group.rules {
        let Some(atomic) = AtomicRule::from_remote(rule, &group_name) else {
            continue;
        };
        let Some(&(block, _)) = BLOCKS
            .iter()
            .find(|(_, dir)| dir.eq_ignore_ascii_case(&rule.flow_direction))
        else {
            continue;
        };
        let icmp = match atomic.target {
            RuleTarget::Icmp { kind, code } => format!("{}:{}", kind, code),
            _ => String::new(),
        };
        grouped
            .entry((block, format!("{}/{}", atomic.protocol, icmp), rule.description.clone()))
            .or_default()
            .push(atomic.local_id(&rule.id));
    }

    let mut blocks: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
    for ((block, _, description), ids) in grouped {
        let mut raw = Attributes::new();
        if let Some(description) = description {
            raw.insert("description".to_string(), json!(description));
        }
        blocks.entry(block).or_default().push(block_state(raw, &ids));
    }
    blocks
}

#[async_trait]
impl Resource for SecurityGroupRulesResource {
    fn kind(&self) -> &'static str {
        "exoscale_security_group_rules"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("security_group_id")
                .optional_computed()
                .force_new()
                .conflicts_with(&["security_group"]),
            Attribute::string("security_group").optional_computed().force_new(),
            Attribute::block_list("ingress", rule_block()),
            Attribute::block_list("egress", rule_block()),
        ])
        .with_version(SCHEMA_VERSION)
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let group = resolve_group(ctx, d).await?;
        d.set_id(group.id.as_str());
        d.set("security_group_id", group.id.as_str());
        d.set("security_group", group.name.as_str());

        for (block, direction) in BLOCKS {
            reconcile(ctx, d, &group.id, block, direction, BTreeMap::new()).await?;
        }
        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let result = ctx.api().get_security_group(ctx.default_zone(), &id).await;
        let Some(group) = or_gone(d, result)? else {
            return Ok(());
        };
        d.set("security_group_id", group.id.as_str());
        d.set("security_group", group.name.as_str());

        // keep only the rules that still exist remotely
        let live: BTreeSet<&str> = group.rules.iter().map(|r| r.id.as_str()).collect();
        for (block, _) in BLOCKS {
            let states: Vec<Value> = desired_blocks(d, block)
                .into_iter()
                .map(|raw| {
                    let ids: Vec<String> = raw
                        .get_strings("ids")
                        .into_iter()
                        .filter(|id| live.contains(remote_of(id)))
                        .collect();
                    block_state(raw, &ids)
                })
                .collect();
            d.set(block, Value::Array(states));
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let group_id = d.id().to_string();
        let diff = self.schema().diff(d.prior(), d.attributes());
        for (block, direction) in BLOCKS {
            if !diff.changes.iter().any(|c| c.name == *block) {
                // desired blocks carry no ids; keep the stored ones
                let stored = d.prior().raw(block).cloned().unwrap_or(Value::Null);
                d.set(block, stored);
                continue;
            }
            let existing = prior_rules(d, block);
            reconcile(ctx, d, &group_id, block, direction, existing).await?;
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let group_id = d.id().to_string();
        for (block, _) in BLOCKS {
            for id in block_ids(d, block) {
                let result = ctx
                    .api()
                    .delete_security_group_rule(ctx.default_zone(), &group_id, remote_of(&id))
                    .await;
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
            d.set(block, Value::Array(Vec::new()));
        }
        d.clear_id();
        Ok(())
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_security_group(ctx.default_zone(), d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let group = ctx.api().find_security_group(ctx.default_zone(), id).await?;
        let names: HashMap<String, String> = ctx
            .api()
            .list_security_groups(ctx.default_zone())
            .await?
            .into_iter()
            .map(|g| (g.id, g.name))
            .collect();

        let mut d = ResourceData::new(Default::default());
        d.set_id(group.id.as_str());
        d.set("security_group_id", group.id.as_str());
        d.set("security_group", group.name.as_str());
        let mut blocks = blocks_from_group(&group, |gid| names.get(gid).cloned());
        for (block, _) in BLOCKS {
            d.set(block, Value::Array(blocks.remove(block).unwrap_or_default()));
        }
        d.commit();
        Ok(d)
    }

    fn upgrade_state(&self, version: u32, attrs: Attributes) -> Result<Attributes> {
        if version == 0 {
            return Ok(migrate::rule_blocks_v0_to_v1(attrs));
        }
        Ok(attrs)
    }
}
