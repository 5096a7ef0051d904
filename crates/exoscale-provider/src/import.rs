//! Import and the sibling resources some imports bring along
//!
//! Importing a compute instance also surfaces its secondary IPs and extra
//! NICs, a domain surfaces its records and a security group its rules.

use crate::data::{Attributes, ResourceData};
use crate::error::Result;
use crate::resource::{Context, Resource};
use crate::resources::{SecurityGroupRuleResource, domain_record, nic, secondary_ip, security_group_rule};
use serde::Serialize;

/// One resource produced by an import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imported {
    pub resource_type: String,
    pub id: String,
    pub attributes: Attributes,
}

impl Imported {
    fn new(kind: &str, d: ResourceData) -> Self {
        Self {
            resource_type: kind.to_string(),
            id: d.id().to_string(),
            attributes: d.into_attributes(),
        }
    }
}

/// Import `id` as `resource`, root first, then its siblings
pub async fn import(ctx: &Context, resource: &dyn Resource, id: &str) -> Result<Vec<Imported>> {
    let root = resource.import(ctx, id).await?;
    let root_id = root.id().to_string();

    let mut imported = vec![Imported::new(resource.kind(), root)];
    let siblings = match resource.kind() {
        "exoscale_compute" => compute_siblings(ctx, &root_id).await?,
        "exoscale_domain" => domain_siblings(ctx, &root_id).await?,
        "exoscale_security_group" => security_group_siblings(ctx, &root_id).await?,
        _ => Vec::new(),
    };

    tracing::debug!(
        "imported {} {} with {} sibling(s)",
        resource.kind(),
        root_id,
        siblings.len()
    );
    imported.extend(siblings);
    Ok(imported)
}

async fn compute_siblings(ctx: &Context, vm_id: &str) -> Result<Vec<Imported>> {
    let vm = ctx.api().get_virtual_machine(vm_id).await?;
    let mut siblings = Vec::new();

    if let Some(default_nic) = vm.default_nic() {
        for ip in &default_nic.secondaryip {
            let mut d = ResourceData::new(Attributes::new());
            d.set_id(ip.id.as_str());
            secondary_ip::apply(&mut d, &vm, ip);
            d.commit();
            siblings.push(Imported::new("exoscale_secondary_ipaddress", d));
        }
    }

    for extra in vm.nic.iter().filter(|n| !n.isdefault) {
        let mut d = ResourceData::new(Attributes::new());
        d.set_id(extra.id.as_str());
        nic::apply(&mut d, extra);
        d.set("compute_id", vm.id.as_str());
        d.commit();
        siblings.push(Imported::new("exoscale_nic", d));
    }

    Ok(siblings)
}

async fn domain_siblings(ctx: &Context, domain: &str) -> Result<Vec<Imported>> {
    let records = ctx.api().list_records(domain).await?;

    Ok(records
        .iter()
        .filter(|r| !r.is_platform_managed())
        .map(|record| {
            let mut d = ResourceData::new(Attributes::new());
            d.set_id(record.id.to_string());
            domain_record::apply(&mut d, domain, record);
            d.commit();
            Imported::new("exoscale_domain_record", d)
        })
        .collect())
}

async fn security_group_siblings(ctx: &Context, group_id: &str) -> Result<Vec<Imported>> {
    let group = ctx
        .api()
        .get_security_group(ctx.default_zone(), group_id)
        .await?;

    let mut siblings = Vec::new();
    for rule in &group.rules {
        let d = SecurityGroupRuleResource
            .import(ctx, &security_group_rule::import_id(&group.id, &rule.id))
            .await?;
        siblings.push(Imported::new("exoscale_security_group_rule", d));
    }
    Ok(siblings)
}
