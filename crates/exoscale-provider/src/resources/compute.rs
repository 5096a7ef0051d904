//! `exoscale_compute`
//!
//! Instances live on the legacy API. Some attributes can only change while
//! the instance is stopped, so Update may stop it, send one update payload,
//! run the remaining commands in order and start it again.

use crate::data::{AttrReader, Attributes, ResourceData};
use crate::error::{ProviderError, Result};
use crate::mapper::TagDiff;
use crate::mapper::user_data;
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Timeouts, Validator, validators};
use crate::templates;
use async_trait::async_trait;
use exoscale_client::ApiError;
use exoscale_client::compute::{
    DeployVirtualMachine, TAG_RESOURCE_VM, TemplateFilter, UpdateVirtualMachine, VirtualMachine,
};
use std::collections::BTreeMap;
use std::time::Duration;

pub struct ComputeResource;

pub const STATE_RUNNING: &str = "Running";
pub const STATE_STOPPED: &str = "Stopped";

/// Changing any of these needs the instance stopped
const REBOOT_ATTRIBUTES: &[&str] = &[
    "hostname",
    "user_data",
    "size",
    "disk_size",
    "key_pair",
    "security_groups",
    "security_group_ids",
    "affinity_groups",
    "affinity_group_ids",
    "ip6",
];

fn is_running(state: &str) -> bool {
    state.eq_ignore_ascii_case(STATE_RUNNING) || state.eq_ignore_ascii_case("Migrating")
}

/// State as shown to the user; a migration is invisible
fn reported_state(state: &str) -> &str {
    if state.eq_ignore_ascii_case("Migrating") {
        STATE_RUNNING
    } else {
        state
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Transitions {
    reboot: bool,
    start: bool,
    stop: bool,
}

/// Reject changes the platform cannot make
fn check_transitions(d: &ResourceData) -> Result<()> {
    let prior = d.prior();

    if let (Some(old), Some(new)) = (prior.get_i64("disk_size"), d.get_i64("disk_size")) {
        if new < old {
            return Err(ProviderError::invalid(format!(
                "disk_size cannot shrink from {} to {}",
                old, new
            )));
        }
    }

    if prior.get_bool("ip4") == Some(true) && d.get_bool("ip4") == Some(false) {
        return Err(ProviderError::invalid("ip4 cannot be disabled once enabled"));
    }
    if prior.get_bool("ip4") == Some(false) && d.get_bool("ip4") == Some(true) {
        return Err(ProviderError::invalid("ip4 can only be enabled at creation"));
    }
    if prior.get_bool("ip6") == Some(true) && d.get_bool("ip6") == Some(false) {
        return Err(ProviderError::invalid("ip6 cannot be disabled once enabled"));
    }
    Ok(())
}

fn transitions(d: &ResourceData) -> Result<Transitions> {
    check_transitions(d)?;

    let mut t = Transitions {
        reboot: d.has_changes(REBOOT_ATTRIBUTES),
        ..Default::default()
    };

    if d.has_change("state") {
        match d.get_str("state") {
            Some(state) if state.eq_ignore_ascii_case(STATE_STOPPED) => {
                t.stop = true;
                t.reboot = false;
            }
            _ => t.start = true,
        }
    }
    Ok(t)
}

/// Names win over IDs unless only the IDs changed
fn prefer_names(d: &ResourceData, names: &str, ids: &str) -> bool {
    !d.get_strings(names).is_empty() && (d.has_change(names) || !d.has_change(ids))
}

async fn security_group_ids(ctx: &Context, d: &ResourceData) -> Result<Vec<String>> {
    if !prefer_names(d, "security_groups", "security_group_ids") {
        return Ok(d.get_strings("security_group_ids"));
    }

    let mut ids = Vec::new();
    for name in d.get_strings("security_groups") {
        let group = ctx
            .api()
            .find_security_group(ctx.default_zone(), &name)
            .await?;
        ids.push(group.id);
    }
    Ok(ids)
}

async fn affinity_group_ids(ctx: &Context, d: &ResourceData) -> Result<Vec<String>> {
    if !prefer_names(d, "affinity_groups", "affinity_group_ids") {
        return Ok(d.get_strings("affinity_group_ids"));
    }

    let mut ids = Vec::new();
    for name in d.get_strings("affinity_groups") {
        let group = ctx
            .api()
            .find_anti_affinity_group(ctx.default_zone(), &name)
            .await?;
        ids.push(group.id);
    }
    Ok(ids)
}

/// Service offering ID for a size name such as `Medium`
async fn service_offering_id(ctx: &Context, size: &str) -> Result<String> {
    ctx.api()
        .list_service_offerings(Some(size))
        .await?
        .into_iter()
        .find(|o| o.name.eq_ignore_ascii_case(size))
        .map(|o| o.id)
        .ok_or_else(|| ApiError::NotFound(format!("service offering {:?}", size)).into())
}

/// Encoded user-data, recording whether the user already wrote base64
fn encoded_user_data(ctx: &Context, d: &mut ResourceData) -> Result<Option<String>> {
    let Some(raw) = d.get_string("user_data") else {
        d.set("user_data_base64", false);
        return Ok(None);
    };
    let encoded = user_data::encode(&raw, ctx.config().gzip_user_data)?;
    d.set("user_data_base64", encoded.already_encoded);
    Ok(Some(encoded.value))
}

/// Copy what the instance record carries into `d`
fn apply(d: &mut ResourceData, vm: &VirtualMachine) {
    d.set("zone", vm.zonename.as_str());
    d.set("template_id", vm.templateid.as_str());
    if !d
        .get_str("template")
        .is_some_and(|t| t.eq_ignore_ascii_case(&vm.templatename))
    {
        d.set("template", vm.templatename.as_str());
    }
    if !d
        .get_str("size")
        .is_some_and(|s| s.eq_ignore_ascii_case(&vm.serviceofferingname))
    {
        d.set("size", vm.serviceofferingname.as_str());
    }

    d.set("display_name", vm.displayname.as_str());
    d.set("hostname", vm.name.as_str());
    d.set_opt("key_pair", vm.keypair.clone());
    d.set("state", reported_state(&vm.state));

    d.set_strings("security_groups", vm.securitygroup.iter().map(|g| g.name.clone()));
    d.set_strings("security_group_ids", vm.securitygroup.iter().map(|g| g.id.clone()));
    d.set_strings("affinity_groups", vm.affinitygroup.iter().map(|g| g.name.clone()));
    d.set_strings("affinity_group_ids", vm.affinitygroup.iter().map(|g| g.id.clone()));

    let nic = vm.default_nic();
    d.set("ip4", nic.is_some_and(|n| n.ipaddress.is_some()));
    d.set("ip6", nic.is_some_and(|n| n.ip6address.is_some()));
    d.set_opt("ip_address", vm.ip_address().map(str::to_string));
    d.set_opt("ip6_address", nic.and_then(|n| n.ip6address.clone()));
    d.set_opt("ip6_cidr", nic.and_then(|n| n.ip6cidr.clone()));

    d.set_string_map("tags", &vm.tag_map());

    if let Some(password) = &vm.password {
        d.set("password", password.as_str());
    }
}

/// One step of the ordered update queue
#[derive(Debug, Clone, PartialEq)]
enum Command {
    ResizeVolume(i64),
    Scale(String),
    ResetSshKey(String),
    UpdateAffinityGroups(Vec<String>),
    DeleteTags(BTreeMap<String, String>),
    CreateTags(BTreeMap<String, String>),
    ActivateIp6(String),
    SetReverseDns(String),
    ClearReverseDns,
    Start,
}

impl Command {
    async fn run(&self, ctx: &Context, vm_id: &str) -> Result<()> {
        tracing::debug!("instance {}: {:?}", vm_id, self);
        let api = ctx.api();
        match self {
            Command::ResizeVolume(size) => {
                let volume = api.get_root_volume(vm_id).await?;
                api.resize_volume(&volume.id, *size).await?;
            }
            Command::Scale(offering_id) => api.scale_virtual_machine(vm_id, offering_id).await?,
            Command::ResetSshKey(key_pair) => {
                api.reset_ssh_key(vm_id, key_pair).await?;
            }
            Command::UpdateAffinityGroups(ids) => {
                api.update_affinity_groups(vm_id, ids).await?;
            }
            Command::DeleteTags(tags) => api.delete_tags(vm_id, TAG_RESOURCE_VM, tags).await?,
            Command::CreateTags(tags) => api.create_tags(vm_id, TAG_RESOURCE_VM, tags).await?,
            Command::ActivateIp6(nic_id) => {
                api.activate_ip6(nic_id).await?;
            }
            Command::SetReverseDns(name) => api.update_reverse_dns(vm_id, name).await?,
            Command::ClearReverseDns => api.delete_reverse_dns(vm_id).await?,
            Command::Start => {
                tracing::info!("starting instance {}", vm_id);
                api.start_virtual_machine(vm_id).await?;
            }
        }
        Ok(())
    }
}

/// Commands following the update payload, in execution order (without the
/// final start)
async fn command_queue(ctx: &Context, d: &ResourceData, vm: &VirtualMachine) -> Result<Vec<Command>> {
    let mut queue = Vec::new();

    if d.has_change("disk_size") {
        if let Some(size) = d.get_i64("disk_size") {
            queue.push(Command::ResizeVolume(size));
        }
    }

    if d.has_change("size") {
        if let Some(size) = d.get_str("size") {
            queue.push(Command::Scale(service_offering_id(ctx, size).await?));
        }
    }

    if d.has_change("key_pair") {
        if let Some(key_pair) = d.get_string("key_pair") {
            queue.push(Command::ResetSshKey(key_pair));
        }
    }

    if d.has_changes(&["affinity_groups", "affinity_group_ids"]) {
        queue.push(Command::UpdateAffinityGroups(affinity_group_ids(ctx, d).await?));
    }

    if d.has_change("tags") {
        let tags = TagDiff::between(&d.prior().get_string_map("tags"), &d.get_string_map("tags"));
        if !tags.remove.is_empty() {
            queue.push(Command::DeleteTags(tags.remove));
        }
        if !tags.add.is_empty() {
            queue.push(Command::CreateTags(tags.add));
        }
    }

    if d.has_change("ip6") && d.get_bool("ip6") == Some(true) {
        let nic = vm
            .default_nic()
            .ok_or_else(|| ProviderError::invalid(format!("instance {} has no default NIC", vm.id)))?;
        queue.push(Command::ActivateIp6(nic.id.clone()));
    }

    if d.has_change("reverse_dns") {
        queue.push(match d.get_string("reverse_dns") {
            Some(name) => Command::SetReverseDns(name),
            None => Command::ClearReverseDns,
        });
    }

    Ok(queue)
}

#[async_trait]
impl Resource for ComputeResource {
    fn kind(&self) -> &'static str {
        "exoscale_compute"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("zone").required().force_new(),
            Attribute::string("template")
                .optional_computed()
                .force_new()
                .conflicts_with(&["template_id"]),
            Attribute::string("template_id")
                .optional_computed()
                .force_new()
                .conflicts_with(&["template"]),
            Attribute::string("size").required().case_insensitive(),
            Attribute::int("disk_size")
                .required()
                .validate(Validator::IntRange(10, 51200)),
            Attribute::string("key_pair"),
            Attribute::string_set("security_groups")
                .optional_computed()
                .conflicts_with(&["security_group_ids"]),
            Attribute::string_set("security_group_ids")
                .optional_computed()
                .conflicts_with(&["security_groups"]),
            Attribute::string_set("affinity_groups")
                .optional_computed()
                .conflicts_with(&["affinity_group_ids"]),
            Attribute::string_set("affinity_group_ids")
                .optional_computed()
                .conflicts_with(&["affinity_groups"]),
            Attribute::string("display_name").optional_computed(),
            Attribute::string("hostname")
                .optional_computed()
                .validate(Validator::Regex(validators::HOSTNAME_PATTERN, "a valid hostname")),
            Attribute::string("user_data"),
            Attribute::bool("user_data_base64").computed(),
            Attribute::string("state")
                .optional_computed()
                .validate(Validator::OneOf(&[STATE_RUNNING, STATE_STOPPED])),
            Attribute::bool("ip4").default(true),
            Attribute::bool("ip6").default(false),
            Attribute::string_map("tags"),
            Attribute::string("reverse_dns").validate(Validator::Regex(
                validators::REVERSE_DNS_PATTERN,
                "a domain name ending with a dot",
            )),
            Attribute::string("password").computed().sensitive(),
            Attribute::string("ip_address").computed(),
            Attribute::string("ip6_address").computed(),
            Attribute::string("ip6_cidr").computed(),
        ])
        .with_timeouts(Timeouts::all(Duration::from_secs(5 * 60)))
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let zone_name = ctx.zone_of(d);
        let zone = templates::zone(ctx, &zone_name).await?;
        let disk_size = d.get_i64("disk_size").unwrap_or(10);

        let template = match (d.get_string("template_id"), d.get_string("template")) {
            (Some(id), _) => {
                ctx.api()
                    .get_template(&zone.id, &id, TemplateFilter::Featured)
                    .await?
            }
            (None, Some(name)) => {
                templates::resolve(ctx, &zone.id, &name, Some(disk_size), TemplateFilter::Featured).await?
            }
            (None, None) => {
                return Err(ProviderError::invalid("one of template or template_id is required"));
            }
        };

        let size = d.get_string("size").unwrap_or_default();
        let req = DeployVirtualMachine {
            zone_id: zone.id.clone(),
            template_id: template.id.clone(),
            service_offering_id: service_offering_id(ctx, &size).await?,
            root_disk_size: disk_size,
            display_name: d.get_string("display_name"),
            name: d.get_string("hostname"),
            key_pair: d.get_string("key_pair"),
            user_data: encoded_user_data(ctx, d)?,
            security_group_ids: security_group_ids(ctx, d).await?,
            affinity_group_ids: affinity_group_ids(ctx, d).await?,
            ip4: d.get_bool("ip4").unwrap_or(true),
            ip6: d.get_bool("ip6").unwrap_or(false),
            start_vm: !d
                .get_str("state")
                .is_some_and(|s| s.eq_ignore_ascii_case(STATE_STOPPED)),
        };

        tracing::info!(
            "deploying instance from template {} ({}) in {}",
            template.name,
            template.id,
            zone.name
        );
        let vm = ctx.api().deploy_virtual_machine(&req).await?;
        d.set_id(vm.id.as_str());
        if let Some(password) = &vm.password {
            d.set("password", password.as_str());
        }

        let tags = d.get_string_map("tags");
        if let Err(e) = ctx.api().create_tags(&vm.id, TAG_RESOURCE_VM, &tags).await {
            tracing::debug!("tagging instance {} failed, rolling back", vm.id);
            if let Err(rollback) = ctx.api().destroy_virtual_machine(&vm.id).await {
                tracing::warn!("cannot destroy instance {} after failed tagging: {}", vm.id, rollback);
            }
            d.clear_id();
            return Err(e.into());
        }

        if let Some(name) = d.get_string("reverse_dns") {
            ctx.api().update_reverse_dns(&vm.id, &name).await?;
        }

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let result = ctx.api().get_virtual_machine(&id).await;
        let Some(vm) = or_gone(d, result)? else {
            return Ok(());
        };
        apply(d, &vm);

        let volume = ctx.api().get_root_volume(&id).await?;
        d.set("disk_size", volume.size_gb());

        match ctx.api().get_user_data(&id).await? {
            Some(encoded) => {
                let already_encoded = d.get_bool("user_data_base64").unwrap_or(false);
                d.set("user_data", user_data::for_state(&encoded, already_encoded)?);
            }
            None => d.remove("user_data"),
        }

        let reverse_dns = ctx.api().get_reverse_dns(&id).await?;
        d.set_opt("reverse_dns", reverse_dns);
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let t = transitions(d)?;

        let vm = ctx.api().get_virtual_machine(&id).await?;
        let mut running = is_running(&vm.state);

        let mut payload = UpdateVirtualMachine {
            id: id.clone(),
            ..Default::default()
        };
        if d.has_change("display_name") {
            payload.display_name = d.get_string("display_name");
        }
        if d.has_change("hostname") {
            payload.name = d.get_string("hostname");
        }
        if d.has_change("user_data") {
            payload.user_data = Some(encoded_user_data(ctx, d)?.unwrap_or_default());
        }
        if d.has_changes(&["security_groups", "security_group_ids"]) {
            payload.security_group_ids = Some(security_group_ids(ctx, d).await?);
        }

        let mut queue = command_queue(ctx, d, &vm).await?;
        let desired_running = !d
            .get_str("state")
            .is_some_and(|s| s.eq_ignore_ascii_case(STATE_STOPPED));
        if desired_running && (t.reboot || t.start) {
            queue.push(Command::Start);
        }

        if running && (t.reboot || t.stop) {
            tracing::info!("stopping instance {}", id);
            let stopped = ctx.api().stop_virtual_machine(&id).await?;
            apply(d, &stopped);
            running = false;
        }

        if !payload.is_empty() {
            ctx.api().update_virtual_machine(&payload).await?;
            tracing::debug!("instance {}: attribute update applied", id);
        }

        for command in &queue {
            if *command == Command::Start && running {
                continue;
            }
            command.run(ctx, &id).await?;
        }

        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let result = ctx.api().destroy_virtual_machine(&id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        exists_from(ctx.api().get_virtual_machine(d.id()).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let vm = match ctx.api().get_virtual_machine(id).await {
            Ok(vm) => vm,
            Err(e) if e.is_not_found() => find_by_name(ctx, id).await?,
            Err(e) => return Err(e.into()),
        };

        let mut d = ResourceData::new(Attributes::new());
        d.set_id(vm.id.as_str());
        self.read(ctx, &mut d).await?;
        d.commit();
        Ok(d)
    }
}

async fn find_by_name(ctx: &Context, name: &str) -> Result<VirtualMachine> {
    let mut matches: Vec<VirtualMachine> = ctx
        .api()
        .list_virtual_machines(None)
        .await?
        .into_iter()
        .filter(|vm| vm.displayname == name || vm.name == name)
        .collect();

    match matches.len() {
        0 => Err(ApiError::NotFound(format!("compute instance {:?}", name)).into()),
        1 => Ok(matches.remove(0)),
        count => Err(ApiError::Ambiguous {
            kind: "compute instance",
            name: name.to_string(),
            count,
        }
        .into()),
    }
}
