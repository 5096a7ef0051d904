//! `exoscale_secondary_ipaddress`
//!
//! Binds an existing elastic IP to the default NIC of a compute instance.
//! The local ID is the secondary IP record's ID.

use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::resource::{Context, Resource, deleted, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::ApiError;
use exoscale_client::compute::{NicSecondaryIp, VirtualMachine};

pub struct SecondaryIpResource;

fn find_binding(vm: &VirtualMachine, id: &str) -> Option<NicSecondaryIp> {
    vm.default_nic()?
        .secondaryip
        .iter()
        .find(|ip| ip.id == id)
        .cloned()
}

pub(crate) fn apply(d: &mut ResourceData, vm: &VirtualMachine, ip: &NicSecondaryIp) {
    d.set("compute_id", vm.id.as_str());
    d.set("ip_address", ip.ipaddress.as_str());
    if let Some(nic) = vm.default_nic() {
        d.set("nic_id", nic.id.as_str());
        d.set("network_id", nic.networkid.as_str());
    }
}

#[async_trait]
impl Resource for SecondaryIpResource {
    fn kind(&self) -> &'static str {
        "exoscale_secondary_ipaddress"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("compute_id").required().force_new(),
            Attribute::string("ip_address")
                .required()
                .force_new()
                .validate(Validator::IpAddress),
            Attribute::string("nic_id").computed(),
            Attribute::string("network_id").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        let ip = d.get_string("ip_address").unwrap_or_default();

        let vm = ctx.api().get_virtual_machine(&vm_id).await?;
        let nic = vm.default_nic().ok_or_else(|| {
            ProviderError::invalid(format!("instance {} has no default NIC", vm_id))
        })?;

        let binding = ctx.api().add_ip_to_nic(&nic.id, &ip).await?;
        d.set_id(binding.id.as_str());

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        let result = ctx.api().get_virtual_machine(&vm_id).await;
        let Some(vm) = or_gone(d, result)? else {
            return Ok(());
        };

        match find_binding(&vm, d.id()) {
            Some(ip) => apply(d, &vm, &ip),
            None => {
                tracing::info!("secondary IP {} is no longer bound, removing from state", d.id());
                d.clear_id();
            }
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let result = ctx.api().remove_ip_from_nic(&id).await;
        deleted(d, result)
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        match ctx.api().get_virtual_machine(&vm_id).await {
            Ok(vm) => Ok(find_binding(&vm, d.id()).is_some()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let (vm_id, ip) = id.split_once('_').ok_or_else(|| {
            ProviderError::invalid(format!(
                "import ID {:?} must look like <compute-id>_<ip-address>",
                id
            ))
        })?;

        let vm = ctx.api().get_virtual_machine(vm_id).await?;
        let binding = vm
            .default_nic()
            .and_then(|nic| nic.secondaryip.iter().find(|s| s.ipaddress == ip))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("secondary IP {} on {}", ip, vm_id)))?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(binding.id.as_str());
        apply(&mut d, &vm, &binding);
        d.commit();
        Ok(d)
    }
}

