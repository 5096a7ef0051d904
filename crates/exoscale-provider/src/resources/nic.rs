//! `exoscale_nic`
//!
//! A private network interface attached to a compute instance. The parent
//! instance and the network are fixed for the NIC's lifetime; only the
//! static IP can move.

use crate::data::{AttrReader, ResourceData};
use crate::error::{ProviderError, Result};
use crate::resource::{Context, Resource, deleted, exists_from, or_gone};
use crate::schema::{Attribute, Schema, Validator};
use async_trait::async_trait;
use exoscale_client::ApiError;
use exoscale_client::compute::Nic;

pub struct NicResource;

pub(crate) fn apply(d: &mut ResourceData, nic: &Nic) {
    if let Some(vm_id) = &nic.virtualmachineid {
        d.set("compute_id", vm_id.as_str());
    }
    d.set("network_id", nic.networkid.as_str());
    d.set_opt("ip_address", nic.ipaddress.clone());
    d.set_opt("netmask", nic.netmask.clone());
    d.set_opt("gateway", nic.gateway.clone());
    d.set_opt("mac_address", nic.macaddress.clone());
}

#[async_trait]
impl Resource for NicResource {
    fn kind(&self) -> &'static str {
        "exoscale_nic"
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Attribute::string("compute_id").required().force_new(),
            Attribute::string("network_id").required().force_new(),
            Attribute::string("ip_address")
                .optional_computed()
                .validate(Validator::Ipv4),
            Attribute::string("netmask").computed(),
            Attribute::string("gateway").computed(),
            Attribute::string("mac_address").computed(),
        ])
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        let network_id = d.get_string("network_id").unwrap_or_default();
        let ip = d.get_string("ip_address");

        let nic = ctx
            .api()
            .add_nic(&vm_id, &network_id, ip.as_deref())
            .await?;
        d.set_id(nic.id.as_str());

        self.read(ctx, d).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        let result = ctx.api().get_nic(&id, &vm_id).await;
        if let Some(nic) = or_gone(d, result)? {
            apply(d, &nic);
            d.set("compute_id", vm_id);
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        if d.has_change("ip_address") {
            if let Some(ip) = d.get_string("ip_address") {
                tracing::info!("moving NIC {} to {}", d.id(), ip);
                ctx.api().update_nic_ip(d.id(), &ip).await?;
            }
        }
        self.read(ctx, d).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        let result = ctx.api().remove_nic(&vm_id, &id).await;
        deleted(d, result)?;

        // The job can succeed while the interface is still attached
        let still_attached = ctx
            .api()
            .list_nics(&vm_id)
            .await
            .map(|nics| nics.iter().any(|n| n.id == id))
            .or_else(|e| if e.is_not_found() { Ok(false) } else { Err(e) })?;
        if still_attached {
            return Err(ProviderError::Api(ApiError::Conflict(format!(
                "NIC {} is still attached to instance {}",
                id, vm_id
            ))));
        }
        Ok(())
    }

    async fn exists(&self, ctx: &Context, d: &ResourceData) -> Result<bool> {
        let vm_id = d.get_string("compute_id").unwrap_or_default();
        exists_from(ctx.api().get_nic(d.id(), &vm_id).await)
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<ResourceData> {
        let nic = ctx
            .api()
            .list_virtual_machines(None)
            .await?
            .into_iter()
            .flat_map(|vm| {
                let vm_id = vm.id;
                vm.nic.into_iter().map(move |mut nic| {
                    nic.virtualmachineid.get_or_insert_with(|| vm_id.clone());
                    nic
                })
            })
            .find(|nic| nic.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("NIC {}", id)))?;

        let mut d = ResourceData::new(Default::default());
        d.set_id(nic.id.as_str());
        apply(&mut d, &nic);
        d.commit();
        Ok(d)
    }
}
