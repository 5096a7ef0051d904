//! Legacy v1 compute surface: zones, templates, offerings, virtual machines,
//! volumes, NICs, tags, reverse DNS and SSH key generation

use crate::client::{Client, Params, take, take_required};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type name used by the tag commands for instances
pub const TAG_RESOURCE_VM: &str = "UserVm";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFilter {
    #[default]
    Featured,
    Community,
    Mine,
}

impl TemplateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFilter::Featured => "featured",
            TemplateFilter::Community => "community",
            TemplateFilter::Mine => "self",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "featured" => Some(TemplateFilter::Featured),
            "community" => Some(TemplateFilter::Community),
            "mine" | "self" => Some(TemplateFilter::Mine),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub displaytext: Option<String>,
    /// Base disk size in bytes
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub zoneid: Option<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl Template {
    /// Base disk size in GiB
    pub fn size_gb(&self) -> Option<i64> {
        self.size.map(|s| s >> 30)
    }

    /// Login user advertised by the template, if any
    pub fn username(&self) -> Option<&str> {
        self.details.get("username").map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cpunumber: Option<i64>,
    #[serde(default)]
    pub memory: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// `{id, name}` pair embedded in VM records (security groups, affinity groups)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NicSecondaryIp {
    pub id: String,
    pub ipaddress: String,
    #[serde(default)]
    pub nicid: Option<String>,
    #[serde(default)]
    pub networkid: Option<String>,
    #[serde(default)]
    pub virtualmachineid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nic {
    pub id: String,
    #[serde(default)]
    pub virtualmachineid: Option<String>,
    #[serde(default)]
    pub networkid: String,
    #[serde(default)]
    pub ipaddress: Option<String>,
    #[serde(default)]
    pub ip6address: Option<String>,
    #[serde(default)]
    pub ip6cidr: Option<String>,
    #[serde(default)]
    pub macaddress: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub isdefault: bool,
    #[serde(default)]
    pub secondaryip: Vec<NicSecondaryIp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    /// Hostname
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub displayname: String,
    #[serde(default)]
    pub zoneid: String,
    #[serde(default)]
    pub zonename: String,
    #[serde(default)]
    pub templateid: String,
    #[serde(default)]
    pub templatename: String,
    #[serde(default)]
    pub serviceofferingid: String,
    #[serde(default)]
    pub serviceofferingname: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub keypair: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub securitygroup: Vec<NamedRef>,
    #[serde(default)]
    pub affinitygroup: Vec<NamedRef>,
    #[serde(default)]
    pub nic: Vec<Nic>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub created: Option<String>,
}

impl VirtualMachine {
    pub fn default_nic(&self) -> Option<&Nic> {
        self.nic.iter().find(|n| n.isdefault)
    }

    /// Public IPv4 address of the default NIC
    pub fn ip_address(&self) -> Option<&str> {
        self.default_nic().and_then(|n| n.ipaddress.as_deref())
    }

    pub fn tag_map(&self) -> BTreeMap<String, String> {
        self.tags
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    /// Size in bytes
    #[serde(default)]
    pub size: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub virtualmachineid: Option<String>,
}

impl Volume {
    pub fn size_gb(&self) -> i64 {
        self.size >> 30
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshKeyPair {
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub privatekey: Option<String>,
}

/// Parameters of `deployVirtualMachine`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployVirtualMachine {
    pub zone_id: String,
    pub template_id: String,
    pub service_offering_id: String,
    pub root_disk_size: i64,
    pub display_name: Option<String>,
    pub name: Option<String>,
    pub key_pair: Option<String>,
    /// Already base64-encoded
    pub user_data: Option<String>,
    pub security_group_ids: Vec<String>,
    pub affinity_group_ids: Vec<String>,
    pub ip4: bool,
    pub ip6: bool,
    pub start_vm: bool,
}

/// Parameters of `updateVirtualMachine`; `None` leaves the attribute untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateVirtualMachine {
    pub id: String,
    pub display_name: Option<String>,
    pub name: Option<String>,
    pub user_data: Option<String>,
    pub security_group_ids: Option<Vec<String>>,
}

impl UpdateVirtualMachine {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.name.is_none()
            && self.user_data.is_none()
            && self.security_group_ids.is_none()
    }
}

/// Legacy compute operations
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn list_zones(&self) -> Result<Vec<Zone>>;

    async fn list_templates(
        &self,
        zone_id: &str,
        filter: TemplateFilter,
        name: Option<&str>,
    ) -> Result<Vec<Template>>;

    async fn get_template(&self, zone_id: &str, id: &str, filter: TemplateFilter) -> Result<Template>;

    async fn list_service_offerings(&self, name: Option<&str>) -> Result<Vec<ServiceOffering>>;

    async fn deploy_virtual_machine(&self, req: &DeployVirtualMachine) -> Result<VirtualMachine>;

    async fn get_virtual_machine(&self, id: &str) -> Result<VirtualMachine>;

    async fn list_virtual_machines(&self, name: Option<&str>) -> Result<Vec<VirtualMachine>>;

    async fn update_virtual_machine(&self, req: &UpdateVirtualMachine) -> Result<VirtualMachine>;

    async fn destroy_virtual_machine(&self, id: &str) -> Result<()>;

    async fn start_virtual_machine(&self, id: &str) -> Result<VirtualMachine>;

    async fn stop_virtual_machine(&self, id: &str) -> Result<VirtualMachine>;

    async fn scale_virtual_machine(&self, id: &str, service_offering_id: &str) -> Result<()>;

    async fn reset_ssh_key(&self, id: &str, key_pair: &str) -> Result<VirtualMachine>;

    async fn get_root_volume(&self, vm_id: &str) -> Result<Volume>;

    async fn resize_volume(&self, volume_id: &str, size_gb: i64) -> Result<Volume>;

    async fn update_affinity_groups(&self, vm_id: &str, group_ids: &[String]) -> Result<VirtualMachine>;

    async fn activate_ip6(&self, nic_id: &str) -> Result<Nic>;

    /// Base64 user-data of an instance
    async fn get_user_data(&self, vm_id: &str) -> Result<Option<String>>;

    async fn get_reverse_dns(&self, vm_id: &str) -> Result<Option<String>>;

    async fn update_reverse_dns(&self, vm_id: &str, domain_name: &str) -> Result<()>;

    async fn delete_reverse_dns(&self, vm_id: &str) -> Result<()>;

    async fn create_tags(
        &self,
        resource_id: &str,
        resource_type: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn delete_tags(
        &self,
        resource_id: &str,
        resource_type: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>>;

    async fn get_nic(&self, nic_id: &str, vm_id: &str) -> Result<Nic> {
        self.list_nics(vm_id)
            .await?
            .into_iter()
            .find(|n| n.id == nic_id)
            .ok_or_else(|| ApiError::NotFound(format!("NIC {}", nic_id)))
    }

    async fn add_nic(&self, vm_id: &str, network_id: &str, ip_address: Option<&str>) -> Result<Nic>;

    async fn remove_nic(&self, vm_id: &str, nic_id: &str) -> Result<()>;

    async fn update_nic_ip(&self, nic_id: &str, ip_address: &str) -> Result<Nic>;

    async fn add_ip_to_nic(&self, nic_id: &str, ip_address: &str) -> Result<NicSecondaryIp>;

    async fn remove_ip_from_nic(&self, secondary_ip_id: &str) -> Result<()>;

    /// Generate a key pair server side; the private key is only returned here
    async fn create_ssh_key_pair(&self, name: &str) -> Result<SshKeyPair>;
}

#[async_trait]
impl ComputeApi for Client {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let body = self
            .v1_request("listZones", Params::new().set("available", true))
            .await?;
        take(&body, "zone")
    }

    async fn list_templates(
        &self,
        zone_id: &str,
        filter: TemplateFilter,
        name: Option<&str>,
    ) -> Result<Vec<Template>> {
        let params = Params::new()
            .set("templatefilter", filter.as_str())
            .set("zoneid", zone_id)
            .set_opt("name", name);
        let body = self.v1_request("listTemplates", params).await?;
        take(&body, "template")
    }

    async fn get_template(&self, zone_id: &str, id: &str, filter: TemplateFilter) -> Result<Template> {
        let params = Params::new()
            .set("templatefilter", filter.as_str())
            .set("zoneid", zone_id)
            .set("id", id);
        let body = self.v1_request("listTemplates", params).await?;
        let templates: Vec<Template> = take(&body, "template")?;
        templates
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("template {}", id)))
    }

    async fn list_service_offerings(&self, name: Option<&str>) -> Result<Vec<ServiceOffering>> {
        let body = self
            .v1_request("listServiceOfferings", Params::new().set_opt("name", name))
            .await?;
        take(&body, "serviceoffering")
    }

    async fn deploy_virtual_machine(&self, req: &DeployVirtualMachine) -> Result<VirtualMachine> {
        let params = Params::new()
            .set("zoneid", &req.zone_id)
            .set("templateid", &req.template_id)
            .set("serviceofferingid", &req.service_offering_id)
            .set("rootdisksize", req.root_disk_size)
            .set_opt("displayname", req.display_name.as_ref())
            .set_opt("name", req.name.as_ref())
            .set_opt("keypair", req.key_pair.as_ref())
            .set_opt("userdata", req.user_data.as_ref())
            .set_list("securitygroupids", &req.security_group_ids)
            .set_list("affinitygroupids", &req.affinity_group_ids)
            .set("ip4", req.ip4)
            .set("ip6", req.ip6)
            .set("startvm", req.start_vm);
        let result = self.v1_async("deployVirtualMachine", params).await?;
        take_required(&result, "virtualmachine")
    }

    async fn get_virtual_machine(&self, id: &str) -> Result<VirtualMachine> {
        let body = self
            .v1_request("listVirtualMachines", Params::new().set("id", id))
            .await?;
        let vms: Vec<VirtualMachine> = take(&body, "virtualmachine")?;
        vms.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("virtual machine {}", id)))
    }

    async fn list_virtual_machines(&self, name: Option<&str>) -> Result<Vec<VirtualMachine>> {
        let body = self
            .v1_request("listVirtualMachines", Params::new().set_opt("name", name))
            .await?;
        take(&body, "virtualmachine")
    }

    async fn update_virtual_machine(&self, req: &UpdateVirtualMachine) -> Result<VirtualMachine> {
        let mut params = Params::new()
            .set("id", &req.id)
            .set_opt("displayname", req.display_name.as_ref())
            .set_opt("name", req.name.as_ref())
            .set_opt("userdata", req.user_data.as_ref());
        if let Some(ids) = &req.security_group_ids {
            params = params.set("securitygroupids", ids.join(","));
        }
        let body = self.v1_request("updateVirtualMachine", params).await?;
        take_required(&body, "virtualmachine")
    }

    async fn destroy_virtual_machine(&self, id: &str) -> Result<()> {
        self.v1_async("destroyVirtualMachine", Params::new().set("id", id))
            .await?;
        Ok(())
    }

    async fn start_virtual_machine(&self, id: &str) -> Result<VirtualMachine> {
        let result = self
            .v1_async("startVirtualMachine", Params::new().set("id", id))
            .await?;
        take_required(&result, "virtualmachine")
    }

    async fn stop_virtual_machine(&self, id: &str) -> Result<VirtualMachine> {
        let result = self
            .v1_async("stopVirtualMachine", Params::new().set("id", id))
            .await?;
        take_required(&result, "virtualmachine")
    }

    async fn scale_virtual_machine(&self, id: &str, service_offering_id: &str) -> Result<()> {
        let params = Params::new()
            .set("id", id)
            .set("serviceofferingid", service_offering_id);
        self.v1_async("scaleVirtualMachine", params).await?;
        Ok(())
    }

    async fn reset_ssh_key(&self, id: &str, key_pair: &str) -> Result<VirtualMachine> {
        let params = Params::new().set("id", id).set("keypair", key_pair);
        let result = self
            .v1_async("resetSSHKeyForVirtualMachine", params)
            .await?;
        take_required(&result, "virtualmachine")
    }

    async fn get_root_volume(&self, vm_id: &str) -> Result<Volume> {
        let params = Params::new()
            .set("virtualmachineid", vm_id)
            .set("type", "ROOT");
        let body = self.v1_request("listVolumes", params).await?;
        let volumes: Vec<Volume> = take(&body, "volume")?;
        volumes
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("root volume of {}", vm_id)))
    }

    async fn resize_volume(&self, volume_id: &str, size_gb: i64) -> Result<Volume> {
        let params = Params::new().set("id", volume_id).set("size", size_gb);
        let result = self.v1_async("resizeVolume", params).await?;
        take_required(&result, "volume")
    }

    async fn update_affinity_groups(&self, vm_id: &str, group_ids: &[String]) -> Result<VirtualMachine> {
        // an empty list must still be sent to clear every group
        let params = Params::new()
            .set("id", vm_id)
            .set("affinitygroupids", group_ids.join(","));
        let result = self.v1_async("updateVMAffinityGroup", params).await?;
        take_required(&result, "virtualmachine")
    }

    async fn activate_ip6(&self, nic_id: &str) -> Result<Nic> {
        let result = self
            .v1_async("activateIp6", Params::new().set("nicid", nic_id))
            .await?;
        take_required(&result, "nic")
    }

    async fn get_user_data(&self, vm_id: &str) -> Result<Option<String>> {
        let body = self
            .v1_request(
                "getVirtualMachineUserData",
                Params::new().set("virtualmachineid", vm_id),
            )
            .await?;
        Ok(body
            .get("virtualmachineuserdata")
            .and_then(|u| u.get("userdata"))
            .and_then(|u| u.as_str())
            .filter(|u| !u.is_empty())
            .map(str::to_string))
    }

    async fn get_reverse_dns(&self, vm_id: &str) -> Result<Option<String>> {
        let body = self
            .v1_request(
                "queryReverseDnsForVirtualMachine",
                Params::new().set("id", vm_id),
            )
            .await?;
        Ok(body
            .get("virtualmachine")
            .and_then(|vm| vm.get("reversedns"))
            .and_then(|r| r.as_array())
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.get("domainname"))
            .and_then(|d| d.as_str())
            .map(str::to_string))
    }

    async fn update_reverse_dns(&self, vm_id: &str, domain_name: &str) -> Result<()> {
        let params = Params::new().set("id", vm_id).set("domainname", domain_name);
        self.v1_request("updateReverseDnsForVirtualMachine", params)
            .await?;
        Ok(())
    }

    async fn delete_reverse_dns(&self, vm_id: &str) -> Result<()> {
        self.v1_request(
            "deleteReverseDnsFromVirtualMachine",
            Params::new().set("id", vm_id),
        )
        .await?;
        Ok(())
    }

    async fn create_tags(
        &self,
        resource_id: &str,
        resource_type: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let params = Params::new()
            .set("resourceids", resource_id)
            .set("resourcetype", resource_type)
            .set_map("tags", tags);
        self.v1_async("createTags", params).await?;
        Ok(())
    }

    async fn delete_tags(
        &self,
        resource_id: &str,
        resource_type: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let params = Params::new()
            .set("resourceids", resource_id)
            .set("resourcetype", resource_type)
            .set_map("tags", tags);
        self.v1_async("deleteTags", params).await?;
        Ok(())
    }

    async fn list_nics(&self, vm_id: &str) -> Result<Vec<Nic>> {
        let body = self
            .v1_request("listNics", Params::new().set("virtualmachineid", vm_id))
            .await?;
        take(&body, "nic")
    }

    async fn add_nic(&self, vm_id: &str, network_id: &str, ip_address: Option<&str>) -> Result<Nic> {
        let params = Params::new()
            .set("virtualmachineid", vm_id)
            .set("networkid", network_id)
            .set_opt("ipaddress", ip_address);
        let result = self.v1_async("addNicToVirtualMachine", params).await?;
        let vm: VirtualMachine = take_required(&result, "virtualmachine")?;
        vm.nic
            .into_iter()
            .find(|n| n.networkid == network_id)
            .ok_or_else(|| ApiError::NotFound(format!("NIC on network {}", network_id)))
    }

    async fn remove_nic(&self, vm_id: &str, nic_id: &str) -> Result<()> {
        let params = Params::new()
            .set("virtualmachineid", vm_id)
            .set("nicid", nic_id);
        self.v1_async("removeNicFromVirtualMachine", params).await?;
        Ok(())
    }

    async fn update_nic_ip(&self, nic_id: &str, ip_address: &str) -> Result<Nic> {
        let params = Params::new().set("nicid", nic_id).set("ipaddress", ip_address);
        let result = self.v1_async("updateVmNicIp", params).await?;
        let vm: VirtualMachine = take_required(&result, "virtualmachine")?;
        vm.nic
            .into_iter()
            .find(|n| n.id == nic_id)
            .ok_or_else(|| ApiError::NotFound(format!("NIC {}", nic_id)))
    }

    async fn add_ip_to_nic(&self, nic_id: &str, ip_address: &str) -> Result<NicSecondaryIp> {
        let params = Params::new().set("nicid", nic_id).set("ipaddress", ip_address);
        let result = self.v1_async("addIpToNic", params).await?;
        take_required(&result, "nicsecondaryip")
    }

    async fn remove_ip_from_nic(&self, secondary_ip_id: &str) -> Result<()> {
        self.v1_async("removeIpFromNic", Params::new().set("id", secondary_ip_id))
            .await?;
        Ok(())
    }

    async fn create_ssh_key_pair(&self, name: &str) -> Result<SshKeyPair> {
        let body = self
            .v1_request("createSSHKeyPair", Params::new().set("name", name))
            .await?;
        take_required(&body, "keypair")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_virtual_machine_from_v1_payload() {
        let vm: VirtualMachine = serde_json::from_value(json!({
            "id": "vm-1",
            "name": "web-1",
            "displayname": "web-1",
            "state": "Running",
            "zonename": "ch-gva-2",
            "serviceofferingname": "Medium",
            "securitygroup": [{"id": "sg-1", "name": "default"}],
            "nic": [
                {"id": "nic-2", "networkid": "net-2", "isdefault": false, "ipaddress": "10.0.0.5"},
                {"id": "nic-1", "networkid": "net-1", "isdefault": true, "ipaddress": "198.51.100.7",
                 "secondaryip": [{"id": "sec-1", "ipaddress": "203.0.113.10"}]}
            ],
            "tags": [{"key": "env", "value": "prod"}]
        }))
        .unwrap();

        assert_eq!(vm.ip_address(), Some("198.51.100.7"));
        assert_eq!(vm.default_nic().unwrap().secondaryip.len(), 1);
        assert_eq!(vm.tag_map().get("env").map(String::as_str), Some("prod"));
        assert!(vm.affinitygroup.is_empty());
    }

    #[test]
    fn test_template_size_and_username() {
        let template: Template = serde_json::from_value(json!({
            "id": "tpl-1",
            "name": "Linux Debian 11 64-bit",
            "size": 10u64 << 30,
            "details": {"username": "debian"}
        }))
        .unwrap();

        assert_eq!(template.size_gb(), Some(10));
        assert_eq!(template.username(), Some("debian"));
    }

    #[test]
    fn test_template_filter_parse() {
        assert_eq!(TemplateFilter::parse("Featured"), Some(TemplateFilter::Featured));
        assert_eq!(TemplateFilter::parse("mine"), Some(TemplateFilter::Mine));
        assert_eq!(TemplateFilter::Mine.as_str(), "self");
        assert_eq!(TemplateFilter::parse("other"), None);
    }

    #[test]
    fn test_update_request_emptiness() {
        let mut req = UpdateVirtualMachine {
            id: "vm-1".to_string(),
            ..Default::default()
        };
        assert!(req.is_empty());
        req.security_group_ids = Some(Vec::new());
        assert!(!req.is_empty());
    }
}
