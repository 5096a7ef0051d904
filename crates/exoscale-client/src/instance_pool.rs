//! Instance pools, instance types and (read-only) instances

use crate::client::{Client, IdRef};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstancePool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub disk_size: i64,
    #[serde(default)]
    pub instance_type: Option<IdRef>,
    #[serde(default)]
    pub template: Option<IdRef>,
    #[serde(default)]
    pub ssh_key: Option<NameRef>,
    #[serde(default)]
    pub instance_prefix: Option<String>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default)]
    pub ipv6_enabled: bool,
    #[serde(default)]
    pub deploy_target: Option<IdRef>,
    #[serde(default)]
    pub anti_affinity_groups: Vec<IdRef>,
    #[serde(default)]
    pub security_groups: Vec<IdRef>,
    #[serde(default)]
    pub private_networks: Vec<IdRef>,
    #[serde(default)]
    pub elastic_ips: Vec<IdRef>,
    #[serde(default)]
    pub instances: Vec<IdRef>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl InstancePool {
    /// Pool has settled: no scaling or update in flight
    pub fn is_converged(&self) -> bool {
        self.state == "running"
            && self.instances.len() as i64 == self.size
    }
}

/// SSH keys are referenced by name in v2
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

/// Body of instance pool creation and update
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstancePoolRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<NameRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_target: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anti_affinity_groups: Option<Vec<IdRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<IdRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_networks: Option<Vec<IdRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elastic_ips: Option<Vec<IdRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    pub id: String,
    /// Family, e.g. `standard`
    pub family: String,
    /// Size within the family, e.g. `medium`
    pub size: String,
    #[serde(default)]
    pub cpus: Option<i64>,
    #[serde(default)]
    pub memory: Option<i64>,
}

impl InstanceType {
    /// `family.size` form used by configurations
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.family, self.size)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Instance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub ipv6_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InstancePoolList {
    #[serde(default)]
    instance_pools: Vec<InstancePool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InstanceTypeList {
    #[serde(default)]
    instance_types: Vec<InstanceType>,
}

#[derive(Serialize)]
struct ScaleRequest {
    size: i64,
}

#[async_trait]
pub trait InstancePoolApi: Send + Sync {
    async fn create_instance_pool(&self, zone: &str, req: &InstancePoolRequest) -> Result<InstancePool>;

    async fn get_instance_pool(&self, zone: &str, id: &str) -> Result<InstancePool>;

    async fn list_instance_pools(&self, zone: &str) -> Result<Vec<InstancePool>>;

    async fn update_instance_pool(&self, zone: &str, id: &str, req: &InstancePoolRequest) -> Result<()>;

    async fn scale_instance_pool(&self, zone: &str, id: &str, size: i64) -> Result<()>;

    async fn delete_instance_pool(&self, zone: &str, id: &str) -> Result<()>;

    async fn list_instance_types(&self, zone: &str) -> Result<Vec<InstanceType>>;

    async fn get_instance(&self, zone: &str, id: &str) -> Result<Instance>;

    /// Look an instance type up by `family.size` (case-insensitive)
    async fn find_instance_type(&self, zone: &str, name: &str) -> Result<InstanceType> {
        let (family, size) = name
            .split_once('.')
            .ok_or_else(|| ApiError::Invalid(format!("instance type {:?} is not family.size", name)))?;
        self.list_instance_types(zone)
            .await?
            .into_iter()
            .find(|t| t.family.eq_ignore_ascii_case(family) && t.size.eq_ignore_ascii_case(size))
            .ok_or_else(|| ApiError::NotFound(format!("instance type {}", name)))
    }
}

#[async_trait]
impl InstancePoolApi for Client {
    async fn create_instance_pool(&self, zone: &str, req: &InstancePoolRequest) -> Result<InstancePool> {
        let op = self
            .v2_operation(zone, Method::POST, "/instance-pool", Some(req))
            .await?;
        let id = op
            .reference_id()
            .ok_or_else(|| ApiError::Transport("instance pool creation returned no reference".to_string()))?;
        self.get_instance_pool(zone, id).await
    }

    async fn get_instance_pool(&self, zone: &str, id: &str) -> Result<InstancePool> {
        self.v2_get(zone, &format!("/instance-pool/{}", id)).await
    }

    async fn list_instance_pools(&self, zone: &str) -> Result<Vec<InstancePool>> {
        let list: InstancePoolList = self.v2_get(zone, "/instance-pool").await?;
        Ok(list.instance_pools)
    }

    async fn update_instance_pool(&self, zone: &str, id: &str, req: &InstancePoolRequest) -> Result<()> {
        self.v2_operation(zone, Method::PUT, &format!("/instance-pool/{}", id), Some(req))
            .await?;
        Ok(())
    }

    async fn scale_instance_pool(&self, zone: &str, id: &str, size: i64) -> Result<()> {
        self.v2_operation(
            zone,
            Method::PUT,
            &format!("/instance-pool/{}:scale", id),
            Some(&ScaleRequest { size }),
        )
        .await?;
        Ok(())
    }

    async fn delete_instance_pool(&self, zone: &str, id: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/instance-pool/{}", id), None::<&()>)
            .await?;
        Ok(())
    }

    async fn list_instance_types(&self, zone: &str) -> Result<Vec<InstanceType>> {
        let list: InstanceTypeList = self.v2_get(zone, "/instance-type").await?;
        Ok(list.instance_types)
    }

    async fn get_instance(&self, zone: &str, id: &str) -> Result<Instance> {
        self.v2_get(zone, &format!("/instance/{}", id)).await
    }
}
