//! Private networks and elastic IPs

use crate::client::Client;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrivateNetwork {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_ip: Option<String>,
    #[serde(default)]
    pub end_ip: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PrivateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ElasticIpHealthcheck {
    pub mode: String,
    pub port: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikes_ok: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikes_fail: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_sni: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_skip_verify: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ElasticIp {
    pub id: String,
    pub ip: String,
    #[serde(default)]
    pub addressfamily: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub healthcheck: Option<ElasticIpHealthcheck>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ElasticIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addressfamily: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<ElasticIpHealthcheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PrivateNetworkList {
    #[serde(default)]
    private_networks: Vec<PrivateNetwork>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ElasticIpList {
    #[serde(default)]
    elastic_ips: Vec<ElasticIp>,
}

#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn create_private_network(&self, zone: &str, req: &PrivateNetworkRequest) -> Result<PrivateNetwork>;

    async fn get_private_network(&self, zone: &str, id: &str) -> Result<PrivateNetwork>;

    async fn list_private_networks(&self, zone: &str) -> Result<Vec<PrivateNetwork>>;

    async fn update_private_network(&self, zone: &str, id: &str, req: &PrivateNetworkRequest) -> Result<()>;

    async fn delete_private_network(&self, zone: &str, id: &str) -> Result<()>;

    async fn create_elastic_ip(&self, zone: &str, req: &ElasticIpRequest) -> Result<ElasticIp>;

    async fn get_elastic_ip(&self, zone: &str, id: &str) -> Result<ElasticIp>;

    async fn list_elastic_ips(&self, zone: &str) -> Result<Vec<ElasticIp>>;

    async fn update_elastic_ip(&self, zone: &str, id: &str, req: &ElasticIpRequest) -> Result<()>;

    async fn delete_elastic_ip(&self, zone: &str, id: &str) -> Result<()>;

    /// Reset one field (e.g. `healthcheck`) of an elastic IP to its default
    async fn reset_elastic_ip_field(&self, zone: &str, id: &str, field: &str) -> Result<()>;

    /// Find a private network by ID or name
    async fn find_private_network(&self, zone: &str, needle: &str) -> Result<PrivateNetwork> {
        let networks = self.list_private_networks(zone).await?;
        crate::api::find_one(networks, "private network", needle, |n| (n.id.as_str(), n.name.as_str()))
    }

    /// Find an elastic IP by ID or address
    async fn find_elastic_ip(&self, zone: &str, needle: &str) -> Result<ElasticIp> {
        let ips = self.list_elastic_ips(zone).await?;
        crate::api::find_one(ips, "elastic IP", needle, |e| (e.id.as_str(), e.ip.as_str()))
    }
}

#[async_trait]
impl NetworkApi for Client {
    async fn create_private_network(&self, zone: &str, req: &PrivateNetworkRequest) -> Result<PrivateNetwork> {
        let op = self
            .v2_operation(zone, Method::POST, "/private-network", Some(req))
            .await?;
        let id = op.reference_id().ok_or_else(|| {
            ApiError::Transport("private network creation returned no reference".to_string())
        })?;
        self.get_private_network(zone, id).await
    }

    async fn get_private_network(&self, zone: &str, id: &str) -> Result<PrivateNetwork> {
        self.v2_get(zone, &format!("/private-network/{}", id)).await
    }

    async fn list_private_networks(&self, zone: &str) -> Result<Vec<PrivateNetwork>> {
        let list: PrivateNetworkList = self.v2_get(zone, "/private-network").await?;
        Ok(list.private_networks)
    }

    async fn update_private_network(&self, zone: &str, id: &str, req: &PrivateNetworkRequest) -> Result<()> {
        self.v2_operation(zone, Method::PUT, &format!("/private-network/{}", id), Some(req))
            .await?;
        Ok(())
    }

    async fn delete_private_network(&self, zone: &str, id: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/private-network/{}", id), None::<&()>)
            .await?;
        Ok(())
    }

    async fn create_elastic_ip(&self, zone: &str, req: &ElasticIpRequest) -> Result<ElasticIp> {
        let op = self
            .v2_operation(zone, Method::POST, "/elastic-ip", Some(req))
            .await?;
        let id = op.reference_id().ok_or_else(|| {
            ApiError::Transport("elastic IP creation returned no reference".to_string())
        })?;
        self.get_elastic_ip(zone, id).await
    }

    async fn get_elastic_ip(&self, zone: &str, id: &str) -> Result<ElasticIp> {
        self.v2_get(zone, &format!("/elastic-ip/{}", id)).await
    }

    async fn list_elastic_ips(&self, zone: &str) -> Result<Vec<ElasticIp>> {
        let list: ElasticIpList = self.v2_get(zone, "/elastic-ip").await?;
        Ok(list.elastic_ips)
    }

    async fn update_elastic_ip(&self, zone: &str, id: &str, req: &ElasticIpRequest) -> Result<()> {
        self.v2_operation(zone, Method::PUT, &format!("/elastic-ip/{}", id), Some(req))
            .await?;
        Ok(())
    }

    async fn delete_elastic_ip(&self, zone: &str, id: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/elastic-ip/{}", id), None::<&()>)
            .await?;
        Ok(())
    }

    async fn reset_elastic_ip_field(&self, zone: &str, id: &str, field: &str) -> Result<()> {
        self.v2_operation(
            zone,
            Method::DELETE,
            &format!("/elastic-ip/{}/{}", id, field),
            None::<&()>,
        )
        .await?;
        Ok(())
    }
}
