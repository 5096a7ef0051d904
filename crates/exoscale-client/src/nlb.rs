//! Network load balancers and their services

use crate::client::{Client, IdRef};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Healthcheck {
    pub mode: String,
    pub port: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_sni: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadBalancerService {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub target_port: i64,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub instance_pool: Option<IdRef>,
    #[serde(default)]
    pub healthcheck: Option<Healthcheck>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub services: Vec<LoadBalancerService>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl LoadBalancer {
    pub fn service(&self, id: &str) -> Option<&LoadBalancerService> {
        self.services.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadBalancerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadBalancerServiceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_pool: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LoadBalancerList {
    #[serde(default)]
    load_balancers: Vec<LoadBalancer>,
}

#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn create_load_balancer(&self, zone: &str, req: &LoadBalancerRequest) -> Result<LoadBalancer>;

    async fn get_load_balancer(&self, zone: &str, id: &str) -> Result<LoadBalancer>;

    async fn list_load_balancers(&self, zone: &str) -> Result<Vec<LoadBalancer>>;

    async fn update_load_balancer(&self, zone: &str, id: &str, req: &LoadBalancerRequest) -> Result<()>;

    async fn delete_load_balancer(&self, zone: &str, id: &str) -> Result<()>;

    async fn add_load_balancer_service(
        &self,
        zone: &str,
        nlb_id: &str,
        req: &LoadBalancerServiceRequest,
    ) -> Result<LoadBalancerService>;

    async fn update_load_balancer_service(
        &self,
        zone: &str,
        nlb_id: &str,
        service_id: &str,
        req: &LoadBalancerServiceRequest,
    ) -> Result<()>;

    async fn delete_load_balancer_service(&self, zone: &str, nlb_id: &str, service_id: &str) -> Result<()>;

    async fn get_load_balancer_service(
        &self,
        zone: &str,
        nlb_id: &str,
        service_id: &str,
    ) -> Result<LoadBalancerService> {
        self.get_load_balancer(zone, nlb_id)
            .await?
            .services
            .into_iter()
            .find(|s| s.id == service_id)
            .ok_or_else(|| ApiError::NotFound(format!("NLB service {}", service_id)))
    }

    /// Find a load balancer by ID or name
    async fn find_load_balancer(&self, zone: &str, needle: &str) -> Result<LoadBalancer> {
        let nlbs = self.list_load_balancers(zone).await?;
        crate::api::find_one(nlbs, "network load balancer", needle, |n| {
            (n.id.as_str(), n.name.as_str())
        })
    }
}

#[async_trait]
impl LoadBalancerApi for Client {
    async fn create_load_balancer(&self, zone: &str, req: &LoadBalancerRequest) -> Result<LoadBalancer> {
        let op = self
            .v2_operation(zone, Method::POST, "/load-balancer", Some(req))
            .await?;
        let id = op.reference_id().ok_or_else(|| {
            ApiError::Transport("load balancer creation returned no reference".to_string())
        })?;
        self.get_load_balancer(zone, id).await
    }

    async fn get_load_balancer(&self, zone: &str, id: &str) -> Result<LoadBalancer> {
        self.v2_get(zone, &format!("/load-balancer/{}", id)).await
    }

    async fn list_load_balancers(&self, zone: &str) -> Result<Vec<LoadBalancer>> {
        let list: LoadBalancerList = self.v2_get(zone, "/load-balancer").await?;
        Ok(list.load_balancers)
    }

    async fn update_load_balancer(&self, zone: &str, id: &str, req: &LoadBalancerRequest) -> Result<()> {
        self.v2_operation(zone, Method::PUT, &format!("/load-balancer/{}", id), Some(req))
            .await?;
        Ok(())
    }

    async fn delete_load_balancer(&self, zone: &str, id: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/load-balancer/{}", id), None::<&()>)
            .await?;
        Ok(())
    }

    async fn add_load_balancer_service(
        &self,
        zone: &str,
        nlb_id: &str,
        req: &LoadBalancerServiceRequest,
    ) -> Result<LoadBalancerService> {
        let known: HashSet<String> = self
            .get_load_balancer(zone, nlb_id)
            .await?
            .services
            .into_iter()
            .map(|s| s.id)
            .collect();

        self.v2_operation(
            zone,
            Method::POST,
            &format!("/load-balancer/{}/service", nlb_id),
            Some(req),
        )
        .await?;

        self.get_load_balancer(zone, nlb_id)
            .await?
            .services
            .into_iter()
            .find(|s| !known.contains(&s.id) && Some(&s.name) == req.name.as_ref())
            .ok_or_else(|| ApiError::NotFound(format!("newly added service on NLB {}", nlb_id)))
    }

    async fn update_load_balancer_service(
        &self,
        zone: &str,
        nlb_id: &str,
        service_id: &str,
        req: &LoadBalancerServiceRequest,
    ) -> Result<()> {
        self.v2_operation(
            zone,
            Method::PUT,
            &format!("/load-balancer/{}/service/{}", nlb_id, service_id),
            Some(req),
        )
        .await?;
        Ok(())
    }

    async fn delete_load_balancer_service(&self, zone: &str, nlb_id: &str, service_id: &str) -> Result<()> {
        self.v2_operation(
            zone,
            Method::DELETE,
            &format!("/load-balancer/{}/service/{}", nlb_id, service_id),
            None::<&()>,
        )
        .await?;
        Ok(())
    }
}
