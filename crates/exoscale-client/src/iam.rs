//! IAM API access keys

use crate::client::Client;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource restriction of an access key, textual form `domain/type:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccessKeyResource {
    pub domain: String,
    pub resource_type: String,
    pub resource_name: String,
}

impl fmt::Display for AccessKeyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.domain, self.resource_type, self.resource_name)
    }
}

impl FromStr for AccessKeyResource {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ApiError::Invalid(format!("resource {:?} is not domain/type:name", s));
        let (domain, rest) = s.split_once('/').ok_or_else(invalid)?;
        let (resource_type, resource_name) = rest.split_once(':').ok_or_else(invalid)?;
        if domain.is_empty() || resource_type.is_empty() || resource_name.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            domain: domain.to_string(),
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessKey {
    pub key: String,
    pub name: String,
    /// Only returned on creation
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub resources: Vec<AccessKeyResource>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccessKeyRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<AccessKeyResource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait IamApi: Send + Sync {
    async fn create_access_key(&self, zone: &str, req: &AccessKeyRequest) -> Result<AccessKey>;

    async fn get_access_key(&self, zone: &str, key: &str) -> Result<AccessKey>;

    async fn revoke_access_key(&self, zone: &str, key: &str) -> Result<()>;
}

#[async_trait]
impl IamApi for Client {
    async fn create_access_key(&self, zone: &str, req: &AccessKeyRequest) -> Result<AccessKey> {
        // creation answers with the key itself, not an operation
        self.v2_request(zone, Method::POST, "/access-key", &[], Some(req))
            .await
    }

    async fn get_access_key(&self, zone: &str, key: &str) -> Result<AccessKey> {
        self.v2_get(zone, &format!("/access-key/{}", key)).await
    }

    async fn revoke_access_key(&self, zone: &str, key: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/access-key/{}", key), None::<&()>)
            .await?;
        Ok(())
    }
}
