//! DNS domains and records

use crate::client::Client;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub unicode_name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub expires_on: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    #[serde(default)]
    pub domain_id: i64,
    /// Relative name; empty for the apex
    #[serde(default)]
    pub name: String,
    pub record_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub prio: Option<i64>,
}

impl Record {
    /// Records the platform manages on every domain
    pub fn is_platform_managed(&self) -> bool {
        matches!(self.record_type.as_str(), "NS" | "SOA")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordRequest {
    pub name: String,
    pub record_type: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prio: Option<i64>,
}

#[derive(Serialize, Deserialize)]
struct DomainEnvelope<T> {
    domain: T,
}

#[derive(Serialize, Deserialize)]
struct RecordEnvelope<T> {
    record: T,
}

#[derive(Serialize)]
struct NewDomain<'a> {
    name: &'a str,
}

#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn create_domain(&self, name: &str) -> Result<Domain>;

    async fn get_domain(&self, name: &str) -> Result<Domain>;

    async fn list_domains(&self) -> Result<Vec<Domain>>;

    async fn delete_domain(&self, name: &str) -> Result<()>;

    async fn create_record(&self, domain: &str, req: &RecordRequest) -> Result<Record>;

    async fn get_record(&self, domain: &str, id: i64) -> Result<Record>;

    async fn list_records(&self, domain: &str) -> Result<Vec<Record>>;

    async fn update_record(&self, domain: &str, id: i64, req: &RecordRequest) -> Result<Record>;

    async fn delete_record(&self, domain: &str, id: i64) -> Result<()>;
}

#[async_trait]
impl DnsApi for Client {
    async fn create_domain(&self, name: &str) -> Result<Domain> {
        let body = DomainEnvelope {
            domain: NewDomain { name },
        };
        let created: DomainEnvelope<Domain> =
            self.dns_request(Method::POST, "/domains", Some(&body)).await?;
        Ok(created.domain)
    }

    async fn get_domain(&self, name: &str) -> Result<Domain> {
        let found: DomainEnvelope<Domain> = self
            .dns_request(Method::GET, &format!("/domains/{}", name), None::<&()>)
            .await?;
        Ok(found.domain)
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let list: Vec<DomainEnvelope<Domain>> = self
            .dns_request(Method::GET, "/domains", None::<&()>)
            .await?;
        Ok(list.into_iter().map(|d| d.domain).collect())
    }

    async fn delete_domain(&self, name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .dns_request(Method::DELETE, &format!("/domains/{}", name), None::<&()>)
            .await?;
        Ok(())
    }

    async fn create_record(&self, domain: &str, req: &RecordRequest) -> Result<Record> {
        let body = RecordEnvelope { record: req };
        let created: RecordEnvelope<Record> = self
            .dns_request(Method::POST, &format!("/domains/{}/records", domain), Some(&body))
            .await?;
        Ok(created.record)
    }

    async fn get_record(&self, domain: &str, id: i64) -> Result<Record> {
        let found: RecordEnvelope<Record> = self
            .dns_request(
                Method::GET,
                &format!("/domains/{}/records/{}", domain, id),
                None::<&()>,
            )
            .await?;
        Ok(found.record)
    }

    async fn list_records(&self, domain: &str) -> Result<Vec<Record>> {
        let list: Vec<RecordEnvelope<Record>> = self
            .dns_request(Method::GET, &format!("/domains/{}/records", domain), None::<&()>)
            .await?;
        Ok(list.into_iter().map(|r| r.record).collect())
    }

    async fn update_record(&self, domain: &str, id: i64, req: &RecordRequest) -> Result<Record> {
        let body = RecordEnvelope { record: req };
        let updated: RecordEnvelope<Record> = self
            .dns_request(
                Method::PUT,
                &format!("/domains/{}/records/{}", domain, id),
                Some(&body),
            )
            .await?;
        Ok(updated.record)
    }

    async fn delete_record(&self, domain: &str, id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .dns_request(
                Method::DELETE,
                &format!("/domains/{}/records/{}", domain, id),
                None::<&()>,
            )
            .await?;
        Ok(())
    }
}
