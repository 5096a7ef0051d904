//! Managed database services

use crate::client::Client;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Kafka,
    Mysql,
    Pg,
    Redis,
    Opensearch,
}

impl DatabaseType {
    pub const ALL: [DatabaseType; 5] = [
        DatabaseType::Kafka,
        DatabaseType::Mysql,
        DatabaseType::Pg,
        DatabaseType::Redis,
        DatabaseType::Opensearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::Kafka => "kafka",
            DatabaseType::Mysql => "mysql",
            DatabaseType::Pg => "pg",
            DatabaseType::Redis => "redis",
            DatabaseType::Opensearch => "opensearch",
        }
    }

    /// Path segment of the typed endpoints (`/dbaas-{segment}/{name}`)
    pub fn path_segment(&self) -> &'static str {
        match self {
            DatabaseType::Pg => "postgres",
            other => other.as_str(),
        }
    }

    /// Body key carrying the typed user configuration
    pub fn settings_key(&self) -> String {
        format!("{}-settings", self.as_str())
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        DatabaseType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ApiError::Invalid(format!("unsupported database type {:?}", s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintenance {
    /// Day of week (`monday`..`sunday`, or `never`)
    pub dow: String,
    /// `HH:MM:SS`
    pub time: String,
}

/// Service summary as returned by the cross-type listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DatabaseType,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseService {
    pub name: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub maintenance: Option<Maintenance>,
    #[serde(default)]
    pub termination_protection: bool,
    #[serde(default)]
    pub node_count: Option<i64>,
    #[serde(default)]
    pub node_cpu_count: Option<i64>,
    #[serde(default)]
    pub node_memory: Option<i64>,
    #[serde(default)]
    pub disk_size: Option<i64>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Type-specific fields, including the `<type>-settings` user configuration
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DatabaseService {
    pub fn settings(&self, kind: DatabaseType) -> Option<&serde_json::Value> {
        self.extra.get(&kind.settings_key())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRequest {
    pub plan: Option<String>,
    pub version: Option<String>,
    pub maintenance: Option<Maintenance>,
    pub termination_protection: Option<bool>,
    pub settings: Option<serde_json::Value>,
}

impl DatabaseRequest {
    /// Request body for the given service type
    pub fn to_body(&self, kind: DatabaseType) -> Result<serde_json::Value> {
        let mut body = serde_json::Map::new();
        if let Some(plan) = &self.plan {
            body.insert("plan".to_string(), plan.clone().into());
        }
        if let Some(version) = &self.version {
            body.insert("version".to_string(), version.clone().into());
        }
        if let Some(maintenance) = &self.maintenance {
            body.insert("maintenance".to_string(), serde_json::to_value(maintenance)?);
        }
        if let Some(protection) = self.termination_protection {
            body.insert("termination-protection".to_string(), protection.into());
        }
        if let Some(settings) = &self.settings {
            body.insert(kind.settings_key(), settings.clone());
        }
        Ok(serde_json::Value::Object(body))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DatabaseList {
    #[serde(default)]
    dbaas_services: Vec<DatabaseSummary>,
}

#[derive(Deserialize)]
struct CaCertificate {
    certificate: String,
}

#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn create_database(
        &self,
        zone: &str,
        kind: DatabaseType,
        name: &str,
        req: &DatabaseRequest,
    ) -> Result<DatabaseService>;

    async fn get_database(&self, zone: &str, kind: DatabaseType, name: &str) -> Result<DatabaseService>;

    async fn update_database(
        &self,
        zone: &str,
        kind: DatabaseType,
        name: &str,
        req: &DatabaseRequest,
    ) -> Result<()>;

    async fn delete_database(&self, zone: &str, name: &str) -> Result<()>;

    async fn list_databases(&self, zone: &str) -> Result<Vec<DatabaseSummary>>;

    async fn get_database_ca_certificate(&self, zone: &str) -> Result<String>;

    /// Discover the type of a service from its name
    async fn find_database(&self, zone: &str, name: &str) -> Result<DatabaseSummary> {
        self.list_databases(zone)
            .await?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ApiError::NotFound(format!("database service {}", name)))
    }
}

#[async_trait]
impl DatabaseApi for Client {
    async fn create_database(
        &self,
        zone: &str,
        kind: DatabaseType,
        name: &str,
        req: &DatabaseRequest,
    ) -> Result<DatabaseService> {
        let body = req.to_body(kind)?;
        self.v2_operation(
            zone,
            Method::POST,
            &format!("/dbaas-{}/{}", kind.path_segment(), name),
            Some(&body),
        )
        .await?;
        self.get_database(zone, kind, name).await
    }

    async fn get_database(&self, zone: &str, kind: DatabaseType, name: &str) -> Result<DatabaseService> {
        self.v2_get(zone, &format!("/dbaas-{}/{}", kind.path_segment(), name))
            .await
    }

    async fn update_database(
        &self,
        zone: &str,
        kind: DatabaseType,
        name: &str,
        req: &DatabaseRequest,
    ) -> Result<()> {
        let body = req.to_body(kind)?;
        self.v2_operation(
            zone,
            Method::PUT,
            &format!("/dbaas-{}/{}", kind.path_segment(), name),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_database(&self, zone: &str, name: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/dbaas-service/{}", name), None::<&()>)
            .await?;
        Ok(())
    }

    async fn list_databases(&self, zone: &str) -> Result<Vec<DatabaseSummary>> {
        let list: DatabaseList = self.v2_get(zone, "/dbaas-service").await?;
        Ok(list.dbaas_services)
    }

    async fn get_database_ca_certificate(&self, zone: &str) -> Result<String> {
        let ca: CaCertificate = self.v2_get(zone, "/dbaas-ca-certificate").await?;
        Ok(ca.certificate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_names() {
        assert_eq!(DatabaseType::Pg.path_segment(), "postgres");
        assert_eq!(DatabaseType::Kafka.path_segment(), "kafka");
        assert_eq!(DatabaseType::Redis.settings_key(), "redis-settings");
        assert_eq!("opensearch".parse::<DatabaseType>().unwrap(), DatabaseType::Opensearch);
        assert!("mongo".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn test_request_body_uses_typed_settings_key() {
        let req = DatabaseRequest {
            plan: Some("startup-4".to_string()),
            termination_protection: Some(true),
            settings: Some(json!({"max_connections": 100})),
            ..Default::default()
        };
        assert_eq!(
            req.to_body(DatabaseType::Pg).unwrap(),
            json!({
                "plan": "startup-4",
                "termination-protection": true,
                "pg-settings": {"max_connections": 100}
            })
        );
    }

    #[test]
    fn test_service_keeps_settings_in_extra() {
        let svc: DatabaseService = serde_json::from_value(json!({
            "name": "db",
            "plan": "hobbyist-2",
            "termination-protection": false,
            "maintenance": {"dow": "monday", "time": "01:00:00"},
            "mysql-settings": {"sql_mode": "ANSI"}
        }))
        .unwrap();
        assert_eq!(
            svc.settings(DatabaseType::Mysql),
            Some(&json!({"sql_mode": "ANSI"}))
        );
        assert!(svc.settings(DatabaseType::Pg).is_none());
    }
}
