//! Security groups and their rules, anti-affinity groups and SSH keys

use crate::client::{Client, IdRef};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icmp {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,
}

/// Reference to a security group from inside a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecurityGroupRule {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `ingress` or `egress`
    pub flow_direction: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub start_port: Option<i64>,
    #[serde(default)]
    pub end_port: Option<i64>,
    #[serde(default)]
    pub icmp: Option<Icmp>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub security_group: Option<GroupRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecurityGroupRuleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub flow_direction: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp: Option<Icmp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group: Option<GroupRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

impl SecurityGroup {
    pub fn rule(&self, id: &str) -> Option<&SecurityGroupRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AntiAffinityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instances: Vec<IdRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshKey {
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
}

#[derive(Serialize)]
struct NamedRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct RegisterSshKey<'a> {
    name: &'a str,
    public_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SecurityGroupList {
    #[serde(default)]
    security_groups: Vec<SecurityGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AntiAffinityGroupList {
    #[serde(default)]
    anti_affinity_groups: Vec<AntiAffinityGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SshKeyList {
    #[serde(default)]
    ssh_keys: Vec<SshKey>,
}

#[async_trait]
pub trait SecurityApi: Send + Sync {
    async fn create_security_group(
        &self,
        zone: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<SecurityGroup>;

    async fn get_security_group(&self, zone: &str, id: &str) -> Result<SecurityGroup>;

    async fn list_security_groups(&self, zone: &str) -> Result<Vec<SecurityGroup>>;

    async fn delete_security_group(&self, zone: &str, id: &str) -> Result<()>;

    /// Add one rule and return it as the API recorded it
    async fn add_security_group_rule(
        &self,
        zone: &str,
        group_id: &str,
        rule: &SecurityGroupRuleRequest,
    ) -> Result<SecurityGroupRule>;

    async fn delete_security_group_rule(&self, zone: &str, group_id: &str, rule_id: &str) -> Result<()>;

    async fn create_anti_affinity_group(
        &self,
        zone: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<AntiAffinityGroup>;

    async fn get_anti_affinity_group(&self, zone: &str, id: &str) -> Result<AntiAffinityGroup>;

    async fn list_anti_affinity_groups(&self, zone: &str) -> Result<Vec<AntiAffinityGroup>>;

    async fn delete_anti_affinity_group(&self, zone: &str, id: &str) -> Result<()>;

    async fn register_ssh_key(&self, zone: &str, name: &str, public_key: &str) -> Result<SshKey>;

    async fn get_ssh_key(&self, zone: &str, name: &str) -> Result<SshKey>;

    async fn list_ssh_keys(&self, zone: &str) -> Result<Vec<SshKey>>;

    async fn delete_ssh_key(&self, zone: &str, name: &str) -> Result<()>;

    /// Find a security group by ID or name
    async fn find_security_group(&self, zone: &str, needle: &str) -> Result<SecurityGroup> {
        let groups = self.list_security_groups(zone).await?;
        crate::api::find_one(groups, "security group", needle, |g| {
            (g.id.as_str(), g.name.as_str())
        })
    }

    /// Find an anti-affinity group by ID or name
    async fn find_anti_affinity_group(&self, zone: &str, needle: &str) -> Result<AntiAffinityGroup> {
        let groups = self.list_anti_affinity_groups(zone).await?;
        crate::api::find_one(groups, "anti-affinity group", needle, |g| {
            (g.id.as_str(), g.name.as_str())
        })
    }
}

#[async_trait]
impl SecurityApi for Client {
    async fn create_security_group(
        &self,
        zone: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<SecurityGroup> {
        let body = NamedRequest { name, description };
        let op = self
            .v2_operation(zone, Method::POST, "/security-group", Some(&body))
            .await?;
        let id = op.reference_id().ok_or_else(|| {
            ApiError::Transport("security group creation returned no reference".to_string())
        })?;
        self.get_security_group(zone, id).await
    }

    async fn get_security_group(&self, zone: &str, id: &str) -> Result<SecurityGroup> {
        self.v2_get(zone, &format!("/security-group/{}", id)).await
    }

    async fn list_security_groups(&self, zone: &str) -> Result<Vec<SecurityGroup>> {
        let list: SecurityGroupList = self.v2_get(zone, "/security-group").await?;
        Ok(list.security_groups)
    }

    async fn delete_security_group(&self, zone: &str, id: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/security-group/{}", id), None::<&()>)
            .await?;
        Ok(())
    }

    async fn add_security_group_rule(
        &self,
        zone: &str,
        group_id: &str,
        rule: &SecurityGroupRuleRequest,
    ) -> Result<SecurityGroupRule> {
        let known: HashSet<String> = self
            .get_security_group(zone, group_id)
            .await?
            .rules
            .into_iter()
            .map(|r| r.id)
            .collect();

        self.v2_operation(
            zone,
            Method::POST,
            &format!("/security-group/{}/rules", group_id),
            Some(rule),
        )
        .await?;

        // the operation references the group, so the new rule is the unknown one
        self.get_security_group(zone, group_id)
            .await?
            .rules
            .into_iter()
            .find(|r| {
                !known.contains(&r.id)
                    && r.flow_direction == rule.flow_direction
                    && r.protocol.eq_ignore_ascii_case(&rule.protocol)
            })
            .ok_or_else(|| {
                ApiError::NotFound(format!("newly added rule in security group {}", group_id))
            })
    }

    async fn delete_security_group_rule(&self, zone: &str, group_id: &str, rule_id: &str) -> Result<()> {
        self.v2_operation(
            zone,
            Method::DELETE,
            &format!("/security-group/{}/rules/{}", group_id, rule_id),
            None::<&()>,
        )
        .await?;
        Ok(())
    }

    async fn create_anti_affinity_group(
        &self,
        zone: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<AntiAffinityGroup> {
        let body = NamedRequest { name, description };
        let op = self
            .v2_operation(zone, Method::POST, "/anti-affinity-group", Some(&body))
            .await?;
        let id = op.reference_id().ok_or_else(|| {
            ApiError::Transport("anti-affinity group creation returned no reference".to_string())
        })?;
        self.get_anti_affinity_group(zone, id).await
    }

    async fn get_anti_affinity_group(&self, zone: &str, id: &str) -> Result<AntiAffinityGroup> {
        self.v2_get(zone, &format!("/anti-affinity-group/{}", id)).await
    }

    async fn list_anti_affinity_groups(&self, zone: &str) -> Result<Vec<AntiAffinityGroup>> {
        let list: AntiAffinityGroupList = self.v2_get(zone, "/anti-affinity-group").await?;
        Ok(list.anti_affinity_groups)
    }

    async fn delete_anti_affinity_group(&self, zone: &str, id: &str) -> Result<()> {
        self.v2_operation(
            zone,
            Method::DELETE,
            &format!("/anti-affinity-group/{}", id),
            None::<&()>,
        )
        .await?;
        Ok(())
    }

    async fn register_ssh_key(&self, zone: &str, name: &str, public_key: &str) -> Result<SshKey> {
        let body = RegisterSshKey { name, public_key };
        self.v2_operation(zone, Method::POST, "/ssh-key", Some(&body))
            .await?;
        self.get_ssh_key(zone, name).await
    }

    async fn get_ssh_key(&self, zone: &str, name: &str) -> Result<SshKey> {
        self.v2_get(zone, &format!("/ssh-key/{}", name)).await
    }

    async fn list_ssh_keys(&self, zone: &str) -> Result<Vec<SshKey>> {
        let list: SshKeyList = self.v2_get(zone, "/ssh-key").await?;
        Ok(list.ssh_keys)
    }

    async fn delete_ssh_key(&self, zone: &str, name: &str) -> Result<()> {
        self.v2_operation(zone, Method::DELETE, &format!("/ssh-key/{}", name), None::<&()>)
            .await?;
        Ok(())
    }
}
