//! Reconcilers, one module per resource kind

pub mod anti_affinity_group;
pub mod compute;
pub mod database;
pub mod domain;
pub mod domain_record;
pub mod elastic_ip;
pub mod iam_access_key;
pub mod instance_pool;
pub mod nic;
pub mod nlb;
pub mod nlb_service;
pub mod private_network;
pub mod secondary_ip;
pub mod security_group;
pub mod security_group_rule;
pub mod security_group_rules;
pub mod ssh_key;

use crate::resource::Resource;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use anti_affinity_group::AntiAffinityGroupResource;
pub use compute::ComputeResource;
pub use database::DatabaseResource;
pub use domain::DomainResource;
pub use domain_record::DomainRecordResource;
pub use elastic_ip::ElasticIpResource;
pub use iam_access_key::IamAccessKeyResource;
pub use instance_pool::InstancePoolResource;
pub use nic::NicResource;
pub use nlb::NlbResource;
pub use nlb_service::NlbServiceResource;
pub use private_network::PrivateNetworkResource;
pub use secondary_ip::SecondaryIpResource;
pub use security_group::SecurityGroupResource;
pub use security_group_rule::SecurityGroupRuleResource;
pub use security_group_rules::SecurityGroupRulesResource;
pub use ssh_key::SshKeyResource;

/// Every resource kind, keyed by its engine-facing name
pub fn registry() -> BTreeMap<&'static str, Arc<dyn Resource>> {
    let all: Vec<Arc<dyn Resource>> = vec![
        Arc::new(ComputeResource),
        Arc::new(InstancePoolResource),
        Arc::new(PrivateNetworkResource),
        Arc::new(NicResource),
        Arc::new(ElasticIpResource),
        Arc::new(SecondaryIpResource),
        Arc::new(SecurityGroupResource),
        Arc::new(SecurityGroupRuleResource),
        Arc::new(SecurityGroupRulesResource),
        Arc::new(AntiAffinityGroupResource),
        Arc::new(SshKeyResource),
        Arc::new(DomainResource),
        Arc::new(DomainRecordResource),
        Arc::new(NlbResource),
        Arc::new(NlbServiceResource),
        Arc::new(DatabaseResource),
        Arc::new(IamAccessKeyResource),
    ];
    all.into_iter().map(|r| (r.kind(), r)).collect()
}
