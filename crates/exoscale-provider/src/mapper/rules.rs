//! Atomic security group rules and their synthetic local identifiers
//!
//! A rule block expands into atomic rules, one per source and port range
//! (or per source for ICMP and portless protocols). Each created rule is
//! tracked locally as `<remote-id>_<PROTOCOL>_<source>[_<start>-<end>|_<type>:<code>]`.

use crate::error::{ProviderError, Result};
use crate::mapper::PortRange;
use exoscale_client::security::{GroupRef, Icmp, SecurityGroupRule, SecurityGroupRuleRequest};
use ipnet::IpNet;
use std::fmt;

pub const PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP", "ICMPv6", "AH", "ESP", "GRE", "IPIP"];

pub const DIRECTIONS: &[&str] = &["INGRESS", "EGRESS"];

/// Spelling of `protocol` as listed in [`PROTOCOLS`]
pub fn canonical_protocol(protocol: &str) -> Result<&'static str> {
    PROTOCOLS
        .iter()
        .find(|p| p.eq_ignore_ascii_case(protocol))
        .copied()
        .ok_or_else(|| ProviderError::invalid(format!("unsupported protocol {:?}", protocol)))
}

pub fn is_icmp(protocol: &str) -> bool {
    protocol.to_ascii_uppercase().starts_with("ICMP")
}

pub fn has_ports(protocol: &str) -> bool {
    protocol.eq_ignore_ascii_case("TCP") || protocol.eq_ignore_ascii_case("UDP")
}

/// Where traffic comes from (ingress) or goes to (egress)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleSource {
    Cidr(String),
    /// Security group, by name
    Group(String),
}

impl RuleSource {
    /// CIDRs parse as networks, anything else is a group name
    pub fn parse(value: &str) -> Self {
        match value.parse::<IpNet>() {
            Ok(_) => RuleSource::Cidr(value.to_string()),
            Err(_) => RuleSource::Group(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RuleSource::Cidr(s) | RuleSource::Group(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleTarget {
    Ports(PortRange),
    Icmp { kind: i64, code: i64 },
    /// Protocols without ports
    Any,
}

/// One rule as the API knows it, minus its remote ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomicRule {
    pub protocol: &'static str,
    pub source: RuleSource,
    pub target: RuleTarget,
}

impl AtomicRule {
    /// Local identifier of this rule once created as `remote_id`
    pub fn local_id(&self, remote_id: &str) -> String {
        format!("{}_{}", remote_id, self)
    }

    /// Split a local identifier into the remote ID and the rule it encodes
    pub fn parse_local_id(id: &str) -> Option<(&str, AtomicRule)> {
        let (remote_id, rest) = id.split_once('_')?;
        let (protocol, rest) = rest.split_once('_')?;
        let protocol = canonical_protocol(protocol).ok()?;

        let (source, target) = if has_ports(protocol) {
            let (source, ports) = rest.rsplit_once('_')?;
            (source, RuleTarget::Ports(ports.parse().ok()?))
        } else if is_icmp(protocol) {
            let (source, icmp) = rest.rsplit_once('_')?;
            let (kind, code) = icmp.split_once(':')?;
            let target = RuleTarget::Icmp {
                kind: kind.parse().ok()?,
                code: code.parse().ok()?,
            };
            (source, target)
        } else {
            (rest, RuleTarget::Any)
        };

        Some((
            remote_id,
            AtomicRule {
                protocol,
                source: RuleSource::parse(source),
                target,
            },
        ))
    }

    /// Project a remote rule; `group_name` resolves group references that
    /// only carry an ID.
    pub fn from_remote(rule: &SecurityGroupRule, group_name: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let protocol = canonical_protocol(&rule.protocol).ok()?;

        let source = match (&rule.network, &rule.security_group) {
            (Some(network), _) => RuleSource::Cidr(network.clone()),
            (None, Some(GroupRef { name: Some(name), .. })) => RuleSource::Group(name.clone()),
            (None, Some(GroupRef { id: Some(id), .. })) => RuleSource::Group(group_name(id)?),
            _ => return None,
        };

        let target = if has_ports(protocol) {
            let start = u16::try_from(rule.start_port?).ok()?;
            let end = u16::try_from(rule.end_port.unwrap_or(i64::from(start))).ok()?;
            RuleTarget::Ports(PortRange::new(start, end).ok()?)
        } else if is_icmp(protocol) {
            let icmp = rule.icmp.clone().unwrap_or_default();
            RuleTarget::Icmp {
                kind: icmp.kind.unwrap_or(-1),
                code: icmp.code.unwrap_or(-1),
            }
        } else {
            RuleTarget::Any
        };

        Some(AtomicRule {
            protocol,
            source,
            target,
        })
    }

    /// API request for this rule; group sources must already be resolved to
    /// an ID through `group_id`.
    pub fn to_request(
        &self,
        direction: &str,
        description: Option<String>,
        group_id: Option<String>,
    ) -> SecurityGroupRuleRequest {
        let mut req = SecurityGroupRuleRequest {
            description,
            flow_direction: direction.to_lowercase(),
            protocol: self.protocol.to_lowercase(),
            ..Default::default()
        };

        match &self.source {
            RuleSource::Cidr(cidr) => req.network = Some(cidr.clone()),
            RuleSource::Group(name) => {
                req.security_group = Some(match group_id {
                    Some(id) => GroupRef {
                        id: Some(id),
                        name: None,
                    },
                    None => GroupRef {
                        id: None,
                        name: Some(name.clone()),
                    },
                })
            }
        }

        match self.target {
            RuleTarget::Ports(ports) => {
                req.start_port = Some(i64::from(ports.start));
                req.end_port = Some(i64::from(ports.end));
            }
            RuleTarget::Icmp { kind, code } => {
                req.icmp = Some(Icmp {
                    kind: Some(kind),
                    code: Some(code),
                })
            }
            RuleTarget::Any => {}
        }
        req
    }
}

impl fmt::Display for AtomicRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.protocol, self.source.as_str())?;
        match self.target {
            RuleTarget::Ports(p) => write!(f, "_{}-{}", p.start, p.end),
            RuleTarget::Icmp { kind, code } => write!(f, "_{}:{}", kind, code),
            RuleTarget::Any => Ok(()),
        }
    }
}

/// Expand one rule block into its atomic rules.
///
/// TCP and UDP yield one rule per source and port range; ICMP yields one
/// rule per source with the block's type and code; other protocols one rule
/// per source.
pub fn expand(
    protocol: &str,
    sources: &[RuleSource],
    ports: &[PortRange],
    icmp: Option<(i64, i64)>,
) -> Result<Vec<AtomicRule>> {
    let protocol = canonical_protocol(protocol)?;
    let mut rules = Vec::new();

    for source in sources {
        if has_ports(protocol) {
            if ports.is_empty() {
                return Err(ProviderError::invalid(format!(
                    "{} rules need at least one port range",
                    protocol
                )));
            }
            for range in ports {
                rules.push(AtomicRule {
                    protocol,
                    source: source.clone(),
                    target: RuleTarget::Ports(*range),
                });
            }
        } else if is_icmp(protocol) {
            let (kind, code) = icmp.unwrap_or((-1, -1));
            rules.push(AtomicRule {
                protocol,
                source: source.clone(),
                target: RuleTarget::Icmp { kind, code },
            });
        } else {
            rules.push(AtomicRule {
                protocol,
                source: source.clone(),
                target: RuleTarget::Any,
            });
        }
    }
    Ok(rules)
}
