//! Attribute value validators

use ipnet::IpNet;
use regex::Regex;
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr};

/// Hostname label: letters, digits and inner dashes
pub const HOSTNAME_PATTERN: &str = r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$";

/// Fully qualified reverse DNS name, trailing dot included
pub const REVERSE_DNS_PATTERN: &str = r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+$";

/// `N` or `M-N`
pub const PORT_RANGE_PATTERN: &str = r"^\d+(-\d+)?$";

/// Maintenance window time of day
pub const TIME_OF_DAY_PATTERN: &str = r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d$";

#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Inclusive integer bounds
    IntRange(i64, i64),
    /// Enumerated strings, compared case-insensitively
    OneOf(&'static [&'static str]),
    Cidr,
    Ipv4,
    IpAddress,
    /// Pattern and a human description of it
    Regex(&'static str, &'static str),
    Lowercase,
    NotEmpty,
    /// String holding a JSON document
    Json,
}

impl Validator {
    /// Check one scalar value; collection attributes call this per member.
    pub fn check(&self, name: &str, value: &Value) -> Result<(), String> {
        match self {
            Validator::IntRange(min, max) => match value.as_i64() {
                Some(v) if (*min..=*max).contains(&v) => Ok(()),
                Some(v) => Err(format!(
                    "{}: {} is out of range, expected {} to {}",
                    name, v, min, max
                )),
                None => Err(format!("{}: expected an integer", name)),
            },
            Validator::OneOf(allowed) => {
                let s = expect_str(name, value)?;
                if allowed.iter().any(|a| a.eq_ignore_ascii_case(s)) {
                    Ok(())
                } else {
                    Err(format!(
                        "{}: {:?} must be one of {}",
                        name,
                        s,
                        allowed.join(", ")
                    ))
                }
            }
            Validator::Cidr => {
                let s = expect_str(name, value)?;
                s.parse::<IpNet>()
                    .map(|_| ())
                    .map_err(|_| format!("{}: {:?} is not a valid CIDR block", name, s))
            }
            Validator::Ipv4 => {
                let s = expect_str(name, value)?;
                s.parse::<Ipv4Addr>()
                    .map(|_| ())
                    .map_err(|_| format!("{}: {:?} is not an IPv4 address", name, s))
            }
            Validator::IpAddress => {
                let s = expect_str(name, value)?;
                s.parse::<IpAddr>()
                    .map(|_| ())
                    .map_err(|_| format!("{}: {:?} is not an IP address", name, s))
            }
            Validator::Regex(pattern, description) => {
                let s = expect_str(name, value)?;
                let re = Regex::new(pattern)
                    .map_err(|e| format!("{}: bad validation pattern: {}", name, e))?;
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("{}: {:?} must be {}", name, s, description))
                }
            }
            Validator::Lowercase => {
                let s = expect_str(name, value)?;
                if s.chars().any(char::is_uppercase) {
                    Err(format!("{}: {:?} must be lowercase", name, s))
                } else {
                    Ok(())
                }
            }
            Validator::NotEmpty => {
                if expect_str(name, value)?.is_empty() {
                    Err(format!("{}: must not be empty", name))
                } else {
                    Ok(())
                }
            }
            Validator::Json => {
                let s = expect_str(name, value)?;
                serde_json::from_str::<Value>(s)
                    .map(|_| ())
                    .map_err(|e| format!("{}: invalid JSON: {}", name, e))
            }
        }
    }
}

fn expect_str<'a>(name: &str, value: &'a Value) -> Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("{}: expected a string", name))
}
