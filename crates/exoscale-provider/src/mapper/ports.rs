//! Textual port ranges: `N` is the single port N, `M-N` the range M..=N

use crate::error::{ProviderError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start > end {
            return Err(ProviderError::invalid(format!(
                "port range {}-{} has its start after its end",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }
}

impl FromStr for PortRange {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        let parse = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| ProviderError::invalid(format!("{:?} is not a port or port range", s)))
        };
        match s.split_once('-') {
            Some((start, end)) => PortRange::new(parse(start)?, parse(end)?),
            None => Ok(PortRange::single(parse(s)?)),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}
