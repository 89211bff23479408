//! Reachability grants between execution groups.

use crate::model::ids::ExecutionGroupId;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
}

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Directed permission: `source` may open connections to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReachabilityGrant {
    pub source: ExecutionGroupId,
    pub destination: ExecutionGroupId,
    pub protocol: Protocol,
    pub ports: PortRange,
    pub description: String,
}

impl ReachabilityGrant {
    pub fn logical_id(&self) -> String {
        format!(
            "{}-to-{}-ingress",
            strip_group_suffix(self.source.as_str()),
            strip_group_suffix(self.destination.as_str())
        )
    }
}

fn strip_group_suffix(id: &str) -> &str {
    id.strip_suffix("-security-group").unwrap_or(id)
}
