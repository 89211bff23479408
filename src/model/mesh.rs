//! Mesh identity records: nodes and the routes that resolve to them.

use crate::model::ids::{MeshNodeId, MeshRouteName};
use crate::model::secs;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Fastest polling the mesh control plane accepts.
pub const MIN_MESH_HEALTH_INTERVAL: Duration = Duration::from_secs(5);
/// Shortest timeout the mesh control plane accepts.
pub const MIN_MESH_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshProtocol {
    Http,
}

/// Listener-level health check evaluated by the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshHealthCheck {
    pub protocol: MeshProtocol,
    pub path: String,
    pub port: u16,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,
    #[serde(rename = "timeout_secs", with = "secs")]
    pub timeout: Duration,
}

impl MeshHealthCheck {
    /// Check against the platform minimums. Returns the reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval < MIN_MESH_HEALTH_INTERVAL {
            return Err(format!(
                "interval {}s is below the {}s minimum",
                self.interval.as_secs(),
                MIN_MESH_HEALTH_INTERVAL.as_secs()
            ));
        }
        if self.timeout < MIN_MESH_HEALTH_TIMEOUT {
            return Err(format!(
                "timeout {}s is below the {}s minimum",
                self.timeout.as_secs(),
                MIN_MESH_HEALTH_TIMEOUT.as_secs()
            ));
        }
        if self.timeout >= self.interval {
            return Err("timeout must be shorter than the interval".to_string());
        }
        if !(2..=10).contains(&self.healthy_threshold)
            || !(2..=10).contains(&self.unhealthy_threshold)
        {
            return Err("thresholds must be between 2 and 10".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub port: u16,
    pub protocol: MeshProtocol,
    pub health_check: MeshHealthCheck,
}

/// A service's identity inside the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshNode {
    pub name: MeshNodeId,
    pub mesh: String,
    /// Discovery hostname the node resolves its instances through.
    pub discovery: String,
    pub listener: Listener,
    backends: BTreeSet<MeshRouteName>,
}

impl MeshNode {
    pub fn new(name: MeshNodeId, mesh: String, discovery: String, listener: Listener) -> Self {
        Self {
            name,
            mesh,
            discovery,
            listener,
            backends: BTreeSet::new(),
        }
    }

    /// Allow this node's proxy to route to `route`. Returns false if it
    /// already could.
    pub fn add_backend(&mut self, route: MeshRouteName) -> bool {
        self.backends.insert(route)
    }

    pub fn backends(&self) -> &BTreeSet<MeshRouteName> {
        &self.backends
    }

    /// Name the proxy sidecar uses to fetch its configuration.
    pub fn qualified_name(&self) -> String {
        format!("mesh/{}/virtualNode/{}", self.mesh, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshRoute {
    pub name: MeshRouteName,
    pub mesh: String,
    pub node: MeshNodeId,
}
