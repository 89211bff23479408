//! Topology file: services, call-graph edges and the public entry point.
//!
//! TOML shape (JSON mirrors it):
//!
//! ```toml
//! [mesh]
//! name = "greeting-app-mesh"
//!
//! [[services]]
//! name = "name"
//! port = 3000
//! hosting = "node"              # or "serverless"
//! image = "nathanpeck/name"
//! memory_mib = 128
//! env = { PORT = "3000" }
//! health_check = { command = ["curl localhost:3000"] }
//!
//! [[connections]]
//! from = "greeter"
//! to = "name"
//!
//! [public]
//! service = "greeter"
//! ```
//!
//! Services are composed in file order, then connections are applied in file
//! order, so every edge target already has a registered route.

use crate::assembly;
use crate::compose::{
    Assembly, ContainerDescriptor, Hosting, MeshService, ProcessDescriptor, PublicEntryPoint,
    ServerlessDescriptor, ServiceProps,
};
use crate::config::Settings;
use crate::error::{Error, Result, TopologyError};
use crate::model::{Capacity, Cluster, HealthCheck, Mesh, Namespace, Network};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologySpec {
    #[serde(default)]
    pub network: NetworkSpec,
    #[serde(default)]
    pub cluster: ClusterSpec,
    #[serde(default)]
    pub mesh: MeshSpec,
    pub services: Vec<ServiceSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub public: Option<PublicSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSpec {
    pub id: String,
    pub max_azs: u32,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            id: "GreetingVpc".into(),
            max_azs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterSpec {
    pub id: String,
    pub namespace: String,
    pub capacity: Vec<CapacitySpec>,
}

impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            id: "Cluster".into(),
            namespace: assembly::NAMESPACE.into(),
            capacity: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacitySpec {
    pub id: String,
    pub instance_type: String,
    pub min: u32,
    pub max: u32,
    #[serde(default)]
    pub key_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshSpec {
    pub id: String,
    pub name: String,
}

impl Default for MeshSpec {
    fn default() -> Self {
        Self {
            id: "app-mesh".into(),
            name: assembly::MESH_NAME.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckSpec {
    pub command: Vec<String>,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_start_period")]
    pub start_period_secs: u64,
}

fn default_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    2
}

fn default_retries() -> u32 {
    3
}

fn default_start_period() -> u64 {
    10
}

impl From<&HealthCheckSpec> for HealthCheck {
    fn from(spec: &HealthCheckSpec) -> Self {
        HealthCheck {
            command: spec.command.clone(),
            interval: Duration::from_secs(spec.interval_secs),
            timeout: Duration::from_secs(spec.timeout_secs),
            retries: spec.retries,
            start_period: Duration::from_secs(spec.start_period_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    pub name: String,
    pub port: u16,
    #[serde(default = "default_hosting")]
    pub hosting: Hosting,
    pub image: String,
    pub memory_mib: u32,
    #[serde(default)]
    pub cpu: Option<u32>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub log_prefix: Option<String>,
    #[serde(default)]
    pub health_check: Option<HealthCheckSpec>,
    /// Serverless only.
    #[serde(default)]
    pub task_cpu: Option<u32>,
    /// Serverless only.
    #[serde(default)]
    pub task_memory_mib: Option<u32>,
}

fn default_hosting() -> Hosting {
    Hosting::Node
}

impl ServiceSpec {
    fn descriptor(&self) -> Result<ProcessDescriptor> {
        let mut container = ContainerDescriptor::new(self.image.clone(), self.memory_mib);
        container.cpu = self.cpu;
        container.environment = self.env.clone();
        container.log_stream_prefix = self.log_prefix.clone();
        container.health_check = self.health_check.as_ref().map(HealthCheck::from);

        match self.hosting {
            Hosting::Node => {
                if self.task_cpu.is_some() || self.task_memory_mib.is_some() {
                    return Err(invalid(format!(
                        "service {}: task_cpu/task_memory_mib only apply to serverless hosting",
                        self.name
                    )));
                }
                Ok(ProcessDescriptor::NodeHosted(container))
            }
            Hosting::Serverless => {
                let mut desc = ServerlessDescriptor::new(container);
                if let Some(cpu) = self.task_cpu {
                    desc.task_cpu = cpu;
                }
                if let Some(memory) = self.task_memory_mib {
                    desc.task_memory_mib = memory;
                }
                Ok(ProcessDescriptor::Serverless(desc))
            }
        }
    }
}

/// Directed edge: `from` calls `to`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSpec {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicSpec {
    pub service: String,
    #[serde(default = "default_public_port")]
    pub port: u16,
    #[serde(default = "default_public_port")]
    pub target_port: u16,
    #[serde(default = "default_load_balancer")]
    pub load_balancer: String,
    #[serde(default = "default_listener")]
    pub listener: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_export_name")]
    pub export_name: String,
}

fn default_public_port() -> u16 {
    assembly::PUBLIC_PORT
}

fn default_load_balancer() -> String {
    "external".into()
}

fn default_listener() -> String {
    "PublicListener".into()
}

fn default_output() -> String {
    "ExternalDNS".into()
}

fn default_export_name() -> String {
    assembly::EXPORT_NAME.into()
}

fn invalid(msg: String) -> Error {
    Error::Topology(TopologyError::Invalid(msg))
}

impl TopologySpec {
    /// Read a topology file. `.json` files are parsed as JSON, anything else
    /// as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TopologyError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_toml(&text)
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text).map_err(TopologyError::Toml)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text).map_err(TopologyError::Json)?)
    }

    /// Structural checks that need no composition:
    /// - at least one service, unique names
    /// - connections reference declared services, no self-edges, no duplicates
    /// - public service (if any) is declared
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(invalid("topology must declare at least 1 service".into()));
        }

        let mut names = BTreeSet::new();
        for s in &self.services {
            if !names.insert(s.name.as_str()) {
                return Err(invalid(format!("duplicate service name: {}", s.name)));
            }
        }

        let mut seen = BTreeSet::new();
        for c in &self.connections {
            if !names.contains(c.from.as_str()) {
                return Err(invalid(format!(
                    "connection references unknown caller: {}",
                    c.from
                )));
            }
            if !names.contains(c.to.as_str()) {
                return Err(invalid(format!(
                    "connection references unknown callee: {}",
                    c.to
                )));
            }
            if c.from == c.to {
                return Err(invalid(format!("service {} connects to itself", c.from)));
            }
            if !seen.insert((c.from.as_str(), c.to.as_str())) {
                return Err(invalid(format!(
                    "duplicate connection: {} -> {}",
                    c.from, c.to
                )));
            }
        }

        if let Some(public) = &self.public {
            if !names.contains(public.service.as_str()) {
                return Err(invalid(format!(
                    "public entry point references unknown service: {}",
                    public.service
                )));
            }
        }

        for cap in &self.cluster.capacity {
            if cap.min > cap.max {
                return Err(invalid(format!(
                    "capacity {}: min {} exceeds max {}",
                    cap.id, cap.min, cap.max
                )));
            }
        }
        Ok(())
    }

    /// Validate, then compose every service, apply connections and attach
    /// the public entry point.
    pub fn validate_and_build(&self, settings: &Settings) -> Result<Assembly> {
        self.validate()?;

        let network = Network {
            id: self.network.id.clone(),
            max_azs: self.network.max_azs,
        };
        let cluster = Cluster {
            id: self.cluster.id.clone(),
            network: network.id.clone(),
            namespace: Namespace {
                name: self.cluster.namespace.clone(),
                private: true,
            },
            capacity: self
                .cluster
                .capacity
                .iter()
                .map(|c| Capacity {
                    id: c.id.clone(),
                    instance_type: c.instance_type.clone(),
                    min: c.min,
                    max: c.max,
                    key_name: c.key_name.clone(),
                })
                .collect(),
        };
        let mesh = Mesh {
            id: self.mesh.id.clone(),
            name: self.mesh.name.clone(),
        };
        let mut assembly = Assembly::new(settings.clone(), network, cluster, mesh);

        let mut composed: BTreeMap<&str, MeshService> = BTreeMap::new();
        for s in &self.services {
            let service = MeshService::compose(
                &mut assembly,
                ServiceProps {
                    name: s.name.clone(),
                    port: s.port,
                    application: s.descriptor()?,
                },
            )?;
            composed.insert(s.name.as_str(), service);
        }

        for c in &self.connections {
            // Both ends exist: checked by validate().
            let (Some(from), Some(to)) = (composed.get(c.from.as_str()), composed.get(c.to.as_str()))
            else {
                return Err(invalid(format!("unresolved connection {} -> {}", c.from, c.to)));
            };
            from.connect_to_mesh_service(&mut assembly, to)?;
        }

        if let Some(public) = &self.public {
            let target = composed
                .get(public.service.as_str())
                .ok_or_else(|| invalid(format!("unknown public service {}", public.service)))?;
            PublicEntryPoint {
                load_balancer: public.load_balancer.clone(),
                listener: public.listener.clone(),
                port: public.port,
                target_group: public.service.clone(),
                target_port: public.target_port,
                output: public.output.clone(),
                export_name: public.export_name.clone(),
            }
            .attach(&mut assembly, target)?;
        }

        debug!(
            services = composed.len(),
            connections = self.connections.len(),
            "topology built"
        );
        Ok(assembly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposeError;

    const MINIMAL: &str = r#"
[[services]]
name = "api"
port = 8080
image = "example/api"
memory_mib = 256
health_check = { command = ["curl localhost:8080/health"] }

[[services]]
name = "db-proxy"
port = 5432
hosting = "serverless"
image = "example/db-proxy"
memory_mib = 512
health_check = { command = ["true"], interval_secs = 10, start_period_secs = 30 }

[[connections]]
from = "api"
to = "db-proxy"

[public]
service = "api"
"#;

    fn build(text: &str) -> Result<Assembly> {
        TopologySpec::from_toml(text)?.validate_and_build(&Settings::default())
    }

    #[test]
    fn builds_minimal_topology_with_defaults() {
        let asm = build(MINIMAL).unwrap();
        assert_eq!(asm.mesh().name, "greeting-app-mesh");
        assert_eq!(asm.services().count(), 2);

        let proxy = asm.service("db-proxy").unwrap();
        assert_eq!(proxy.hosting, Hosting::Serverless);
        assert_eq!(proxy.task.memory_mib, Some(4096));

        assert_eq!(asm.grants().len(), 1);
        assert_eq!(asm.grants()[0].ports.from, 5432);
        assert_eq!(asm.load_balancers()[0].listeners[0].port, 80);
    }

    #[test]
    fn rejects_duplicate_service() {
        let text = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64

[[services]]
name = "a"
port = 81
image = "y"
memory_mib = 64
"#;
        let err = build(text).unwrap_err();
        assert!(err.to_string().contains("duplicate service name: a"), "{err}");
    }

    #[test]
    fn rejects_unknown_connection_target() {
        let text = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64

[[connections]]
from = "a"
to = "b"
"#;
        let err = build(text).unwrap_err();
        assert!(err.to_string().contains("unknown callee: b"), "{err}");
    }

    #[test]
    fn rejects_self_edge_and_unknown_public() {
        let self_edge = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64

[[connections]]
from = "a"
to = "a"
"#;
        assert!(build(self_edge).unwrap_err().to_string().contains("itself"));

        let bad_public = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64

[public]
service = "b"
"#;
        assert!(
            build(bad_public)
                .unwrap_err()
                .to_string()
                .contains("unknown service: b")
        );
    }

    #[test]
    fn missing_health_check_surfaces_compose_error() {
        let text = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64
"#;
        match build(text) {
            Err(Error::Compose(ComposeError::MissingHealthCheck(name))) => assert_eq!(name, "a"),
            other => panic!("expected missing health check, got {other:?}"),
        }
    }

    #[test]
    fn node_hosted_rejects_task_reservation() {
        let text = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64
task_cpu = 256
health_check = { command = ["true"] }
"#;
        assert!(
            build(text)
                .unwrap_err()
                .to_string()
                .contains("only apply to serverless")
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let text = r#"
[[services]]
name = "a"
port = 80
image = "x"
memory_mib = 64
replicas = 5
"#;
        assert!(matches!(
            TopologySpec::from_toml(text),
            Err(Error::Topology(TopologyError::Toml(_)))
        ));
    }

    #[test]
    fn parses_json() {
        let text = r#"{
  "services": [
    { "name": "a", "port": 80, "image": "x", "memory_mib": 64,
      "health_check": { "command": ["true"] } }
  ]
}"#;
        let spec = TopologySpec::from_json(text).unwrap();
        let asm = spec.validate_and_build(&Settings::default()).unwrap();
        assert_eq!(asm.services().count(), 1);
        assert!(asm.load_balancers().is_empty());
    }
}
