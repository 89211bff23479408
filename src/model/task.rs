//! Task specification and scheduler registration records.

use crate::model::ids::{ExecutionGroupId, TaskDefinitionId};
use crate::model::secs;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Startup condition one container waits for on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyCondition {
    /// Dependency must report healthy before the dependent starts.
    Healthy,
    /// Dependency must have started; its health is not awaited.
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerDependency {
    pub container: String,
    pub condition: DependencyCondition,
}

/// Container health probe, consumed by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub command: Vec<String>,
    #[serde(rename = "interval_secs", with = "secs")]
    pub interval: Duration,
    #[serde(rename = "timeout_secs", with = "secs")]
    pub timeout: Duration,
    pub retries: u32,
    #[serde(rename = "start_period_secs", with = "secs")]
    pub start_period: Duration,
}

impl HealthCheck {
    /// Whether the start grace period covers at least two polling intervals.
    pub fn tolerates_slow_bootstrap(&self) -> bool {
        self.start_period >= self.interval * 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: &'static str,
}

impl PortMapping {
    pub fn tcp(port: u16) -> Self {
        Self {
            container_port: port,
            host_port: port,
            protocol: "tcp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub memory_limit_mib: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    pub essential: bool,
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_stream_prefix: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ContainerDependency>,
}

impl ContainerSpec {
    /// Condition this container waits on for `other`, if any.
    pub fn dependency_on(&self, other: &str) -> Option<DependencyCondition> {
        self.depends_on
            .iter()
            .find(|d| d.container == other)
            .map(|d| d.condition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkMode {
    #[serde(rename = "awsvpc")]
    AwsVpc,
}

/// Transparent traffic redirection through the proxy sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyConfiguration {
    pub container_name: String,
    pub app_ports: Vec<u16>,
    pub proxy_ingress_port: u16,
    pub proxy_egress_port: u16,
    /// Traffic from this uid is never intercepted (the proxy's own).
    pub ignored_uid: u32,
    /// Link-local infrastructure addresses that bypass the proxy.
    pub egress_ignored_ips: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LaunchType {
    /// Shares fixed-capacity cluster hosts.
    Ec2,
    /// Per-task isolated capacity.
    Fargate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSpec {
    pub id: TaskDefinitionId,
    pub network_mode: NetworkMode,
    pub compatibility: LaunchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u32>,
    pub proxy: ProxyConfiguration,
    pub containers: Vec<ContainerSpec>,
}

impl TaskSpec {
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn container_names(&self) -> Vec<&str> {
        self.containers.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DnsRecordType {
    A,
}

/// DNS-based discovery registration for a scheduler service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryOptions {
    pub name: String,
    pub namespace: String,
    pub record_type: DnsRecordType,
    #[serde(rename = "ttl_secs", with = "secs")]
    pub ttl: Duration,
    pub failure_threshold: u32,
}

impl DiscoveryOptions {
    pub fn hostname(&self) -> String {
        format!("{}.{}", self.name, self.namespace)
    }
}

/// A task specification registered with the scheduler under a service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerService {
    pub name: String,
    pub cluster: String,
    pub task_definition: TaskDefinitionId,
    pub launch_type: LaunchType,
    pub desired_count: u32,
    pub execution_group: ExecutionGroupId,
    pub discovery: DiscoveryOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(interval: u64, start: u64) -> HealthCheck {
        HealthCheck {
            command: vec!["true".into()],
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(2),
            retries: 3,
            start_period: Duration::from_secs(start),
        }
    }

    #[test]
    fn grace_period_must_cover_two_intervals() {
        assert!(check(5, 10).tolerates_slow_bootstrap());
        assert!(check(5, 30).tolerates_slow_bootstrap());
        assert!(!check(5, 9).tolerates_slow_bootstrap());
    }

    #[test]
    fn health_check_serializes_seconds() {
        let json = serde_json::to_value(check(5, 10)).unwrap();
        assert_eq!(json["interval_secs"], 5);
        assert_eq!(json["timeout_secs"], 2);
        assert_eq!(json["start_period_secs"], 10);
    }

    #[test]
    fn dependency_conditions_serialize_uppercase() {
        assert_eq!(
            serde_json::to_value(DependencyCondition::Healthy).unwrap(),
            "HEALTHY"
        );
        assert_eq!(
            serde_json::to_value(DependencyCondition::Start).unwrap(),
            "START"
        );
        assert_eq!(serde_json::to_value(LaunchType::Fargate).unwrap(), "FARGATE");
        assert_eq!(serde_json::to_value(NetworkMode::AwsVpc).unwrap(), "awsvpc");
    }
}
