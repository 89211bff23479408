//! Shared infrastructure the services are composed onto.

use crate::model::ids::ExecutionGroupId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub id: String,
    pub max_azs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub name: String,
    /// Private DNS namespace, resolvable only inside `network`.
    pub private: bool,
}

/// Fixed host capacity backing node-hosted services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub id: String,
    pub instance_type: String,
    pub min: u32,
    pub max: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub network: String,
    pub namespace: Namespace,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capacity: Vec<Capacity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mesh {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Register hosts (node-hosted tasks).
    Instance,
    /// Register task addresses directly (serverless tasks).
    Ip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    pub id: String,
    pub port: u16,
    pub target_type: TargetType,
    /// Scheduler service whose tasks are registered as targets.
    pub service: String,
    pub execution_group: ExecutionGroupId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerListener {
    pub id: String,
    pub port: u16,
    /// Accept traffic from anywhere.
    pub open: bool,
    pub targets: Vec<TargetGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancer {
    pub id: String,
    pub network: String,
    pub internet_facing: bool,
    pub listeners: Vec<LoadBalancerListener>,
}

impl LoadBalancer {
    /// Token the provisioning engine resolves to the balancer's address.
    pub fn dns_name_ref(&self) -> String {
        format!("${{{}.DNSName}}", self.id)
    }
}

/// Externally observable value published by the assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    pub id: String,
    pub export_name: String,
    pub value: String,
}
