//! Application process descriptors, one per hosting model.

use crate::config::Settings;
use crate::model::{HealthCheck, LaunchType, TargetType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default task-level reservation for serverless services.
pub const SERVERLESS_TASK_CPU: u32 = 2048;
pub const SERVERLESS_TASK_MEMORY_MIB: u32 = 4096;

/// Where a service's tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hosting {
    /// Shares the cluster's fixed host capacity.
    Node,
    /// Per-task isolated capacity.
    Serverless,
}

impl Hosting {
    pub fn launch_type(self) -> LaunchType {
        match self {
            Hosting::Node => LaunchType::Ec2,
            Hosting::Serverless => LaunchType::Fargate,
        }
    }

    pub fn target_type(self) -> TargetType {
        match self {
            Hosting::Node => TargetType::Instance,
            Hosting::Serverless => TargetType::Ip,
        }
    }

    pub fn proxy_image(self, settings: &Settings) -> &str {
        match self {
            Hosting::Node => &settings.proxy.node_image,
            Hosting::Serverless => &settings.proxy.serverless_image,
        }
    }

    /// Host-level metrics sidecar and proxy stats export.
    pub fn forwards_metrics(self) -> bool {
        matches!(self, Hosting::Node)
    }
}

/// The application container handed to the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub image: String,
    pub memory_limit_mib: u32,
    pub cpu: Option<u32>,
    pub health_check: Option<HealthCheck>,
    pub environment: BTreeMap<String, String>,
    pub log_stream_prefix: Option<String>,
}

impl ContainerDescriptor {
    pub fn new(image: impl Into<String>, memory_limit_mib: u32) -> Self {
        Self {
            image: image.into(),
            memory_limit_mib,
            cpu: None,
            health_check: None,
            environment: BTreeMap::new(),
            log_stream_prefix: None,
        }
    }

    pub fn with_health_check(mut self, check: HealthCheck) -> Self {
        self.health_check = Some(check);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_stream_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerlessDescriptor {
    pub container: ContainerDescriptor,
    pub task_cpu: u32,
    pub task_memory_mib: u32,
}

impl ServerlessDescriptor {
    pub fn new(container: ContainerDescriptor) -> Self {
        Self {
            container,
            task_cpu: SERVERLESS_TASK_CPU,
            task_memory_mib: SERVERLESS_TASK_MEMORY_MIB,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessDescriptor {
    NodeHosted(ContainerDescriptor),
    Serverless(ServerlessDescriptor),
}

impl ProcessDescriptor {
    pub fn hosting(&self) -> Hosting {
        match self {
            ProcessDescriptor::NodeHosted(_) => Hosting::Node,
            ProcessDescriptor::Serverless(_) => Hosting::Serverless,
        }
    }

    pub fn container(&self) -> &ContainerDescriptor {
        match self {
            ProcessDescriptor::NodeHosted(c) => c,
            ProcessDescriptor::Serverless(s) => &s.container,
        }
    }

    /// Task-level (cpu, memory MiB) reservation, if the model has one.
    pub fn task_reservation(&self) -> Option<(u32, u32)> {
        match self {
            ProcessDescriptor::NodeHosted(_) => None,
            ProcessDescriptor::Serverless(s) => Some((s.task_cpu, s.task_memory_mib)),
        }
    }
}
