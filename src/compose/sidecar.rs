//! Proxy and metrics sidecars.

use crate::compose::variant::Hosting;
use crate::config::Settings;
use crate::model::{
    ContainerSpec, HealthCheck, MeshNode, ProxyConfiguration, ServiceIdentity,
};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

pub const APP_CONTAINER: &str = "app";
pub const PROXY_CONTAINER: &str = "envoy";
pub const METRICS_CONTAINER: &str = "cloudwatch-agent";

pub const PROXY_INGRESS_PORT: u16 = 15000;
pub const PROXY_EGRESS_PORT: u16 = 15001;
pub const PROXY_ADMIN_PORT: u16 = 9901;
/// Uid the proxy runs as; its traffic is exempt from redirection.
pub const PROXY_UID: u32 = 1337;
pub const PROXY_MEMORY_MIB: u32 = 128;
pub const METRICS_MEMORY_MIB: u32 = 512;

/// Task metadata endpoint and instance metadata service. Redirecting either
/// cuts the task off from its own credentials and configuration.
pub const EGRESS_IGNORED_IPS: [Ipv4Addr; 2] = [
    Ipv4Addr::new(169, 254, 170, 2),
    Ipv4Addr::new(169, 254, 169, 254),
];

const METRICS_AGENT_LOGFILE: &str =
    "/opt/aws/amazon-cloudwatch-agent/logs/amazon-cloudwatch-agent.log";

pub fn proxy_configuration(identity: &ServiceIdentity) -> ProxyConfiguration {
    ProxyConfiguration {
        container_name: PROXY_CONTAINER.to_string(),
        app_ports: vec![identity.port()],
        proxy_ingress_port: PROXY_INGRESS_PORT,
        proxy_egress_port: PROXY_EGRESS_PORT,
        ignored_uid: PROXY_UID,
        egress_ignored_ips: EGRESS_IGNORED_IPS.to_vec(),
    }
}

/// Liveness probe against the proxy's admin endpoint.
pub fn proxy_health_check() -> HealthCheck {
    HealthCheck {
        command: vec![
            "CMD-SHELL".to_string(),
            format!(
                "curl -s http://localhost:{PROXY_ADMIN_PORT}/server_info | grep state | grep -q LIVE"
            ),
        ],
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(2),
        retries: 3,
        start_period: Duration::from_secs(10),
    }
}

pub fn proxy_container(
    identity: &ServiceIdentity,
    node: &MeshNode,
    hosting: Hosting,
    settings: &Settings,
) -> ContainerSpec {
    let stats = if hosting.forwards_metrics() { "1" } else { "0" };

    let mut environment = BTreeMap::new();
    environment.insert("APPMESH_VIRTUAL_NODE_NAME".to_string(), node.qualified_name());
    environment.insert("AWS_REGION".to_string(), settings.region.clone());
    environment.insert("ENABLE_ENVOY_STATS_TAGS".to_string(), stats.to_string());
    environment.insert("ENABLE_ENVOY_DOG_STATSD".to_string(), stats.to_string());
    environment.insert("ENVOY_LOG_LEVEL".to_string(), settings.proxy.log_level.clone());

    ContainerSpec {
        name: PROXY_CONTAINER.to_string(),
        image: hosting.proxy_image(settings).to_string(),
        memory_limit_mib: PROXY_MEMORY_MIB,
        cpu: None,
        essential: true,
        environment,
        health_check: Some(proxy_health_check()),
        port_mappings: Vec::new(),
        user: Some(PROXY_UID.to_string()),
        log_stream_prefix: Some(format!("{}-envoy", identity.name())),
        depends_on: Vec::new(),
    }
}

/// StatsD listener forwarding proxy metrics. Non-essential: its failure must
/// not take the task down.
pub fn metrics_container(settings: &Settings) -> ContainerSpec {
    let agent_config = serde_json::json!({
        "agent": {
            "omit_hostname": true,
            "region": settings.region,
            "logfile": METRICS_AGENT_LOGFILE,
            "debug": true,
        },
        "metrics": {
            "metrics_collected": {
                "statsd": {
                    "service_address": settings.metrics.statsd_address,
                    "metrics_collection_interval": settings.metrics.collection_interval_secs,
                    "metrics_aggregation_interval": settings.metrics.aggregation_interval_secs,
                }
            }
        }
    });

    let mut environment = BTreeMap::new();
    environment.insert("CW_CONFIG_CONTENT".to_string(), agent_config.to_string());

    ContainerSpec {
        name: METRICS_CONTAINER.to_string(),
        image: settings.metrics.image.clone(),
        memory_limit_mib: METRICS_MEMORY_MIB,
        cpu: None,
        essential: false,
        environment,
        health_check: None,
        port_mappings: Vec::new(),
        user: None,
        log_stream_prefix: None,
        depends_on: Vec::new(),
    }
}
