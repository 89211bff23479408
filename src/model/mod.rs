//! Entity records handed to the provisioning engine.
//!
//! Everything here is plain data: write-once records that the `compose`
//! layer fills in and the `render` layer serializes. The only mutation
//! allowed after construction is appending mesh backends.

pub mod ids;
pub mod infra;
pub mod mesh;
pub mod network;
pub mod task;

pub use ids::{ExecutionGroupId, MeshNodeId, MeshRouteName, ServiceIdentity, TaskDefinitionId};
pub use infra::{
    Capacity, Cluster, LoadBalancer, LoadBalancerListener, Mesh, Namespace, Network, Output,
    TargetGroup, TargetType,
};
pub use mesh::{Listener, MeshHealthCheck, MeshNode, MeshProtocol, MeshRoute};
pub use network::{PortRange, Protocol, ReachabilityGrant};
pub use task::{
    ContainerDependency, ContainerSpec, DependencyCondition, DiscoveryOptions, DnsRecordType,
    HealthCheck, LaunchType, NetworkMode, PortMapping, ProxyConfiguration, SchedulerService,
    TaskSpec,
};

/// Serialize a `Duration` as whole seconds.
pub(crate) mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
