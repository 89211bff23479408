//! Mesh-enabled service composition.
//!
//! `MeshService::compose` turns an application container into a task with a
//! proxy sidecar (and, node-hosted, a metrics sidecar), registers it with the
//! scheduler under DNS discovery, and gives it a mesh node plus a stable
//! `<name>.internal` route. `connect_to_mesh_service` then opens one directed
//! call-graph edge.

use crate::compose::context::{Assembly, ComposedService, Edge};
use crate::compose::sidecar::{self, APP_CONTAINER, METRICS_CONTAINER, PROXY_CONTAINER};
use crate::compose::variant::ProcessDescriptor;
use crate::error::ComposeError;
use crate::model::{
    ContainerDependency, ContainerSpec, DependencyCondition, DiscoveryOptions, DnsRecordType,
    ExecutionGroupId, HealthCheck, Listener, MeshHealthCheck, MeshNode, MeshNodeId,
    MeshProtocol, MeshRoute, MeshRouteName, NetworkMode, PortMapping, PortRange, Protocol,
    ReachabilityGrant, SchedulerService, ServiceIdentity, TaskDefinitionId, TaskSpec,
};
use std::time::Duration;
use tracing::info;

/// Replicas per service.
pub const DESIRED_COUNT: u32 = 2;
pub const DISCOVERY_TTL: Duration = Duration::from_secs(10);
pub const DISCOVERY_FAILURE_THRESHOLD: u32 = 2;

/// What a caller needs to know about a peer to connect to it.
pub trait MeshPeer {
    fn identity(&self) -> &ServiceIdentity;
    fn execution_group(&self) -> &ExecutionGroupId;
    fn task_definition(&self) -> &TaskDefinitionId;
    fn mesh_node(&self) -> &MeshNodeId;
    fn mesh_route(&self) -> &MeshRouteName;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProps {
    pub name: String,
    pub port: u16,
    pub application: ProcessDescriptor,
}

/// Handle to a service composed into an [`Assembly`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshService {
    identity: ServiceIdentity,
    execution_group: ExecutionGroupId,
    task_definition: TaskDefinitionId,
    mesh_node: MeshNodeId,
    mesh_route: MeshRouteName,
}

impl MeshPeer for MeshService {
    fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    fn execution_group(&self) -> &ExecutionGroupId {
        &self.execution_group
    }

    fn task_definition(&self) -> &TaskDefinitionId {
        &self.task_definition
    }

    fn mesh_node(&self) -> &MeshNodeId {
        &self.mesh_node
    }

    fn mesh_route(&self) -> &MeshRouteName {
        &self.mesh_route
    }
}

impl MeshService {
    pub fn compose(assembly: &mut Assembly, props: ServiceProps) -> Result<Self, ComposeError> {
        let ServiceProps {
            name,
            port,
            application,
        } = props;

        let identity = ServiceIdentity::new(name, port)?;
        let hosting = application.hosting();
        let settings = assembly.settings().clone();

        // Mesh node first: the proxy sidecar is configured with its name.
        let discovery = DiscoveryOptions {
            name: identity.name().to_string(),
            namespace: assembly.cluster().namespace.name.clone(),
            record_type: DnsRecordType::A,
            ttl: DISCOVERY_TTL,
            failure_threshold: DISCOVERY_FAILURE_THRESHOLD,
        };
        let node = MeshNode::new(
            identity.mesh_node(),
            assembly.mesh().name.clone(),
            discovery.hostname(),
            listener(&identity)?,
        );
        let route = MeshRoute {
            name: identity.mesh_route(),
            mesh: assembly.mesh().name.clone(),
            node: node.name.clone(),
        };

        let proxy = sidecar::proxy_container(&identity, &node, hosting, &settings);
        if let Some(check) = &proxy.health_check {
            check_proxy_grace(&identity, check)?;
        }

        let mut app = application_container(&identity, &application)?;
        app.depends_on.push(ContainerDependency {
            container: PROXY_CONTAINER.to_string(),
            condition: DependencyCondition::Healthy,
        });

        let mut containers = vec![app, proxy];
        if hosting.forwards_metrics() {
            containers[0].depends_on.push(ContainerDependency {
                container: METRICS_CONTAINER.to_string(),
                condition: DependencyCondition::Start,
            });
            containers.push(sidecar::metrics_container(&settings));
        }

        let reservation = application.task_reservation();
        if let Some((cpu, memory)) = reservation {
            let required: u32 = containers.iter().filter_map(|c| c.cpu).sum();
            if required > cpu {
                return Err(ComposeError::InsufficientTaskCpu {
                    service: identity.name().to_string(),
                    required,
                    available: cpu,
                });
            }
            let required: u32 = containers.iter().map(|c| c.memory_limit_mib).sum();
            if required > memory {
                return Err(ComposeError::InsufficientTaskMemory {
                    service: identity.name().to_string(),
                    required,
                    available: memory,
                });
            }
        }

        let task = TaskSpec {
            id: identity.task_definition(),
            network_mode: NetworkMode::AwsVpc,
            compatibility: hosting.launch_type(),
            cpu: reservation.map(|(cpu, _)| cpu),
            memory_mib: reservation.map(|(_, memory)| memory),
            proxy: sidecar::proxy_configuration(&identity),
            containers,
        };

        let scheduler = SchedulerService {
            name: identity.scheduler_service(),
            cluster: assembly.cluster().id.clone(),
            task_definition: task.id.clone(),
            launch_type: hosting.launch_type(),
            desired_count: DESIRED_COUNT,
            execution_group: identity.execution_group(),
            discovery,
        };

        let service = MeshService {
            execution_group: scheduler.execution_group.clone(),
            task_definition: task.id.clone(),
            mesh_node: node.name.clone(),
            mesh_route: route.name.clone(),
            identity: identity.clone(),
        };

        assembly.register_service(
            ComposedService {
                identity,
                hosting,
                task,
                scheduler,
            },
            node,
            route,
        )?;

        info!(
            service = %service.identity,
            hosting = ?hosting,
            route = %service.mesh_route,
            "composed mesh service"
        );
        Ok(service)
    }

    /// Let this service call `peer` through the mesh.
    ///
    /// Grants reachability from this execution group to the peer's on the
    /// peer's port, and adds the peer's route to this node's backends.
    /// Connecting the same pair twice changes nothing.
    pub fn connect_to_mesh_service(
        &self,
        assembly: &mut Assembly,
        peer: &impl MeshPeer,
    ) -> Result<(), ComposeError> {
        if peer.identity().name() == self.identity.name() {
            return Err(ComposeError::SelfConnection(self.identity.name().to_string()));
        }

        assembly.require_composed(self)?;
        assembly.require_composed(peer)?;
        let routed = assembly
            .route(peer.mesh_route())
            .is_some_and(|route| &route.node == peer.mesh_node());
        if !routed {
            return Err(ComposeError::UnregisteredRoute {
                service: peer.identity().name().to_string(),
                route: peer.mesh_route().to_string(),
            });
        }

        assembly.add_grant(ReachabilityGrant {
            source: self.execution_group.clone(),
            destination: peer.execution_group().clone(),
            protocol: Protocol::Tcp,
            ports: PortRange::single(peer.identity().port()),
            description: format!(
                "Inbound traffic from the app mesh enabled {} to {}",
                self.identity.name(),
                peer.identity().name()
            ),
        })?;
        assembly.add_backend(&self.mesh_node, peer.mesh_route().clone())?;
        assembly.add_edge(Edge {
            from: self.identity.name().to_string(),
            to: peer.identity().name().to_string(),
            route: peer.mesh_route().clone(),
        });

        info!(
            from = %self.identity.name(),
            to = %peer.identity().name(),
            port = peer.identity().port(),
            "connected mesh services"
        );
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

}

fn application_container(
    identity: &ServiceIdentity,
    application: &ProcessDescriptor,
) -> Result<ContainerSpec, ComposeError> {
    let desc = application.container();
    let health_check = desc
        .health_check
        .clone()
        .ok_or_else(|| ComposeError::MissingHealthCheck(identity.name().to_string()))?;

    Ok(ContainerSpec {
        name: APP_CONTAINER.to_string(),
        image: desc.image.clone(),
        memory_limit_mib: desc.memory_limit_mib,
        cpu: desc.cpu,
        essential: true,
        environment: desc.environment.clone(),
        health_check: Some(health_check),
        port_mappings: vec![PortMapping::tcp(identity.port())],
        user: None,
        log_stream_prefix: desc.log_stream_prefix.clone(),
        depends_on: Vec::new(),
    })
}

fn listener(identity: &ServiceIdentity) -> Result<Listener, ComposeError> {
    let health_check = MeshHealthCheck {
        protocol: MeshProtocol::Http,
        path: "/".to_string(),
        port: identity.port(),
        healthy_threshold: 2,
        unhealthy_threshold: 2,
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(2),
    };
    health_check
        .validate()
        .map_err(|reason| ComposeError::ListenerHealthCheck {
            service: identity.name().to_string(),
            reason,
        })?;

    Ok(Listener {
        port: identity.port(),
        protocol: MeshProtocol::Http,
        health_check,
    })
}

fn check_proxy_grace(identity: &ServiceIdentity, check: &HealthCheck) -> Result<(), ComposeError> {
    if check.tolerates_slow_bootstrap() {
        return Ok(());
    }
    Err(ComposeError::ProxyGracePeriod {
        service: identity.name().to_string(),
        min_secs: (check.interval * 2).as_secs(),
        actual_secs: check.start_period.as_secs(),
    })
}
