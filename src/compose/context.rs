//! The composition context.
//!
//! An `Assembly` is the explicit scope every composition step writes into.
//! It owns the shared infrastructure (network, cluster, mesh) and the
//! registries of everything composed on top of it. Callers thread it through
//! `MeshService::compose` / `connect_to_mesh_service` by `&mut`.

use crate::compose::service::MeshPeer;
use crate::compose::variant::Hosting;
use crate::config::Settings;
use crate::error::ComposeError;
use crate::model::{
    Cluster, ExecutionGroupId, LoadBalancer, Mesh, MeshNode, MeshNodeId, MeshRoute,
    MeshRouteName, Network, Output, ReachabilityGrant, SchedulerService, ServiceIdentity,
    TaskSpec,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Scheduler-side records of one composed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedService {
    pub identity: ServiceIdentity,
    pub hosting: Hosting,
    pub task: TaskSpec,
    pub scheduler: SchedulerService,
}

/// One caller -> callee edge of the call graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub route: MeshRouteName,
}

#[derive(Debug, Clone)]
pub struct Assembly {
    settings: Settings,
    network: Network,
    cluster: Cluster,
    mesh: Mesh,
    /// Composition order; `services` is keyed by name.
    order: Vec<String>,
    services: BTreeMap<String, ComposedService>,
    nodes: BTreeMap<MeshNodeId, MeshNode>,
    routes: BTreeMap<MeshRouteName, MeshRoute>,
    grants: Vec<ReachabilityGrant>,
    edges: Vec<Edge>,
    load_balancers: Vec<LoadBalancer>,
    outputs: Vec<Output>,
    /// Document resource id -> owner, for everything registered so far.
    claimed: BTreeMap<String, String>,
}

impl Assembly {
    pub fn new(settings: Settings, network: Network, cluster: Cluster, mesh: Mesh) -> Self {
        debug!(
            network = %network.id,
            cluster = %cluster.id,
            mesh = %mesh.name,
            "new assembly"
        );
        let claimed = BTreeMap::from([
            (network.id.clone(), format!("network '{}'", network.id)),
            (cluster.id.clone(), format!("cluster '{}'", cluster.id)),
            (mesh.id.clone(), format!("mesh '{}'", mesh.name)),
        ]);
        Self {
            settings,
            network,
            cluster,
            mesh,
            order: Vec::new(),
            services: BTreeMap::new(),
            nodes: BTreeMap::new(),
            routes: BTreeMap::new(),
            grants: Vec::new(),
            edges: Vec::new(),
            load_balancers: Vec::new(),
            outputs: Vec::new(),
            claimed,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Composed services in composition order.
    pub fn services(&self) -> impl Iterator<Item = &ComposedService> {
        self.order.iter().filter_map(|name| self.services.get(name))
    }

    pub fn service(&self, name: &str) -> Option<&ComposedService> {
        self.services.get(name)
    }

    pub fn node(&self, id: &MeshNodeId) -> Option<&MeshNode> {
        self.nodes.get(id)
    }

    pub fn route(&self, name: &MeshRouteName) -> Option<&MeshRoute> {
        self.routes.get(name)
    }

    pub fn grants(&self) -> &[ReachabilityGrant] {
        &self.grants
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn load_balancers(&self) -> &[LoadBalancer] {
        &self.load_balancers
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Service owning execution group `group`.
    pub fn service_for_group(&self, group: &ExecutionGroupId) -> Option<&ComposedService> {
        self.services
            .values()
            .find(|s| &s.scheduler.execution_group == group)
    }

    pub(crate) fn register_service(
        &mut self,
        service: ComposedService,
        node: MeshNode,
        route: MeshRoute,
    ) -> Result<(), ComposeError> {
        let name = service.identity.name().to_string();
        if self.services.contains_key(&name)
            || self.nodes.contains_key(&node.name)
            || self.routes.contains_key(&route.name)
        {
            return Err(ComposeError::DuplicateService(name));
        }
        let ids = service.identity.resource_ids();
        for id in &ids {
            self.check_unclaimed(id)?;
        }

        debug!(service = %name, task = %service.task.id, "registered task specification");
        debug!(service = %name, node = %node.name, "registered mesh node");
        debug!(service = %name, route = %route.name, "registered mesh route");

        for id in ids {
            self.claimed.insert(id, format!("service '{name}'"));
        }
        self.order.push(name.clone());
        self.services.insert(name, service);
        self.nodes.insert(node.name.clone(), node);
        self.routes.insert(route.name.clone(), route);
        Ok(())
    }

    /// Check that `peer` was composed here with exactly these handles.
    pub(crate) fn require_composed(&self, peer: &impl MeshPeer) -> Result<(), ComposeError> {
        let identity = peer.identity();
        let registered = self.services.get(identity.name()).is_some_and(|s| {
            &s.identity == identity
                && &s.scheduler.execution_group == peer.execution_group()
                && &s.task.id == peer.task_definition()
        });
        if !registered || !self.nodes.contains_key(peer.mesh_node()) {
            return Err(ComposeError::UnknownService(identity.name().to_string()));
        }
        Ok(())
    }

    fn check_unclaimed(&self, id: &str) -> Result<(), ComposeError> {
        match self.claimed.get(id) {
            Some(owner) => Err(ComposeError::ResourceIdConflict {
                id: id.to_string(),
                owner: owner.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Record a grant unless an identical one already exists.
    pub(crate) fn add_grant(&mut self, grant: ReachabilityGrant) -> Result<bool, ComposeError> {
        if self.grants.contains(&grant) {
            return Ok(false);
        }
        let id = grant.logical_id();
        self.check_unclaimed(&id)?;
        debug!(grant = %id, ports = %grant.ports, "added reachability grant");
        self.claimed.insert(
            id,
            format!("grant {} -> {}", grant.source, grant.destination),
        );
        self.grants.push(grant);
        Ok(true)
    }

    pub(crate) fn add_backend(
        &mut self,
        node: &MeshNodeId,
        route: MeshRouteName,
    ) -> Result<bool, ComposeError> {
        let node = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| ComposeError::UnknownService(node.to_string()))?;
        debug!(node = %node.name, backend = %route, "added mesh backend");
        Ok(node.add_backend(route))
    }

    pub(crate) fn add_edge(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Register a public load balancer together with the output publishing
    /// its address. Either both are recorded or neither is.
    pub(crate) fn add_entry_point(
        &mut self,
        lb: LoadBalancer,
        output: Output,
    ) -> Result<(), ComposeError> {
        if self.load_balancers.iter().any(|existing| existing.id == lb.id) {
            return Err(ComposeError::DuplicateLoadBalancer(lb.id));
        }
        self.check_unclaimed(&lb.id)?;
        if let Some(existing) = self
            .outputs
            .iter()
            .find(|o| o.id == output.id || o.export_name == output.export_name)
        {
            let taken = if existing.id == output.id {
                output.id
            } else {
                output.export_name
            };
            return Err(ComposeError::DuplicateOutput(taken));
        }

        self.claimed
            .insert(lb.id.clone(), format!("load balancer '{}'", lb.id));
        self.load_balancers.push(lb);
        self.outputs.push(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly;

    fn grant(from: &str, to: &str) -> ReachabilityGrant {
        ReachabilityGrant {
            source: ServiceIdentity::new(from, 3000).unwrap().execution_group(),
            destination: ServiceIdentity::new(to, 3000).unwrap().execution_group(),
            protocol: crate::model::Protocol::Tcp,
            ports: crate::model::PortRange::single(3000),
            description: String::new(),
        }
    }

    fn public(lb: &str, output: &str, export: &str) -> (LoadBalancer, Output) {
        let lb = LoadBalancer {
            id: lb.into(),
            network: "GreetingVpc".into(),
            internet_facing: true,
            listeners: Vec::new(),
        };
        let output = Output {
            id: output.into(),
            export_name: export.into(),
            value: lb.dns_name_ref(),
        };
        (lb, output)
    }

    #[test]
    fn grants_with_colliding_ids_are_rejected() {
        let mut asm = assembly::infrastructure(&Settings::default());
        assert_eq!(asm.add_grant(grant("a-to-b", "c")), Ok(true));
        assert_eq!(asm.add_grant(grant("a-to-b", "c")), Ok(false));
        assert_eq!(
            asm.add_grant(grant("a", "b-to-c")),
            Err(ComposeError::ResourceIdConflict {
                id: "a-to-b-to-c-ingress".into(),
                owner: "grant a-to-b-security-group -> c-security-group".into(),
            })
        );
        assert_eq!(asm.grants().len(), 1);
    }

    #[test]
    fn entry_point_is_all_or_nothing() {
        let mut asm = assembly::infrastructure(&Settings::default());
        let (lb, output) = public("external", "ExternalDNS", "app-external");
        asm.add_entry_point(lb, output).unwrap();

        let (lb, output) = public("external2", "ExternalDNS2", "app-external");
        assert_eq!(
            asm.add_entry_point(lb, output),
            Err(ComposeError::DuplicateOutput("app-external".into()))
        );
        let (lb, output) = public("external", "Other", "other-external");
        assert_eq!(
            asm.add_entry_point(lb, output),
            Err(ComposeError::DuplicateLoadBalancer("external".into()))
        );
        let (lb, output) = public("app-mesh", "Other", "other-external");
        assert!(matches!(
            asm.add_entry_point(lb, output),
            Err(ComposeError::ResourceIdConflict { .. })
        ));

        assert_eq!(asm.load_balancers().len(), 1);
        assert_eq!(asm.outputs().len(), 1);
    }
}
