//! Desired-state document handed to the provisioning engine.
//!
//! Every record becomes a resource keyed by a stable logical id, with its
//! properties and the logical ids it must be created after. Maps are
//! ordered so the same assembly always renders byte-identical output.

use crate::compose::Assembly;
use crate::error::RenderError;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

pub const FORMAT: &str = "mesh-composer/v1";

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub format: &'static str,
    pub region: String,
    pub resources: BTreeMap<String, Resource>,
    pub outputs: BTreeMap<String, OutputView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputView {
    pub export_name: String,
    pub value: String,
}

/// Insert `resource` under `id`. Two records never share an id.
fn insert(
    resources: &mut BTreeMap<String, Resource>,
    id: String,
    resource: Resource,
) -> Result<(), RenderError> {
    match resources.entry(id) {
        Entry::Occupied(entry) => Err(RenderError::DuplicateResource {
            id: entry.key().clone(),
            existing: entry.get().kind,
            kind: resource.kind,
        }),
        Entry::Vacant(entry) => {
            entry.insert(resource);
            Ok(())
        }
    }
}

/// Build the document for `assembly`.
pub fn build_document(assembly: &Assembly) -> Result<Document, RenderError> {
    let mut resources = BTreeMap::new();

    let network = assembly.network();
    let cluster = assembly.cluster();
    let mesh = assembly.mesh();

    insert(
        &mut resources,
        network.id.clone(),
        Resource {
            kind: "Network",
            properties: serde_json::to_value(network)?,
            depends_on: vec![],
        },
    )?;
    insert(
        &mut resources,
        cluster.id.clone(),
        Resource {
            kind: "Cluster",
            properties: serde_json::to_value(cluster)?,
            depends_on: vec![network.id.clone()],
        },
    )?;
    insert(
        &mut resources,
        mesh.id.clone(),
        Resource {
            kind: "Mesh",
            properties: serde_json::to_value(mesh)?,
            depends_on: vec![],
        },
    )?;

    for svc in assembly.services() {
        let name = svc.identity.name();
        let group = svc.scheduler.execution_group.to_string();

        insert(
            &mut resources,
            group.clone(),
            Resource {
                kind: "ExecutionGroup",
                properties: json!({
                    "network": network.id,
                    "service": name,
                }),
                depends_on: vec![network.id.clone()],
            },
        )?;
        insert(
            &mut resources,
            svc.identity.task_definition().to_string(),
            Resource {
                kind: "TaskDefinition",
                properties: serde_json::to_value(&svc.task)?,
                depends_on: vec![],
            },
        )?;
        insert(
            &mut resources,
            svc.identity.scheduler_service(),
            Resource {
                kind: "Service",
                properties: serde_json::to_value(&svc.scheduler)?,
                depends_on: vec![
                    cluster.id.clone(),
                    svc.identity.task_definition().to_string(),
                    group,
                ],
            },
        )?;

        if let Some(node) = assembly.node(&svc.identity.mesh_node()) {
            let mut depends_on = vec![mesh.id.clone(), svc.identity.scheduler_service()];
            for backend in node.backends() {
                let callee = assembly
                    .route(backend)
                    .and_then(|route| assembly.service(route.node.as_str()));
                if let Some(callee) = callee {
                    depends_on.push(callee.identity.virtual_service_id());
                }
            }
            insert(
                &mut resources,
                svc.identity.virtual_node_id(),
                Resource {
                    kind: "VirtualNode",
                    properties: serde_json::to_value(node)?,
                    depends_on,
                },
            )?;
        }

        if let Some(route) = assembly.route(&svc.identity.mesh_route()) {
            insert(
                &mut resources,
                svc.identity.virtual_service_id(),
                Resource {
                    kind: "VirtualService",
                    properties: serde_json::to_value(route)?,
                    depends_on: vec![mesh.id.clone(), svc.identity.virtual_node_id()],
                },
            )?;
        }
    }

    for grant in assembly.grants() {
        insert(
            &mut resources,
            grant.logical_id(),
            Resource {
                kind: "IngressRule",
                properties: serde_json::to_value(grant)?,
                depends_on: vec![grant.source.to_string(), grant.destination.to_string()],
            },
        )?;
    }

    for lb in assembly.load_balancers() {
        let depends_on = lb
            .listeners
            .iter()
            .flat_map(|l| l.targets.iter().map(|t| t.service.clone()))
            .chain(std::iter::once(network.id.clone()))
            .collect();
        insert(
            &mut resources,
            lb.id.clone(),
            Resource {
                kind: "LoadBalancer",
                properties: serde_json::to_value(lb)?,
                depends_on,
            },
        )?;
    }

    let mut outputs = BTreeMap::new();
    for o in assembly.outputs() {
        let view = OutputView {
            export_name: o.export_name.clone(),
            value: o.value.clone(),
        };
        if outputs.insert(o.id.clone(), view).is_some() {
            return Err(RenderError::DuplicateResource {
                id: o.id.clone(),
                existing: "Output",
                kind: "Output",
            });
        }
    }

    Ok(Document {
        format: FORMAT,
        region: assembly.region().to_string(),
        resources,
        outputs,
    })
}

/// Render `assembly` as pretty-printed JSON.
pub fn render_document(assembly: &Assembly) -> Result<String, RenderError> {
    let doc = build_document(assembly)?;
    Ok(serde_json::to_string_pretty(&doc)?)
}
