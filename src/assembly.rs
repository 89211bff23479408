//! The greeter application: one public caller and two internal callees.
//!
//! ```text
//!   internet --:80--> external LB --> greeter --> name.internal
//!                                            \--> greeting.internal
//! ```

use crate::compose::{
    Assembly, ContainerDescriptor, MeshPeer, MeshService, ProcessDescriptor, PublicEntryPoint,
    ServiceProps,
};
use crate::config::Settings;
use crate::error::ComposeError;
use crate::model::{Capacity, Cluster, HealthCheck, Mesh, Namespace, Network};
use std::time::Duration;
use tracing::info;

pub const MESH_NAME: &str = "greeting-app-mesh";
pub const NAMESPACE: &str = "internal";
pub const APP_PORT: u16 = 3000;
pub const PUBLIC_PORT: u16 = 80;
pub const EXPORT_NAME: &str = "greeter-app-external";

/// Network, cluster (with node capacity) and mesh shared by all services.
pub fn infrastructure(settings: &Settings) -> Assembly {
    let network = Network {
        id: "GreetingVpc".into(),
        max_azs: 2,
    };
    let cluster = Cluster {
        id: "Cluster".into(),
        network: network.id.clone(),
        namespace: Namespace {
            name: NAMESPACE.into(),
            private: true,
        },
        capacity: vec![Capacity {
            id: "greeter-capacity".into(),
            instance_type: "t3.large".into(),
            min: 3,
            max: 3,
            key_name: Some("aws-key".into()),
        }],
    };
    let mesh = Mesh {
        id: "app-mesh".into(),
        name: MESH_NAME.into(),
    };
    Assembly::new(settings.clone(), network, cluster, mesh)
}

/// Health check shared by the three application containers.
pub fn app_health_check(port: u16) -> HealthCheck {
    HealthCheck {
        command: vec![format!("curl localhost:{port}")],
        interval: Duration::from_secs(5),
        timeout: Duration::from_secs(2),
        retries: 3,
        start_period: Duration::from_secs(10),
    }
}

fn app(name: &str) -> ContainerDescriptor {
    ContainerDescriptor::new(format!("nathanpeck/{name}"), 128)
        .with_health_check(app_health_check(APP_PORT))
        .with_log_prefix(format!("app-mesh-{name}"))
        .with_env("PORT", APP_PORT.to_string())
}

fn service_url(service: &MeshService) -> String {
    format!("http://{}:{}", service.mesh_route(), APP_PORT)
}

/// Build the complete greeter assembly.
pub fn greeter(settings: &Settings) -> Result<Assembly, ComposeError> {
    let mut assembly = infrastructure(settings);

    let name = MeshService::compose(
        &mut assembly,
        ServiceProps {
            name: "name".into(),
            port: APP_PORT,
            application: ProcessDescriptor::NodeHosted(app("name")),
        },
    )?;
    let greeting = MeshService::compose(
        &mut assembly,
        ServiceProps {
            name: "greeting".into(),
            port: APP_PORT,
            application: ProcessDescriptor::NodeHosted(app("greeting")),
        },
    )?;
    let greeter = MeshService::compose(
        &mut assembly,
        ServiceProps {
            name: "greeter".into(),
            port: APP_PORT,
            application: ProcessDescriptor::NodeHosted(
                app("greeter")
                    .with_env("GREETING_URL", service_url(&greeting))
                    .with_env("NAME_URL", service_url(&name)),
            ),
        },
    )?;

    greeter.connect_to_mesh_service(&mut assembly, &name)?;
    greeter.connect_to_mesh_service(&mut assembly, &greeting)?;

    PublicEntryPoint {
        load_balancer: "external".into(),
        listener: "PublicListener".into(),
        port: PUBLIC_PORT,
        target_group: "greeter".into(),
        target_port: PUBLIC_PORT,
        output: "ExternalDNS".into(),
        export_name: EXPORT_NAME.into(),
    }
    .attach(&mut assembly, &greeter)?;

    info!(
        services = assembly.services().count(),
        edges = assembly.edges().len(),
        "greeter assembly complete"
    );
    Ok(assembly)
}
