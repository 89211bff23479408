use crate::compose::Assembly;
use crate::compose::sidecar::APP_CONTAINER;
use std::fmt::Write;

/// Human-readable plan of what the assembly will ask the engine to create.
pub fn render_summary(assembly: &Assembly) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "mesh {} on cluster {} ({}), region {}",
        assembly.mesh().name,
        assembly.cluster().id,
        assembly.network().id,
        assembly.region()
    );

    for svc in assembly.services() {
        let name = svc.identity.name();
        let image = svc
            .task
            .container(APP_CONTAINER)
            .map(|c| c.image.as_str())
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "\nservice {name} :{} [{:?}] x{}",
            svc.identity.port(),
            svc.hosting,
            svc.scheduler.desired_count
        );
        let _ = writeln!(out, "  image      {image}");
        let _ = writeln!(out, "  containers {}", svc.task.container_names().join(", "));
        let _ = writeln!(out, "  discovery  {}", svc.scheduler.discovery.hostname());
        let _ = writeln!(out, "  route      {}", svc.identity.mesh_route());
        if let Some(node) = assembly.node(&svc.identity.mesh_node()) {
            let backends: Vec<&str> = node.backends().iter().map(|b| b.as_str()).collect();
            if !backends.is_empty() {
                let _ = writeln!(out, "  backends   {}", backends.join(", "));
            }
        }
    }

    if !assembly.grants().is_empty() {
        let _ = writeln!(out, "\ngrants");
        for g in assembly.grants() {
            let _ = writeln!(
                out,
                "  {} -> {} tcp/{}",
                g.source, g.destination, g.ports
            );
        }
    }

    for lb in assembly.load_balancers() {
        for l in &lb.listeners {
            for t in &l.targets {
                let _ = writeln!(
                    out,
                    "\npublic {}:{} -> {} port {}",
                    lb.id, l.port, t.service, t.port
                );
            }
        }
    }
    for o in assembly.outputs() {
        let _ = writeln!(out, "output {} = {}", o.export_name, o.value);
    }
    out
}
