use crate::compose::Assembly;
use std::fmt::Write;

/// Render the call graph as a Graphviz digraph. Public services get an
/// extra edge from an `internet` node labelled with the listener port.
pub fn render_dot(assembly: &Assembly) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", assembly.mesh().name);
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  node [shape=box];");

    for svc in assembly.services() {
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\\n:{} ({:?})\"];",
            svc.identity.name(),
            svc.identity.name(),
            svc.identity.port(),
            svc.hosting
        );
    }

    let public: Vec<_> = assembly
        .load_balancers()
        .iter()
        .flat_map(|lb| lb.listeners.iter())
        .flat_map(|l| l.targets.iter().map(move |t| (l.port, t)))
        .collect();
    if !public.is_empty() {
        let _ = writeln!(out, "  \"internet\" [shape=plaintext];");
    }
    for (port, target) in public {
        if let Some(svc) = assembly.service_for_group(&target.execution_group) {
            let _ = writeln!(
                out,
                "  \"internet\" -> \"{}\" [label=\":{}\"];",
                svc.identity.name(),
                port
            );
        }
    }

    for edge in assembly.edges() {
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            edge.from, edge.to, edge.route
        );
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly;
    use crate::config::Settings;

    #[test]
    fn greeter_graph_edges() {
        let dot = render_dot(&assembly::greeter(&Settings::default()).unwrap());
        assert!(dot.starts_with("digraph \"greeting-app-mesh\" {"));
        assert!(dot.contains("\"greeter\" -> \"name\" [label=\"name.internal\"];"));
        assert!(dot.contains("\"greeter\" -> \"greeting\" [label=\"greeting.internal\"];"));
        assert!(dot.contains("\"internet\" -> \"greeter\" [label=\":80\"];"));
        assert!(!dot.contains("\"name\" -> "));
    }
}
