use mesh_composer::assembly;
use mesh_composer::compose::sidecar::{EGRESS_IGNORED_IPS, METRICS_CONTAINER, PROXY_CONTAINER};
use mesh_composer::config::Settings;
use mesh_composer::model::{DependencyCondition, PortRange, Protocol, ServiceIdentity};
use pretty_assertions::assert_eq;

#[test]
fn greeter_call_graph_has_exactly_two_edges_from_greeter() {
    let asm = assembly::greeter(&Settings::default()).expect("greeter assembly");

    let greeter_group = ServiceIdentity::new("greeter", 3000)
        .unwrap()
        .execution_group();
    assert_eq!(asm.grants().len(), 2);
    for grant in asm.grants() {
        assert_eq!(grant.source, greeter_group);
        assert_eq!(grant.protocol, Protocol::Tcp);
        assert_eq!(grant.ports, PortRange::single(3000));
    }

    let destinations: Vec<&str> = asm
        .grants()
        .iter()
        .map(|g| g.destination.as_str())
        .collect();
    assert_eq!(
        destinations,
        vec!["name-security-group", "greeting-security-group"]
    );

    let edges: Vec<(&str, &str)> = asm
        .edges()
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(edges, vec![("greeter", "name"), ("greeter", "greeting")]);
}

#[test]
fn greeter_backends_are_exactly_its_callees() {
    let asm = assembly::greeter(&Settings::default()).unwrap();

    let backends = |name: &str| -> Vec<String> {
        let id = ServiceIdentity::new(name, 3000).unwrap();
        asm.node(&id.mesh_node())
            .expect("node registered")
            .backends()
            .iter()
            .map(|r| r.to_string())
            .collect()
    };

    assert_eq!(
        backends("greeter"),
        vec!["greeting.internal".to_string(), "name.internal".to_string()]
    );
    assert!(backends("name").is_empty());
    assert!(backends("greeting").is_empty());
}

#[test]
fn every_service_follows_the_composition_contract() {
    let asm = assembly::greeter(&Settings::default()).unwrap();
    assert_eq!(asm.services().count(), 3);

    for svc in asm.services() {
        let name = svc.identity.name();

        let route = asm.route(&svc.identity.mesh_route()).expect("route registered");
        assert_eq!(route.name.as_str(), format!("{name}.internal"));
        assert_eq!(route.node, svc.identity.mesh_node());

        let app = svc.task.container("app").expect("app container");
        assert_eq!(
            app.dependency_on(PROXY_CONTAINER),
            Some(DependencyCondition::Healthy),
            "{name}"
        );
        assert_eq!(
            app.dependency_on(METRICS_CONTAINER),
            Some(DependencyCondition::Start),
            "{name}"
        );

        assert_eq!(svc.task.proxy.egress_ignored_ips, EGRESS_IGNORED_IPS.to_vec());

        let proxy = svc.task.container(PROXY_CONTAINER).unwrap();
        let check = proxy.health_check.as_ref().expect("proxy health check");
        assert!(check.start_period >= check.interval * 2, "{name}");
        assert!(proxy.essential);
    }
}
