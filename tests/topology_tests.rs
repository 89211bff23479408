use mesh_composer::config::Settings;
use mesh_composer::error::{ComposeError, Error, TopologyError};
use mesh_composer::model::{LaunchType, TargetType};
use mesh_composer::render::render_document;
use mesh_composer::spec::TopologySpec;
use mesh_composer::{assembly, render};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn topology(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("topologies")
        .join(name)
}

#[test]
fn bundled_greeter_topology_matches_builtin_assembly() {
    let settings = Settings::default();
    let from_file = TopologySpec::load(topology("greeter.toml"))
        .expect("parse greeter.toml")
        .validate_and_build(&settings)
        .expect("build greeter.toml");
    let builtin = assembly::greeter(&settings).unwrap();

    assert_eq!(
        render_document(&from_file).unwrap(),
        render_document(&builtin).unwrap()
    );
}

#[test]
fn serverless_topology_uses_isolated_capacity() {
    let asm = TopologySpec::load(topology("greeter-serverless.toml"))
        .unwrap()
        .validate_and_build(&Settings::default())
        .unwrap();

    for svc in asm.services() {
        assert_eq!(svc.scheduler.launch_type, LaunchType::Fargate);
        assert_eq!(svc.task.container_names(), vec!["app", "envoy"]);
        assert!(asm.route(&svc.identity.mesh_route()).is_some());
    }
    assert_eq!(
        asm.load_balancers()[0].listeners[0].targets[0].target_type,
        TargetType::Ip
    );
    assert_eq!(asm.grants().len(), 2);
    assert!(asm.cluster().capacity.is_empty());
}

#[test]
fn json_topology_loads_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pair.json");
    fs::write(
        &path,
        r#"{
  "mesh": { "id": "m", "name": "pair-mesh" },
  "services": [
    { "name": "front", "port": 8080, "image": "example/front", "memory_mib": 128,
      "health_check": { "command": ["curl localhost:8080"] } },
    { "name": "back", "port": 9090, "image": "example/back", "memory_mib": 128,
      "health_check": { "command": ["curl localhost:9090"] } }
  ],
  "connections": [ { "from": "front", "to": "back" } ]
}"#,
    )
    .unwrap();

    let asm = TopologySpec::load(&path)
        .unwrap()
        .validate_and_build(&Settings::default())
        .unwrap();
    assert_eq!(asm.mesh().name, "pair-mesh");
    assert_eq!(asm.grants()[0].ports.from, 9090);
    assert!(render::render_dot(&asm).contains("\"front\" -> \"back\""));
}

#[test]
fn missing_topology_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    match TopologySpec::load(dir.path().join("absent.toml")) {
        Err(Error::Topology(TopologyError::ReadFile { .. })) => {}
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn settings_region_flows_into_proxies_and_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(&path, "region = \"eu-central-1\"\n[proxy]\nlog_level = \"info\"\n").unwrap();

    let settings = Settings::load(&path).unwrap();
    let asm = assembly::greeter(&settings).unwrap();
    let proxy = asm
        .service("name")
        .unwrap()
        .task
        .container("envoy")
        .unwrap();
    assert_eq!(proxy.environment["AWS_REGION"], "eu-central-1");
    assert_eq!(proxy.environment["ENVOY_LOG_LEVEL"], "info");

    let doc: serde_json::Value = serde_json::from_str(&render_document(&asm).unwrap()).unwrap();
    assert_eq!(doc["region"], "eu-central-1");
    assert_eq!(doc["format"], "mesh-composer/v1");
}

fn hyphenated_topology(services: &[&str], connections: &[(&str, &str)]) -> TopologySpec {
    let mut text = String::new();
    for name in services {
        text.push_str(&format!(
            "[[services]]\nname = \"{name}\"\nport = 3000\nimage = \"example/{name}\"\n\
             memory_mib = 128\nhealth_check = {{ command = [\"curl localhost:3000\"] }}\n\n"
        ));
    }
    for (from, to) in connections {
        text.push_str(&format!("[[connections]]\nfrom = \"{from}\"\nto = \"{to}\"\n\n"));
    }
    TopologySpec::from_toml(&text).unwrap()
}

#[test]
fn services_whose_resource_ids_collide_are_rejected() {
    let spec = hyphenated_topology(&["a", "a-virtual"], &[]);
    match spec.validate_and_build(&Settings::default()) {
        Err(Error::Compose(ComposeError::ResourceIdConflict { id, .. })) => {
            assert_eq!(id, "a-virtual-service");
        }
        other => panic!("expected resource id conflict, got {other:?}"),
    }
}

#[test]
fn grants_whose_resource_ids_collide_are_rejected() {
    let spec = hyphenated_topology(
        &["a", "a-to-b", "c", "b-to-c"],
        &[("a-to-b", "c"), ("a", "b-to-c")],
    );
    match spec.validate_and_build(&Settings::default()) {
        Err(Error::Compose(ComposeError::ResourceIdConflict { id, .. })) => {
            assert_eq!(id, "a-to-b-to-c-ingress");
        }
        other => panic!("expected resource id conflict, got {other:?}"),
    }

    // Without the clashing edge every grant is rendered.
    let asm = hyphenated_topology(&["a", "a-to-b", "c", "b-to-c"], &[("a-to-b", "c"), ("a", "c")])
        .validate_and_build(&Settings::default())
        .unwrap();
    let doc: serde_json::Value = serde_json::from_str(&render_document(&asm).unwrap()).unwrap();
    let rules = doc["resources"]
        .as_object()
        .unwrap()
        .values()
        .filter(|r| r["type"] == "IngressRule")
        .count();
    assert_eq!(rules, 2);
}
