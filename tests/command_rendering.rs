mod common;

use common::{replica_env, TestResult};
use kubevali::cluster::StaticNodeAddresses;
use kubevali::config::{render, ConfigFile};
use kubevali::errors::KubevaliError;
use kubevali::identity::Environment;
use kubevali::template::TemplateError;
use kubevali::types::ArgValue;
use kubevali_test_utils::builders::ConfigFileBuilder;

fn render_for(cfg: &ConfigFile, index: usize) -> kubevali::errors::Result<kubevali::config::RenderedNode> {
    let nodes = StaticNodeAddresses::new(cfg.cluster.external_addresses.clone());
    render(cfg, &replica_env(index), &nodes)
}

#[test]
fn index_from_hostname_drives_command() -> TestResult {
    let cfg = ConfigFileBuilder::new(&["{{ .Index }}"]).build();
    let node = render_for(&cfg, 2)?;

    assert_eq!(node.identity.index, 2);
    assert_eq!(node.command.path, "2");
    assert!(node.command.args.is_empty());
    Ok(())
}

#[test]
fn common_template_is_shared_by_command_and_args() -> TestResult {
    let cfg = ConfigFileBuilder::new(&["/usr/bin/node", "--name", r#"{{ include "name" . }}"#])
        .with_common_template(r#"{{ define "name" }}validator-{{ .Index }}{{ end }}"#)
        .with_arg("base-path", ArgValue::String(r#"/data/{{ include "name" . }}"#.to_string()))
        .with_arg("rpc-port", ArgValue::Int(9933))
        .build();

    let node = render_for(&cfg, 1)?;
    assert_eq!(node.command.path, "/usr/bin/node");
    assert_eq!(
        node.command.args,
        vec!["--name", "validator-1", "--base-path", "/data/validator-1", "--rpc-port", "9933"]
    );
    Ok(())
}

#[test]
fn flags_are_sorted_by_name() -> TestResult {
    let cfg = ConfigFileBuilder::new(&["node"])
        .with_arg("zeta", ArgValue::Int(1))
        .with_arg("alpha", ArgValue::Bool(false))
        .with_arg("mid", ArgValue::List(vec!["x".to_string(), "y".to_string()]))
        .build();

    let node = render_for(&cfg, 0)?;
    assert_eq!(
        node.command.args,
        vec!["--alpha", "false", "--mid", "x", "--mid", "y", "--zeta", "1"]
    );
    Ok(())
}

#[test]
fn conditional_flags_disappear_when_empty() -> TestResult {
    let cfg = ConfigFileBuilder::new(&["node"])
        .with_arg(
            "bootnodes",
            ArgValue::String(r#"{{ if ne .Index 0 }}/ip4/{{ getNodeIPWithIndex 0 }}/tcp/30333{{ end }}"#.to_string()),
        )
        .with_addresses(&["10.0.0.1", "10.0.0.2"])
        .build();

    assert!(render_for(&cfg, 0)?.command.args.is_empty());
    assert_eq!(
        render_for(&cfg, 1)?.command.args,
        vec!["--bootnodes", "/ip4/10.0.0.1/tcp/30333"]
    );
    Ok(())
}

#[test]
fn random_node_ip_needs_addresses() {
    let cfg = ConfigFileBuilder::new(&["node", "{{ getRandomNodeIP }}"]).build();
    match render_for(&cfg, 0) {
        Err(KubevaliError::Template(TemplateError::Exec(msg))) => {
            assert!(msg.contains("no external node address found"), "{msg}");
        }
        other => panic!("expected template error, got: {other:?}"),
    }
}

#[test]
fn self_referencing_include_fails_cleanly() {
    let cfg = ConfigFileBuilder::new(&[r#"{{ include "loop" . }}"#])
        .with_common_template(
            r#"{{ define "loop" }}{{ if true }}{{ printf "%s" (include "loop" . | upper) }}{{ end }}{{ end }}"#,
        )
        .build();

    match render_for(&cfg, 0) {
        Err(KubevaliError::Template(TemplateError::Recursion(name))) => assert_eq!(name, "loop"),
        other => panic!("expected recursion error, got: {other:?}"),
    }
}

#[test]
fn missing_hostname_is_an_invalid_index() {
    let cfg = ConfigFileBuilder::new(&["node"]).build();
    let result = render(&cfg, &Environment::isolated(), &StaticNodeAddresses::default());
    assert!(matches!(result, Err(KubevaliError::InvalidIndex { .. })));
}

#[test]
fn short_healthcheck_list_is_reported() {
    let cfg = ConfigFileBuilder::new(&["node"])
        .with_watchlog("Imported", std::time::Duration::from_secs(60), &["id-0", "id-1"])
        .build();

    let err = render_for(&cfg, 2).unwrap_err();
    assert_eq!(
        err.to_string(),
        "not enough healthcheck IDs: expected at least 3, got 2"
    );
}

#[test]
fn dry_run_line_is_shell_quoted() -> TestResult {
    let cfg = ConfigFileBuilder::new(&["/usr/bin/node", "--name", "validator {{ .Index }}"]).build();
    let node = render_for(&cfg, 4)?;
    assert_eq!(node.command.shell_command(), "/usr/bin/node --name 'validator 4'");
    Ok(())
}
