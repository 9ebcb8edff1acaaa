mod common;

use common::replica_env;
use kubevali::cluster::StaticNodeAddresses;
use kubevali::config::render;
use kubevali::types::ArgValue;
use kubevali_test_utils::builders::ConfigFileBuilder;
use proptest::prelude::*;

proptest! {
    #[test]
    fn string_flag_is_omitted_iff_empty(value in "[a-z0-9/.]{0,12}", index in 0usize..50) {
        let cfg = ConfigFileBuilder::new(&["node"])
            .with_arg("flag", ArgValue::String(value.clone()))
            .build();
        let node = render(&cfg, &replica_env(index), &StaticNodeAddresses::default()).unwrap();

        if value.is_empty() {
            prop_assert!(node.command.args.is_empty());
        } else {
            prop_assert_eq!(node.command.args, vec!["--flag".to_string(), value]);
        }
    }

    #[test]
    fn list_flag_repeats_for_each_non_empty_element(items in proptest::collection::vec("[a-z]{0,4}", 0..6)) {
        let cfg = ConfigFileBuilder::new(&["node"])
            .with_arg("peer", ArgValue::List(items.clone()))
            .build();
        let node = render(&cfg, &replica_env(0), &StaticNodeAddresses::default()).unwrap();

        let expected: Vec<String> = items
            .iter()
            .filter(|item| !item.is_empty())
            .flat_map(|item| ["--peer".to_string(), item.clone()])
            .collect();
        prop_assert_eq!(node.command.args, expected);
    }

    #[test]
    fn rendering_is_deterministic(index in 0usize..1000) {
        let cfg = ConfigFileBuilder::new(&["node", "--id={{ .Index }}", "{{ add .Index 30333 }}"])
            .with_common_template(r#"{{ define "p" }}{{ mul .Index 2 }}{{ end }}"#)
            .with_arg("p", ArgValue::String(r#"{{ include "p" . }}"#.to_string()))
            .build();
        let env = replica_env(index);
        let nodes = StaticNodeAddresses::default();

        let first = render(&cfg, &env, &nodes).unwrap();
        let second = render(&cfg, &env, &nodes).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.identity.index, index);
        prop_assert_eq!(first.command.args[1].clone(), (index + 30333).to_string());
    }
}
