use serde_json::{Value, json};

use wirebridge::config::BridgeConfig;
use wirebridge::state::{Fixup, FixupPolicy, PathSeg};
use wirebridge::types::TypeSpec;
use wirebridge::value::HostValue;

mod common;
use common::*;

/// Re-root marshal-side fixups (`result`-rooted) onto the first parameter
/// position, the way a client would when echoing a graph back.
fn reroot_to_param(fixups: &[Fixup], index: usize) -> Vec<Fixup> {
    fixups
        .iter()
        .map(|fixup| {
            let rebase = |path: &[PathSeg]| {
                let mut out = vec![PathSeg::field("params"), PathSeg::Index(index)];
                out.extend_from_slice(&path[1..]);
                out
            };
            Fixup {
                target: rebase(&fixup.target),
                source: rebase(&fixup.source),
            }
        })
        .collect()
}

/********************
 * Marshal direction
 ********************/

#[test]
fn shared_value_marshals_once_with_one_fixup() {
    let bridge = default_bridge();
    let shared = HostValue::list(vec![HostValue::Int(1)]);
    let root = HostValue::list(vec![shared.clone(), shared]);

    let outcome = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &root)
        .unwrap();

    assert_eq!(
        outcome.value["list"],
        json!([{"javaClass": "java.util.ArrayList", "list": [1]}, null])
    );
    assert_eq!(outcome.fixups.len(), 1);
    assert_eq!(
        outcome.fixups[0].target,
        vec![
            PathSeg::field("result"),
            PathSeg::field("list"),
            PathSeg::Index(1)
        ]
    );
    assert_eq!(
        outcome.fixups[0].source,
        vec![
            PathSeg::field("result"),
            PathSeg::field("list"),
            PathSeg::Index(0)
        ]
    );
}

#[test]
fn fixups_accumulate_in_discovery_order_against_the_first_location() {
    let bridge = default_bridge();
    let shared = HostValue::list(vec![HostValue::Int(7)]);
    let root = HostValue::list(vec![shared.clone(), shared.clone(), shared]);

    let outcome = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &root)
        .unwrap();

    assert_eq!(outcome.fixups.len(), 2);
    for (i, fixup) in outcome.fixups.iter().enumerate() {
        assert_eq!(
            fixup.target,
            vec![
                PathSeg::field("result"),
                PathSeg::field("list"),
                PathSeg::Index(i + 1)
            ]
        );
        // Every duplicate points at the canonical first location.
        assert_eq!(
            fixup.source,
            vec![
                PathSeg::field("result"),
                PathSeg::field("list"),
                PathSeg::Index(0)
            ]
        );
    }
}

#[test]
fn cycles_are_fatal_under_duplicates_only() {
    let bridge = test_bridge(
        BridgeConfig::default().with_fixup_policy(FixupPolicy::DuplicatesOnly),
    );
    let err = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &cyclic_bean_a())
        .unwrap_err();
    assert!(err.to_string().contains("circular reference"));
}

#[test]
fn forbid_policy_expands_duplicates_as_copies() {
    let bridge = test_bridge(BridgeConfig::default().with_fixup_policy(FixupPolicy::Forbid));
    let shared = HostValue::list(vec![HostValue::Int(1)]);
    let root = HostValue::list(vec![shared.clone(), shared]);

    let outcome = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &root)
        .unwrap();

    assert!(outcome.fixups.is_empty());
    let expected = json!({"javaClass": "java.util.ArrayList", "list": [1]});
    assert_eq!(outcome.value["list"], json!([expected, expected]));
}

#[test]
fn determinism_identical_graphs_marshal_byte_identically() {
    let bridge = default_bridge();
    let first = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &cyclic_bean_a())
        .unwrap();
    let second = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &cyclic_bean_a())
        .unwrap();

    assert_eq!(
        serde_json::to_string(&first.value).unwrap(),
        serde_json::to_string(&second.value).unwrap()
    );
    assert_eq!(first.fixups, second.fixups);
}

/********************
 * Unmarshal direction
 ********************/

#[test]
fn duplicate_parameters_rebuild_with_shared_identity() {
    let bridge = default_bridge();
    let wire = json!({"javaClass": "java.util.ArrayList", "list": [1, 2]});
    let fixups = vec![Fixup {
        target: vec![PathSeg::field("params"), PathSeg::Index(1)],
        source: vec![PathSeg::field("params"), PathSeg::Index(0)],
    }];

    let spec = TypeSpec::list_of(TypeSpec::Any);
    let values = bridge
        .serializer()
        .unmarshal_params(&[&spec, &spec], &[wire, Value::Null], &fixups)
        .unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values[0].identity(), values[1].identity());
}

#[test]
fn cyclic_graph_round_trips_with_identity_sharing() {
    let bridge = default_bridge();
    let outcome = bridge
        .serializer()
        .marshal_root(vec![PathSeg::field("result")], &cyclic_bean_a())
        .unwrap();

    let spec = TypeSpec::Bean("demo.BeanA".to_string());
    let values = bridge
        .serializer()
        .unmarshal_params(
            &[&spec],
            &[outcome.value.clone()],
            &reroot_to_param(&outcome.fixups, 0),
        )
        .unwrap();

    let HostValue::Object(rebuilt_a) = &values[0] else {
        panic!("expected an object, got {:?}", values[0]);
    };
    let bean_b = rebuilt_a
        .with(|a: &BeanA| a.bean_b.clone())
        .expect("instance is a BeanA")
        .expect("beanB survived the round trip");
    let HostValue::Object(rebuilt_b) = &bean_b else {
        panic!("beanB is not an object");
    };
    let back = rebuilt_b
        .with(|b: &BeanB| b.bean_a.clone())
        .expect("instance is a BeanB")
        .expect("beanA survived the round trip");

    // The cycle is closed on the same allocation, not a copy.
    assert_eq!(back.identity(), values[0].identity());
}

#[test]
fn broken_fixup_paths_are_dispatch_failures() {
    let bridge = default_bridge();
    let spec = TypeSpec::list_of(TypeSpec::Any);
    let fixups = vec![Fixup {
        target: vec![PathSeg::field("params"), PathSeg::Index(0), PathSeg::Index(9)],
        source: vec![PathSeg::field("params"), PathSeg::Index(0), PathSeg::Index(0)],
    }];
    let err = bridge
        .serializer()
        .unmarshal_params(&[&spec], &[json!([1])], &fixups)
        .unwrap_err();
    assert!(err.is_dispatch_failure());
}
