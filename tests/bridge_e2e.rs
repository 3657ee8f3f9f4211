use serde_json::{Value, json};

use wirebridge::dispatch::CallContext;

mod common;
use common::*;

/********************
 * Literal scenarios
 ********************/

#[test]
fn echo_string_round_trips() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 1, "params": ["hello"]}),
    );
    assert_eq!(response, json!({"id": 1, "result": "hello"}));
}

#[test]
fn echo_int_array_round_trips() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 2, "params": [[1, 2, 3]]}),
    );
    assert_eq!(response, json!({"id": 2, "result": [1, 2, 3]}));
}

#[test]
fn cyclic_bean_result_carries_exactly_one_fixup() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.aBean", "id": 3, "params": []}),
    );

    assert_eq!(response["id"], json!(3));
    assert_eq!(response["result"]["javaClass"], json!("demo.BeanA"));
    assert_eq!(
        response["result"]["beanB"]["javaClass"],
        json!("demo.BeanB")
    );
    // The revisit position holds null; the fixup restores it.
    assert_eq!(response["result"]["beanB"]["beanA"], Value::Null);
    assert_eq!(
        response["fixups"],
        json!([[["result", "beanB", "beanA"], ["result"]]])
    );
}

#[test]
fn missing_method_fails_with_591() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.missing", "id": 4, "params": []}),
    );
    assert_eq!(response["id"], json!(4));
    assert_eq!(response["error"]["code"], json!(591));
    assert!(response.get("result").is_none());
}

#[test]
fn disallowed_class_hint_fails_with_592() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({
            "method": "test.echo",
            "id": 5,
            "params": [{"javaClass": "sun.misc.Unsafe", "x": 1}],
        }),
    );
    assert_eq!(response["error"]["code"], json!(592));
}

#[test]
fn overloads_dispatch_on_argument_kind() {
    let bridge = default_bridge();
    let numeric = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.pick", "id": 6, "params": [4.5]}),
    );
    assert_eq!(numeric["result"], json!("number"));

    let boolean = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.pick", "id": 7, "params": [true]}),
    );
    assert_eq!(boolean["result"], json!("boolean"));
}

/********************
 * Failure shaping
 ********************/

#[test]
fn malformed_requests_fail_with_590_and_null_id() {
    let bridge = default_bridge();

    let not_an_object = bridge.call(&CallContext::new(), &json!([1, 2]));
    assert_eq!(not_an_object["error"]["code"], json!(590));
    assert_eq!(not_an_object["id"], Value::Null);

    let no_method = bridge.call(&CallContext::new(), &json!({"id": 8}));
    assert_eq!(no_method["error"]["code"], json!(590));
    assert_eq!(no_method["id"], json!(8));

    let bad_params = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 9, "params": "nope"}),
    );
    assert_eq!(bad_params["error"]["code"], json!(590));
}

#[test]
fn handler_errors_surface_as_490_with_sanitized_trace() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.raise", "id": 10, "params": []}),
    );
    assert_eq!(response["error"]["code"], json!(490));
    assert_eq!(response["error"]["message"], json!("boom"));
    assert_eq!(
        response["error"]["data"],
        json!("boom\ncaused by: root cause")
    );
}

#[test]
fn string_ids_echo_back() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": "alpha", "params": ["x"]}),
    );
    assert_eq!(response["id"], json!("alpha"));
}

/********************
 * Locals, constructors, references
 ********************/

#[test]
fn local_arguments_resolve_from_the_context() {
    let bridge = default_bridge();
    let ctx = CallContext::new().with("session", String::from("s-42"));
    let response = bridge.call(
        &ctx,
        &json!({"method": "test.whoami", "id": 11, "params": []}),
    );
    assert_eq!(response["result"], json!("s-42"));

    let missing = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.whoami", "id": 12, "params": []}),
    );
    assert_eq!(missing["error"]["code"], json!(592));
}

#[test]
fn constructors_answer_to_the_synthetic_name() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "demo.Counter.$constructor", "id": 13, "params": []}),
    );
    assert_eq!(
        response["result"],
        json!({"javaClass": "demo.Counter", "count": 0})
    );
}

#[test]
fn static_methods_dispatch_through_the_class_name() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "demo.Counter.version", "id": 14, "params": []}),
    );
    assert_eq!(response["result"], json!("1.0"));
}

#[test]
fn callable_references_round_trip_and_dispatch() {
    let bridge = default_bridge();
    let opened = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.openSession", "id": 15, "params": []}),
    );
    assert_eq!(opened["result"]["JSONRPCType"], json!("CallableReference"));
    assert_eq!(opened["result"]["javaClass"], json!("demo.Session"));
    let object_id = opened["result"]["objectID"].as_u64().expect("objectID");

    let touched = bridge.call(
        &CallContext::new(),
        &json!({
            "method": format!(".obj[{object_id}].touch"),
            "id": 16,
            "params": [],
        }),
    );
    assert_eq!(touched["result"], json!(1));

    assert!(bridge.invalidate_reference(object_id));
    let dead = bridge.call(
        &CallContext::new(),
        &json!({
            "method": format!(".obj[{object_id}].touch"),
            "id": 17,
            "params": [],
        }),
    );
    assert_eq!(dead["error"]["code"], json!(591));
}

/********************
 * Catalogue
 ********************/

#[test]
fn list_methods_enumerates_the_sorted_catalogue() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "system.listMethods", "id": 18, "params": []}),
    );
    let entries: Vec<String> = response["result"]
        .as_array()
        .expect("catalogue is an array")
        .iter()
        .map(|v| v.as_str().expect("entries are strings").to_string())
        .collect();

    let mut sorted = entries.clone();
    sorted.sort();
    assert_eq!(entries, sorted, "catalogue is sorted");

    assert!(entries.contains(&"test.echo".to_string()));
    assert!(entries.contains(&"test.aBean".to_string()));
    assert!(entries.contains(&"demo.Counter.version".to_string()));
    assert!(entries.contains(&"demo.Counter.$constructor".to_string()));
    assert!(entries.contains(&";ref[demo.Session].touch".to_string()));
}

/********************
 * Concurrency
 ********************/

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_share_the_bridge_safely() {
    let bridge = std::sync::Arc::new(default_bridge());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let bridge = std::sync::Arc::clone(&bridge);
            tokio::spawn(async move {
                let payload = format!("msg-{i}");
                let response = bridge.call(
                    &CallContext::new(),
                    &json!({"method": "test.echo", "id": i, "params": [payload.clone()]}),
                );
                assert_eq!(response["result"], json!(payload));
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
}
