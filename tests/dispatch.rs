use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use wirebridge::dispatch::{
    CallContext, CallbackRegistration, HandlerError, InvocationCallback, MethodSpec, MethodTarget,
};
use wirebridge::value::HostValue;

mod common;
use common::*;

/********************
 * Arity routing
 ********************/

#[test]
fn arity_is_part_of_the_method_key() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 1, "params": ["a", "b"]}),
    );
    assert_eq!(response["error"]["code"], json!(591));
}

#[test]
fn absent_params_mean_zero_arity() {
    let bridge = default_bridge();
    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.aBean", "id": 2}),
    );
    assert!(response.get("error").is_none());
}

/********************
 * Callbacks
 ********************/

#[derive(Default)]
struct Recording {
    pre: AtomicUsize,
    post: AtomicUsize,
    errors: AtomicUsize,
    veto: bool,
}

impl InvocationCallback for Recording {
    fn pre_invoke(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _args: &[HostValue],
    ) -> Result<(), HandlerError> {
        self.pre.fetch_add(1, Ordering::SeqCst);
        if self.veto {
            Err(HandlerError::msg("vetoed"))
        } else {
            Ok(())
        }
    }

    fn post_invoke(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _outcome: Result<&HostValue, &HandlerError>,
    ) -> Result<(), HandlerError> {
        self.post.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_error(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _error: &HandlerError,
    ) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn callbacks_observe_successful_calls() {
    let bridge = default_bridge();
    let recording = Arc::new(Recording::default());
    bridge.register_callback(CallbackRegistration::global(Arc::clone(&recording) as Arc<dyn InvocationCallback>));

    bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 1, "params": ["x"]}),
    );
    assert_eq!(recording.pre.load(Ordering::SeqCst), 1);
    assert_eq!(recording.post.load(Ordering::SeqCst), 1);
    assert_eq!(recording.errors.load(Ordering::SeqCst), 0);
}

#[test]
fn pre_invoke_errors_abort_the_call() {
    let bridge = default_bridge();
    let recording = Arc::new(Recording {
        veto: true,
        ..Recording::default()
    });
    bridge.register_callback(CallbackRegistration::global(Arc::clone(&recording) as Arc<dyn InvocationCallback>));

    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 2, "params": ["x"]}),
    );
    assert_eq!(response["error"]["code"], json!(490));
    assert_eq!(response["error"]["message"], json!("vetoed"));
    // The handler never ran, so post_invoke never ran either.
    assert_eq!(recording.post.load(Ordering::SeqCst), 0);
    assert_eq!(recording.errors.load(Ordering::SeqCst), 1);
}

#[test]
fn post_invoke_runs_even_when_the_handler_fails() {
    let bridge = default_bridge();
    let recording = Arc::new(Recording::default());
    bridge.register_callback(CallbackRegistration::global(Arc::clone(&recording) as Arc<dyn InvocationCallback>));

    bridge.call(
        &CallContext::new(),
        &json!({"method": "test.raise", "id": 3, "params": []}),
    );
    assert_eq!(recording.post.load(Ordering::SeqCst), 1);
    assert_eq!(recording.errors.load(Ordering::SeqCst), 1);
}

struct PostVeto;

impl InvocationCallback for PostVeto {
    fn post_invoke(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _outcome: Result<&HostValue, &HandlerError>,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::msg("post rejected"))
    }
}

#[test]
fn post_invoke_errors_replace_the_outcome() {
    let bridge = default_bridge();
    bridge.register_callback(CallbackRegistration::global(Arc::new(PostVeto)));

    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 4, "params": ["x"]}),
    );
    assert_eq!(response["error"]["code"], json!(490));
    assert_eq!(response["error"]["message"], json!("post rejected"));
}

#[test]
fn scoped_callbacks_only_see_matching_contexts() {
    let bridge = default_bridge();
    let recording = Arc::new(Recording::default());
    bridge.register_callback(CallbackRegistration::scoped(
        Arc::clone(&recording) as Arc<dyn InvocationCallback>,
        "session",
    ));

    bridge.call(
        &CallContext::new(),
        &json!({"method": "test.echo", "id": 5, "params": ["x"]}),
    );
    assert_eq!(recording.pre.load(Ordering::SeqCst), 0);

    let ctx = CallContext::new().with("session", String::from("s"));
    bridge.call(&ctx, &json!({"method": "test.echo", "id": 6, "params": ["x"]}));
    assert_eq!(recording.pre.load(Ordering::SeqCst), 1);
}

/********************
 * Exception transformer
 ********************/

#[test]
fn the_exception_transformer_reshapes_remote_failures() {
    let bridge = default_bridge();
    bridge.set_exception_transformer(Arc::new(|err| {
        HandlerError::msg("internal error").caused_by(err)
    }));

    let response = bridge.call(
        &CallContext::new(),
        &json!({"method": "test.raise", "id": 7, "params": []}),
    );
    assert_eq!(response["error"]["code"], json!(490));
    assert_eq!(response["error"]["message"], json!("internal error"));
    assert_eq!(
        response["error"]["data"],
        json!("internal error\ncaused by: boom\ncaused by: root cause")
    );
}
