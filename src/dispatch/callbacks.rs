//! Invocation callbacks.
//!
//! Callbacks observe every dispatched call. `pre_invoke` runs before the
//! handler and can veto the call by returning an error; `post_invoke` runs
//! after the handler whether it succeeded or failed, and its errors
//! replace the call's outcome; `on_error` runs on handler failure and its
//! own failures are swallowed. A registration may be scoped to calls whose
//! context carries a given key.

use std::sync::Arc;

use crate::value::HostValue;

use super::{CallContext, HandlerError, MethodSpec, MethodTarget};

/// Observer of the invocation pipeline. All hooks default to no-ops.
pub trait InvocationCallback: Send + Sync {
    /// Runs before the handler. An error aborts the call.
    fn pre_invoke(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _args: &[HostValue],
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Runs after the handler, on success and on failure alike. An error
    /// here becomes the call's outcome.
    fn post_invoke(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _outcome: Result<&HostValue, &HandlerError>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Runs when the handler failed. Failures in this hook are swallowed.
    fn on_error(
        &self,
        _ctx: &CallContext,
        _target: MethodTarget<'_>,
        _method: &MethodSpec,
        _error: &HandlerError,
    ) {
    }
}

/// A registered callback, optionally scoped by context key.
#[derive(Clone)]
pub struct CallbackRegistration {
    callback: Arc<dyn InvocationCallback>,
    context_key: Option<&'static str>,
}

impl CallbackRegistration {
    /// A callback invoked on every call.
    pub fn global(callback: Arc<dyn InvocationCallback>) -> Self {
        Self {
            callback,
            context_key: None,
        }
    }

    /// A callback invoked only when the call context carries `key`.
    pub fn scoped(callback: Arc<dyn InvocationCallback>, key: &'static str) -> Self {
        Self {
            callback,
            context_key: Some(key),
        }
    }

    /// Whether this registration applies to the given context.
    pub fn applies_to(&self, ctx: &CallContext) -> bool {
        self.context_key.is_none_or(|key| ctx.has(key))
    }

    pub fn callback(&self) -> &Arc<dyn InvocationCallback> {
        &self.callback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recording;

    impl InvocationCallback for Recording {}

    #[test]
    fn scoped_registrations_match_their_context() {
        let registration = CallbackRegistration::scoped(Arc::new(Recording), "session");
        let with_key = CallContext::new().with("session", 1_i64);
        let without_key = CallContext::new();
        assert!(registration.applies_to(&with_key));
        assert!(!registration.applies_to(&without_key));

        let global = CallbackRegistration::global(Arc::new(Recording));
        assert!(global.applies_to(&without_key));
    }
}
