//! Local argument registry.
//!
//! A local argument is a declared parameter the dispatcher fills from the
//! call context instead of the wire (the transport's request, response or
//! session objects). The registry maps the declared key to an availability
//! check; registering or removing a resolver bumps an epoch, which is what
//! invalidates the class analysis cache (wire arity depends on which
//! parameters count as local).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{CallContext, DispatchError};

/// Checks that a local argument can be satisfied from a context.
pub type LocalResolver = Arc<dyn Fn(&CallContext) -> Result<(), DispatchError> + Send + Sync>;

#[derive(Default)]
pub struct LocalArgRegistry {
    resolvers: RwLock<FxHashMap<String, LocalResolver>>,
    epoch: AtomicU64,
}

impl LocalArgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom availability check for a local key.
    pub fn register(&self, key: impl Into<String>, resolver: LocalResolver) {
        self.resolvers.write().insert(key.into(), resolver);
        self.epoch.fetch_add(1, Ordering::Relaxed);
    }

    /// Register the default check: the context must carry the key.
    pub fn register_context_key(&self, key: &'static str) {
        self.register(
            key,
            Arc::new(move |ctx: &CallContext| {
                if ctx.has(key) {
                    Ok(())
                } else {
                    Err(DispatchError::LocalUnavailable {
                        key: key.to_string(),
                    })
                }
            }),
        );
    }

    /// Verify a declared local argument against a context.
    ///
    /// Unregistered keys fall back to the default check, so a method can
    /// declare a context key without separate registration.
    pub fn check(&self, key: &str, ctx: &CallContext) -> Result<(), DispatchError> {
        if let Some(resolver) = self.resolvers.read().get(key) {
            return resolver(ctx);
        }
        if ctx.has(key) {
            Ok(())
        } else {
            Err(DispatchError::LocalUnavailable {
                key: key.to_string(),
            })
        }
    }

    /// Monotonic change counter, read by the analysis cache.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }
}
