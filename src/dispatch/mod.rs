//! Dispatch subsystem: method keys, call context, analysis, overload
//! resolution and the invocation callbacks.
//!
//! The wire names a method with a dotted key. The dispatcher parses the
//! key, fetches the candidate methods of the addressed target, ranks
//! overloads by trial-unmarshalling the arguments, and runs the selected
//! handler inside the callback pipeline. Everything here is synchronous;
//! concurrency discipline belongs to the registries.

mod analyzer;
mod callbacks;
mod locals;
mod method;
mod resolver;

pub use analyzer::{ClassAnalyzer, ClassData};
pub use callbacks::{CallbackRegistration, InvocationCallback};
pub use locals::LocalArgRegistry;
pub use method::{
    Handler, HandlerError, MethodKind, MethodSpec, MethodSpecBuilder, MethodTarget, Param,
};
pub use resolver::select_method;

use std::any::Any;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::serialize::UnmarshalError;

/// Synthetic method name addressing a class constructor.
pub const CONSTRUCTOR_METHOD: &str = "$constructor";

/// Reserved key returning the enumerable method catalogue.
pub const LIST_METHODS: &str = "system.listMethods";

/// Opaque per-call context values, injected by the transport.
///
/// The dispatcher never looks inside these; they exist so local arguments
/// (request, response, session objects) can reach handlers without
/// crossing the wire.
#[derive(Default)]
pub struct CallContext {
    values: FxHashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a context value under a well-known key.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &'static str, value: T) -> &mut Self {
        self.values.insert(key, Box::new(value));
        self
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, key: &'static str, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Borrow a context value downcast to `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// A parsed wire method key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodKey {
    /// `system.listMethods`
    ListMethods,
    /// `Target.method` where the target is a registered object key or
    /// class name (possibly dotted itself).
    Named { target: String, method: String },
    /// `.obj[<id>].method` on a live callable reference.
    Reference { object_id: u64, method: String },
}

impl MethodKey {
    /// Parse the `method` field of a request.
    pub fn parse(key: &str) -> Result<Self, DispatchError> {
        let bad = || DispatchError::BadMethodKey {
            key: key.to_string(),
        };
        if key == LIST_METHODS {
            return Ok(Self::ListMethods);
        }
        if let Some(rest) = key.strip_prefix(".obj[") {
            let (id, method) = rest.split_once("].").ok_or_else(bad)?;
            let object_id = id.parse::<u64>().map_err(|_| bad())?;
            if method.is_empty() {
                return Err(bad());
            }
            return Ok(Self::Reference {
                object_id,
                method: method.to_string(),
            });
        }
        let (target, method) = key.rsplit_once('.').ok_or_else(bad)?;
        if target.is_empty() || method.is_empty() {
            return Err(bad());
        }
        Ok(Self::Named {
            target: target.to_string(),
            method: method.to_string(),
        })
    }
}

/// Errors raised while locating and preparing a method call.
#[derive(Debug, Error, Diagnostic)]
pub enum DispatchError {
    /// The method field does not follow the key grammar.
    #[error("malformed method key {key:?}")]
    #[diagnostic(code(wirebridge::dispatch::bad_method_key))]
    BadMethodKey { key: String },

    /// No registered object or class answers to the target name.
    #[error("no registered target named {target}")]
    #[diagnostic(code(wirebridge::dispatch::unknown_target))]
    UnknownTarget { target: String },

    /// No method with this name takes this many wire arguments.
    #[error("no method {name} taking {arity} arguments")]
    #[diagnostic(code(wirebridge::dispatch::no_such_method))]
    NoSuchMethod { name: String, arity: usize },

    /// An incoming reference id has no live entry.
    #[error("no live reference with id {id}")]
    #[diagnostic(code(wirebridge::dispatch::dead_reference))]
    DeadReference { id: u64 },

    /// Arguments could not be unmarshalled for any candidate.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Unmarshal(#[from] UnmarshalError),

    /// A declared local argument is missing from the call context.
    #[error("local argument {key} is unavailable in this context")]
    #[diagnostic(
        code(wirebridge::dispatch::local_unavailable),
        help("the transport must install {key} in the call context before dispatching")
    )]
    LocalUnavailable { key: String },
}
