//! # Wirebridge: a bidirectional JSON-RPC bridge
//!
//! Wirebridge exposes registered host objects and classes to remote
//! JSON-RPC peers, marshalling arbitrary in-memory value graphs to and
//! from JSON while preserving object identity, surviving circular
//! references, and keeping session-scoped instances alive as opaque
//! reference handles.
//!
//! ## Core Concepts
//!
//! - **Host values**: a dynamic value graph with shared composites
//! - **Codecs**: an ordered registry of per-category (de)serializers
//! - **Walk state**: per-call revisit tracking and the fixup protocol
//! - **Dispatch**: method keys, overload ranking, invocation callbacks
//! - **Resolver**: allow-listed resolution of wire class hints
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use wirebridge::bridge::Bridge;
//! use wirebridge::dispatch::{CallContext, MethodSpec};
//! use wirebridge::registry::ExportedClass;
//! use wirebridge::types::TypeSpec;
//! use wirebridge::value::ObjectRef;
//!
//! struct Greeter;
//!
//! let bridge = Bridge::default();
//! let class = ExportedClass::builder("demo.Greeter")
//!     .method(
//!         MethodSpec::builder("greet")
//!             .param(TypeSpec::Str)
//!             .handler(|_, args, _| {
//!                 let name = args[0].as_str().unwrap_or("world");
//!                 Ok(format!("hello, {name}").into())
//!             }),
//!     )
//!     .build();
//! bridge.register_object("greeter", ObjectRef::new("demo.Greeter", Greeter), class);
//!
//! let response = bridge.call(
//!     &CallContext::new(),
//!     &json!({"method": "greeter.greet", "id": 1, "params": ["ada"]}),
//! );
//! assert_eq!(response, json!({"id": 1, "result": "hello, ada"}));
//! ```
//!
//! ## Graphs, Duplicates and Cycles
//!
//! Composite host values are shared allocations; a value reachable twice
//! marshals once, and the second position is restored through a fixup
//! instruction (or a flat-mode slot token). The same machinery runs in
//! reverse on incoming arguments, so a cyclic object graph round-trips
//! with its identity structure intact.
//!
//! ## Errors
//!
//! Every call returns a well-formed JSON-RPC response; failures carry the
//! fixed protocol codes (590 parse, 591 unknown method, 592 unmarshal,
//! 593 marshal, 594 constructor/fixup, 490 remote exception). Library
//! errors are `thiserror` enums with `miette` diagnostics throughout.
//!
//! ## Module Guide
//!
//! - [`value`] - Host value model and identity
//! - [`beans`] - Registered class descriptors and accessors
//! - [`serialize`] - Codec registry, marshalling, unmarshalling
//! - [`state`] - Walk state, fixups, flat output
//! - [`resolver`] - Gated class-hint resolution
//! - [`dispatch`] - Method specs, overloads, callbacks
//! - [`bridge`] - Registration surface and the call entry point
//! - [`client`] - Async client over a pluggable transport
//! - [`parser`] - Nested and flat request parsers
//! - [`results`] - Response shaping and failure codes

pub mod beans;
pub mod bridge;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod match_score;
pub mod parser;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod results;
pub mod serialize;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod value;
