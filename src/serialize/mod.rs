//! Type-driven (de)serialization engine.
//!
//! The engine is an ordered registry of [`Codec`]s, one per data category.
//! Marshalling routes a host value to the first codec that claims it;
//! unmarshalling either routes by the declared [`TypeSpec`] or, when the
//! caller has no expectation, lets every codec report a
//! [`MatchScore`](crate::match_score::MatchScore) and takes the best fit.
//!
//! Registration order is part of the contract: the reference codec sits in
//! front of the bean codec, so classes registered as references marshal as
//! opaque handles and never leak their properties.
//!
//! The [`Serializer`] façade owns the registry, creates a fresh
//! [`WalkState`] per call, and attaches the accumulated fixups or flat
//! slots to the outcome. It also applies incoming fixups to unmarshalled
//! host graphs, which is how shared and cyclic arguments regain their
//! identity structure.

mod codecs;

pub use codecs::default_codecs;

use std::sync::Arc;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::beans::BeanError;
use crate::config::BridgeConfig;
use crate::match_score::MatchScore;
use crate::registry::Registries;
use crate::resolver::TypeResolver;
use crate::state::{
    FlatSlot, Fixup, PathSeg, Visit, WalkError, WalkState, render_path,
};
use crate::types::TypeSpec;
use crate::value::{HostValue, ValueKind};

/// Errors while turning a host value into JSON.
#[derive(Debug, Error, Diagnostic)]
pub enum MarshalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bean(#[from] BeanError),

    /// No registered codec claims this value.
    #[error("no codec can marshal a {kind} value")]
    #[diagnostic(code(wirebridge::serialize::unsupported_value))]
    UnsupportedValue { kind: ValueKind },

    /// The value's class has no registration on this bridge.
    #[error("class {name} is not registered")]
    #[diagnostic(
        code(wirebridge::serialize::unknown_class),
        help("register the class on the bridge before marshalling instances of it")
    )]
    UnknownClass { name: String },

    /// Non-finite floats have no JSON number form.
    #[error("{value} has no JSON representation")]
    #[diagnostic(code(wirebridge::serialize::non_finite_number))]
    NonFiniteNumber { value: f64 },
}

/// Errors while turning JSON into a host value.
#[derive(Debug, Error, Diagnostic)]
pub enum UnmarshalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Walk(#[from] WalkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bean(#[from] BeanError),

    /// The wire value does not have the shape the spec demands.
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(wirebridge::serialize::type_mismatch))]
    TypeMismatch { expected: String, found: String },

    /// A string wire form failed the exact-width numeric parse.
    #[error("{text:?} is not a number ({expected})")]
    #[diagnostic(code(wirebridge::serialize::not_a_number))]
    NotANumber { text: String, expected: String },

    /// A numeric wire form does not fit the declared width.
    #[error("number {value} is too large for {expected}")]
    #[diagnostic(code(wirebridge::serialize::number_too_large))]
    NumberTooLarge { value: String, expected: String },

    /// A date wrapper hinted at a temporal type this bridge cannot build.
    #[error("unknown temporal hint {hint}")]
    #[diagnostic(code(wirebridge::serialize::unknown_temporal))]
    UnknownTemporalHint { hint: String },

    /// The named variant is not part of the declared enum class.
    #[error("{class} has no variant named {variant}")]
    #[diagnostic(code(wirebridge::serialize::unknown_enum_variant))]
    UnknownEnumVariant { class: String, variant: String },

    /// A declared target names a class this bridge never registered.
    #[error("class {name} is not registered")]
    #[diagnostic(code(wirebridge::serialize::unregistered_class))]
    UnregisteredClass { name: String },

    /// The wire hint named a class that the resolver refuses.
    #[error("class {name} is not resolvable here")]
    #[diagnostic(
        code(wirebridge::serialize::class_denied),
        help("only allow-listed or safe-marked registered classes resolve from wire hints")
    )]
    ClassDenied { name: String },

    /// An incoming reference id has no live entry.
    #[error("no live reference with id {id}")]
    #[diagnostic(code(wirebridge::serialize::unknown_reference))]
    UnknownReference { id: u64 },

    /// No registered codec accepts the declared spec for this wire value.
    #[error("no codec can unmarshal {found} as {expected}")]
    #[diagnostic(code(wirebridge::serialize::no_codec))]
    NoCodec { expected: String, found: String },
}

impl UnmarshalError {
    /// Whether this failure is the dispatch class (missing constructor or
    /// broken fixup) rather than a plain unmarshal failure.
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            Self::Bean(BeanError::NotConstructible { .. })
                | Self::Walk(WalkError::MalformedFixup { .. })
                | Self::Walk(WalkError::PathNotFound { .. })
                | Self::Walk(WalkError::NotSettable { .. })
        )
    }
}

/// Short wire-kind label for error messages.
pub(crate) fn wire_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One data-category serializer.
///
/// Codecs are stateless and process-wide; everything per-call travels in
/// the [`WalkState`]. `try_unmarshal` must be side-effect free, it runs
/// during overload ranking against arguments that may never be used.
pub trait Codec: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Claim test for marshalling.
    fn can_marshal(&self, serializer: &Serializer, value: &HostValue) -> bool;

    /// Claim test for unmarshalling the given wire value as `spec`.
    fn can_unmarshal(&self, serializer: &Serializer, spec: &TypeSpec, wire: &Value) -> bool;

    fn marshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError>;

    fn try_unmarshal(
        &self,
        serializer: &Serializer,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<MatchScore, UnmarshalError>;

    fn unmarshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError>;
}

/// Result of a root-level marshal: the wire value plus whatever side
/// channel the output mode produced.
#[derive(Debug)]
pub struct MarshalOutcome {
    pub value: Value,
    pub fixups: Vec<Fixup>,
    pub flat_slots: Vec<FlatSlot>,
}

/// The serialization façade: ordered codecs plus the registries and
/// resolver they route through.
pub struct Serializer {
    codecs: Vec<Arc<dyn Codec>>,
    registries: Arc<Registries>,
    resolver: Arc<TypeResolver>,
    config: BridgeConfig,
}

impl Serializer {
    /// A serializer with the default codec set.
    pub fn new(
        registries: Arc<Registries>,
        resolver: Arc<TypeResolver>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            codecs: default_codecs(),
            registries,
            resolver,
            config,
        }
    }

    /// A serializer with its own registries and resolver, for client-side
    /// use and tests that do not need a full bridge.
    pub fn standalone(config: BridgeConfig) -> Self {
        let registries = Arc::new(Registries::new(config.reference_capacity));
        let resolver = Arc::new(TypeResolver::new(Arc::clone(&registries)));
        Self::new(registries, resolver, config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Marshal one value rooted at the given path.
    #[instrument(skip(self, value), err)]
    pub fn marshal_root(
        &self,
        root: Vec<PathSeg>,
        value: &HostValue,
    ) -> Result<MarshalOutcome, MarshalError> {
        let mut state = WalkState::with_root(self.config.output_mode, root);
        let wire = self.marshal_value(&mut state, value)?;
        let (fixups, flat_slots) = state.finish();
        Ok(MarshalOutcome {
            value: wire,
            fixups,
            flat_slots,
        })
    }

    /// Marshal a parameter list rooted under `params`, sharing one walk
    /// state so duplicates across arguments are still detected.
    pub fn marshal_params(&self, params: &[HostValue]) -> Result<MarshalOutcome, MarshalError> {
        let mut state = WalkState::with_root(
            self.config.output_mode,
            vec![PathSeg::field("params")],
        );
        let mut out = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            state.push_seg(PathSeg::Index(i));
            let wire = self.marshal_value(&mut state, param)?;
            state.pop_seg();
            out.push(wire);
        }
        let (fixups, flat_slots) = state.finish();
        Ok(MarshalOutcome {
            value: Value::Array(out),
            fixups,
            flat_slots,
        })
    }

    /// Marshal one value inside an ongoing walk.
    pub fn marshal_value(
        &self,
        state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        if !value.is_composite() {
            return self.route_marshal(state, value);
        }
        match state.enter(value)? {
            Visit::Token(token) => Ok(token),
            Visit::Fresh => {
                let serialized = self.route_marshal(state, value)?;
                Ok(state.leave(serialized))
            }
        }
    }

    /// Marshal a child value one path segment below the current position.
    pub fn marshal_child(
        &self,
        state: &mut WalkState,
        seg: PathSeg,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        state.push_seg(seg);
        let result = self.marshal_value(state, value);
        state.pop_seg();
        result
    }

    fn route_marshal(
        &self,
        state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        for codec in &self.codecs {
            if codec.can_marshal(self, value) {
                return codec.marshal(self, state, value);
            }
        }
        Err(MarshalError::UnsupportedValue { kind: value.kind() })
    }

    /// Unmarshal one root value with a fresh state.
    #[instrument(skip(self, wire), err)]
    pub fn unmarshal_root(
        &self,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        let mut state = WalkState::new(self.config.output_mode);
        self.unmarshal_value(&mut state, spec, wire)
    }

    /// Unmarshal a parameter list and re-install identity sharing from the
    /// accompanying fixups. Fixup paths are relative to the enclosing
    /// request, so they lead with a `params` segment.
    pub fn unmarshal_params(
        &self,
        specs: &[&TypeSpec],
        args: &[Value],
        fixups: &[Fixup],
    ) -> Result<Vec<HostValue>, UnmarshalError> {
        debug_assert_eq!(specs.len(), args.len());
        let mut state =
            WalkState::with_root(self.config.output_mode, vec![PathSeg::field("params")]);
        let mut values = Vec::with_capacity(args.len());
        for (i, (spec, arg)) in specs.iter().zip(args).enumerate() {
            state.push_seg(PathSeg::Index(i));
            let value = self.unmarshal_value(&mut state, spec, arg)?;
            state.pop_seg();
            values.push(value);
        }
        if fixups.is_empty() {
            return Ok(values);
        }

        let holder = HostValue::array(values);
        for fixup in fixups {
            let target = strip_root(&fixup.target, "params")?;
            let source = strip_root(&fixup.source, "params")?;
            let shared = self.resolve_path(&holder, source)?;
            self.set_path(&holder, target, shared)?;
        }
        let out = match &holder {
            HostValue::Array(seq) => seq.read().clone(),
            _ => unreachable!("params holder is always an array"),
        };
        Ok(out)
    }

    /// Unmarshal a response's `result` subtree and re-install identity
    /// sharing from the response fixups, whose paths lead with a `result`
    /// segment.
    pub fn unmarshal_result(
        &self,
        spec: &TypeSpec,
        wire: &Value,
        fixups: &[Fixup],
    ) -> Result<HostValue, UnmarshalError> {
        let mut state =
            WalkState::with_root(self.config.output_mode, vec![PathSeg::field("result")]);
        let value = self.unmarshal_value(&mut state, spec, wire)?;
        for fixup in fixups {
            let target = strip_root(&fixup.target, "result")?;
            let source = strip_root(&fixup.source, "result")?;
            let shared = self.resolve_path(&value, source)?;
            self.set_path(&value, target, shared)?;
        }
        Ok(value)
    }

    /// Unmarshal one value inside an ongoing walk.
    pub fn unmarshal_value(
        &self,
        state: &mut WalkState,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        if wire.is_null() {
            return Ok(HostValue::Null);
        }
        if matches!(spec, TypeSpec::Any) {
            let codec = self.best_codec(spec, wire)?;
            return codec.unmarshal(self, state, spec, wire);
        }
        for codec in &self.codecs {
            if codec.can_unmarshal(self, spec, wire) {
                return codec.unmarshal(self, state, spec, wire);
            }
        }
        Err(UnmarshalError::NoCodec {
            expected: spec.to_string(),
            found: wire_kind(wire).to_string(),
        })
    }

    /// Unmarshal a child value one path segment below the current position.
    pub fn unmarshal_child(
        &self,
        state: &mut WalkState,
        seg: PathSeg,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        state.push_seg(seg);
        let result = self.unmarshal_value(state, spec, wire);
        state.pop_seg();
        result
    }

    /// Fitness of unmarshalling `wire` as `spec`, without doing it.
    pub fn try_unmarshal(
        &self,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        if wire.is_null() {
            return Ok(MatchScore::EXACT);
        }
        if matches!(spec, TypeSpec::Any) {
            return self.best_fit(spec, wire).map(|(score, _)| score);
        }
        for codec in &self.codecs {
            if codec.can_unmarshal(self, spec, wire) {
                return codec.try_unmarshal(self, spec, wire);
            }
        }
        Err(UnmarshalError::NoCodec {
            expected: spec.to_string(),
            found: wire_kind(wire).to_string(),
        })
    }

    fn best_fit(
        &self,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<(MatchScore, usize), UnmarshalError> {
        let mut best: Option<(MatchScore, usize)> = None;
        let mut first_err: Option<UnmarshalError> = None;
        for (i, codec) in self.codecs.iter().enumerate() {
            if !codec.can_unmarshal(self, spec, wire) {
                continue;
            }
            match codec.try_unmarshal(self, spec, wire) {
                Ok(score) => {
                    // Ties break to registration order.
                    if best.map_or(true, |(current, _)| score < current) {
                        best = Some((score, i));
                    }
                }
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match best {
            Some(found) => Ok(found),
            None => Err(first_err.unwrap_or_else(|| UnmarshalError::NoCodec {
                expected: spec.to_string(),
                found: wire_kind(wire).to_string(),
            })),
        }
    }

    fn best_codec(&self, spec: &TypeSpec, wire: &Value) -> Result<&Arc<dyn Codec>, UnmarshalError> {
        let (_, index) = self.best_fit(spec, wire)?;
        Ok(&self.codecs[index])
    }

    /// Resolve a (root-stripped) fixup path in a host graph.
    pub fn resolve_path(
        &self,
        root: &HostValue,
        path: &[PathSeg],
    ) -> Result<HostValue, UnmarshalError> {
        let mut current = root.clone();
        let mut idx = 0;
        while idx < path.len() {
            let (accessor, next) = step_accessor(&current, path, idx)?;
            current = self.read_accessor(&current, &accessor, path)?;
            idx = next;
        }
        Ok(current)
    }

    /// Install `value` at a (root-stripped) fixup path in a host graph.
    pub fn set_path(
        &self,
        root: &HostValue,
        path: &[PathSeg],
        value: HostValue,
    ) -> Result<(), UnmarshalError> {
        if path.is_empty() {
            return Err(WalkError::NotSettable {
                path: "<root>".to_string(),
            }
            .into());
        }
        let mut current = root.clone();
        let mut idx = 0;
        loop {
            let (accessor, next) = step_accessor(&current, path, idx)?;
            if next >= path.len() {
                return self.write_accessor(&current, &accessor, value, path);
            }
            current = self.read_accessor(&current, &accessor, path)?;
            idx = next;
        }
    }

    fn read_accessor(
        &self,
        parent: &HostValue,
        accessor: &Accessor,
        path: &[PathSeg],
    ) -> Result<HostValue, UnmarshalError> {
        let not_found = || -> UnmarshalError {
            WalkError::PathNotFound {
                path: render_path(path),
            }
            .into()
        };
        match (parent, accessor) {
            (
                HostValue::Array(seq) | HostValue::List(seq) | HostValue::Set(seq),
                Accessor::Element(i),
            ) => seq.read().get(*i).cloned().ok_or_else(not_found),
            (HostValue::Map(map), Accessor::Entry(key)) => {
                map.read().get(key).cloned().ok_or_else(not_found)
            }
            (HostValue::Object(obj), Accessor::Property(prop)) => {
                let bean = self
                    .registries
                    .class(obj.class_name())
                    .and_then(|class| class.bean().cloned())
                    .ok_or_else(not_found)?;
                let property = bean.property(prop).ok_or_else(not_found)?;
                let guard = obj.instance().read();
                property.get(guard.as_ref()).map_err(UnmarshalError::Bean)
            }
            _ => Err(not_found()),
        }
    }

    fn write_accessor(
        &self,
        parent: &HostValue,
        accessor: &Accessor,
        value: HostValue,
        path: &[PathSeg],
    ) -> Result<(), UnmarshalError> {
        let not_found = || -> UnmarshalError {
            WalkError::PathNotFound {
                path: render_path(path),
            }
            .into()
        };
        match (parent, accessor) {
            (
                HostValue::Array(seq) | HostValue::List(seq) | HostValue::Set(seq),
                Accessor::Element(i),
            ) => {
                let mut items = seq.write();
                let slot = items.get_mut(*i).ok_or_else(not_found)?;
                *slot = value;
                Ok(())
            }
            (HostValue::Map(map), Accessor::Entry(key)) => {
                map.write().insert(key.clone(), value);
                Ok(())
            }
            (HostValue::Object(obj), Accessor::Property(prop)) => {
                let bean = self
                    .registries
                    .class(obj.class_name())
                    .and_then(|class| class.bean().cloned())
                    .ok_or_else(not_found)?;
                let property = bean.property(prop).ok_or_else(not_found)?;
                let mut guard = obj.instance().write();
                property
                    .set(obj.class_name(), guard.as_mut(), value)
                    .map_err(UnmarshalError::Bean)
            }
            _ => Err(WalkError::NotSettable {
                path: render_path(path),
            }
            .into()),
        }
    }
}

/// How one navigation step reads or writes a child of a host value.
enum Accessor {
    Element(usize),
    Entry(String),
    Property(String),
}

/// Decode the next navigation step at `idx`.
///
/// Wire paths include the wrapper level of hinted containers (`list`,
/// `set`, `map`), which does not exist on the host graph; a wrapper
/// segment followed by more path is folded into the step it introduces.
fn step_accessor(
    current: &HostValue,
    path: &[PathSeg],
    idx: usize,
) -> Result<(Accessor, usize), UnmarshalError> {
    use crate::types::wire;
    let not_found = || -> UnmarshalError {
        WalkError::PathNotFound {
            path: render_path(path),
        }
        .into()
    };
    let seg = &path[idx];
    match current {
        HostValue::Array(_) | HostValue::List(_) | HostValue::Set(_) => match seg {
            PathSeg::Index(i) => Ok((Accessor::Element(*i), idx + 1)),
            PathSeg::Field(name)
                if (name == wire::LIST_PAYLOAD || name == wire::SET_PAYLOAD)
                    && idx + 1 < path.len() =>
            {
                match &path[idx + 1] {
                    PathSeg::Index(i) => Ok((Accessor::Element(*i), idx + 2)),
                    PathSeg::Field(_) => Err(not_found()),
                }
            }
            PathSeg::Field(_) => Err(not_found()),
        },
        HostValue::Map(_) => match seg {
            PathSeg::Field(name) if name == wire::MAP_PAYLOAD && idx + 1 < path.len() => {
                match &path[idx + 1] {
                    PathSeg::Field(key) => Ok((Accessor::Entry(key.clone()), idx + 2)),
                    PathSeg::Index(_) => Err(not_found()),
                }
            }
            PathSeg::Field(key) => Ok((Accessor::Entry(key.clone()), idx + 1)),
            PathSeg::Index(_) => Err(not_found()),
        },
        HostValue::Object(_) => match seg {
            PathSeg::Field(prop) => Ok((Accessor::Property(prop.clone()), idx + 1)),
            PathSeg::Index(_) => Err(not_found()),
        },
        _ => Err(not_found()),
    }
}

fn strip_root<'a>(path: &'a [PathSeg], root: &str) -> Result<&'a [PathSeg], UnmarshalError> {
    match path.first() {
        Some(PathSeg::Field(name)) if name == root => Ok(&path[1..]),
        _ => Err(WalkError::PathNotFound {
            path: render_path(path),
        }
        .into()),
    }
}
