//! Per-call graph walk state and the fixup protocol.
//!
//! Every marshal or unmarshal invocation gets its own [`WalkState`]: a
//! scratchpad tracking which composite values have been visited, where in
//! the emitted tree they live, and which revisits turned into fixups. A
//! state is thread-confined to its call and never reused.
//!
//! # The revisit protocol
//!
//! The walk is depth-first, left to right. Entering a composite value asks
//! the state what to do:
//!
//! - first encounter: the value is recorded at the current location and the
//!   caller produces its subtree;
//! - revisit of an ancestor (a cycle): policies that permit it emit a
//!   [`Fixup`] pointing the current location back at the first one, and the
//!   emitted tree carries `null` at the revisit position;
//!   [`FixupPolicy::Forbid`] treats the cycle as fatal;
//! - revisit of a finished value (a duplicate): depending on policy this is
//!   a fixup or an independent re-marshal of the subtree.
//!
//! Fixups accumulate in discovery order, and the first-discovered location
//! is always the canonical source, which keeps output deterministic.
//!
//! In flat mode there are no fixups: every composite value is hoisted to a
//! top-level slot keyed `_1`, `_2`, ... and any position holding the value
//! (including the first) emits the slot token instead.

use std::fmt;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::value::HostValue;

/// One component of a location path in the emitted tree.
///
/// Object fields and map keys are [`Field`](PathSeg::Field) segments,
/// sequence positions are [`Index`](PathSeg::Index) segments. On the wire a
/// path is an array mixing strings and numbers accordingly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSeg {
    Field(String),
    Index(usize),
}

impl PathSeg {
    /// Shorthand for a field segment.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Wire form of this segment.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Field(name) => Value::String(name.clone()),
            Self::Index(i) => Value::Number((*i).into()),
        }
    }

    /// Parse a wire path component.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Field(s.clone())),
            Value::Number(n) => n.as_u64().map(|i| Self::Index(i as usize)),
            _ => None,
        }
    }
}

impl fmt::Display for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// Render a path for diagnostics.
pub fn render_path(path: &[PathSeg]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter().map(ToString::to_string).collect()
}

/// A wire-side instruction: the value at `target` must be replaced by the
/// value already present at `source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fixup {
    pub target: Vec<PathSeg>,
    pub source: Vec<PathSeg>,
}

impl Fixup {
    /// Wire form: `[[target components], [source components]]`.
    pub fn to_json(&self) -> Value {
        let target: Vec<Value> = self.target.iter().map(PathSeg::to_json).collect();
        let source: Vec<Value> = self.source.iter().map(PathSeg::to_json).collect();
        Value::Array(vec![Value::Array(target), Value::Array(source)])
    }

    /// Parse one wire fixup entry.
    pub fn from_json(value: &Value) -> Result<Self, WalkError> {
        let malformed = || WalkError::MalformedFixup {
            entry: value.to_string(),
        };
        let pair = value.as_array().ok_or_else(malformed)?;
        if pair.len() != 2 {
            return Err(malformed());
        }
        let parse = |v: &Value| -> Result<Vec<PathSeg>, WalkError> {
            v.as_array()
                .ok_or_else(malformed)?
                .iter()
                .map(|seg| PathSeg::from_json(seg).ok_or_else(malformed))
                .collect()
        };
        Ok(Self {
            target: parse(&pair[0])?,
            source: parse(&pair[1])?,
        })
    }
}

/// How revisits are reported in nested output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FixupPolicy {
    /// No fixups at all: cycles are fatal, duplicates re-marshal as
    /// independent copies.
    Forbid,
    /// Duplicates become fixups; cycles are still fatal.
    DuplicatesOnly,
    /// Both cycles and duplicates become fixups.
    #[default]
    CircularAndDuplicates,
}

/// Overall output shape of a marshal pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// In-tree output with a fixup side channel.
    Nested(FixupPolicy),
    /// Hoisted output: composites live in top-level `_n` slots.
    Flat,
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::Nested(FixupPolicy::default())
    }
}

/// Errors raised by the walk state and fixup handling.
#[derive(Debug, Error, Diagnostic)]
pub enum WalkError {
    /// A cycle was found under a policy that forbids them.
    #[error("circular reference at {path}")]
    #[diagnostic(
        code(wirebridge::state::circular_reference),
        help("enable circular-reference fixups or flat output to marshal cyclic graphs")
    )]
    CircularReference { path: String },

    /// A wire fixup entry did not have the `[[..],[..]]` shape.
    #[error("malformed fixup entry: {entry}")]
    #[diagnostic(code(wirebridge::state::malformed_fixup))]
    MalformedFixup { entry: String },

    /// A fixup path did not resolve in the graph it was applied to.
    #[error("fixup path {path} does not resolve")]
    #[diagnostic(code(wirebridge::state::path_not_found))]
    PathNotFound { path: String },

    /// A fixup target cannot be written (say, a scalar position).
    #[error("fixup target {path} is not settable")]
    #[diagnostic(code(wirebridge::state::not_settable))]
    NotSettable { path: String },
}

/// What the caller should do after entering a composite value.
#[derive(Debug)]
pub enum Visit {
    /// First encounter (or a policy-mandated copy): produce the subtree,
    /// then call [`WalkState::leave`].
    Fresh,
    /// The value was seen before: emit this wire form instead of
    /// recursing. No matching `leave` call.
    Token(Value),
}

/// A hoisted slot of flat output.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatSlot {
    /// Top-level key, `_1`, `_2`, ...
    pub token: String,
    /// Finalized wire form of the slot.
    pub value: Value,
}

#[derive(Debug)]
struct ProcessedSlot {
    location: Vec<PathSeg>,
    in_flight: bool,
    flat_index: Option<usize>,
}

#[derive(Debug)]
struct Frame {
    identity: usize,
    owns_slot: bool,
}

/// Per-call scratchpad for one marshal or unmarshal pass.
pub struct WalkState {
    mode: OutputMode,
    path: Vec<PathSeg>,
    slots: FxHashMap<usize, usize>,
    arena: Vec<ProcessedSlot>,
    frames: Vec<Frame>,
    fixups: Vec<Fixup>,
    flat_values: Vec<Option<Value>>,
}

impl WalkState {
    /// A state starting at the tree root.
    pub fn new(mode: OutputMode) -> Self {
        Self::with_root(mode, Vec::new())
    }

    /// A state whose paths are rooted under `root` (for responses that is
    /// `["result"]`, for requests `["params"]`).
    pub fn with_root(mode: OutputMode, root: Vec<PathSeg>) -> Self {
        Self {
            mode,
            path: root,
            slots: FxHashMap::default(),
            arena: Vec::new(),
            frames: Vec::new(),
            fixups: Vec::new(),
            flat_values: Vec::new(),
        }
    }

    /// The configured output mode.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Current descent path.
    pub fn path(&self) -> &[PathSeg] {
        &self.path
    }

    /// Descend into a child position.
    pub fn push_seg(&mut self, seg: PathSeg) {
        self.path.push(seg);
    }

    /// Leave a child position.
    pub fn pop_seg(&mut self) {
        self.path.pop();
    }

    /// Enter a composite value at the current location.
    ///
    /// Scalar values never enter the state; callers must only pass values
    /// with an identity.
    pub fn enter(&mut self, value: &HostValue) -> Result<Visit, WalkError> {
        let identity = value
            .identity()
            .expect("only composite values enter the walk state");

        if let Some(&slot_id) = self.slots.get(&identity) {
            return self.revisit(identity, slot_id);
        }

        let slot_id = self.arena.len();
        let flat_index = match self.mode {
            OutputMode::Flat => {
                self.flat_values.push(None);
                Some(self.flat_values.len() - 1)
            }
            OutputMode::Nested(_) => None,
        };
        self.arena.push(ProcessedSlot {
            location: self.path.clone(),
            in_flight: true,
            flat_index,
        });
        self.slots.insert(identity, slot_id);
        self.frames.push(Frame {
            identity,
            owns_slot: true,
        });
        Ok(Visit::Fresh)
    }

    fn revisit(&mut self, identity: usize, slot_id: usize) -> Result<Visit, WalkError> {
        let is_ancestor = self.arena[slot_id].in_flight;
        match self.mode {
            OutputMode::Flat => {
                let index = self.arena[slot_id]
                    .flat_index
                    .expect("flat slots always carry an index");
                Ok(Visit::Token(Value::String(flat_token(index))))
            }
            OutputMode::Nested(policy) => {
                let emit_fixup = match (policy, is_ancestor) {
                    (FixupPolicy::Forbid, true) | (FixupPolicy::DuplicatesOnly, true) => {
                        return Err(WalkError::CircularReference {
                            path: render_path(&self.path),
                        });
                    }
                    (FixupPolicy::Forbid, false) => false,
                    (FixupPolicy::DuplicatesOnly, false) => true,
                    (FixupPolicy::CircularAndDuplicates, _) => true,
                };
                if emit_fixup {
                    let fixup = Fixup {
                        target: self.path.clone(),
                        source: self.arena[slot_id].location.clone(),
                    };
                    debug!(
                        fixup_target = %render_path(&fixup.target),
                        fixup_source = %render_path(&fixup.source),
                        ancestor = is_ancestor,
                        "emitting fixup"
                    );
                    self.fixups.push(fixup);
                    Ok(Visit::Token(Value::Null))
                } else {
                    // Duplicate under a no-fixup policy: re-marshal the
                    // subtree as an independent copy. The original slot
                    // keeps its location.
                    self.frames.push(Frame {
                        identity,
                        owns_slot: false,
                    });
                    Ok(Visit::Fresh)
                }
            }
        }
    }

    /// Finish a composite value entered with [`enter`](Self::enter).
    ///
    /// Returns the wire form to embed at the current position: the subtree
    /// itself in nested mode, the slot token in flat mode.
    pub fn leave(&mut self, serialized: Value) -> Value {
        let frame = self.frames.pop().expect("leave without a matching enter");
        if !frame.owns_slot {
            return serialized;
        }
        let slot_id = self.slots[&frame.identity];
        self.arena[slot_id].in_flight = false;
        match self.arena[slot_id].flat_index {
            Some(index) => {
                self.flat_values[index] = Some(serialized);
                Value::String(flat_token(index))
            }
            None => serialized,
        }
    }

    /// Fixups accumulated so far, in discovery order.
    pub fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    /// Consume the state, returning accumulated fixups and flat slots.
    pub fn finish(self) -> (Vec<Fixup>, Vec<FlatSlot>) {
        let flat_slots = self
            .flat_values
            .into_iter()
            .enumerate()
            .map(|(index, value)| FlatSlot {
                token: flat_token(index),
                value: value.unwrap_or(Value::Null),
            })
            .collect();
        (self.fixups, flat_slots)
    }
}

/// Top-level key of the flat slot with the given zero-based index.
pub fn flat_token(index: usize) -> String {
    format!("_{}", index + 1)
}

/// Parse a flat slot token. Recognizes exactly `_<digits>`.
pub fn parse_flat_token(s: &str) -> Option<usize> {
    let digits = s.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok().and_then(|n| n.checked_sub(1))
}
