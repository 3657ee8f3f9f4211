//! Request parsers: nested and flat.
//!
//! Both variants share one signature: given the envelope object and a
//! field name (`params` on the server, `result` on the client), produce
//! the subtree plus the fixups that restore identity sharing.
//!
//! The nested parser reads the field directly and decodes the sibling
//! `fixups` array. The flat parser inflates `_n` slot tokens by walking
//! the subtree depth-first; a token met again while its slot is still
//! being materialized is a cycle, which the parser records as a synthetic
//! fixup so the host-graph applier can close it. Parser choice is
//! bridge-wide and must agree with the serializer's output mode.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::state::{Fixup, PathSeg, WalkError, parse_flat_token};
use crate::types::wire;

/// Which parser variant a bridge runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserKind {
    Nested,
    Flat,
}

/// Errors raised while reading a request or response envelope.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    /// The requested field is absent.
    #[error("envelope has no {field} field")]
    #[diagnostic(code(wirebridge::parser::missing_field))]
    MissingField { field: String },

    /// A flat token names a slot the envelope does not carry.
    #[error("flat token {token} has no top-level slot")]
    #[diagnostic(code(wirebridge::parser::unknown_slot))]
    UnknownSlot { token: String },

    /// The fixups array is malformed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fixups(#[from] WalkError),
}

impl ParseError {
    /// Fixup problems classify as dispatch failures, everything else is a
    /// parse failure.
    pub fn is_fixup_failure(&self) -> bool {
        matches!(self, Self::Fixups(_))
    }
}

/// Extract `field` from the envelope along with its fixups.
pub fn extract(
    kind: ParserKind,
    envelope: &Map<String, Value>,
    field: &str,
) -> Result<(Value, Vec<Fixup>), ParseError> {
    match kind {
        ParserKind::Nested => parse_nested(envelope, field),
        ParserKind::Flat => parse_flat(envelope, field),
    }
}

fn parse_nested(
    envelope: &Map<String, Value>,
    field: &str,
) -> Result<(Value, Vec<Fixup>), ParseError> {
    let subtree = envelope
        .get(field)
        .cloned()
        .ok_or_else(|| ParseError::MissingField {
            field: field.to_string(),
        })?;
    let mut fixups = Vec::new();
    if let Some(Value::Array(entries)) = envelope.get(wire::FIXUPS_FIELD) {
        for entry in entries {
            fixups.push(Fixup::from_json(entry)?);
        }
    }
    Ok((subtree, fixups))
}

fn parse_flat(
    envelope: &Map<String, Value>,
    field: &str,
) -> Result<(Value, Vec<Fixup>), ParseError> {
    let subtree = envelope
        .get(field)
        .ok_or_else(|| ParseError::MissingField {
            field: field.to_string(),
        })?;
    let mut inflater = Inflater {
        envelope,
        seen: FxHashMap::default(),
        fixups: Vec::new(),
    };
    let mut path = vec![PathSeg::field(field)];
    let value = inflater.inflate(subtree, &mut path)?;
    Ok((value, inflater.fixups))
}

/// Depth-first slot inflation with a visited map keyed by slot index.
struct Inflater<'a> {
    envelope: &'a Map<String, Value>,
    /// Slot index to the path where the slot first materialized.
    seen: FxHashMap<usize, Vec<PathSeg>>,
    fixups: Vec<Fixup>,
}

impl Inflater<'_> {
    fn inflate(&mut self, value: &Value, path: &mut Vec<PathSeg>) -> Result<Value, ParseError> {
        match value {
            Value::String(s) => match parse_flat_token(s) {
                Some(index) if self.envelope.contains_key(s.as_str()) => {
                    self.inflate_slot(s, index, path)
                }
                // A string shaped like a token without a slot is plain data.
                _ => Ok(value.clone()),
            },
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(PathSeg::Index(i));
                    let inflated = self.inflate(item, path);
                    path.pop();
                    out.push(inflated?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(object) => {
                let mut out = Map::new();
                for (key, item) in object {
                    path.push(PathSeg::field(key.clone()));
                    let inflated = self.inflate(item, path);
                    path.pop();
                    out.insert(key.clone(), inflated?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn inflate_slot(
        &mut self,
        token: &str,
        index: usize,
        path: &mut Vec<PathSeg>,
    ) -> Result<Value, ParseError> {
        if let Some(first) = self.seen.get(&index) {
            // Revisit: either a finished duplicate or an in-flight cycle.
            // Both become a fixup against the first materialized path.
            self.fixups.push(Fixup {
                target: path.clone(),
                source: first.clone(),
            });
            return Ok(Value::Null);
        }
        let slot = self
            .envelope
            .get(token)
            .ok_or_else(|| ParseError::UnknownSlot {
                token: token.to_string(),
            })?;
        self.seen.insert(index, path.clone());
        self.inflate(slot, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::render_path;
    use serde_json::json;

    fn envelope(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("test envelope is an object")
    }

    #[test]
    fn nested_returns_the_field_and_fixups() {
        let env = envelope(json!({
            "params": ["a", null],
            "fixups": [[["params", 1], ["params", 0]]],
        }));
        let (value, fixups) = extract(ParserKind::Nested, &env, "params").unwrap();
        assert_eq!(value, json!(["a", null]));
        assert_eq!(fixups.len(), 1);
        assert_eq!(
            fixups[0].target,
            vec![PathSeg::field("params"), PathSeg::Index(1)]
        );
    }

    #[test]
    fn nested_missing_field_is_an_error() {
        let env = envelope(json!({"id": 1}));
        assert!(matches!(
            extract(ParserKind::Nested, &env, "params"),
            Err(ParseError::MissingField { .. })
        ));
    }

    #[test]
    fn flat_inflates_slot_tokens() {
        let env = envelope(json!({
            "result": "_1",
            "_1": {"foo": "_2"},
            "_2": {"bar": 1},
        }));
        let (value, fixups) = extract(ParserKind::Flat, &env, "result").unwrap();
        assert_eq!(value, json!({"foo": {"bar": 1}}));
        assert!(fixups.is_empty());
    }

    #[test]
    fn flat_duplicate_slots_become_fixups() {
        let env = envelope(json!({
            "params": ["_1", "_1"],
            "_1": {"x": 1},
        }));
        let (value, fixups) = extract(ParserKind::Flat, &env, "params").unwrap();
        assert_eq!(value, json!([{"x": 1}, null]));
        assert_eq!(fixups.len(), 1);
        assert_eq!(
            fixups[0].source,
            vec![PathSeg::field("params"), PathSeg::Index(0)]
        );
    }

    #[test]
    fn flat_cycles_close_through_fixups() {
        let env = envelope(json!({
            "params": ["_1"],
            "_1": {"self": "_1"},
        }));
        let (value, fixups) = extract(ParserKind::Flat, &env, "params").unwrap();
        assert_eq!(value, json!([{"self": null}]));
        assert_eq!(fixups.len(), 1);
        assert_eq!(
            render_path(&fixups[0].target),
            ".params[0].self"
        );
        assert_eq!(render_path(&fixups[0].source), ".params[0]");
    }

    #[test]
    fn token_shaped_strings_without_slots_stay_strings() {
        let env = envelope(json!({"params": ["_9"]}));
        let (value, _) = extract(ParserKind::Flat, &env, "params").unwrap();
        assert_eq!(value, json!(["_9"]));
    }
}
