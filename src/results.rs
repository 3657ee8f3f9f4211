//! Call results and the fixed failure codes.
//!
//! Every call produces a well-formed JSON-RPC response object; nothing in
//! the bridge throws past the call boundary. Failures carry one of the
//! fixed codes below, remote failures (the handler raised) carry the
//! sanitized handler trace as error data.

use serde_json::{Map, Value};

use crate::dispatch::HandlerError;
use crate::request::Id;
use crate::serialize::MarshalOutcome;
use crate::state::{FlatSlot, Fixup};
use crate::types::wire;

/// Fixed failure codes of the wire protocol.
pub mod codes {
    /// Malformed request.
    pub const PARSE: i64 = 590;
    /// No method matches the name and arity.
    pub const METHOD_NOT_FOUND: i64 = 591;
    /// Arguments could not be unmarshalled (including denied class hints).
    pub const UNMARSHAL: i64 = 592;
    /// The return value could not be marshalled.
    pub const MARSHAL: i64 = 593;
    /// Missing constructor or broken fixup.
    pub const CONSTRUCTOR: i64 = 594;
    /// The invoked method raised.
    pub const REMOTE: i64 = 490;
}

/// Outcome of one dispatched call.
#[derive(Debug)]
pub enum CallResult {
    /// The call succeeded; the marshalled result plus its side channel.
    Success { id: Id, outcome: MarshalOutcome },
    /// The bridge failed the call with a fixed code.
    Failure {
        id: Id,
        code: i64,
        message: String,
    },
    /// The invoked handler raised.
    RemoteFailure { id: Id, error: HandlerError },
}

impl CallResult {
    pub fn failure(id: Id, code: i64, message: impl Into<String>) -> Self {
        Self::Failure {
            id,
            code,
            message: message.into(),
        }
    }

    /// The response envelope for this outcome.
    pub fn into_json(self) -> Value {
        match self {
            Self::Success { id, outcome } => {
                let MarshalOutcome {
                    value,
                    fixups,
                    flat_slots,
                } = outcome;
                let mut envelope = Map::new();
                envelope.insert("id".to_string(), id.to_json());
                envelope.insert("result".to_string(), value);
                attach_fixups(&mut envelope, fixups);
                attach_flat_slots(&mut envelope, flat_slots);
                Value::Object(envelope)
            }
            Self::Failure { id, code, message } => error_envelope(id, code, message, Value::Null),
            Self::RemoteFailure { id, error } => {
                let data = Value::String(error.sanitized_trace());
                error_envelope(id, codes::REMOTE, error.message, data)
            }
        }
    }
}

fn error_envelope(id: Id, code: i64, message: String, data: Value) -> Value {
    let mut error = Map::new();
    error.insert("code".to_string(), Value::Number(code.into()));
    error.insert("message".to_string(), Value::String(message));
    error.insert("data".to_string(), data);

    let mut envelope = Map::new();
    envelope.insert("id".to_string(), id.to_json());
    envelope.insert("error".to_string(), Value::Object(error));
    Value::Object(envelope)
}

fn attach_fixups(envelope: &mut Map<String, Value>, fixups: Vec<Fixup>) {
    if fixups.is_empty() {
        return;
    }
    let entries = fixups.iter().map(Fixup::to_json).collect();
    envelope.insert(wire::FIXUPS_FIELD.to_string(), Value::Array(entries));
}

fn attach_flat_slots(envelope: &mut Map<String, Value>, slots: Vec<FlatSlot>) {
    for slot in slots {
        envelope.insert(slot.token, slot.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PathSeg;
    use serde_json::json;

    #[test]
    fn success_carries_id_and_result() {
        let result = CallResult::Success {
            id: Id::Num(1),
            outcome: MarshalOutcome {
                value: json!("hello"),
                fixups: Vec::new(),
                flat_slots: Vec::new(),
            },
        };
        assert_eq!(result.into_json(), json!({"id": 1, "result": "hello"}));
    }

    #[test]
    fn fixups_attach_as_a_side_array() {
        let result = CallResult::Success {
            id: Id::Num(3),
            outcome: MarshalOutcome {
                value: json!({"beanB": {"beanA": null}}),
                fixups: vec![Fixup {
                    target: vec![
                        PathSeg::field("result"),
                        PathSeg::field("beanB"),
                        PathSeg::field("beanA"),
                    ],
                    source: vec![PathSeg::field("result")],
                }],
                flat_slots: Vec::new(),
            },
        };
        let envelope = result.into_json();
        assert_eq!(
            envelope["fixups"],
            json!([[["result", "beanB", "beanA"], ["result"]]])
        );
    }

    #[test]
    fn flat_slots_land_at_the_top_level() {
        let result = CallResult::Success {
            id: Id::Num(1),
            outcome: MarshalOutcome {
                value: json!("_1"),
                fixups: Vec::new(),
                flat_slots: vec![
                    FlatSlot {
                        token: "_1".into(),
                        value: json!({"foo": "_2"}),
                    },
                    FlatSlot {
                        token: "_2".into(),
                        value: json!({"bar": 1}),
                    },
                ],
            },
        };
        assert_eq!(
            result.into_json(),
            json!({"id": 1, "result": "_1", "_1": {"foo": "_2"}, "_2": {"bar": 1}})
        );
    }

    #[test]
    fn remote_failures_expose_the_sanitized_trace() {
        let result = CallResult::RemoteFailure {
            id: Id::Num(9),
            error: HandlerError::msg("boom").caused_by(HandlerError::msg("inner")),
        };
        let envelope = result.into_json();
        assert_eq!(envelope["error"]["code"], json!(490));
        assert_eq!(envelope["error"]["message"], json!("boom"));
        assert_eq!(envelope["error"]["data"], json!("boom\ncaused by: inner"));
    }

    #[test]
    fn failure_codes_are_fixed() {
        assert_eq!(codes::PARSE, 590);
        assert_eq!(codes::METHOD_NOT_FOUND, 591);
        assert_eq!(codes::UNMARSHAL, 592);
        assert_eq!(codes::MARSHAL, 593);
        assert_eq!(codes::CONSTRUCTOR, 594);
        assert_eq!(codes::REMOTE, 490);
    }
}
