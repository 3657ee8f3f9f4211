//! Array, list and set codec.
//!
//! Arrays marshal as bare JSON arrays; lists and sets wrap their payload
//! (`{"javaClass": .., "list": [..]}`), and element paths include the
//! payload key, so fixups into wrapped containers resolve.

use serde_json::{Map, Value};

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::{PathSeg, WalkState};
use crate::types::{TypeSpec, wire};
use crate::value::HostValue;

pub struct ContainerCodec;

/// Extract the element array of a wire container: either a bare array or
/// the payload of a list/set wrapper.
fn elements(wire_value: &Value) -> Option<(&Vec<Value>, Option<&'static str>)> {
    match wire_value {
        Value::Array(items) => Some((items, None)),
        Value::Object(object) => {
            if let Some(Value::Array(items)) = object.get(wire::LIST_PAYLOAD) {
                Some((items, Some(wire::LIST_PAYLOAD)))
            } else if let Some(Value::Array(items)) = object.get(wire::SET_PAYLOAD) {
                Some((items, Some(wire::SET_PAYLOAD)))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn element_spec(spec: &TypeSpec) -> &TypeSpec {
    match spec {
        TypeSpec::Array(e) | TypeSpec::List(e) | TypeSpec::Set(e) => e,
        _ => &TypeSpec::Any,
    }
}

impl ContainerCodec {
    fn marshal_elements(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        items: &[HostValue],
    ) -> Result<Value, MarshalError> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(serializer.marshal_child(state, PathSeg::Index(i), item)?);
        }
        Ok(Value::Array(out))
    }

    fn marshal_wrapped(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        items: &[HostValue],
        payload_key: &'static str,
        class_hint: &'static str,
    ) -> Result<Value, MarshalError> {
        state.push_seg(PathSeg::field(payload_key));
        let payload = self.marshal_elements(serializer, state, items);
        state.pop_seg();

        let mut object = Map::new();
        if serializer.config().marshal_class_hints {
            object.insert(
                wire::CLASS_HINT.to_string(),
                Value::String(class_hint.to_string()),
            );
        }
        object.insert(payload_key.to_string(), payload?);
        Ok(Value::Object(object))
    }
}

impl Codec for ContainerCodec {
    fn name(&self) -> &'static str {
        "container"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(
            value,
            HostValue::Array(_) | HostValue::List(_) | HostValue::Set(_)
        )
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire_value: &Value) -> bool {
        match spec {
            TypeSpec::Array(_) | TypeSpec::List(_) | TypeSpec::Set(_) => {
                elements(wire_value).is_some()
            }
            TypeSpec::Any => elements(wire_value).is_some(),
            _ => false,
        }
    }

    fn marshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        match value {
            HostValue::Array(seq) => {
                let items = seq.read().clone();
                self.marshal_elements(serializer, state, &items)
            }
            HostValue::List(seq) => {
                let items = seq.read().clone();
                self.marshal_wrapped(
                    serializer,
                    state,
                    &items,
                    wire::LIST_PAYLOAD,
                    wire::LIST_CLASS,
                )
            }
            HostValue::Set(seq) => {
                let items = seq.read().clone();
                self.marshal_wrapped(
                    serializer,
                    state,
                    &items,
                    wire::SET_PAYLOAD,
                    wire::SET_CLASS,
                )
            }
            _ => Err(MarshalError::UnsupportedValue { kind: value.kind() }),
        }
    }

    fn try_unmarshal(
        &self,
        serializer: &Serializer,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        let Some((items, _)) = elements(wire_value) else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire_value).to_string(),
            });
        };
        let inner = element_spec(spec);
        let mut score = MatchScore::EXACT;
        for item in items {
            score = score.worse(serializer.try_unmarshal(inner, item)?);
        }
        Ok(score)
    }

    fn unmarshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        let Some((items, payload_key)) = elements(wire_value) else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire_value).to_string(),
            });
        };
        if let Some(key) = payload_key {
            state.push_seg(PathSeg::field(key));
        }
        let inner = element_spec(spec);
        let mut out = Vec::with_capacity(items.len());
        let mut result = Ok(());
        for (i, item) in items.iter().enumerate() {
            match serializer.unmarshal_child(state, PathSeg::Index(i), inner, item) {
                Ok(value) => out.push(value),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        if payload_key.is_some() {
            state.pop_seg();
        }
        result?;
        Ok(match (spec, payload_key) {
            (TypeSpec::Array(_), _) => HostValue::array(out),
            (TypeSpec::Set(_), _) => HostValue::set(out),
            (TypeSpec::Any, Some(key)) if key == wire::SET_PAYLOAD => HostValue::set(out),
            // Untyped bare arrays and list specs both build lists.
            _ => HostValue::list(out),
        })
    }
}
