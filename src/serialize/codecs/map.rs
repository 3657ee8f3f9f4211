//! Map codec.
//!
//! Maps marshal as `{"javaClass": .., "map": {..}}`; entry paths include
//! the payload key. Unmarshalling accepts both the wrapped form and bare
//! objects, but never objects claiming to be something else: a foreign
//! `javaClass` hint or a `JSONRPCType` marker belongs to another codec,
//! and degrading such a value into a map would hide type errors.
//!
//! Map keys are strings by construction on the host side; other key types
//! are out of scope for the wire protocol.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::{PathSeg, WalkState};
use crate::types::{TypeSpec, wire};
use crate::value::HostValue;

pub struct MapCodec;

/// The entry object of a wire map: the `map` payload when wrapped, the
/// object itself when bare. `None` when the object is not a map shape.
fn entries(wire_value: &Value) -> Option<(&Map<String, Value>, bool)> {
    let object = wire_value.as_object()?;
    if object.contains_key(wire::RPC_TYPE) {
        return None;
    }
    if let Some(Value::Object(payload)) = object.get(wire::MAP_PAYLOAD) {
        return Some((payload, true));
    }
    match object.get(wire::CLASS_HINT).and_then(Value::as_str) {
        None => Some((object, false)),
        Some(wire::MAP_CLASS) => Some((object, false)),
        Some(_) => None,
    }
}

fn value_spec(spec: &TypeSpec) -> &TypeSpec {
    match spec {
        TypeSpec::Map(v) => v,
        _ => &TypeSpec::Any,
    }
}

impl Codec for MapCodec {
    fn name(&self) -> &'static str {
        "map"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Map(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire_value: &Value) -> bool {
        matches!(spec, TypeSpec::Map(_) | TypeSpec::Any) && entries(wire_value).is_some()
    }

    fn marshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        let HostValue::Map(map) = value else {
            return Err(MarshalError::UnsupportedValue { kind: value.kind() });
        };
        let snapshot = map.read().clone();

        state.push_seg(PathSeg::field(wire::MAP_PAYLOAD));
        let mut payload = Map::new();
        let mut failed = None;
        for (key, entry) in &snapshot {
            match serializer.marshal_child(state, PathSeg::field(key.clone()), entry) {
                Ok(wire_entry) => {
                    payload.insert(key.clone(), wire_entry);
                }
                Err(err) => {
                    failed = Some(err);
                    break;
                }
            }
        }
        state.pop_seg();
        if let Some(err) = failed {
            return Err(err);
        }

        let mut object = Map::new();
        if serializer.config().marshal_class_hints {
            object.insert(
                wire::CLASS_HINT.to_string(),
                Value::String(wire::MAP_CLASS.to_string()),
            );
        }
        object.insert(wire::MAP_PAYLOAD.to_string(), Value::Object(payload));
        Ok(Value::Object(object))
    }

    fn try_unmarshal(
        &self,
        serializer: &Serializer,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        let Some((payload, wrapped)) = entries(wire_value) else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire_value).to_string(),
            });
        };
        let inner = value_spec(spec);
        // A bare object is an exact map when the caller asked for one, a
        // plausible map when the caller had no expectation.
        let mut score = match (spec, wrapped) {
            (TypeSpec::Map(_), _) | (_, true) => MatchScore::EXACT,
            _ => MatchScore::SIMILAR,
        };
        for (key, entry) in payload {
            if !wrapped && key == wire::CLASS_HINT {
                continue;
            }
            score = score.worse(serializer.try_unmarshal(inner, entry)?);
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
        let Some((payload, wrapped)) = entries(wire_value) else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire_value).to_string(),
            });
        };
        if wrapped {
            state.push_seg(PathSeg::field(wire::MAP_PAYLOAD));
        }
        let inner = value_spec(spec);
        let mut out = IndexMap::with_capacity(payload.len());
        let mut result = Ok(());
        for (key, entry) in payload {
            if !wrapped && key == wire::CLASS_HINT {
                continue;
            }
            match serializer.unmarshal_child(state, PathSeg::field(key.clone()), inner, entry) {
                Ok(value) => {
                    out.insert(key.clone(), value);
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        if wrapped {
            state.pop_seg();
        }
        result?;
        Ok(HostValue::map(out))
    }
}
