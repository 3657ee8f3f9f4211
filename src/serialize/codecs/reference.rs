//! Reference codec: registered reference classes marshal as opaque
//! handles instead of property bags.
//!
//! This codec must run before the bean codec; that ordering is what keeps
//! a reference-registered instance from leaking its state onto the wire.

use serde_json::{Map, Value};

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::WalkState;
use crate::types::{TypeSpec, wire};
use crate::value::HostValue;

pub struct ReferenceCodec;

fn object_id(object: &Map<String, Value>) -> Option<u64> {
    object.get(wire::OBJECT_ID).and_then(Value::as_u64)
}

impl Codec for ReferenceCodec {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn can_marshal(&self, serializer: &Serializer, value: &HostValue) -> bool {
        let HostValue::Object(instance) = value else {
            return false;
        };
        let registries = serializer.registries();
        registries.references_enabled()
            && (registries.is_callable_reference_class(instance.class_name())
                || registries.is_reference_class(instance.class_name()))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire_value: &Value) -> bool {
        let Some(object) = wire_value.as_object() else {
            return false;
        };
        match spec {
            TypeSpec::Reference(_) => object_id(object).is_some(),
            TypeSpec::Any => object.contains_key(wire::RPC_TYPE),
            _ => false,
        }
    }

    fn marshal(
        &self,
        serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        let HostValue::Object(instance) = value else {
            return Err(MarshalError::UnsupportedValue { kind: value.kind() });
        };
        let registries = serializer.registries();
        let callable = registries.is_callable_reference_class(instance.class_name());
        let id = registries.intern_reference(instance);

        let mut object = Map::new();
        object.insert(
            wire::RPC_TYPE.to_string(),
            Value::String(
                if callable {
                    wire::CALLABLE_REFERENCE
                } else {
                    wire::REFERENCE
                }
                .to_string(),
            ),
        );
        object.insert(
            wire::CLASS_HINT.to_string(),
            Value::String(instance.class_name().to_string()),
        );
        object.insert(wire::OBJECT_ID.to_string(), Value::Number(id.into()));
        Ok(Value::Object(object))
    }

    fn try_unmarshal(
        &self,
        _serializer: &Serializer,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        let id = wire_value.as_object().and_then(object_id);
        match id {
            Some(_) => Ok(MatchScore::EXACT),
            None => Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: format!("{} without an objectID", wire_kind(wire_value)),
            }),
        }
    }

    fn unmarshal(
        &self,
        serializer: &Serializer,
        _state: &mut WalkState,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        let id = wire_value
            .as_object()
            .and_then(object_id)
            .ok_or_else(|| UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: format!("{} without an objectID", wire_kind(wire_value)),
            })?;
        let instance = serializer
            .registries()
            .reference(id)
            .ok_or(UnmarshalError::UnknownReference { id })?;
        if let TypeSpec::Reference(expected) = spec
            && instance.class_name() != expected
        {
            return Err(UnmarshalError::TypeMismatch {
                expected: format!("reference {expected}"),
                found: format!("reference {}", instance.class_name()),
            });
        }
        Ok(HostValue::Object(instance))
    }
}
