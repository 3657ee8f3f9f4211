//! Enum codec: variants travel as their names.

use serde_json::Value;

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::WalkState;
use crate::types::TypeSpec;
use crate::value::{EnumValue, HostValue};

pub struct EnumCodec;

impl EnumCodec {
    fn check_variant(
        &self,
        serializer: &Serializer,
        class_name: &str,
        variant: &str,
    ) -> Result<(), UnmarshalError> {
        let class = serializer
            .registries()
            .enum_class(class_name)
            .ok_or_else(|| UnmarshalError::UnregisteredClass {
                name: class_name.to_string(),
            })?;
        if class.has_variant(variant) {
            Ok(())
        } else {
            Err(UnmarshalError::UnknownEnumVariant {
                class: class_name.to_string(),
                variant: variant.to_string(),
            })
        }
    }
}

impl Codec for EnumCodec {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Enum(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire: &Value) -> bool {
        matches!(spec, TypeSpec::Enum(_)) && matches!(wire, Value::String(_))
    }

    fn marshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        match value {
            HostValue::Enum(e) => Ok(Value::String(e.variant.clone())),
            _ => Err(MarshalError::UnsupportedValue { kind: value.kind() }),
        }
    }

    fn try_unmarshal(
        &self,
        serializer: &Serializer,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        let (TypeSpec::Enum(class_name), Value::String(variant)) = (spec, wire) else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire).to_string(),
            });
        };
        self.check_variant(serializer, class_name, variant)?;
        Ok(MatchScore::EXACT)
    }

    fn unmarshal(
        &self,
        serializer: &Serializer,
        _state: &mut WalkState,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        self.try_unmarshal(serializer, spec, wire)?;
        let (TypeSpec::Enum(class_name), Value::String(variant)) = (spec, wire) else {
            unreachable!("try_unmarshal rejected other shapes");
        };
        Ok(HostValue::Enum(EnumValue::new(class_name, variant)))
    }
}
