//! Date codec: epoch-millisecond wrappers with temporal class hints.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::WalkState;
use crate::types::{TypeSpec, wire};
use crate::value::HostValue;

pub struct DateCodec;

/// Temporal hints this codec will dispatch on.
fn is_temporal_hint(name: &str) -> bool {
    matches!(
        name,
        wire::DATE_CLASS | wire::TIMESTAMP_CLASS | wire::SQL_DATE_CLASS | wire::SQL_TIME_CLASS
    )
}

fn time_field(object: &Map<String, Value>) -> Option<i64> {
    object.get(wire::TIME_FIELD).and_then(Value::as_i64)
}

impl Codec for DateCodec {
    fn name(&self) -> &'static str {
        "date"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Date(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire_value: &Value) -> bool {
        match spec {
            TypeSpec::Date => matches!(wire_value, Value::Object(_) | Value::Number(_)),
            TypeSpec::Any => wire_value
                .as_object()
                .and_then(|obj| obj.get(wire::CLASS_HINT))
                .and_then(Value::as_str)
                .is_some_and(is_temporal_hint),
            _ => false,
        }
    }

    fn marshal(
        &self,
        serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        let HostValue::Date(when) = value else {
            return Err(MarshalError::UnsupportedValue { kind: value.kind() });
        };
        let mut object = Map::new();
        if serializer.config().marshal_class_hints {
            object.insert(
                wire::CLASS_HINT.to_string(),
                Value::String(wire::DATE_CLASS.to_string()),
            );
        }
        object.insert(
            wire::TIME_FIELD.to_string(),
            Value::Number(when.timestamp_millis().into()),
        );
        Ok(Value::Object(object))
    }

    fn try_unmarshal(
        &self,
        _serializer: &Serializer,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        match wire_value {
            Value::Object(object) => {
                if let Some(hint) = object.get(wire::CLASS_HINT).and_then(Value::as_str)
                    && !is_temporal_hint(hint)
                {
                    return Err(UnmarshalError::UnknownTemporalHint {
                        hint: hint.to_string(),
                    });
                }
                match time_field(object) {
                    Some(_) => Ok(MatchScore::EXACT),
                    None => Err(UnmarshalError::TypeMismatch {
                        expected: "date".to_string(),
                        found: "object without a time field".to_string(),
                    }),
                }
            }
            Value::Number(_) => Ok(MatchScore::SIMILAR),
            other => Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(other).to_string(),
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
        self.try_unmarshal(serializer, spec, wire_value)?;
        let millis = match wire_value {
            Value::Object(object) => time_field(object).unwrap_or_default(),
            Value::Number(n) => n.as_i64().ok_or_else(|| UnmarshalError::NumberTooLarge {
                value: n.to_string(),
                expected: "date".to_string(),
            })?,
            _ => unreachable!("try_unmarshal rejected other wire kinds"),
        };
        let when: DateTime<Utc> = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            UnmarshalError::NumberTooLarge {
                value: millis.to_string(),
                expected: "date".to_string(),
            }
        })?;
        Ok(HostValue::Date(when))
    }
}
