//! Number, boolean and string codecs.
//!
//! Numeric wire forms may arrive as JSON numbers or as strings; strings
//! are parsed with the exact parser of the declared width, so a fractional
//! string never silently truncates into an integer target.

use serde_json::Value;

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::WalkState;
use crate::types::TypeSpec;
use crate::value::HostValue;

pub struct NumberCodec;

fn int_fits(spec: &TypeSpec, value: i64) -> bool {
    match spec {
        TypeSpec::I8 => i8::try_from(value).is_ok(),
        TypeSpec::I16 => i16::try_from(value).is_ok(),
        TypeSpec::I32 => i32::try_from(value).is_ok(),
        TypeSpec::I64 => true,
        _ => false,
    }
}

/// Parse a string with the exact parser of the declared width.
fn parse_int(spec: &TypeSpec, text: &str) -> Option<i64> {
    match spec {
        TypeSpec::I8 => text.parse::<i8>().ok().map(i64::from),
        TypeSpec::I16 => text.parse::<i16>().ok().map(i64::from),
        TypeSpec::I32 => text.parse::<i32>().ok().map(i64::from),
        TypeSpec::I64 => text.parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_float(spec: &TypeSpec, text: &str) -> Option<f64> {
    match spec {
        TypeSpec::F32 => text.parse::<f32>().ok().map(f64::from),
        TypeSpec::F64 => text.parse::<f64>().ok(),
        _ => None,
    }
}

fn is_int_spec(spec: &TypeSpec) -> bool {
    matches!(
        spec,
        TypeSpec::I8 | TypeSpec::I16 | TypeSpec::I32 | TypeSpec::I64
    )
}

fn is_float_spec(spec: &TypeSpec) -> bool {
    matches!(spec, TypeSpec::F32 | TypeSpec::F64)
}

impl Codec for NumberCodec {
    fn name(&self) -> &'static str {
        "number"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Int(_) | HostValue::Float(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire: &Value) -> bool {
        match spec {
            s if is_int_spec(s) || is_float_spec(s) => {
                matches!(wire, Value::Number(_) | Value::String(_))
            }
            TypeSpec::Any => matches!(wire, Value::Number(_)),
            _ => false,
        }
    }

    fn marshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        match value {
            HostValue::Int(i) => Ok(Value::Number((*i).into())),
            HostValue::Float(x) => serde_json::Number::from_f64(*x)
                .map(Value::Number)
                .ok_or(MarshalError::NonFiniteNumber { value: *x }),
            _ => Err(MarshalError::UnsupportedValue { kind: value.kind() }),
        }
    }

    fn try_unmarshal(
        &self,
        _serializer: &Serializer,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        match (spec, wire) {
            (TypeSpec::Any, Value::Number(_)) => Ok(MatchScore::EXACT),
            (s, Value::Number(n)) if is_int_spec(s) => match n.as_i64() {
                Some(v) if int_fits(s, v) => Ok(MatchScore::EXACT),
                Some(v) => Err(UnmarshalError::NumberTooLarge {
                    value: v.to_string(),
                    expected: s.to_string(),
                }),
                None if n.as_u64().is_some() => Err(UnmarshalError::NumberTooLarge {
                    value: n.to_string(),
                    expected: s.to_string(),
                }),
                None => Err(UnmarshalError::NotANumber {
                    text: n.to_string(),
                    expected: s.to_string(),
                }),
            },
            (s, Value::Number(_)) if is_float_spec(s) => Ok(MatchScore::EXACT),
            (s, Value::String(text)) if is_int_spec(s) => {
                if parse_int(s, text).is_some() {
                    Ok(MatchScore::SIMILAR)
                } else if text.parse::<i128>().is_ok() {
                    Err(UnmarshalError::NumberTooLarge {
                        value: text.clone(),
                        expected: s.to_string(),
                    })
                } else {
                    Err(UnmarshalError::NotANumber {
                        text: text.clone(),
                        expected: s.to_string(),
                    })
                }
            }
            (s, Value::String(text)) if is_float_spec(s) => {
                parse_float(s, text).map(|_| MatchScore::SIMILAR).ok_or_else(|| {
                    UnmarshalError::NotANumber {
                        text: text.clone(),
                        expected: s.to_string(),
                    }
                })
            }
            _ => Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire).to_string(),
            }),
        }
    }

    fn unmarshal(
        &self,
        serializer: &Serializer,
        _state: &mut WalkState,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        // Shares the validation above so trial and real unmarshal agree.
        self.try_unmarshal(serializer, spec, wire)?;
        match (spec, wire) {
            (TypeSpec::Any, Value::Number(n)) => Ok(n
                .as_i64()
                .map(HostValue::Int)
                .or_else(|| n.as_f64().map(HostValue::Float))
                .unwrap_or(HostValue::Null)),
            (s, Value::Number(n)) if is_int_spec(s) => {
                Ok(HostValue::Int(n.as_i64().unwrap_or_default()))
            }
            (s, Value::Number(n)) if is_float_spec(s) => {
                Ok(HostValue::Float(n.as_f64().unwrap_or_default()))
            }
            (s, Value::String(text)) if is_int_spec(s) => Ok(HostValue::Int(
                parse_int(s, text).unwrap_or_default(),
            )),
            (s, Value::String(text)) if is_float_spec(s) => Ok(HostValue::Float(
                parse_float(s, text).unwrap_or_default(),
            )),
            _ => Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire).to_string(),
            }),
        }
    }
}

pub struct BooleanCodec;

impl Codec for BooleanCodec {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Bool(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire: &Value) -> bool {
        match spec {
            TypeSpec::Bool => matches!(wire, Value::Bool(_) | Value::String(_)),
            TypeSpec::Any => matches!(wire, Value::Bool(_)),
            _ => false,
        }
    }

    fn marshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        match value {
            HostValue::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(MarshalError::UnsupportedValue { kind: value.kind() }),
        }
    }

    fn try_unmarshal(
        &self,
        _serializer: &Serializer,
        _spec: &TypeSpec,
        wire: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        match wire {
            Value::Bool(_) => Ok(MatchScore::EXACT),
            // The exact literals are a match; any other string is usable
            // but only roughly.
            Value::String(s) if s == "true" || s == "false" => Ok(MatchScore::EXACT),
            Value::String(_) => Ok(MatchScore::ROUGH),
            other => Err(UnmarshalError::TypeMismatch {
                expected: "bool".to_string(),
                found: wire_kind(other).to_string(),
            }),
        }
    }

    fn unmarshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        _spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        match wire {
            Value::Bool(b) => Ok(HostValue::Bool(*b)),
            Value::String(s) => Ok(HostValue::Bool(s.eq_ignore_ascii_case("true"))),
            other => Err(UnmarshalError::TypeMismatch {
                expected: "bool".to_string(),
                found: wire_kind(other).to_string(),
            }),
        }
    }
}

pub struct StringCodec;

impl Codec for StringCodec {
    fn name(&self) -> &'static str {
        "string"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Str(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire: &Value) -> bool {
        match spec {
            TypeSpec::Str | TypeSpec::Char => {
                matches!(wire, Value::String(_) | Value::Number(_))
            }
            TypeSpec::Any => matches!(wire, Value::String(_)),
            _ => false,
        }
    }

    fn marshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        match value {
            HostValue::Str(s) => Ok(Value::String(s.clone())),
            _ => Err(MarshalError::UnsupportedValue { kind: value.kind() }),
        }
    }

    fn try_unmarshal(
        &self,
        _serializer: &Serializer,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        let text = match wire {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(UnmarshalError::TypeMismatch {
                    expected: spec.to_string(),
                    found: wire_kind(other).to_string(),
                });
            }
        };
        if matches!(spec, TypeSpec::Char) && text.chars().count() != 1 {
            return Err(UnmarshalError::TypeMismatch {
                expected: "char".to_string(),
                found: format!("string of length {}", text.chars().count()),
            });
        }
        match wire {
            Value::String(_) => Ok(MatchScore::EXACT),
            _ => Ok(MatchScore::SIMILAR),
        }
    }

    fn unmarshal(
        &self,
        serializer: &Serializer,
        _state: &mut WalkState,
        spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        self.try_unmarshal(serializer, spec, wire)?;
        match wire {
            Value::String(s) => Ok(HostValue::Str(s.clone())),
            Value::Number(n) => Ok(HostValue::Str(n.to_string())),
            other => Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(other).to_string(),
            }),
        }
    }
}
