//! Bean codec: registered classes marshalled property by property.
//!
//! Unmarshalling is the security-sensitive direction. Whenever the wire
//! object carries a `javaClass` hint, the hint goes through the bridge's
//! resolver before anything is constructed; a denied hint fails the
//! unmarshal rather than degrading into some other shape.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::beans::BeanClass;
use crate::match_score::MatchScore;
use crate::resolver::ResolvedType;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError, wire_kind};
use crate::state::{PathSeg, WalkState};
use crate::types::{TypeSpec, wire};
use crate::value::{HostValue, ObjectRef};

pub struct BeanCodec;

fn is_meta_key(key: &str) -> bool {
    key == wire::CLASS_HINT || key == wire::RPC_TYPE
}

impl BeanCodec {
    /// Pick the descriptor an incoming object unmarshals through: the
    /// resolver-gated hint when one is present, the declared class
    /// otherwise.
    fn target_class(
        &self,
        serializer: &Serializer,
        spec: &TypeSpec,
        object: &Map<String, Value>,
    ) -> Result<Arc<BeanClass>, UnmarshalError> {
        if let Some(hint) = object.get(wire::CLASS_HINT).and_then(Value::as_str) {
            return match serializer.resolver().try_resolve(hint) {
                Some(ResolvedType::Bean(class)) => {
                    class.bean().cloned().ok_or_else(|| UnmarshalError::TypeMismatch {
                        expected: format!("bean {hint}"),
                        found: "class without a bean descriptor".to_string(),
                    })
                }
                Some(ResolvedType::Enum(_)) => Err(UnmarshalError::TypeMismatch {
                    expected: spec.to_string(),
                    found: format!("enum class {hint}"),
                }),
                None => Err(UnmarshalError::ClassDenied {
                    name: hint.to_string(),
                }),
            };
        }
        let TypeSpec::Bean(name) = spec else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: "object without a class hint".to_string(),
            });
        };
        serializer
            .registries()
            .class(name)
            .and_then(|class| class.bean().cloned())
            .ok_or_else(|| UnmarshalError::UnregisteredClass { name: name.clone() })
    }
}

impl Codec for BeanCodec {
    fn name(&self) -> &'static str {
        "bean"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Object(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, wire_value: &Value) -> bool {
        let Some(object) = wire_value.as_object() else {
            return false;
        };
        match spec {
            TypeSpec::Bean(_) => true,
            TypeSpec::Any => {
                object.contains_key(wire::CLASS_HINT) && !object.contains_key(wire::RPC_TYPE)
            }
            _ => false,
        }
    }

    fn marshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        let HostValue::Object(instance) = value else {
            return Err(MarshalError::UnsupportedValue { kind: value.kind() });
        };
        let bean = serializer
            .registries()
            .class(instance.class_name())
            .and_then(|class| class.bean().cloned())
            .ok_or_else(|| MarshalError::UnknownClass {
                name: instance.class_name().to_string(),
            })?;

        let mut object = Map::new();
        if serializer.config().marshal_class_hints {
            object.insert(
                wire::CLASS_HINT.to_string(),
                Value::String(instance.class_name().to_string()),
            );
        }
        for property in bean.properties() {
            let value = {
                let guard = instance.instance().read();
                property.get(guard.as_ref())?
            };
            let wire_value =
                serializer.marshal_child(state, PathSeg::field(property.name()), &value)?;
            object.insert(property.name().to_string(), wire_value);
        }
        Ok(Value::Object(object))
    }

    fn try_unmarshal(
        &self,
        serializer: &Serializer,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        let Some(object) = wire_value.as_object() else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire_value).to_string(),
            });
        };
        let bean = self.target_class(serializer, spec, object)?;
        // Keys with no writable counterpart raise the mismatch; they do
        // not reject the candidate.
        let strays = object
            .keys()
            .filter(|key| !is_meta_key(key))
            .filter(|key| !bean.property(key).is_some_and(|p| p.is_writable()))
            .count();
        Ok(MatchScore::with_mismatch(strays as u32))
    }

    fn unmarshal(
        &self,
        serializer: &Serializer,
        state: &mut WalkState,
        spec: &TypeSpec,
        wire_value: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        let Some(object) = wire_value.as_object() else {
            return Err(UnmarshalError::TypeMismatch {
                expected: spec.to_string(),
                found: wire_kind(wire_value).to_string(),
            });
        };
        let bean = self.target_class(serializer, spec, object)?;
        let instance = ObjectRef::from_boxed(bean.name(), bean.construct()?);
        for (key, entry) in object {
            if is_meta_key(key) {
                continue;
            }
            let Some(property) = bean.property(key) else {
                continue;
            };
            if !property.is_writable() {
                continue;
            }
            let value =
                serializer.unmarshal_child(state, PathSeg::field(key.clone()), &TypeSpec::Any, entry)?;
            let mut guard = instance.instance().write();
            property.set(bean.name(), guard.as_mut(), value)?;
        }
        Ok(HostValue::Object(instance))
    }
}
