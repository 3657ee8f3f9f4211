//! Raw codec: JSON subtrees carried through the bridge verbatim.
//!
//! A raw value still has identity (its shared allocation), so the same
//! subtree reachable twice participates in duplicate detection like any
//! other composite. Its interior is plain JSON and cannot alias, so the
//! subtree itself is emitted as-is.

use serde_json::Value;

use crate::match_score::MatchScore;
use crate::serialize::{Codec, MarshalError, Serializer, UnmarshalError};
use crate::state::WalkState;
use crate::types::TypeSpec;
use crate::value::HostValue;

pub struct RawCodec;

impl Codec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn can_marshal(&self, _serializer: &Serializer, value: &HostValue) -> bool {
        matches!(value, HostValue::Raw(_))
    }

    fn can_unmarshal(&self, _serializer: &Serializer, spec: &TypeSpec, _wire: &Value) -> bool {
        matches!(spec, TypeSpec::Raw)
    }

    fn marshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        value: &HostValue,
    ) -> Result<Value, MarshalError> {
        match value {
            HostValue::Raw(subtree) => Ok((**subtree).clone()),
            _ => Err(MarshalError::UnsupportedValue { kind: value.kind() }),
        }
    }

    fn try_unmarshal(
        &self,
        _serializer: &Serializer,
        _spec: &TypeSpec,
        _wire: &Value,
    ) -> Result<MatchScore, UnmarshalError> {
        Ok(MatchScore::EXACT)
    }

    fn unmarshal(
        &self,
        _serializer: &Serializer,
        _state: &mut WalkState,
        _spec: &TypeSpec,
        wire: &Value,
    ) -> Result<HostValue, UnmarshalError> {
        Ok(HostValue::raw(wire.clone()))
    }
}
