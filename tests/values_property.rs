//! Property tests for the roundtrip laws: scalars survive a marshal and
//! typed unmarshal unchanged, and marshalling is deterministic.

use proptest::prelude::*;
use serde_json::Value;

use wirebridge::config::BridgeConfig;
use wirebridge::serialize::Serializer;
use wirebridge::state::PathSeg;
use wirebridge::types::TypeSpec;
use wirebridge::value::HostValue;

fn marshal(serializer: &Serializer, value: &HostValue) -> Value {
    serializer
        .marshal_root(vec![PathSeg::field("result")], value)
        .unwrap()
        .value
}

proptest! {
    #[test]
    fn int_roundtrip(v in any::<i64>()) {
        let ser = Serializer::standalone(BridgeConfig::default());
        let wire = marshal(&ser, &HostValue::Int(v));
        let back = ser.unmarshal_root(&TypeSpec::I64, &wire).unwrap();
        prop_assert_eq!(back.as_int(), Some(v));
    }

    #[test]
    fn narrow_int_roundtrip(v in any::<i8>()) {
        let ser = Serializer::standalone(BridgeConfig::default());
        let wire = marshal(&ser, &HostValue::Int(i64::from(v)));
        let back = ser.unmarshal_root(&TypeSpec::I8, &wire).unwrap();
        prop_assert_eq!(back.as_int(), Some(i64::from(v)));
    }

    #[test]
    fn float_roundtrip(v in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let ser = Serializer::standalone(BridgeConfig::default());
        let wire = marshal(&ser, &HostValue::Float(v));
        let back = ser.unmarshal_root(&TypeSpec::F64, &wire).unwrap();
        match back {
            HostValue::Float(x) => prop_assert_eq!(x, v),
            other => prop_assert!(false, "kind changed: {:?}", other),
        }
    }

    #[test]
    fn string_roundtrip(v in ".*") {
        let ser = Serializer::standalone(BridgeConfig::default());
        let wire = marshal(&ser, &HostValue::Str(v.clone()));
        let back = ser.unmarshal_root(&TypeSpec::Str, &wire).unwrap();
        prop_assert_eq!(back.as_str(), Some(v.as_str()));
    }

    #[test]
    fn bool_roundtrip(v in any::<bool>()) {
        let ser = Serializer::standalone(BridgeConfig::default());
        let wire = marshal(&ser, &HostValue::Bool(v));
        let back = ser.unmarshal_root(&TypeSpec::Bool, &wire).unwrap();
        prop_assert_eq!(back.as_bool(), Some(v));
    }

    #[test]
    fn scalar_lists_marshal_deterministically(items in proptest::collection::vec(any::<i32>(), 0..16)) {
        let ser = Serializer::standalone(BridgeConfig::default());
        let value = HostValue::list(items.iter().map(|&i| HostValue::from(i)).collect());
        let first = serde_json::to_string(&marshal(&ser, &value)).unwrap();
        let second = serde_json::to_string(&marshal(&ser, &value)).unwrap();
        prop_assert_eq!(first, second);
    }
}
