//! Shared fixtures for the integration tests: a bridge with a registered
//! echo object, a cyclic bean pair, an enum, and a callable reference
//! class.
#![allow(dead_code)]

use std::sync::Arc;

use wirebridge::beans::{BeanClass, BeanError, EnumClass};
use wirebridge::bridge::Bridge;
use wirebridge::config::BridgeConfig;
use wirebridge::dispatch::{HandlerError, MethodSpec};
use wirebridge::registry::ExportedClass;
use wirebridge::types::TypeSpec;
use wirebridge::value::{HostValue, ObjectRef};

pub struct Echo;

#[derive(Default)]
pub struct BeanA {
    pub bean_b: Option<HostValue>,
}

#[derive(Default)]
pub struct BeanB {
    pub bean_a: Option<HostValue>,
}

#[derive(Default)]
pub struct Counter {
    pub count: i64,
}

pub struct Session;

fn object_or_null(value: HostValue, property: &str) -> Result<Option<HostValue>, BeanError> {
    match value {
        HostValue::Null => Ok(None),
        object @ HostValue::Object(_) => Ok(Some(object)),
        other => Err(BeanError::property_type(property, "object", other.kind())),
    }
}

pub fn bean_a_class() -> Arc<BeanClass> {
    BeanClass::builder("demo.BeanA")
        .safe_for_dispatch()
        .constructor(BeanA::default)
        .property(
            "beanB",
            |a: &BeanA| a.bean_b.clone().unwrap_or(HostValue::Null),
            |a: &mut BeanA, v| {
                a.bean_b = object_or_null(v, "beanB")?;
                Ok(())
            },
        )
        .build()
}

pub fn bean_b_class() -> Arc<BeanClass> {
    BeanClass::builder("demo.BeanB")
        .safe_for_dispatch()
        .constructor(BeanB::default)
        .property(
            "beanA",
            |b: &BeanB| b.bean_a.clone().unwrap_or(HostValue::Null),
            |b: &mut BeanB, v| {
                b.bean_a = object_or_null(v, "beanA")?;
                Ok(())
            },
        )
        .build()
}

pub fn counter_class() -> Arc<BeanClass> {
    BeanClass::builder("demo.Counter")
        .safe_for_dispatch()
        .constructor(Counter::default)
        .property(
            "count",
            |c: &Counter| HostValue::Int(c.count),
            |c: &mut Counter, v| match v {
                HostValue::Int(i) => {
                    c.count = i;
                    Ok(())
                }
                other => Err(BeanError::property_type("count", "int", other.kind())),
            },
        )
        .build()
}

/// A bean A whose `beanB` points at a bean B pointing back at A.
pub fn cyclic_bean_a() -> HostValue {
    let a = ObjectRef::new("demo.BeanA", BeanA::default());
    let b = ObjectRef::new(
        "demo.BeanB",
        BeanB {
            bean_a: Some(HostValue::Object(a.clone())),
        },
    );
    a.with_mut(|inner: &mut BeanA| {
        inner.bean_b = Some(HostValue::Object(b.clone()));
    });
    HostValue::Object(a)
}

fn echo_class() -> Arc<ExportedClass> {
    ExportedClass::builder("demo.Echo")
        .method(
            MethodSpec::builder("echo")
                .param(TypeSpec::Str)
                .handler(|_, args, _| Ok(args[0].clone())),
        )
        .method(
            MethodSpec::builder("echo")
                .param(TypeSpec::array_of(TypeSpec::I32))
                .handler(|_, args, _| Ok(args[0].clone())),
        )
        .method(
            MethodSpec::builder("echo")
                .param(TypeSpec::list_of(TypeSpec::Str))
                .handler(|_, args, _| Ok(args[0].clone())),
        )
        .method(
            MethodSpec::builder("pick")
                .param(TypeSpec::F64)
                .handler(|_, _, _| Ok(HostValue::from("number"))),
        )
        .method(
            MethodSpec::builder("pick")
                .param(TypeSpec::Bool)
                .handler(|_, _, _| Ok(HostValue::from("boolean"))),
        )
        .method(
            MethodSpec::builder("aBean").handler(|_, _, _| Ok(cyclic_bean_a())),
        )
        .method(
            MethodSpec::builder("raise").handler(|_, _, _| {
                Err(HandlerError::msg("boom").caused_by(HandlerError::msg("root cause")))
            }),
        )
        .method(
            MethodSpec::builder("whoami")
                .local("session")
                .handler(|_, _, ctx| {
                    let session = ctx
                        .get::<String>("session")
                        .cloned()
                        .ok_or_else(|| HandlerError::msg("no session"))?;
                    Ok(HostValue::Str(session))
                }),
        )
        .method(
            MethodSpec::builder("openSession")
                .handler(|_, _, _| Ok(HostValue::Object(ObjectRef::new("demo.Session", Session)))),
        )
        .build()
}

fn session_class() -> Arc<ExportedClass> {
    ExportedClass::builder("demo.Session")
        .method(
            MethodSpec::builder("touch").handler(|_, _, _| Ok(HostValue::Int(1))),
        )
        .build()
}

fn counter_exported() -> Arc<ExportedClass> {
    ExportedClass::builder("demo.Counter")
        .bean(counter_class())
        .method(
            MethodSpec::builder("version")
                .static_method()
                .handler(|_, _, _| Ok(HostValue::from("1.0"))),
        )
        .method(MethodSpec::constructor().handler(|_, _, _| {
            Ok(HostValue::Object(ObjectRef::new(
                "demo.Counter",
                Counter::default(),
            )))
        }))
        .build()
}

/// A bridge with the full test surface registered.
pub fn test_bridge(config: BridgeConfig) -> Bridge {
    let bridge = Bridge::new(config);
    bridge.register_object("test", ObjectRef::new("demo.Echo", Echo), echo_class());
    bridge.register_class(
        ExportedClass::builder("demo.BeanA")
            .bean(bean_a_class())
            .build(),
    );
    bridge.register_class(
        ExportedClass::builder("demo.BeanB")
            .bean(bean_b_class())
            .build(),
    );
    bridge.register_class(counter_exported());
    bridge.register_class(session_class());
    bridge.register_callable_reference_class("demo.Session");
    bridge.register_enum(EnumClass::new("demo.Color", ["Red", "Green", "Blue"]));
    bridge
}

/// Default-configured test bridge.
pub fn default_bridge() -> Bridge {
    test_bridge(BridgeConfig::default())
}
