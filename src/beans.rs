//! Registered class descriptors.
//!
//! The bridge has no runtime introspection to lean on, so classes are
//! described explicitly: a [`BeanClass`] names a type, optionally carries a
//! default constructor, and lists its properties as (getter, setter) pairs
//! over the type-erased instance payload. The [`BeanClassBuilder`] keeps
//! registration readable; the typed `property` helpers hide the downcasts.
//!
//! Properties marshal in registration order, which is what makes bean
//! output deterministic. A property without a setter marshals but is
//! skipped on the way back in.
//!
//! # Examples
//!
//! ```rust
//! use wirebridge::beans::{BeanClass, BeanError};
//! use wirebridge::value::HostValue;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! let class = BeanClass::builder("demo.Counter")
//!     .constructor(Counter::default)
//!     .property(
//!         "count",
//!         |c: &Counter| HostValue::Int(c.count),
//!         |c: &mut Counter, v| match v {
//!             HostValue::Int(i) => {
//!                 c.count = i;
//!                 Ok(())
//!             }
//!             other => Err(BeanError::property_type("count", "int", other.kind())),
//!         },
//!     )
//!     .build();
//!
//! assert_eq!(class.properties().count(), 1);
//! ```

use std::any::Any;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::value::{HostValue, ValueKind};

/// Default constructor of a registered class.
pub type Constructor = Arc<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Reads one property off a type-erased instance.
pub type Getter = Arc<dyn Fn(&dyn Any) -> Result<HostValue, BeanError> + Send + Sync>;

/// Writes one property on a type-erased instance.
pub type Setter = Arc<dyn Fn(&mut dyn Any, HostValue) -> Result<(), BeanError> + Send + Sync>;

/// Errors raised by property access and instance construction.
#[derive(Debug, Error, Diagnostic)]
pub enum BeanError {
    /// The instance payload is not of the class the descriptor expects.
    #[error("instance is not a {class}")]
    #[diagnostic(code(wirebridge::beans::instance_type))]
    InstanceType { class: String },

    /// The class has no property of this name.
    #[error("{class} has no property named {property}")]
    #[diagnostic(code(wirebridge::beans::no_such_property))]
    NoSuchProperty { class: String, property: String },

    /// The property declined the offered value.
    #[error("property {property} expects {expected}, got {got}")]
    #[diagnostic(code(wirebridge::beans::property_type))]
    PropertyType {
        property: String,
        expected: String,
        got: ValueKind,
    },

    /// The property has no setter.
    #[error("property {property} of {class} is read-only")]
    #[diagnostic(code(wirebridge::beans::read_only))]
    ReadOnly { class: String, property: String },

    /// The class was registered without a default constructor.
    #[error("{class} has no default constructor")]
    #[diagnostic(
        code(wirebridge::beans::not_constructible),
        help("register the class with a constructor to unmarshal instances of it")
    )]
    NotConstructible { class: String },
}

impl BeanError {
    /// Shorthand for the common setter mismatch case.
    pub fn property_type(
        property: impl Into<String>,
        expected: impl Into<String>,
        got: ValueKind,
    ) -> Self {
        Self::PropertyType {
            property: property.into(),
            expected: expected.into(),
            got,
        }
    }
}

/// One named property: a getter and an optional setter.
pub struct Property {
    name: String,
    getter: Getter,
    setter: Option<Setter>,
}

impl Property {
    /// The property name as it appears on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the property off an instance.
    pub fn get(&self, instance: &dyn Any) -> Result<HostValue, BeanError> {
        (self.getter)(instance)
    }

    /// Write the property on an instance. Fails for read-only properties.
    pub fn set(&self, class: &str, instance: &mut dyn Any, value: HostValue) -> Result<(), BeanError> {
        match &self.setter {
            Some(setter) => setter(instance, value),
            None => Err(BeanError::ReadOnly {
                class: class.to_string(),
                property: self.name.clone(),
            }),
        }
    }

    /// `true` when the property can be written during unmarshalling.
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

/// Descriptor of a registered class: name, constructor, properties.
pub struct BeanClass {
    name: String,
    construct: Option<Constructor>,
    properties: Vec<Property>,
    index: FxHashMap<String, usize>,
    safe_for_dispatch: bool,
}

impl BeanClass {
    /// Start building a descriptor for the named class.
    pub fn builder(name: impl Into<String>) -> BeanClassBuilder {
        BeanClassBuilder {
            name: name.into(),
            construct: None,
            properties: Vec::new(),
            safe_for_dispatch: false,
        }
    }

    /// Registered class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties in registration order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Look up one property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.index.get(name).map(|&i| &self.properties[i])
    }

    /// Build a fresh instance through the registered constructor.
    pub fn construct(&self) -> Result<Box<dyn Any + Send + Sync>, BeanError> {
        match &self.construct {
            Some(ctor) => Ok(ctor()),
            None => Err(BeanError::NotConstructible {
                class: self.name.clone(),
            }),
        }
    }

    /// `true` when the class registered a default constructor.
    pub fn is_constructible(&self) -> bool {
        self.construct.is_some()
    }

    /// Whether the class opted into resolution from wire hints without an
    /// allow-list entry.
    pub fn is_safe_for_dispatch(&self) -> bool {
        self.safe_for_dispatch
    }
}

impl std::fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanClass")
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("constructible", &self.construct.is_some())
            .finish()
    }
}

/// Fluent builder for [`BeanClass`].
pub struct BeanClassBuilder {
    name: String,
    construct: Option<Constructor>,
    properties: Vec<Property>,
    safe_for_dispatch: bool,
}

impl BeanClassBuilder {
    /// Register a default constructor. Required for unmarshalling.
    #[must_use]
    pub fn constructor<T, F>(mut self, ctor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.construct = Some(Arc::new(move || Box::new(ctor())));
        self
    }

    /// Register a readable and writable property.
    #[must_use]
    pub fn property<T, G, S>(mut self, name: impl Into<String>, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> HostValue + Send + Sync + 'static,
        S: Fn(&mut T, HostValue) -> Result<(), BeanError> + Send + Sync + 'static,
    {
        let name = name.into();
        let class = self.name.clone();
        let class_for_set = self.name.clone();
        let getter: Getter = Arc::new(move |instance| {
            let typed = instance
                .downcast_ref::<T>()
                .ok_or_else(|| BeanError::InstanceType {
                    class: class.clone(),
                })?;
            Ok(get(typed))
        });
        let setter: Setter = Arc::new(move |instance, value| {
            let typed = instance
                .downcast_mut::<T>()
                .ok_or_else(|| BeanError::InstanceType {
                    class: class_for_set.clone(),
                })?;
            set(typed, value)
        });
        self.push(name, getter, Some(setter));
        self
    }

    /// Register a property that marshals but is never written back.
    #[must_use]
    pub fn read_only<T, G>(mut self, name: impl Into<String>, get: G) -> Self
    where
        T: Any,
        G: Fn(&T) -> HostValue + Send + Sync + 'static,
    {
        let name = name.into();
        let class = self.name.clone();
        let getter: Getter = Arc::new(move |instance| {
            let typed = instance
                .downcast_ref::<T>()
                .ok_or_else(|| BeanError::InstanceType {
                    class: class.clone(),
                })?;
            Ok(get(typed))
        });
        self.push(name, getter, None);
        self
    }

    /// Mark the class resolvable from wire hints without an allow-list
    /// entry.
    #[must_use]
    pub fn safe_for_dispatch(mut self) -> Self {
        self.safe_for_dispatch = true;
        self
    }

    fn push(&mut self, name: String, getter: Getter, setter: Option<Setter>) {
        self.properties.push(Property {
            name,
            getter,
            setter,
        });
    }

    /// Finish the descriptor.
    pub fn build(self) -> Arc<BeanClass> {
        let index = self
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Arc::new(BeanClass {
            name: self.name,
            construct: self.construct,
            properties: self.properties,
            index,
            safe_for_dispatch: self.safe_for_dispatch,
        })
    }
}

/// Descriptor of a registered enum class: a name and its variant list.
#[derive(Clone, Debug)]
pub struct EnumClass {
    name: String,
    variants: Vec<String>,
}

impl EnumClass {
    pub fn new<I, S>(name: impl Into<String>, variants: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn has_variant(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Point {
        x: i64,
        y: i64,
    }

    fn point_class() -> Arc<BeanClass> {
        BeanClass::builder("demo.Point")
            .constructor(Point::default)
            .property(
                "x",
                |p: &Point| HostValue::Int(p.x),
                |p: &mut Point, v| match v {
                    HostValue::Int(i) => {
                        p.x = i;
                        Ok(())
                    }
                    other => Err(BeanError::property_type("x", "int", other.kind())),
                },
            )
            .read_only("y", |p: &Point| HostValue::Int(p.y))
            .build()
    }

    #[test]
    fn properties_keep_registration_order() {
        let class = point_class();
        let names: Vec<_> = class.properties().map(Property::name).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn construct_and_round_trip_property() {
        let class = point_class();
        let mut instance = class.construct().unwrap();
        class
            .property("x")
            .unwrap()
            .set("demo.Point", instance.as_mut(), HostValue::Int(12))
            .unwrap();
        let got = class.property("x").unwrap().get(instance.as_ref()).unwrap();
        assert_eq!(got.as_int(), Some(12));
    }

    #[test]
    fn read_only_property_rejects_writes() {
        let class = point_class();
        let mut instance = class.construct().unwrap();
        let err = class
            .property("y")
            .unwrap()
            .set("demo.Point", instance.as_mut(), HostValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, BeanError::ReadOnly { .. }));
    }

    #[test]
    fn wrong_instance_type_is_reported() {
        let class = point_class();
        let mut not_a_point: Box<dyn Any + Send + Sync> = Box::new(String::from("nope"));
        let err = class
            .property("x")
            .unwrap()
            .set("demo.Point", not_a_point.as_mut(), HostValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, BeanError::InstanceType { .. }));
    }

    #[test]
    fn enum_class_variant_lookup() {
        let class = EnumClass::new("demo.Color", ["Red", "Green", "Blue"]);
        assert!(class.has_variant("Green"));
        assert!(!class.has_variant("Purple"));
    }
}
