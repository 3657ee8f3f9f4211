//! Host-side value model for the bridge.
//!
//! Remote peers speak JSON; the host side of the bridge speaks [`HostValue`],
//! a dynamic value graph. Composite values (arrays, lists, sets, maps,
//! objects, raw JSON subtrees) are shared allocations, so the same node can
//! be reachable from several places and graphs may contain cycles. The
//! marshaller relies on that: the identity of a composite value is the
//! address of its shared payload, which is how revisits are detected during
//! a graph walk.
//!
//! # Examples
//!
//! ```rust
//! use wirebridge::value::HostValue;
//!
//! let names = HostValue::list(vec![
//!     HostValue::from("ada"),
//!     HostValue::from("grace"),
//! ]);
//!
//! // Cloning a composite clones the handle, not the payload.
//! let alias = names.clone();
//! assert_eq!(names.identity(), alias.identity());
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

/// Shared sequence payload used by arrays, lists and sets.
pub type SharedSeq = Arc<RwLock<Vec<HostValue>>>;

/// Shared map payload. Keys are strings; insertion order is preserved so
/// marshalling the same map twice produces identical output.
pub type SharedMap = Arc<RwLock<IndexMap<String, HostValue>>>;

/// Shared, type-erased instance payload backing [`ObjectRef`].
pub type SharedInstance = Arc<RwLock<Box<dyn Any + Send + Sync>>>;

/// A dynamic host value.
///
/// Scalars are plain values with no identity; every composite variant wraps
/// a shared payload whose allocation address serves as the value's identity
/// during marshalling. `Array` and `List` share a payload shape and differ
/// only in the wire form they produce (a bare JSON array versus a hinted
/// `{"javaClass": .., "list": [..]}` wrapper).
#[derive(Clone)]
pub enum HostValue {
    /// JSON null.
    Null,
    Bool(bool),
    /// Integer scalar. Narrower widths are an unmarshalling concern.
    Int(i64),
    Float(f64),
    Str(String),
    /// A point in time, marshalled as epoch milliseconds.
    Date(DateTime<Utc>),
    /// A named variant of a registered enum class.
    Enum(EnumValue),
    /// Fixed-size sequence, marshalled as a bare JSON array.
    Array(SharedSeq),
    /// Growable sequence, marshalled with a list wrapper.
    List(SharedSeq),
    /// Sequence with set semantics, marshalled with a set wrapper.
    Set(SharedSeq),
    /// String-keyed map, marshalled with a map wrapper.
    ///
    /// Map keys must be strings. Values with non-string keys have no host
    /// representation here; coercing foreign keys through their textual
    /// form is out of scope.
    Map(SharedMap),
    /// An instance of a registered class.
    Object(ObjectRef),
    /// An already-JSON subtree carried through the bridge verbatim.
    Raw(Arc<Value>),
}

/// A named variant of a registered enum class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    /// Registered class name of the enum.
    pub type_name: String,
    /// Variant name as it appears on the wire.
    pub variant: String,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }
}

/// Classification of a [`HostValue`], used for codec routing and error
/// reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Date,
    Enum,
    Array,
    List,
    Set,
    Map,
    Object,
    Raw,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Date => "date",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Object => "object",
            Self::Raw => "raw",
        };
        write!(f, "{label}")
    }
}

impl HostValue {
    /// Wrap a vector in a shared array payload.
    pub fn array(items: Vec<HostValue>) -> Self {
        Self::Array(Arc::new(RwLock::new(items)))
    }

    /// Wrap a vector in a shared list payload.
    pub fn list(items: Vec<HostValue>) -> Self {
        Self::List(Arc::new(RwLock::new(items)))
    }

    /// Wrap a vector in a shared set payload.
    pub fn set(items: Vec<HostValue>) -> Self {
        Self::Set(Arc::new(RwLock::new(items)))
    }

    /// Wrap an ordered map in a shared map payload.
    pub fn map(entries: IndexMap<String, HostValue>) -> Self {
        Self::Map(Arc::new(RwLock::new(entries)))
    }

    /// Carry a JSON subtree through the bridge verbatim.
    pub fn raw(value: Value) -> Self {
        Self::Raw(Arc::new(value))
    }

    /// The classification of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Date(_) => ValueKind::Date,
            Self::Enum(_) => ValueKind::Enum,
            Self::Array(_) => ValueKind::Array,
            Self::List(_) => ValueKind::List,
            Self::Set(_) => ValueKind::Set,
            Self::Map(_) => ValueKind::Map,
            Self::Object(_) => ValueKind::Object,
            Self::Raw(_) => ValueKind::Raw,
        }
    }

    /// Identity key of a composite value, `None` for scalars.
    ///
    /// Two values report the same identity exactly when they share a
    /// payload allocation. This is the revisit test used by the graph
    /// walk state.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::Array(s) | Self::List(s) | Self::Set(s) => {
                Some(Arc::as_ptr(s) as *const () as usize)
            }
            Self::Map(m) => Some(Arc::as_ptr(m) as *const () as usize),
            Self::Object(o) => Some(o.identity()),
            Self::Raw(v) => Some(Arc::as_ptr(v) as *const () as usize),
            _ => None,
        }
    }

    /// Returns `true` for variants that carry a shared payload.
    pub fn is_composite(&self) -> bool {
        self.identity().is_some()
    }

    /// Convenience accessor for string scalars.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convenience accessor for integer scalars.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convenience accessor for boolean scalars.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Composite payloads are not chased here: a cyclic graph would
        // recurse forever.
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Date(d) => write!(f, "Date({d})"),
            Self::Enum(e) => write!(f, "Enum({}::{})", e.type_name, e.variant),
            Self::Array(s) => write!(f, "Array(len={})", s.read().len()),
            Self::List(s) => write!(f, "List(len={})", s.read().len()),
            Self::Set(s) => write!(f, "Set(len={})", s.read().len()),
            Self::Map(m) => write!(f, "Map(len={})", m.read().len()),
            Self::Object(o) => write!(f, "Object({})", o.class_name()),
            Self::Raw(v) => write!(f, "Raw({v})"),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for HostValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// A shared, type-tagged instance handle.
///
/// `ObjectRef` is how registered class instances travel through the bridge:
/// the payload is type-erased, the class name selects the registered
/// descriptor that knows how to read and write it. Cloning an `ObjectRef`
/// aliases the instance.
///
/// # Examples
///
/// ```rust
/// use wirebridge::value::ObjectRef;
///
/// struct Counter {
///     count: i64,
/// }
///
/// let obj = ObjectRef::new("demo.Counter", Counter { count: 3 });
/// let count = obj.with(|c: &Counter| c.count).unwrap();
/// assert_eq!(count, 3);
/// ```
#[derive(Clone)]
pub struct ObjectRef {
    class_name: Arc<str>,
    instance: SharedInstance,
}

impl ObjectRef {
    /// Wrap a concrete instance under a registered class name.
    pub fn new<T: Any + Send + Sync>(class_name: impl Into<String>, instance: T) -> Self {
        Self {
            class_name: Arc::from(class_name.into()),
            instance: Arc::new(RwLock::new(Box::new(instance))),
        }
    }

    /// Build an `ObjectRef` around an already-boxed instance, as produced
    /// by a registered constructor.
    pub fn from_boxed(class_name: impl Into<String>, instance: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            class_name: Arc::from(class_name.into()),
            instance: Arc::new(RwLock::new(instance)),
        }
    }

    /// Registered class name of the instance.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Identity key, shared by every alias of this instance.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.instance) as *const () as usize
    }

    /// The shared payload. Property accessors borrow through this.
    pub fn instance(&self) -> &SharedInstance {
        &self.instance
    }

    /// Borrow the instance downcast to `T`. Returns `None` when the
    /// payload is not a `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.instance.read();
        guard.downcast_ref::<T>().map(f)
    }

    /// Mutably borrow the instance downcast to `T`.
    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.instance.write();
        guard.downcast_mut::<T>().map(f)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:#x})", self.class_name, self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_identity_is_shared_by_clones() {
        let list = HostValue::list(vec![HostValue::Int(1)]);
        let alias = list.clone();
        assert_eq!(list.identity(), alias.identity());

        let other = HostValue::list(vec![HostValue::Int(1)]);
        assert_ne!(list.identity(), other.identity());
    }

    #[test]
    fn scalars_have_no_identity() {
        assert_eq!(HostValue::Int(7).identity(), None);
        assert_eq!(HostValue::from("x").identity(), None);
        assert_eq!(HostValue::Null.identity(), None);
    }

    #[test]
    fn object_ref_downcasts() {
        struct Point {
            x: i64,
        }
        let obj = ObjectRef::new("demo.Point", Point { x: 4 });
        assert_eq!(obj.with(|p: &Point| p.x), Some(4));
        assert_eq!(obj.with(|s: &String| s.len()), None);
        obj.with_mut(|p: &mut Point| p.x = 9);
        assert_eq!(obj.with(|p: &Point| p.x), Some(9));
    }
}
