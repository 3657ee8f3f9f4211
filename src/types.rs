//! Core wire-facing types for the bridge.
//!
//! This module defines [`TypeSpec`], the declared shape a wire value is
//! unmarshalled into, and the wire vocabulary (`javaClass` hints, reference
//! markers, payload keys) shared by the codecs and the parsers.
//!
//! `TypeSpec` is what method signatures are made of: each wire parameter of
//! a registered method declares the `TypeSpec` its JSON argument must
//! satisfy, and the overload resolver compares candidate signatures through
//! the specificity rules defined here.

use std::fmt;

/// Wire vocabulary: field names and class hints with fixed spellings.
///
/// The hint names keep the original protocol's spellings so existing
/// JavaScript clients can keep decoding hinted containers and dates.
pub mod wire {
    /// Field carrying the source type name of a hinted complex value.
    pub const CLASS_HINT: &str = "javaClass";
    /// Field distinguishing reference handles from ordinary objects.
    pub const RPC_TYPE: &str = "JSONRPCType";
    /// Field carrying the integer identity of a reference handle.
    pub const OBJECT_ID: &str = "objectID";
    /// `JSONRPCType` value for plain (opaque) references.
    pub const REFERENCE: &str = "Reference";
    /// `JSONRPCType` value for references whose methods may be invoked.
    pub const CALLABLE_REFERENCE: &str = "CallableReference";

    /// Payload key of a hinted list wrapper.
    pub const LIST_PAYLOAD: &str = "list";
    /// Payload key of a hinted set wrapper.
    pub const SET_PAYLOAD: &str = "set";
    /// Payload key of a hinted map wrapper.
    pub const MAP_PAYLOAD: &str = "map";
    /// Payload key of a hinted enum wrapper.
    pub const ENUM_PAYLOAD: &str = "enum";
    /// Field carrying epoch milliseconds inside a date wrapper.
    pub const TIME_FIELD: &str = "time";

    /// Class hint emitted for list values.
    pub const LIST_CLASS: &str = "java.util.ArrayList";
    /// Class hint emitted for set values.
    pub const SET_CLASS: &str = "java.util.HashSet";
    /// Class hint emitted for map values.
    pub const MAP_CLASS: &str = "java.util.HashMap";
    /// Class hint emitted for date values.
    pub const DATE_CLASS: &str = "java.util.Date";
    /// Accepted temporal hint: timestamps.
    pub const TIMESTAMP_CLASS: &str = "java.sql.Timestamp";
    /// Accepted temporal hint: calendar dates.
    pub const SQL_DATE_CLASS: &str = "java.sql.Date";
    /// Accepted temporal hint: times of day.
    pub const SQL_TIME_CLASS: &str = "java.sql.Time";

    /// Top-level request/response field carrying fixup instructions.
    pub const FIXUPS_FIELD: &str = "fixups";
    /// Optional top-level response field redirecting the client.
    pub const SERVER_URL_FIELD: &str = "serverURL";
}

/// Declared target shape for unmarshalling a wire value.
///
/// A `TypeSpec` names what the host expects at one position: a scalar of a
/// given width, a container with a declared element shape, a registered
/// bean or enum class, a reference handle, or `Any` when the caller has no
/// expectation and codecs compete by fitness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSpec {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Single character, carried on the wire as a one-length string.
    Char,
    Str,
    Date,
    /// A registered enum class, by name.
    Enum(String),
    /// Fixed-size sequence with the given element shape.
    Array(Box<TypeSpec>),
    List(Box<TypeSpec>),
    Set(Box<TypeSpec>),
    /// String-keyed map with the given value shape.
    Map(Box<TypeSpec>),
    /// A registered bean class, by name.
    Bean(String),
    /// An opaque reference to a live instance of the named class.
    Reference(String),
    /// Verbatim JSON subtree.
    Raw,
    /// No expectation; codecs compete by fitness.
    Any,
}

impl TypeSpec {
    /// Shorthand for a list with the given element shape.
    pub fn list_of(element: TypeSpec) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for an array with the given element shape.
    pub fn array_of(element: TypeSpec) -> Self {
        Self::Array(Box::new(element))
    }

    /// Shorthand for a set with the given element shape.
    pub fn set_of(element: TypeSpec) -> Self {
        Self::Set(Box::new(element))
    }

    /// Shorthand for a map with the given value shape.
    pub fn map_of(value: TypeSpec) -> Self {
        Self::Map(Box::new(value))
    }

    /// Returns `true` for scalar numeric and boolean shapes.
    pub fn is_primitive(&self) -> bool {
        self.primitive_rank().is_some()
    }

    /// Position in the primitive specificity ladder, narrowest first.
    ///
    /// The ladder is `i8 < i16 < i32 < i64 < f32 < f64 < bool` and is
    /// authoritative for overload tie-breaking: when two candidate
    /// signatures differ at a primitive position, the side with the lower
    /// rank is the more specific one.
    pub fn primitive_rank(&self) -> Option<u8> {
        match self {
            Self::I8 => Some(0),
            Self::I16 => Some(1),
            Self::I32 => Some(2),
            Self::I64 => Some(3),
            Self::F32 => Some(4),
            Self::F64 => Some(5),
            Self::Bool => Some(6),
            _ => None,
        }
    }

    /// Whether a value of shape `self` is acceptable where `target` is
    /// declared. `Any` accepts everything; containers are covariant in
    /// their element shape; named classes match by name.
    pub fn assignable_to(&self, target: &TypeSpec) -> bool {
        if matches!(target, TypeSpec::Any) {
            return true;
        }
        match (self, target) {
            (a, b) if a == b => true,
            (Self::Array(a), Self::Array(b))
            | (Self::List(a), Self::List(b))
            | (Self::Set(a), Self::Set(b))
            | (Self::Map(a), Self::Map(b)) => a.assignable_to(b),
            _ => false,
        }
    }

    /// Tri-state specificity comparison for one signature position.
    ///
    /// Returns `Some(true)` when `self` is strictly more specific than
    /// `other`, `Some(false)` when strictly less, and `None` when the
    /// shapes are not comparable or equally specific.
    pub fn more_specific_than(&self, other: &TypeSpec) -> Option<bool> {
        if self == other {
            return None;
        }
        if let (Some(a), Some(b)) = (self.primitive_rank(), other.primitive_rank()) {
            return Some(a < b);
        }
        match (self.assignable_to(other), other.assignable_to(self)) {
            (true, false) => Some(true),
            (false, true) => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Char => write!(f, "char"),
            Self::Str => write!(f, "string"),
            Self::Date => write!(f, "date"),
            Self::Enum(name) => write!(f, "enum {name}"),
            Self::Array(e) => write!(f, "array<{e}>"),
            Self::List(e) => write!(f, "list<{e}>"),
            Self::Set(e) => write!(f, "set<{e}>"),
            Self::Map(v) => write!(f, "map<string, {v}>"),
            Self::Bean(name) => write!(f, "bean {name}"),
            Self::Reference(name) => write!(f, "reference {name}"),
            Self::Raw => write!(f, "raw"),
            Self::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_ladder_orders_narrow_before_wide() {
        let ladder = [
            TypeSpec::I8,
            TypeSpec::I16,
            TypeSpec::I32,
            TypeSpec::I64,
            TypeSpec::F32,
            TypeSpec::F64,
            TypeSpec::Bool,
        ];
        for pair in ladder.windows(2) {
            assert_eq!(pair[0].more_specific_than(&pair[1]), Some(true));
            assert_eq!(pair[1].more_specific_than(&pair[0]), Some(false));
        }
    }

    #[test]
    fn any_is_least_specific() {
        assert_eq!(
            TypeSpec::Bean("demo.A".into()).more_specific_than(&TypeSpec::Any),
            Some(true)
        );
        assert_eq!(
            TypeSpec::Any.more_specific_than(&TypeSpec::Str),
            Some(false)
        );
    }

    #[test]
    fn containers_compare_by_element() {
        let specific = TypeSpec::list_of(TypeSpec::I32);
        let loose = TypeSpec::list_of(TypeSpec::Any);
        assert_eq!(specific.more_specific_than(&loose), Some(true));
        assert!(specific.assignable_to(&loose));
        assert!(!loose.assignable_to(&specific));
    }

    #[test]
    fn unrelated_shapes_are_incomparable() {
        assert_eq!(TypeSpec::Str.more_specific_than(&TypeSpec::Date), None);
    }
}
