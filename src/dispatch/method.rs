//! Method specifications and handler plumbing.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::TypeSpec;
use crate::value::{HostValue, ObjectRef};

use super::{CONSTRUCTOR_METHOD, CallContext};

/// The error a handler raises. Remote peers see its sanitized trace, never
/// host-internal detail.
///
/// Causes chain like the source exceptions they describe:
///
/// ```rust
/// use wirebridge::dispatch::HandlerError;
///
/// let err = HandlerError::msg("storage unavailable")
///     .caused_by(HandlerError::msg("connection refused"));
/// assert_eq!(
///     err.sanitized_trace(),
///     "storage unavailable\ncaused by: connection refused"
/// );
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<HandlerError>>,
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn caused_by(mut self, cause: HandlerError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The textual trace exposed as error data: messages only, one line
    /// per cause.
    pub fn sanitized_trace(&self) -> String {
        let mut lines = vec![self.message.clone()];
        let mut cursor = self.cause.as_deref();
        while let Some(err) = cursor {
            lines.push(format!("caused by: {}", err.message));
            cursor = err.cause.as_deref();
        }
        lines.join("\n")
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

/// What a handler is invoked on.
#[derive(Clone, Copy)]
pub enum MethodTarget<'a> {
    /// Static method or constructor: no instance.
    Static,
    /// Instance method on a registered object or live reference.
    Instance(&'a ObjectRef),
}

impl MethodTarget<'_> {
    pub fn instance(&self) -> Option<&ObjectRef> {
        match self {
            Self::Static => None,
            Self::Instance(obj) => Some(obj),
        }
    }
}

/// One declared parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    /// Unmarshalled from the wire argument at this position.
    Wire(TypeSpec),
    /// Injected from the call context; excluded from wire arity.
    Local(&'static str),
}

/// Flavor of a method registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    Static,
    Constructor,
}

/// The invocable body of a method.
pub type Handler = Arc<
    dyn Fn(MethodTarget<'_>, &[HostValue], &CallContext) -> Result<HostValue, HandlerError>
        + Send
        + Sync,
>;

/// A registered method: name, declared parameters, handler.
#[derive(Clone)]
pub struct MethodSpec {
    name: String,
    kind: MethodKind,
    params: Vec<Param>,
    handler: Handler,
}

impl MethodSpec {
    /// Start building an instance method.
    pub fn builder(name: impl Into<String>) -> MethodSpecBuilder {
        MethodSpecBuilder {
            name: name.into(),
            kind: MethodKind::Instance,
            params: Vec::new(),
        }
    }

    /// Start building a constructor (`$constructor` on the wire).
    pub fn constructor() -> MethodSpecBuilder {
        MethodSpecBuilder {
            name: CONSTRUCTOR_METHOD.to_string(),
            kind: MethodKind::Constructor,
            params: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// The wire-visible parameter shapes, locals excluded.
    pub fn wire_params(&self) -> impl Iterator<Item = &TypeSpec> {
        self.params.iter().filter_map(|p| match p {
            Param::Wire(spec) => Some(spec),
            Param::Local(_) => None,
        })
    }

    /// Number of wire arguments this method takes.
    pub fn wire_arity(&self) -> usize {
        self.wire_params().count()
    }

    /// Declared local argument keys.
    pub fn local_params(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter_map(|p| match p {
            Param::Local(key) => Some(*key),
            Param::Wire(_) => None,
        })
    }

    /// Run the handler.
    pub fn invoke(
        &self,
        target: MethodTarget<'_>,
        args: &[HostValue],
        ctx: &CallContext,
    ) -> Result<HostValue, HandlerError> {
        (self.handler)(target, args, ctx)
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("wire_arity", &self.wire_arity())
            .finish()
    }
}

/// Fluent builder for [`MethodSpec`].
pub struct MethodSpecBuilder {
    name: String,
    kind: MethodKind,
    params: Vec<Param>,
}

impl MethodSpecBuilder {
    /// Declare a wire parameter.
    #[must_use]
    pub fn param(mut self, spec: TypeSpec) -> Self {
        self.params.push(Param::Wire(spec));
        self
    }

    /// Declare a context-injected local parameter.
    #[must_use]
    pub fn local(mut self, key: &'static str) -> Self {
        self.params.push(Param::Local(key));
        self
    }

    /// Mark the method static (callable without an instance).
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.kind = MethodKind::Static;
        self
    }

    /// Attach the handler and finish.
    pub fn handler<F>(self, f: F) -> MethodSpec
    where
        F: Fn(MethodTarget<'_>, &[HostValue], &CallContext) -> Result<HostValue, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        MethodSpec {
            name: self.name,
            kind: self.kind,
            params: self.params,
            handler: Arc::new(f),
        }
    }
}
