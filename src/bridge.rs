//! The bridge: exported objects, classes, references, and the call entry
//! point.
//!
//! A [`Bridge`] owns every process-shared piece of the system: the
//! registries, the resolver, the serializer, the class analyzer, the
//! local argument registry and the callback set. [`Bridge::call`] is the
//! single entry point for requests; it never panics and never returns
//! anything but a well-formed JSON-RPC response object.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::beans::EnumClass;
use crate::config::BridgeConfig;
use crate::dispatch::{
    CONSTRUCTOR_METHOD, CallContext, CallbackRegistration, ClassAnalyzer, DispatchError,
    HandlerError, LocalArgRegistry, MethodKey, MethodKind, MethodSpec, MethodTarget,
    select_method,
};
use crate::parser::{ParserKind, extract};
use crate::registry::{ExportedClass, ExportedObject, Registries};
use crate::request::Id;
use crate::resolver::TypeResolver;
use crate::results::{CallResult, codes};
use crate::serialize::{MarshalOutcome, Serializer};
use crate::state::{Fixup, OutputMode, PathSeg};
use crate::types::TypeSpec;
use crate::value::{HostValue, ObjectRef};

/// Reshapes a handler error before it is exposed remotely. Identity by
/// default.
pub type ExceptionTransformer = Arc<dyn Fn(HandlerError) -> HandlerError + Send + Sync>;

/// A JSON-RPC bridge instance.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use wirebridge::bridge::Bridge;
/// use wirebridge::dispatch::{CallContext, MethodSpec};
/// use wirebridge::registry::ExportedClass;
/// use wirebridge::types::TypeSpec;
/// use wirebridge::value::ObjectRef;
///
/// struct Echo;
///
/// let bridge = Bridge::default();
/// let class = ExportedClass::builder("demo.Echo")
///     .method(
///         MethodSpec::builder("echo")
///             .param(TypeSpec::Str)
///             .handler(|_, args, _| Ok(args[0].clone())),
///     )
///     .build();
/// bridge.register_object("test", ObjectRef::new("demo.Echo", Echo), class);
///
/// let response = bridge.call(
///     &CallContext::new(),
///     &json!({"method": "test.echo", "id": 1, "params": ["hello"]}),
/// );
/// assert_eq!(response, json!({"id": 1, "result": "hello"}));
/// ```
pub struct Bridge {
    config: BridgeConfig,
    registries: Arc<Registries>,
    resolver: Arc<TypeResolver>,
    serializer: Serializer,
    analyzer: ClassAnalyzer,
    locals: LocalArgRegistry,
    callbacks: RwLock<Vec<CallbackRegistration>>,
    exception_transformer: RwLock<ExceptionTransformer>,
}

struct Located {
    instance: Option<ObjectRef>,
    candidates: Vec<Arc<MethodSpec>>,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let registries = Arc::new(Registries::new(config.reference_capacity));
        let resolver = Arc::new(TypeResolver::new(Arc::clone(&registries)));
        let serializer = Serializer::new(
            Arc::clone(&registries),
            Arc::clone(&resolver),
            config.clone(),
        );
        Self {
            config,
            registries,
            resolver,
            serializer,
            analyzer: ClassAnalyzer::new(),
            locals: LocalArgRegistry::new(),
            callbacks: RwLock::new(Vec::new()),
            exception_transformer: RwLock::new(Arc::new(|err| err)),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn locals(&self) -> &LocalArgRegistry {
        &self.locals
    }

    /// Register a class: its bean descriptor (if any), static methods and
    /// constructors become reachable.
    pub fn register_class(&self, class: Arc<ExportedClass>) {
        debug!(class = class.name(), "registering class");
        self.registries.insert_class(class);
        self.resolver.invalidate();
        self.analyzer.invalidate();
    }

    pub fn unregister_class(&self, name: &str) -> bool {
        let removed = self.registries.remove_class(name);
        if removed {
            self.resolver.invalidate();
            self.analyzer.invalidate();
        }
        removed
    }

    /// Register an enum class for marshalling and variant lookup.
    pub fn register_enum(&self, class: Arc<EnumClass>) {
        self.registries.insert_enum(class);
        self.resolver.invalidate();
    }

    /// Register a named instance. The class restricts which methods are
    /// visible through the key; the instance's class name should be the
    /// registered class's name.
    pub fn register_object(
        &self,
        key: impl Into<String>,
        instance: ObjectRef,
        class: Arc<ExportedClass>,
    ) {
        let key = key.into();
        debug!(key = %key, class = class.name(), "registering object");
        self.registries.insert_class(Arc::clone(&class));
        self.registries
            .insert_object(key, ExportedObject { instance, class });
        self.resolver.invalidate();
        self.analyzer.invalidate();
    }

    pub fn unregister_object(&self, key: &str) -> bool {
        self.registries.remove_object(key)
    }

    /// Marshal instances of a class as opaque reference handles.
    pub fn register_reference_class(&self, name: impl Into<String>) {
        self.registries.add_reference_class(name);
    }

    /// Marshal instances of a class as callable reference handles.
    pub fn register_callable_reference_class(&self, name: impl Into<String>) {
        self.registries.add_callable_reference_class(name);
    }

    /// Allow a class name to resolve from wire hints.
    pub fn allow_class(&self, name: impl Into<String>) {
        self.resolver.allow(name);
    }

    /// Drop a live reference handed out earlier.
    pub fn invalidate_reference(&self, id: u64) -> bool {
        self.registries.invalidate_reference(id)
    }

    /// Register an invocation callback.
    pub fn register_callback(&self, registration: CallbackRegistration) {
        self.callbacks.write().push(registration);
    }

    /// Declare a context key that local arguments resolve from.
    pub fn register_local_arg(&self, key: &'static str) {
        self.locals.register_context_key(key);
    }

    /// Install the transformer applied to handler errors before they are
    /// exposed remotely.
    pub fn set_exception_transformer(&self, transformer: ExceptionTransformer) {
        *self.exception_transformer.write() = transformer;
    }

    fn parser_kind(&self) -> ParserKind {
        match self.config.output_mode {
            OutputMode::Flat => ParserKind::Flat,
            OutputMode::Nested(_) => ParserKind::Nested,
        }
    }

    /// Dispatch one request. Always returns a response envelope.
    #[instrument(skip_all)]
    pub fn call(&self, ctx: &CallContext, request: &Value) -> Value {
        self.call_result(ctx, request).into_json()
    }

    fn call_result(&self, ctx: &CallContext, request: &Value) -> CallResult {
        let Some(envelope) = request.as_object() else {
            return CallResult::failure(Id::Null, codes::PARSE, "request is not an object");
        };
        let id = Id::from_field(envelope.get("id"));
        let Some(method_field) = envelope.get("method").and_then(Value::as_str) else {
            return CallResult::failure(id, codes::PARSE, "request has no method field");
        };
        let key = match MethodKey::parse(method_field) {
            Ok(key) => key,
            Err(err) => {
                return CallResult::failure(id, codes::METHOD_NOT_FOUND, err.to_string());
            }
        };
        if key == MethodKey::ListMethods {
            return self.list_methods(id);
        }

        let (params, fixups) = if envelope.contains_key("params") {
            match extract(self.parser_kind(), envelope, "params") {
                Ok(parsed) => parsed,
                Err(err) if err.is_fixup_failure() => {
                    return CallResult::failure(id, codes::CONSTRUCTOR, err.to_string());
                }
                Err(err) => {
                    return CallResult::failure(id, codes::PARSE, err.to_string());
                }
            }
        } else {
            (Value::Array(Vec::new()), Vec::new())
        };
        let Some(args) = params.as_array() else {
            return CallResult::failure(id, codes::PARSE, "params is not an array");
        };

        let located = match self.locate(&key, args.len()) {
            Ok(located) => located,
            Err(err) => return failure_for(id, err),
        };
        let chosen = match select_method(&self.serializer, &located.candidates, args) {
            Ok(method) => method,
            Err(err) => return failure_for(id, err),
        };
        debug!(method = chosen.name(), arity = chosen.wire_arity(), "selected method");

        let missing_local = chosen
            .local_params()
            .find_map(|local| self.locals.check(local, ctx).err());
        if let Some(err) = missing_local {
            return failure_for(id, err);
        }

        let specs: Vec<&TypeSpec> = chosen.wire_params().collect();
        let host_args = match self.serializer.unmarshal_params(&specs, args, &fixups) {
            Ok(values) => values,
            Err(err) => {
                let code = if err.is_dispatch_failure() {
                    codes::CONSTRUCTOR
                } else {
                    codes::UNMARSHAL
                };
                return CallResult::failure(id, code, err.to_string());
            }
        };

        self.invoke(ctx, id, &located, &chosen, &host_args)
    }

    fn invoke(
        &self,
        ctx: &CallContext,
        id: Id,
        located: &Located,
        method: &Arc<MethodSpec>,
        args: &[HostValue],
    ) -> CallResult {
        let target = match &located.instance {
            Some(instance) => MethodTarget::Instance(instance),
            None => MethodTarget::Static,
        };
        let callbacks: Vec<CallbackRegistration> = self
            .callbacks
            .read()
            .iter()
            .filter(|registration| registration.applies_to(ctx))
            .cloned()
            .collect();

        let vetoed = callbacks.iter().find_map(|registration| {
            registration
                .callback()
                .pre_invoke(ctx, target, method, args)
                .err()
        });
        if let Some(err) = vetoed {
            return self.remote_failure(ctx, id, target, method, &callbacks, err);
        }

        let mut outcome = method.invoke(target, args, ctx);

        // Post-invoke callbacks run on success and failure alike; an
        // error raised here replaces the call's outcome.
        for registration in &callbacks {
            let hook = registration
                .callback()
                .post_invoke(ctx, target, method, outcome.as_ref());
            if let Err(err) = hook {
                outcome = Err(err);
            }
        }

        match outcome {
            Ok(value) => {
                match self
                    .serializer
                    .marshal_root(vec![PathSeg::field("result")], &value)
                {
                    Ok(marshalled) => CallResult::Success {
                        id,
                        outcome: marshalled,
                    },
                    Err(err) => CallResult::failure(id, codes::MARSHAL, err.to_string()),
                }
            }
            Err(err) => self.remote_failure(ctx, id, target, method, &callbacks, err),
        }
    }

    fn remote_failure(
        &self,
        ctx: &CallContext,
        id: Id,
        target: MethodTarget<'_>,
        method: &MethodSpec,
        callbacks: &[CallbackRegistration],
        error: HandlerError,
    ) -> CallResult {
        // Error callbacks observe the failure; their own failures are
        // swallowed by contract, so they run before the transformer.
        for registration in callbacks {
            registration.callback().on_error(ctx, target, method, &error);
        }
        warn!(method = method.name(), error = %error, "handler raised");
        let transformer = Arc::clone(&self.exception_transformer.read());
        CallResult::RemoteFailure {
            id,
            error: transformer(error),
        }
    }

    fn locate(&self, key: &MethodKey, arity: usize) -> Result<Located, DispatchError> {
        match key {
            MethodKey::ListMethods => unreachable!("handled before locate"),
            MethodKey::Named { target, method } => {
                if let Some(exported) = self.registries.object(target) {
                    let data = self.analyzer.analyze(&exported.class, &self.locals);
                    let candidates = data.candidates(method, arity, true).to_vec();
                    if candidates.is_empty() {
                        return Err(DispatchError::NoSuchMethod {
                            name: format!("{target}.{method}"),
                            arity,
                        });
                    }
                    Ok(Located {
                        instance: Some(exported.instance),
                        candidates,
                    })
                } else if let Some(class) = self.registries.class(target) {
                    let data = self.analyzer.analyze(&class, &self.locals);
                    let candidates = data.candidates(method, arity, false).to_vec();
                    if candidates.is_empty() {
                        return Err(DispatchError::NoSuchMethod {
                            name: format!("{target}.{method}"),
                            arity,
                        });
                    }
                    Ok(Located {
                        instance: None,
                        candidates,
                    })
                } else {
                    Err(DispatchError::UnknownTarget {
                        target: target.clone(),
                    })
                }
            }
            MethodKey::Reference { object_id, method } => {
                let instance = self
                    .registries
                    .reference(*object_id)
                    .ok_or(DispatchError::DeadReference { id: *object_id })?;
                let class = self.registries.class(instance.class_name()).ok_or_else(|| {
                    DispatchError::UnknownTarget {
                        target: instance.class_name().to_string(),
                    }
                })?;
                let data = self.analyzer.analyze(&class, &self.locals);
                let candidates = data.candidates(method, arity, true).to_vec();
                if candidates.is_empty() {
                    return Err(DispatchError::NoSuchMethod {
                        name: format!(".obj[{object_id}].{method}"),
                        arity,
                    });
                }
                Ok(Located {
                    instance: Some(instance),
                    candidates,
                })
            }
        }
    }

    /// The sorted method catalogue for `system.listMethods`.
    fn list_methods(&self, id: Id) -> CallResult {
        let mut entries: Vec<String> = Vec::new();

        for key in self.registries.object_keys() {
            if let Some(exported) = self.registries.object(&key) {
                let data = self.analyzer.analyze(&exported.class, &self.locals);
                for (name, kind) in data.method_names() {
                    if kind == MethodKind::Instance {
                        entries.push(format!("{key}.{name}"));
                    }
                }
            }
        }
        for class_name in self.registries.class_names() {
            if let Some(class) = self.registries.class(&class_name) {
                let data = self.analyzer.analyze(&class, &self.locals);
                for (name, kind) in data.method_names() {
                    match kind {
                        MethodKind::Static => entries.push(format!("{class_name}.{name}")),
                        MethodKind::Constructor => {
                            entries.push(format!("{class_name}.{CONSTRUCTOR_METHOD}"));
                        }
                        MethodKind::Instance => {}
                    }
                }
            }
        }
        for class_name in self.registries.callable_reference_class_names() {
            if let Some(class) = self.registries.class(&class_name) {
                let data = self.analyzer.analyze(&class, &self.locals);
                for (name, kind) in data.method_names() {
                    if kind == MethodKind::Instance {
                        entries.push(format!(";ref[{class_name}].{name}"));
                    }
                }
            }
        }

        entries.sort();
        entries.dedup();
        let value = Value::Array(entries.into_iter().map(Value::String).collect());
        CallResult::Success {
            id,
            outcome: MarshalOutcome {
                value,
                fixups: Vec::<Fixup>::new(),
                flat_slots: Vec::new(),
            },
        }
    }
}

fn failure_for(id: Id, err: DispatchError) -> CallResult {
    let code = match &err {
        DispatchError::BadMethodKey { .. }
        | DispatchError::UnknownTarget { .. }
        | DispatchError::NoSuchMethod { .. }
        | DispatchError::DeadReference { .. } => codes::METHOD_NOT_FOUND,
        DispatchError::Unmarshal(inner) => {
            if inner.is_dispatch_failure() {
                codes::CONSTRUCTOR
            } else {
                codes::UNMARSHAL
            }
        }
        DispatchError::LocalUnavailable { .. } => codes::UNMARSHAL,
    };
    CallResult::failure(id, code, err.to_string())
}
