//! Process-shared registries of a bridge.
//!
//! Everything a bridge exports lives here: classes (bean descriptors plus
//! their methods), named object instances, the classes marshalled as opaque
//! reference handles, and the store of live references handed out to
//! remote peers. The registries are shared between the dispatcher and the
//! serializer; every boundary-crossing read or write takes the owning
//! map's lock briefly, per-call hot paths snapshot the entry they need.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::beans::{BeanClass, EnumClass};
use crate::dispatch::MethodSpec;
use crate::value::ObjectRef;

/// A registered class: an optional bean descriptor and the methods the
/// class exposes to remote callers.
pub struct ExportedClass {
    name: String,
    bean: Option<Arc<BeanClass>>,
    methods: Vec<Arc<MethodSpec>>,
}

impl ExportedClass {
    /// Start building a class registration.
    pub fn builder(name: impl Into<String>) -> ExportedClassBuilder {
        ExportedClassBuilder {
            name: name.into(),
            bean: None,
            methods: Vec::new(),
        }
    }

    /// Registered class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bean descriptor, when the class marshals by properties.
    pub fn bean(&self) -> Option<&Arc<BeanClass>> {
        self.bean.as_ref()
    }

    /// Exposed methods, in registration order.
    pub fn methods(&self) -> &[Arc<MethodSpec>] {
        &self.methods
    }
}

impl std::fmt::Debug for ExportedClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedClass")
            .field("name", &self.name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Fluent builder for [`ExportedClass`].
pub struct ExportedClassBuilder {
    name: String,
    bean: Option<Arc<BeanClass>>,
    methods: Vec<Arc<MethodSpec>>,
}

impl ExportedClassBuilder {
    /// Attach the bean descriptor used to marshal instances.
    #[must_use]
    pub fn bean(mut self, bean: Arc<BeanClass>) -> Self {
        self.bean = Some(bean);
        self
    }

    /// Expose a method.
    #[must_use]
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    pub fn build(self) -> Arc<ExportedClass> {
        Arc::new(ExportedClass {
            name: self.name,
            bean: self.bean,
            methods: self.methods,
        })
    }
}

/// A named instance registration: the live instance plus the class whose
/// methods are visible through it.
#[derive(Clone)]
pub struct ExportedObject {
    pub instance: ObjectRef,
    pub class: Arc<ExportedClass>,
}

/// Store of live references handed out to remote peers.
///
/// Interning the same instance twice yields the same id. The store is
/// size-bounded: when full, the oldest entry is evicted and a warning is
/// logged, so a chatty peer cannot pin unbounded host memory. Explicit
/// invalidation drops an entry early.
struct ReferenceStore {
    capacity: usize,
    next_id: u64,
    by_id: FxHashMap<u64, ObjectRef>,
    by_identity: FxHashMap<usize, u64>,
    order: VecDeque<u64>,
}

impl ReferenceStore {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: 1,
            by_id: FxHashMap::default(),
            by_identity: FxHashMap::default(),
            order: VecDeque::new(),
        }
    }

    fn intern(&mut self, instance: &ObjectRef) -> u64 {
        let identity = instance.identity();
        if let Some(&id) = self.by_identity.get(&identity) {
            return id;
        }
        if self.by_id.len() >= self.capacity
            && let Some(evicted) = self.order.pop_front()
            && let Some(instance) = self.by_id.remove(&evicted)
        {
            self.by_identity.remove(&instance.identity());
            warn!(
                object_id = evicted,
                class = instance.class_name(),
                "reference store full, evicting oldest reference"
            );
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_id.insert(id, instance.clone());
        self.by_identity.insert(identity, id);
        self.order.push_back(id);
        debug!(object_id = id, class = instance.class_name(), "interned reference");
        id
    }

    fn get(&self, id: u64) -> Option<ObjectRef> {
        self.by_id.get(&id).cloned()
    }

    fn invalidate(&mut self, id: u64) -> bool {
        match self.by_id.remove(&id) {
            Some(instance) => {
                self.by_identity.remove(&instance.identity());
                self.order.retain(|&queued| queued != id);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.by_id.len()
    }
}

/// The full registry set of one bridge.
pub struct Registries {
    classes: RwLock<FxHashMap<String, Arc<ExportedClass>>>,
    enums: RwLock<FxHashMap<String, Arc<EnumClass>>>,
    objects: RwLock<FxHashMap<String, ExportedObject>>,
    reference_classes: RwLock<FxHashSet<String>>,
    callable_reference_classes: RwLock<FxHashSet<String>>,
    references: Mutex<ReferenceStore>,
    references_enabled: AtomicBool,
}

impl Registries {
    pub fn new(reference_capacity: usize) -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            enums: RwLock::new(FxHashMap::default()),
            objects: RwLock::new(FxHashMap::default()),
            reference_classes: RwLock::new(FxHashSet::default()),
            callable_reference_classes: RwLock::new(FxHashSet::default()),
            references: Mutex::new(ReferenceStore::new(reference_capacity)),
            references_enabled: AtomicBool::new(false),
        }
    }

    pub fn insert_class(&self, class: Arc<ExportedClass>) {
        self.classes.write().insert(class.name().to_string(), class);
    }

    pub fn remove_class(&self, name: &str) -> bool {
        self.classes.write().remove(name).is_some()
    }

    pub fn class(&self, name: &str) -> Option<Arc<ExportedClass>> {
        self.classes.read().get(name).cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.read().keys().cloned().collect()
    }

    pub fn insert_enum(&self, class: Arc<EnumClass>) {
        self.enums.write().insert(class.name().to_string(), class);
    }

    pub fn enum_class(&self, name: &str) -> Option<Arc<EnumClass>> {
        self.enums.read().get(name).cloned()
    }

    pub fn insert_object(&self, key: impl Into<String>, object: ExportedObject) {
        self.objects.write().insert(key.into(), object);
    }

    pub fn remove_object(&self, key: &str) -> bool {
        self.objects.write().remove(key).is_some()
    }

    pub fn object(&self, key: &str) -> Option<ExportedObject> {
        self.objects.read().get(key).cloned()
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Mark a class as marshalled by opaque reference.
    pub fn add_reference_class(&self, name: impl Into<String>) {
        self.reference_classes.write().insert(name.into());
        self.references_enabled.store(true, Ordering::Relaxed);
    }

    /// Mark a class as marshalled by callable reference.
    pub fn add_callable_reference_class(&self, name: impl Into<String>) {
        self.callable_reference_classes.write().insert(name.into());
        self.references_enabled.store(true, Ordering::Relaxed);
    }

    pub fn is_reference_class(&self, name: &str) -> bool {
        self.reference_classes.read().contains(name)
    }

    pub fn is_callable_reference_class(&self, name: &str) -> bool {
        self.callable_reference_classes.read().contains(name)
    }

    pub fn callable_reference_class_names(&self) -> Vec<String> {
        self.callable_reference_classes.read().iter().cloned().collect()
    }

    /// Whether any reference class has been registered.
    pub fn references_enabled(&self) -> bool {
        self.references_enabled.load(Ordering::Relaxed)
    }

    /// Hand out (or look up) the id of a live reference.
    pub fn intern_reference(&self, instance: &ObjectRef) -> u64 {
        self.references.lock().intern(instance)
    }

    /// Resolve an incoming reference id.
    pub fn reference(&self, id: u64) -> Option<ObjectRef> {
        self.references.lock().get(id)
    }

    /// Drop a live reference early. Returns `false` for unknown ids.
    pub fn invalidate_reference(&self, id: u64) -> bool {
        self.references.lock().invalidate(id)
    }

    /// Number of live references.
    pub fn reference_count(&self) -> usize {
        self.references.lock().len()
    }
}
