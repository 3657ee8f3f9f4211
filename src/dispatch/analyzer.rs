//! One-shot class analysis with a shared cache.
//!
//! Method lookup is by `(name, wire arity)`; the analyzer builds those
//! tables once per class and caches them. The cache watches the local
//! argument registry's epoch: when the registry changes, every cached
//! table is dropped, because wire arity counts only non-local parameters.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::registry::ExportedClass;

use super::{CONSTRUCTOR_METHOD, LocalArgRegistry, MethodKind, MethodSpec};

type MethodTable = FxHashMap<(String, usize), Vec<Arc<MethodSpec>>>;

/// Lookup tables of one analyzed class.
pub struct ClassData {
    instance: MethodTable,
    statics: MethodTable,
    constructors: FxHashMap<usize, Vec<Arc<MethodSpec>>>,
}

impl ClassData {
    fn build(class: &ExportedClass) -> Self {
        let mut instance: MethodTable = FxHashMap::default();
        let mut statics: MethodTable = FxHashMap::default();
        let mut constructors: FxHashMap<usize, Vec<Arc<MethodSpec>>> = FxHashMap::default();
        for method in class.methods() {
            let key = (method.name().to_string(), method.wire_arity());
            match method.kind() {
                MethodKind::Instance => {
                    instance.entry(key).or_default().push(Arc::clone(method));
                }
                MethodKind::Static => {
                    statics.entry(key).or_default().push(Arc::clone(method));
                }
                MethodKind::Constructor => {
                    constructors
                        .entry(method.wire_arity())
                        .or_default()
                        .push(Arc::clone(method));
                }
            }
        }
        Self {
            instance,
            statics,
            constructors,
        }
    }

    /// Instance-method candidates for `(name, arity)`.
    pub fn instance_methods(&self, name: &str, arity: usize) -> &[Arc<MethodSpec>] {
        self.instance
            .get(&(name.to_string(), arity))
            .map_or(&[], Vec::as_slice)
    }

    /// Static-method candidates for `(name, arity)`.
    pub fn static_methods(&self, name: &str, arity: usize) -> &[Arc<MethodSpec>] {
        self.statics
            .get(&(name.to_string(), arity))
            .map_or(&[], Vec::as_slice)
    }

    /// Constructor candidates for the given arity.
    pub fn constructors(&self, arity: usize) -> &[Arc<MethodSpec>] {
        self.constructors.get(&arity).map_or(&[], Vec::as_slice)
    }

    /// Candidates for a call addressed at a name, searching the table the
    /// addressing mode implies.
    pub fn candidates(&self, name: &str, arity: usize, instance_call: bool) -> &[Arc<MethodSpec>] {
        if name == CONSTRUCTOR_METHOD {
            return self.constructors(arity);
        }
        if instance_call {
            self.instance_methods(name, arity)
        } else {
            self.static_methods(name, arity)
        }
    }

    /// All method names with their kinds, for the catalogue.
    pub fn method_names(&self) -> Vec<(String, MethodKind)> {
        let mut names: Vec<(String, MethodKind)> = Vec::new();
        for (name, _) in self.instance.keys() {
            names.push((name.clone(), MethodKind::Instance));
        }
        for (name, _) in self.statics.keys() {
            names.push((name.clone(), MethodKind::Static));
        }
        if !self.constructors.is_empty() {
            names.push((CONSTRUCTOR_METHOD.to_string(), MethodKind::Constructor));
        }
        names.sort_by(|a, b| a.0.cmp(&b.0));
        names.dedup();
        names
    }
}

/// Cache of [`ClassData`] keyed by class name.
pub struct ClassAnalyzer {
    cache: Mutex<AnalyzerCache>,
}

struct AnalyzerCache {
    entries: FxHashMap<String, Arc<ClassData>>,
    locals_epoch: u64,
}

impl ClassAnalyzer {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(AnalyzerCache {
                entries: FxHashMap::default(),
                locals_epoch: 0,
            }),
        }
    }

    /// Analyze a class, reusing the cached tables when nothing changed.
    pub fn analyze(&self, class: &ExportedClass, locals: &LocalArgRegistry) -> Arc<ClassData> {
        let mut cache = self.cache.lock();
        let epoch = locals.epoch();
        if cache.locals_epoch != epoch {
            cache.entries.clear();
            cache.locals_epoch = epoch;
        }
        if let Some(found) = cache.entries.get(class.name()) {
            return Arc::clone(found);
        }
        let data = Arc::new(ClassData::build(class));
        cache
            .entries
            .insert(class.name().to_string(), Arc::clone(&data));
        data
    }

    /// Drop every cached table.
    pub fn invalidate(&self) {
        self.cache.lock().entries.clear();
    }
}

impl Default for ClassAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
