//! Gated resolution of wire class hints.
//!
//! Incoming JSON may name a class to instantiate through its `javaClass`
//! hint. [`TypeResolver`] is the gate in front of that: a hint resolves
//! only when every rule passes, so a remote peer can never conjure an
//! arbitrary registered type into existence. Denials are cached (bounded,
//! clearable) and surface to callers as unmarshal failures.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::beans::EnumClass;
use crate::registry::{ExportedClass, Registries};

/// Longest hint the resolver will even look at.
const MAX_NAME_LEN: usize = 256;

/// Size bound of the negative cache. When full the cache is cleared, so a
/// class registered after an early denial gets another chance.
const NEGATIVE_CACHE_LIMIT: usize = 1024;

/// Prefixes never resolvable, regardless of allow-list entries.
const DEFAULT_DENIED_PREFIXES: [&str; 3] = ["javax.", "com.sun.", "sun."];

/// What a hint resolved to.
#[derive(Clone)]
pub enum ResolvedType {
    /// A registered class with a bean descriptor and methods.
    Bean(Arc<ExportedClass>),
    /// A registered enum class.
    Enum(Arc<EnumClass>),
}

impl ResolvedType {
    /// The registered name of the resolved type.
    pub fn name(&self) -> &str {
        match self {
            Self::Bean(class) => class.name(),
            Self::Enum(class) => class.name(),
        }
    }
}

/// Allow-listed name-to-type lookup.
pub struct TypeResolver {
    registries: Arc<Registries>,
    allow_list: RwLock<FxHashSet<String>>,
    denied_prefixes: RwLock<Vec<String>>,
    positive: RwLock<FxHashMap<String, ResolvedType>>,
    negative: Mutex<FxHashSet<String>>,
}

impl TypeResolver {
    pub fn new(registries: Arc<Registries>) -> Self {
        Self {
            registries,
            allow_list: RwLock::new(FxHashSet::default()),
            denied_prefixes: RwLock::new(
                DEFAULT_DENIED_PREFIXES.iter().map(ToString::to_string).collect(),
            ),
            positive: RwLock::new(FxHashMap::default()),
            negative: Mutex::new(FxHashSet::default()),
        }
    }

    /// Allow a class name to resolve from wire hints.
    pub fn allow(&self, name: impl Into<String>) {
        self.allow_list.write().insert(name.into());
        self.invalidate();
    }

    /// Add a prefix that never resolves.
    pub fn deny_prefix(&self, prefix: impl Into<String>) {
        self.denied_prefixes.write().push(prefix.into());
        self.invalidate();
    }

    /// Drop both caches. Called whenever registrations change.
    pub fn invalidate(&self) {
        self.positive.write().clear();
        self.negative.lock().clear();
    }

    /// Resolve a wire hint, or `None` when any rule fails.
    pub fn try_resolve(&self, name: &str) -> Option<ResolvedType> {
        if let Some(found) = self.positive.read().get(name) {
            return Some(found.clone());
        }
        if self.negative.lock().contains(name) {
            return None;
        }
        match self.resolve_uncached(name) {
            Some(resolved) => {
                self.positive
                    .write()
                    .insert(name.to_string(), resolved.clone());
                Some(resolved)
            }
            None => {
                let mut negative = self.negative.lock();
                if negative.len() >= NEGATIVE_CACHE_LIMIT {
                    negative.clear();
                }
                negative.insert(name.to_string());
                None
            }
        }
    }

    fn resolve_uncached(&self, name: &str) -> Option<ResolvedType> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            warn!(name, "rejecting class hint: empty or oversized");
            return None;
        }
        let element = normalize_array_syntax(name);
        if !element.contains('.') {
            warn!(name, "rejecting class hint: default-package name");
            return None;
        }
        if let Some(prefix) = self
            .denied_prefixes
            .read()
            .iter()
            .find(|prefix| element.starts_with(prefix.as_str()))
        {
            warn!(name, prefix = %prefix, "rejecting class hint: denied prefix");
            return None;
        }

        let allowed = self.allow_list.read().contains(element);
        if let Some(class) = self.registries.class(element) {
            let safe = class.bean().is_some_and(|bean| bean.is_safe_for_dispatch());
            if allowed || safe {
                debug!(name, "resolved class hint");
                return Some(ResolvedType::Bean(class));
            }
            warn!(name, "rejecting class hint: not allow-listed");
            return None;
        }
        if let Some(class) = self.registries.enum_class(element) {
            if allowed {
                debug!(name, "resolved enum hint");
                return Some(ResolvedType::Enum(class));
            }
            warn!(name, "rejecting enum hint: not allow-listed");
            return None;
        }
        debug!(name, "class hint names no registered type");
        None
    }
}

/// Strip array syntax from a hint: leading `[` markers, an optional `L`
/// element prefix, and the trailing `;`.
fn normalize_array_syntax(name: &str) -> &str {
    let stripped = name.trim_start_matches('[');
    if stripped.len() == name.len() {
        return name;
    }
    let stripped = stripped.strip_prefix('L').unwrap_or(stripped);
    stripped.strip_suffix(';').unwrap_or(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::BeanClass;

    fn registries_with(name: &str, safe: bool) -> Arc<Registries> {
        let registries = Arc::new(Registries::new(16));
        let mut builder = BeanClass::builder(name);
        if safe {
            builder = builder.safe_for_dispatch();
        }
        let class = ExportedClass::builder(name).bean(builder.build()).build();
        registries.insert_class(class);
        registries
    }

    #[test]
    fn allow_listed_class_resolves() {
        let registries = registries_with("demo.Point", false);
        let resolver = TypeResolver::new(registries);
        assert!(resolver.try_resolve("demo.Point").is_none());
        resolver.allow("demo.Point");
        assert!(resolver.try_resolve("demo.Point").is_some());
    }

    #[test]
    fn safe_marker_bypasses_the_allow_list() {
        let registries = registries_with("demo.Point", true);
        let resolver = TypeResolver::new(registries);
        assert!(resolver.try_resolve("demo.Point").is_some());
    }

    #[test]
    fn denied_prefix_wins_over_allow_list() {
        let registries = registries_with("sun.misc.Unsafe", false);
        let resolver = TypeResolver::new(registries);
        resolver.allow("sun.misc.Unsafe");
        assert!(resolver.try_resolve("sun.misc.Unsafe").is_none());
    }

    #[test]
    fn default_package_names_are_rejected() {
        let registries = Arc::new(Registries::new(16));
        let resolver = TypeResolver::new(registries);
        resolver.allow("NoDots");
        assert!(resolver.try_resolve("NoDots").is_none());
        assert!(resolver.try_resolve("").is_none());
    }

    #[test]
    fn array_syntax_normalizes_to_the_element_type() {
        let registries = registries_with("demo.Point", true);
        let resolver = TypeResolver::new(registries);
        assert!(resolver.try_resolve("[Ldemo.Point;").is_some());
        assert!(resolver.try_resolve("[[Ldemo.Point;").is_some());
    }

    #[test]
    fn negative_results_revisit_after_registration() {
        let registries = Arc::new(Registries::new(16));
        let resolver = TypeResolver::new(Arc::clone(&registries));
        assert!(resolver.try_resolve("demo.Late").is_none());

        let class = ExportedClass::builder("demo.Late")
            .bean(BeanClass::builder("demo.Late").safe_for_dispatch().build())
            .build();
        registries.insert_class(class);
        resolver.invalidate();
        assert!(resolver.try_resolve("demo.Late").is_some());
    }

    #[test]
    fn oversized_names_are_rejected() {
        let registries = Arc::new(Registries::new(16));
        let resolver = TypeResolver::new(registries);
        let long = format!("demo.{}", "x".repeat(300));
        assert!(resolver.try_resolve(&long).is_none());
    }
}
