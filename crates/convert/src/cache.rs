//! Process-wide cache reconciling declared and inferred type
//! information per qualified key.
//!
//! Entries are immutable once published; the only mutation is the
//! insert-if-better map operation, held under the lock for a single
//! operation. Concurrent writers racing on the same key may redundantly
//! recompute an inference; that is accepted, the replacement rule is
//! enforced on every write.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::descriptor::{QualifiedKey, TypeDescriptor};

/// Where a cached descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Sourced from authoritative introspection metadata. Final.
    Declared,
    /// Reconstructed from observed data. Replaceable.
    Inferred,
}

/// An immutable published cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub descriptor: Arc<TypeDescriptor>,
    pub quality: Quality,
}

/// Keyed type cache. Read far more often than written; never shrinks
/// except through an explicit [`TypeCache::reset`].
#[derive(Debug, Default)]
pub struct TypeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &QualifiedKey) -> Option<CacheEntry> {
        self.entries
            .read()
            .expect("type cache lock poisoned")
            .get(key.as_str())
            .cloned()
    }

    /// Insert-if-better. A `Declared` write is final: it overwrites
    /// anything and is never overwritten by an `Inferred` one. An
    /// `Inferred` write replaces a prior `Inferred` entry (callers only
    /// publish inferences derived from non-vacuous samples).
    pub fn publish(&self, key: &QualifiedKey, descriptor: TypeDescriptor, quality: Quality) {
        let mut entries = self.entries.write().expect("type cache lock poisoned");
        match entries.get(key.as_str()) {
            Some(existing)
                if existing.quality == Quality::Declared && quality == Quality::Inferred =>
            {
                debug!(key = %key, "keeping declared cache entry over inferred");
            }
            _ => {
                debug!(key = %key, ?quality, "publishing cache entry");
                entries.insert(
                    key.as_str().to_string(),
                    CacheEntry {
                        descriptor: Arc::new(descriptor),
                        quality,
                    },
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("type cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Administrative reset; drops every entry.
    pub fn reset(&self) {
        self.entries
            .write()
            .expect("type cache lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PrimitiveKind;

    fn k(s: &str) -> QualifiedKey {
        QualifiedKey::new(s)
    }

    fn prim(kind: PrimitiveKind) -> TypeDescriptor {
        TypeDescriptor::Primitive(kind)
    }

    #[test]
    fn lazily_populated() {
        let cache = TypeCache::new();
        assert!(cache.lookup(&k("a")).is_none());
        cache.publish(&k("a"), prim(PrimitiveKind::Str), Quality::Inferred);
        let entry = cache.lookup(&k("a")).unwrap();
        assert_eq!(*entry.descriptor, prim(PrimitiveKind::Str));
        assert_eq!(entry.quality, Quality::Inferred);
    }

    #[test]
    fn declared_overwrites_inferred() {
        let cache = TypeCache::new();
        cache.publish(&k("a"), prim(PrimitiveKind::Str), Quality::Inferred);
        cache.publish(&k("a"), prim(PrimitiveKind::Int32), Quality::Declared);
        let entry = cache.lookup(&k("a")).unwrap();
        assert_eq!(*entry.descriptor, prim(PrimitiveKind::Int32));
        assert_eq!(entry.quality, Quality::Declared);
    }

    #[test]
    fn inferred_never_overwrites_declared() {
        let cache = TypeCache::new();
        cache.publish(&k("a"), prim(PrimitiveKind::Int32), Quality::Declared);
        cache.publish(&k("a"), prim(PrimitiveKind::Str), Quality::Inferred);
        let entry = cache.lookup(&k("a")).unwrap();
        assert_eq!(*entry.descriptor, prim(PrimitiveKind::Int32));
        assert_eq!(entry.quality, Quality::Declared);
    }

    #[test]
    fn inferred_replaces_inferred() {
        let cache = TypeCache::new();
        cache.publish(&k("a"), prim(PrimitiveKind::Int32), Quality::Inferred);
        cache.publish(&k("a"), prim(PrimitiveKind::Int64), Quality::Inferred);
        let entry = cache.lookup(&k("a")).unwrap();
        assert_eq!(*entry.descriptor, prim(PrimitiveKind::Int64));
    }

    #[test]
    fn reset_drops_everything() {
        let cache = TypeCache::new();
        cache.publish(&k("a"), prim(PrimitiveKind::Str), Quality::Inferred);
        assert_eq!(cache.len(), 1);
        cache.reset();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_publishes_do_not_corrupt() {
        let cache = Arc::new(TypeCache::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    let key = QualifiedKey::new(format!("k{}", j % 10));
                    let kind = if (i + j) % 2 == 0 {
                        PrimitiveKind::Int32
                    } else {
                        PrimitiveKind::Int64
                    };
                    cache.publish(&key, prim(kind), Quality::Inferred);
                    let _ = cache.lookup(&key);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
