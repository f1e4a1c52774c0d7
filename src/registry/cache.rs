//! Injectable module cache.
//!
//! One `ModuleCache` is shared (via `Rc`) between a registry and the nodes it
//! creates. Tests build their own instance; nothing here is global.

use crate::pipeline::Context;
use crate::registry::{ModuleDescriptor, RankedModule};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub descriptor_hits: u64,
    pub descriptor_loads: u64,
    pub resolution_hits: u64,
    pub context_hits: u64,
    pub context_builds: u64,
}

#[derive(Default)]
pub struct ModuleCache {
    descriptors: RefCell<HashMap<String, Vec<Rc<ModuleDescriptor>>>>,
    resolutions: RefCell<HashMap<(u64, String), Vec<RankedModule>>>,
    contexts: RefCell<HashMap<String, Context>>,
    generations: Cell<u64>,
    stats: Cell<CacheStats>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptors of `source_id`, loading them once. Failed loads are not cached.
    pub fn descriptors_or_load<E>(
        &self,
        source_id: &str,
        load: impl FnOnce() -> Result<Vec<Rc<ModuleDescriptor>>, E>,
    ) -> Result<Vec<Rc<ModuleDescriptor>>, E> {
        if let Some(found) = self.descriptors.borrow().get(source_id) {
            self.bump(|s| s.descriptor_hits += 1);
            return Ok(found.clone());
        }

        let loaded = load()?;
        self.bump(|s| s.descriptor_loads += 1);
        self.descriptors
            .borrow_mut()
            .insert(source_id.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Fresh resolution generation. A registry takes a new one whenever its
    /// loader set or host version changes, so registries sharing this cache
    /// never see each other's results.
    pub fn next_generation(&self) -> u64 {
        let next = self.generations.get() + 1;
        self.generations.set(next);
        next
    }

    pub fn resolution(&self, generation: u64, key: &str) -> Option<Vec<RankedModule>> {
        let found = self
            .resolutions
            .borrow()
            .get(&(generation, key.to_string()))
            .cloned();
        if found.is_some() {
            self.bump(|s| s.resolution_hits += 1);
        }
        found
    }

    /// Remember a non-empty result. Empty results are never stored since a
    /// loader added later may satisfy the query.
    pub fn store_resolution(&self, generation: u64, key: &str, modules: Vec<RankedModule>) {
        if modules.is_empty() {
            return;
        }
        self.resolutions
            .borrow_mut()
            .insert((generation, key.to_string()), modules);
    }

    /// Drop every result stored under `generation`.
    pub fn retire_generation(&self, generation: u64) {
        self.resolutions
            .borrow_mut()
            .retain(|(g, _), _| *g != generation);
    }

    pub fn resolution_count(&self) -> usize {
        self.resolutions.borrow().len()
    }

    /// Cached context for a node key, see [`ModuleCache::context_key`].
    pub fn context(&self, key: &str) -> Option<Context> {
        let found = self.contexts.borrow().get(key).cloned();
        if found.is_some() {
            self.bump(|s| s.context_hits += 1);
        }
        found
    }

    pub fn store_context(&self, key: &str, context: Context) {
        self.bump(|s| s.context_builds += 1);
        self.contexts.borrow_mut().insert(key.to_string(), context);
    }

    /// Evict `key` once no node holds its context any more.
    pub fn release_context(&self, key: &str) {
        let mut contexts = self.contexts.borrow_mut();
        let unused = contexts
            .get(key)
            .is_some_and(|ctx| Rc::strong_count(ctx.data()) == 1);
        if unused {
            contexts.remove(key);
            tracing::trace!("Released context {}", key);
        }
    }

    pub fn context_count(&self) -> usize {
        self.contexts.borrow().len()
    }

    /// Cache key of a node context: registration plus options text.
    pub fn context_key(registration: &str, options_text: &str) -> String {
        format!("{}|{}", registration, options_text)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.get()
    }

    /// Drop all cached entries and reset counters.
    pub fn clear(&self) {
        self.descriptors.borrow_mut().clear();
        self.resolutions.borrow_mut().clear();
        self.contexts.borrow_mut().clear();
        self.stats.set(CacheStats::default());
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.borrow().is_empty()
            && self.resolutions.borrow().is_empty()
            && self.contexts.borrow().is_empty()
    }

    fn bump(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("descriptors", &self.descriptors.borrow().len())
            .field("resolutions", &self.resolutions.borrow().len())
            .field("contexts", &self.contexts.borrow().len())
            .field("stats", &self.stats.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BackendTag;

    fn descriptor(reg: &str) -> Rc<ModuleDescriptor> {
        Rc::new(ModuleDescriptor::new(BackendTag::new("test").unwrap(), reg))
    }

    #[test]
    fn test_descriptors_load_once() {
        let cache = ModuleCache::new();
        let mut loads = 0;
        for _ in 0..3 {
            let found = cache
                .descriptors_or_load("a.module.toml", || {
                    loads += 1;
                    Ok::<_, ()>(vec![descriptor("org/colorpipe/imaging/a")])
                })
                .unwrap();
            assert_eq!(found.len(), 1);
        }
        assert_eq!(loads, 1);
        assert_eq!(cache.stats().descriptor_hits, 2);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let cache = ModuleCache::new();
        assert!(cache.descriptors_or_load("bad", || Err("nope")).is_err());
        let ok = cache.descriptors_or_load("bad", || Ok::<_, &str>(Vec::new()));
        assert!(ok.is_ok());
        assert_eq!(cache.stats().descriptor_loads, 1);
    }

    #[test]
    fn test_context_cache_and_clear() {
        let cache = ModuleCache::new();
        let key = ModuleCache::context_key("org/colorpipe/imaging/gain", "gain: 2\n");
        assert!(cache.context(&key).is_none());
        cache.store_context(&key, Context::new("gain", 8, 2.0f64));
        assert_eq!(cache.context(&key).map(|c| c.size()), Some(8));
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_release_context_keeps_shared_entries() {
        let cache = ModuleCache::new();
        let key = ModuleCache::context_key("org/colorpipe/imaging/gain", "gain: 3\n");
        cache.store_context(&key, Context::new("gain", 8, 3.0f64));

        let held = cache.context(&key).unwrap();
        cache.release_context(&key);
        assert_eq!(cache.context_count(), 1);

        drop(held);
        cache.release_context(&key);
        assert_eq!(cache.context_count(), 0);
        cache.release_context("missing");
    }

    #[test]
    fn test_empty_resolutions_are_not_stored() {
        let cache = ModuleCache::new();
        let generation = cache.next_generation();
        cache.store_resolution(generation, "//imaging/none", Vec::new());
        assert_eq!(cache.resolution_count(), 0);
        assert!(cache.resolution(generation, "//imaging/none").is_none());
    }

    #[test]
    fn test_generations_are_isolated() {
        let cache = ModuleCache::new();
        let first = cache.next_generation();
        let second = cache.next_generation();
        assert_ne!(first, second);

        let hit = RankedModule {
            rank: 4,
            descriptor: descriptor("org/colorpipe/imaging/a"),
        };
        cache.store_resolution(first, "//imaging/a", vec![hit]);
        assert!(cache.resolution(second, "//imaging/a").is_none());
        assert_eq!(cache.resolution(first, "//imaging/a").map(|r| r.len()), Some(1));

        cache.retire_generation(first);
        assert!(cache.resolution(first, "//imaging/a").is_none());
    }
}
