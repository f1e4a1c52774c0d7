//! Module registry: discovery, ranking and instantiation of backend modules.
//!
//! A [`Registry`] asks its meta-loaders for candidate sources, loads their
//! descriptors through the shared [`ModuleCache`] and ranks each descriptor's
//! registration against the requested pattern.
//!
//! # Tie breaking
//!
//! When several modules share the best rank the lexically smallest
//! registration wins; identical registrations keep the first discovered.
//! Discovery order is loader order, then candidate order (sorted paths for
//! manifests, insertion order for builtins).

pub mod cache;
pub mod descriptor;
pub mod loader;
pub mod manifest;

pub use cache::{CacheStats, ModuleCache};
pub use descriptor::{
    BackendTag, BuildContext, DescribeUi, ModuleCapabilities, ModuleDescriptor, RunFilter,
    Version,
};
pub use loader::{BuiltinLoader, MetaLoader, ModuleSource};
pub use manifest::{ImplementationTable, ManifestLoader, MANIFEST_EXTENSION};

use crate::options::Options;
use crate::pipeline::{FilterCore, FilterNode, PipelineError, PipelineResult};
use crate::registration::{self, ApiKind};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised while discovering or loading modules.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Unknown implementation {name:?} in {}", path.display())]
    UnknownImplementation { name: String, path: PathBuf },

    #[error("Invalid backend tag {0:?}: expected 4 ASCII letters or digits")]
    InvalidBackendTag(String),

    #[error("Invalid version {0:?}")]
    InvalidVersion(String),
}

/// Flags modifying [`Registry::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveFlags {
    /// Return every hit, best first, instead of the single best.
    pub rank_list: bool,
    /// In rank-list mode, drop entries that only differ in `_` attributes.
    pub strip_implementation_attrs: bool,
}

/// A resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveQuery {
    pub api: ApiKind,
    pub backend: Option<BackendTag>,
    pub pattern: Option<String>,
    pub flags: ResolveFlags,
}

impl ResolveQuery {
    pub fn new(api: ApiKind) -> Self {
        Self {
            api,
            backend: None,
            pattern: None,
            flags: ResolveFlags::default(),
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn backend(mut self, backend: BackendTag) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn rank_list(mut self, strip_implementation_attrs: bool) -> Self {
        self.flags.rank_list = true;
        self.flags.strip_implementation_attrs = strip_implementation_attrs;
        self
    }

    fn cache_key(&self) -> String {
        format!(
            "{};{:?};{};{}{}",
            self.pattern.as_deref().unwrap_or(""),
            self.api,
            self.backend.map(|b| b.to_string()).unwrap_or_default(),
            self.flags.rank_list as u8,
            self.flags.strip_implementation_attrs as u8
        )
    }
}

/// A descriptor together with the rank it scored.
#[derive(Debug, Clone)]
pub struct RankedModule {
    pub rank: u32,
    pub descriptor: Rc<ModuleDescriptor>,
}

/// Order by rank descending, then registration ascending.
fn rank_order(a: &RankedModule, b: &RankedModule) -> Ordering {
    b.rank
        .cmp(&a.rank)
        .then_with(|| a.descriptor.registration.cmp(&b.descriptor.registration))
}

pub struct Registry {
    loaders: Vec<Box<dyn MetaLoader>>,
    cache: Rc<ModuleCache>,
    host_version: Version,
    cache_resolutions: bool,
    generation: u64,
}

impl Registry {
    /// Empty registry using `cache`.
    pub fn new(cache: Rc<ModuleCache>) -> Self {
        let generation = cache.next_generation();
        Self {
            loaders: Vec::new(),
            cache,
            host_version: Version::host(),
            cache_resolutions: true,
            generation,
        }
    }

    /// Registry with the builtin modules and a fresh cache.
    pub fn with_builtins() -> Self {
        Self::new(Rc::new(ModuleCache::new())).with_loader(crate::modules::builtin_loader())
    }

    pub fn with_loader(mut self, loader: impl MetaLoader + 'static) -> Self {
        self.add_loader(Box::new(loader));
        self
    }

    pub fn add_loader(&mut self, loader: Box<dyn MetaLoader>) {
        tracing::debug!("Added meta loader {}", loader.name());
        self.loaders.push(loader);
        self.invalidate_resolutions();
    }

    pub fn with_host_version(mut self, version: Version) -> Self {
        self.host_version = version;
        self.invalidate_resolutions();
        self
    }

    /// Forget results computed for the previous loader set or host version.
    fn invalidate_resolutions(&mut self) {
        self.cache.retire_generation(self.generation);
        self.generation = self.cache.next_generation();
    }

    pub fn set_cache_resolutions(&mut self, enabled: bool) {
        self.cache_resolutions = enabled;
    }

    pub fn cache(&self) -> &Rc<ModuleCache> {
        &self.cache
    }

    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    /// Load every candidate source, in discovery order. Broken sources are
    /// logged and skipped.
    fn discover(&self, backend: Option<BackendTag>) -> Vec<Rc<ModuleDescriptor>> {
        let mut all = Vec::new();
        for loader in &self.loaders {
            for source in loader.candidates(backend) {
                match self
                    .cache
                    .descriptors_or_load(&source.id, || loader.load(&source))
                {
                    Ok(descriptors) => all.extend(descriptors),
                    Err(e) => {
                        tracing::warn!("Skipping module source {}: {}", source.id, e);
                    }
                }
            }
        }
        all
    }

    /// Every descriptor the loaders can find.
    pub fn descriptors(&self) -> Vec<Rc<ModuleDescriptor>> {
        self.discover(None)
    }

    /// Rank all modules against `query`.
    ///
    /// Returns the single best module, or with `rank_list` every nonzero hit.
    /// No match is an empty list, not an error.
    pub fn resolve(&self, query: &ResolveQuery) -> Vec<RankedModule> {
        let key = query.cache_key();
        if self.cache_resolutions {
            if let Some(hit) = self.cache.resolution(self.generation, &key) {
                return hit;
            }
        }

        let mut hits: Vec<RankedModule> = Vec::new();
        for descriptor in self.discover(query.backend) {
            if !descriptor.capabilities.supports(query.api) {
                continue;
            }
            let mut rank = match query.pattern.as_deref() {
                Some(pattern) => registration::rank(&descriptor.registration, pattern, query.api),
                None => 0,
            };
            if (rank > 0 && descriptor.compat_version == self.host_version)
                || query.pattern.is_none()
            {
                rank += 1;
            }
            if rank > 0 {
                hits.push(RankedModule { rank, descriptor });
            }
        }

        let result = if query.flags.rank_list {
            // Stable sort keeps discovery order among equal registrations
            hits.sort_by(rank_order);
            if query.flags.strip_implementation_attrs {
                let mut seen: Vec<String> = Vec::new();
                hits.retain(|hit| {
                    let stripped =
                        registration::strip_implementation_attrs(&hit.descriptor.registration);
                    if seen.contains(&stripped) {
                        false
                    } else {
                        seen.push(stripped);
                        true
                    }
                });
            }
            hits
        } else {
            let mut best: Option<RankedModule> = None;
            for hit in hits {
                let better = match &best {
                    None => true,
                    Some(current) => rank_order(&hit, current) == Ordering::Less,
                };
                if better {
                    best = Some(hit);
                }
            }
            best.into_iter().collect()
        };

        tracing::debug!(
            "Resolved {:?} ({:?}) to {} module(s)",
            query.pattern,
            query.api,
            result.len()
        );
        if self.cache_resolutions {
            self.cache
                .store_resolution(self.generation, &key, result.clone());
        }
        result
    }

    /// Best module for `pattern` serving `api`.
    pub fn resolve_best(&self, api: ApiKind, pattern: &str) -> Option<Rc<ModuleDescriptor>> {
        self.resolve(&ResolveQuery::new(api).pattern(pattern))
            .into_iter()
            .next()
            .map(|hit| hit.descriptor)
    }

    /// Instantiate a filter core for the best module matching `registration`.
    pub fn create_core(
        &self,
        registration: &str,
        options: Option<&Options>,
    ) -> PipelineResult<FilterCore> {
        let descriptor = self
            .resolve_best(ApiKind::Ui, registration)
            .ok_or_else(|| PipelineError::NoBackend {
                registration: registration.to_string(),
            })?;
        tracing::debug!(
            "Created core {} for {}",
            descriptor.registration,
            registration
        );
        Ok(FilterCore::new(descriptor, options))
    }

    /// Instantiate a node whose contexts are cached in this registry's cache.
    pub fn create_node(
        &self,
        registration: &str,
        options: Option<&Options>,
    ) -> PipelineResult<FilterNode> {
        let core = self.create_core(registration, options)?;
        Ok(FilterNode::with_cache(core, Some(self.cache.clone())))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "loaders",
                &self.loaders.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .field("host_version", &self.host_version)
            .field("generation", &self.generation)
            .field("cache", &self.cache)
            .finish()
    }
}
