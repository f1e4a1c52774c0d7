//! TOML module manifests found on the module search path.
//!
//! A manifest declares one backend and any number of filters. Each filter
//! names an `implementation` which is bound against an [`ImplementationTable`]
//! of in-process capability factories:
//!
//! ```toml
//! backend = "lcms"
//! name = "Little CMS"
//!
//! [[filter]]
//! registration = "org/colorpipe/imaging/icc.lcms._CPU"
//! implementation = "copy"
//! category = "Color/Conversion"
//!
//! [[filter.plugs]]
//! nick = "Img"
//! max_channels = 4
//!
//! [[filter.sockets]]
//! nick = "Img"
//!
//! [filter.options]
//! "org/colorpipe/imaging/icc/rendering_intent" = 0
//! ```

use crate::connector::Connector;
use crate::options::OptionValue;
use crate::registry::loader::{MetaLoader, ModuleSource};
use crate::registry::{BackendTag, ModuleCapabilities, ModuleDescriptor, RegistryError, Version};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

/// Default manifest file suffix.
pub const MANIFEST_EXTENSION: &str = "module.toml";

pub type ImplementationFactory = Rc<dyn Fn() -> ModuleCapabilities>;

/// Named capability factories that manifests can bind to.
#[derive(Clone, Default)]
pub struct ImplementationTable {
    entries: BTreeMap<String, ImplementationFactory>,
}

impl ImplementationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the crate's builtin implementations registered.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        crate::modules::register_implementations(&mut table);
        table
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> ModuleCapabilities + 'static,
    ) {
        self.entries.insert(name.into(), Rc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<ModuleCapabilities> {
        self.entries.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for ImplementationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[derive(Debug, Deserialize)]
struct ModuleManifest {
    backend: BackendTag,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "filter")]
    filters: Vec<FilterManifest>,
}

#[derive(Debug, Deserialize)]
struct FilterManifest {
    registration: String,
    implementation: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    compat_version: Option<Version>,
    #[serde(default)]
    plugs: Vec<Connector>,
    #[serde(default)]
    extra_plugs: usize,
    #[serde(default)]
    sockets: Vec<Connector>,
    #[serde(default)]
    extra_sockets: usize,
    #[serde(default)]
    options: BTreeMap<String, OptionValue>,
}

/// Loads `*.module.toml` manifests from a list of directories.
#[derive(Debug)]
pub struct ManifestLoader {
    paths: Vec<PathBuf>,
    extension: String,
    implementations: ImplementationTable,
}

impl ManifestLoader {
    pub fn new(paths: Vec<PathBuf>, implementations: ImplementationTable) -> Self {
        Self {
            paths,
            extension: MANIFEST_EXTENSION.to_string(),
            implementations,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// File stem without the manifest suffix, if `path` is a manifest.
    fn manifest_stem<'a>(&self, path: &'a Path) -> Option<&'a str> {
        let file_name = path.file_name()?.to_str()?;
        file_name.strip_suffix(&format!(".{}", self.extension))
    }

    fn parse(&self, path: &Path) -> Result<Vec<ModuleDescriptor>, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: ModuleManifest =
            toml::from_str(&content).map_err(|e| RegistryError::Manifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let source_id = path.display().to_string();
        let mut descriptors = Vec::with_capacity(manifest.filters.len());
        for filter in manifest.filters {
            let Some(capabilities) = self.implementations.get(&filter.implementation) else {
                let err = RegistryError::UnknownImplementation {
                    name: filter.implementation.clone(),
                    path: path.to_path_buf(),
                };
                tracing::warn!("Skipping filter {}: {}", filter.registration, err);
                continue;
            };

            let name = if filter.name.is_empty() {
                manifest.name.clone()
            } else {
                filter.name
            };
            let mut descriptor = ModuleDescriptor::new(manifest.backend, filter.registration)
                .with_name(name)
                .with_category(filter.category)
                .with_extra_plugs(filter.extra_plugs)
                .with_extra_sockets(filter.extra_sockets)
                .with_capabilities(capabilities)
                .with_source(source_id.clone());
            if let Some(version) = filter.compat_version {
                descriptor = descriptor.with_compat_version(version);
            }
            for plug in filter.plugs {
                descriptor = descriptor.with_plug(plug);
            }
            for socket in filter.sockets {
                descriptor = descriptor.with_socket(socket);
            }
            for (key, value) in filter.options {
                descriptor = descriptor.with_option(key, value);
            }
            descriptors.push(descriptor);
        }
        Ok(descriptors)
    }
}

impl MetaLoader for ManifestLoader {
    fn name(&self) -> &str {
        "manifest"
    }

    fn candidates(&self, backend: Option<BackendTag>) -> Vec<ModuleSource> {
        let mut sources = Vec::new();
        for dir in &self.paths {
            if !dir.is_dir() {
                tracing::debug!("Module path {} does not exist", dir.display());
                continue;
            }

            let mut found: Vec<PathBuf> = WalkDir::new(dir)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| self.manifest_stem(p).is_some())
                .collect();
            // Sort for deterministic order
            found.sort();

            for path in found {
                let Some(stem) = self.manifest_stem(&path) else {
                    continue;
                };
                let Some(tag) = stem.get(..4).and_then(|s| BackendTag::new(s).ok()) else {
                    tracing::debug!("Ignoring {}: no backend tag prefix", path.display());
                    continue;
                };
                if backend.is_some_and(|b| b != tag) {
                    continue;
                }
                sources.push(ModuleSource {
                    id: path.display().to_string(),
                    backend: tag,
                    path: Some(path),
                });
            }
        }
        sources
    }

    fn load(&self, source: &ModuleSource) -> Result<Vec<Rc<ModuleDescriptor>>, RegistryError> {
        let Some(path) = source.path.as_deref() else {
            return Ok(Vec::new());
        };
        let descriptors = self.parse(path)?;
        tracing::debug!(
            "Loaded {} filter(s) from {}",
            descriptors.len(),
            path.display()
        );
        Ok(descriptors.into_iter().map(Rc::new).collect())
    }
}
