//! Meta-loaders: enumerate module sources and turn them into descriptors.

use crate::registry::{BackendTag, ModuleDescriptor, RegistryError};
use std::path::PathBuf;
use std::rc::Rc;

/// One loadable unit: a manifest file or a builtin module set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSource {
    /// Cache key, unique across loaders.
    pub id: String,
    pub backend: BackendTag,
    pub path: Option<PathBuf>,
}

/// Discovers and loads modules of one kind.
#[cfg_attr(test, mockall::automock)]
pub trait MetaLoader {
    fn name(&self) -> &str;

    /// Sources this loader can offer, optionally restricted to one backend.
    /// The order must be deterministic.
    fn candidates(&self, backend: Option<BackendTag>) -> Vec<ModuleSource>;

    fn load(&self, source: &ModuleSource) -> Result<Vec<Rc<ModuleDescriptor>>, RegistryError>;
}

/// In-process modules, offered in insertion order.
#[derive(Debug, Default)]
pub struct BuiltinLoader {
    name: String,
    modules: Vec<Rc<ModuleDescriptor>>,
}

impl BuiltinLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    pub fn with_module(mut self, descriptor: ModuleDescriptor) -> Self {
        self.push(descriptor);
        self
    }

    pub fn push(&mut self, descriptor: ModuleDescriptor) {
        let source = format!("builtin:{}:{}", self.name, descriptor.backend);
        self.modules.push(Rc::new(descriptor.with_source(source)));
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl MetaLoader for BuiltinLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, backend: Option<BackendTag>) -> Vec<ModuleSource> {
        let mut sources: Vec<ModuleSource> = Vec::new();
        for module in &self.modules {
            if backend.is_some_and(|b| b != module.backend) {
                continue;
            }
            if sources.iter().any(|s| s.backend == module.backend) {
                continue;
            }
            sources.push(ModuleSource {
                id: module.source.clone(),
                backend: module.backend,
                path: None,
            });
        }
        sources
    }

    fn load(&self, source: &ModuleSource) -> Result<Vec<Rc<ModuleDescriptor>>, RegistryError> {
        Ok(self
            .modules
            .iter()
            .filter(|m| m.backend == source.backend)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> BackendTag {
        BackendTag::new(s).unwrap()
    }

    #[test]
    fn test_builtin_groups_by_backend() {
        let loader = BuiltinLoader::new("std")
            .with_module(ModuleDescriptor::new(tag("core"), "org/colorpipe/imaging/a"))
            .with_module(ModuleDescriptor::new(tag("lcms"), "org/colorpipe/imaging/b"))
            .with_module(ModuleDescriptor::new(tag("core"), "org/colorpipe/imaging/c"));

        let all = loader.candidates(None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "builtin:std:core");

        let core = loader.load(&all[0]).unwrap();
        let regs: Vec<_> = core.iter().map(|d| d.registration.as_str()).collect();
        assert_eq!(regs, vec!["org/colorpipe/imaging/a", "org/colorpipe/imaging/c"]);

        let lcms_only = loader.candidates(Some(tag("lcms")));
        assert_eq!(lcms_only.len(), 1);
        assert_eq!(lcms_only[0].backend, tag("lcms"));
    }
}
