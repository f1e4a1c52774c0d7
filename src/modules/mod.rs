//! Built-in backend modules.
//!
//! A minimal set of filters under the `core` backend tag so that graphs can
//! be built and pulled without external backends:
//!
//! ```text
//! [root] ──► [copy | gain] ──► [output]
//! ```
//!
//! The same implementations are available to manifests by name through
//! [`register_implementations`].

pub mod copy;
pub mod gain;
pub mod output;
pub mod root;

use crate::connector::Connector;
use crate::registry::{BackendTag, BuiltinLoader, ImplementationTable, ModuleDescriptor};

/// Backend tag of the built-in modules.
pub const CORE_BACKEND: &str = "core";

/// Connector nick used by every built-in module.
pub const DATA: &str = "data";

pub(crate) fn core_tag() -> BackendTag {
    BackendTag::CORE
}

pub(crate) fn data_plug() -> Connector {
    Connector::plug(DATA).with_name("Image input")
}

pub(crate) fn data_socket() -> Connector {
    Connector::socket(DATA).with_name("Image output")
}

/// Descriptors of all built-in modules.
pub fn descriptors() -> Vec<ModuleDescriptor> {
    vec![
        root::descriptor(),
        copy::descriptor(),
        gain::descriptor(),
        output::descriptor(),
    ]
}

/// Loader offering the built-in modules.
pub fn builtin_loader() -> BuiltinLoader {
    descriptors()
        .into_iter()
        .fold(BuiltinLoader::new("builtin"), BuiltinLoader::with_module)
}

/// Register the built-in implementations under their short names.
pub fn register_implementations(table: &mut ImplementationTable) {
    table.register("root", root::capabilities);
    table.register("copy", copy::capabilities);
    table.register("gain", gain::capabilities);
    table.register("output", output::capabilities);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetaLoader;

    #[test]
    fn test_builtin_loader_offers_one_core_source() {
        let loader = builtin_loader();
        assert_eq!(loader.len(), 4);
        let sources = loader.candidates(None);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].backend.as_str(), CORE_BACKEND);

        let loaded = loader.load(&sources[0]).unwrap();
        let registrations: Vec<_> = loaded.iter().map(|d| d.registration.as_str()).collect();
        assert_eq!(
            registrations,
            vec![
                root::REGISTRATION,
                copy::REGISTRATION,
                gain::REGISTRATION,
                output::REGISTRATION
            ]
        );
    }

    #[test]
    fn test_implementation_names() {
        let table = ImplementationTable::with_builtins();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec!["copy", "gain", "output", "root"]);
        assert!(table.get("gain").and_then(|c| c.context).is_some());
    }
}
