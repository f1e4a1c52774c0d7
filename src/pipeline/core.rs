//! Filter cores and module contexts.

use crate::options::{BoolOp, Options};
use crate::registry::ModuleDescriptor;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Opaque, cacheable artifact a module precomputes from a node's options.
#[derive(Clone)]
pub struct Context {
    kind: String,
    size: usize,
    data: Rc<dyn Any>,
}

impl Context {
    pub fn new<T: Any>(kind: impl Into<String>, size: usize, data: T) -> Self {
        Self {
            kind: kind.into(),
            size,
            data: Rc::new(data),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &Rc<dyn Any> {
        &self.data
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("kind", &self.kind)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// A module descriptor bound to one option set.
pub struct FilterCore {
    descriptor: Rc<ModuleDescriptor>,
    options: Rc<Options>,
}

impl FilterCore {
    /// Bind `descriptor`. Caller options win over the module defaults.
    pub fn new(descriptor: Rc<ModuleDescriptor>, options: Option<&Options>) -> Self {
        let defaults = Options::from_entries(descriptor.default_options.iter().cloned());
        let merged = match options {
            Some(user) => user.combine(&defaults, BoolOp::Union),
            None => defaults,
        };
        Self {
            descriptor,
            options: Rc::new(merged),
        }
    }

    pub fn descriptor(&self) -> &Rc<ModuleDescriptor> {
        &self.descriptor
    }

    pub fn registration(&self) -> &str {
        &self.descriptor.registration
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn category(&self) -> &str {
        &self.descriptor.category
    }

    pub fn options(&self) -> &Rc<Options> {
        &self.options
    }

    pub fn context_type(&self) -> &str {
        self.descriptor.context_type()
    }

    /// Text from the module's UI capability, if it has one.
    pub fn describe(&self) -> Option<String> {
        self.descriptor
            .capabilities
            .ui
            .as_ref()
            .map(|ui| ui.describe(self))
    }
}

impl fmt::Debug for FilterCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCore")
            .field("registration", &self.descriptor.registration)
            .field("options", &self.options.len())
            .finish()
    }
}
