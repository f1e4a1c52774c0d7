//! Module descriptors and capability interfaces.

use crate::connector::{Connector, ConnectorRole};
use crate::options::{OptionEntry, OptionSource, OptionValue};
use crate::pipeline::{Context, FilterCore, RunContext};
use crate::registration::ApiKind;
use crate::registry::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Four character backend identifier, e.g. `lcms`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackendTag([u8; 4]);

impl BackendTag {
    /// Tag of the modules built into the crate.
    pub const CORE: BackendTag = BackendTag(*b"core");

    pub fn new(tag: &str) -> Result<Self, RegistryError> {
        let bytes = tag.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(RegistryError::InvalidBackendTag(tag.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII is ever stored.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl FromStr for BackendTag {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BackendTag {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<BackendTag> for String {
    fn from(tag: BackendTag) -> Self {
        tag.as_str().to_string()
    }
}

impl fmt::Debug for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackendTag({})", self.as_str())
    }
}

impl fmt::Display for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `major.minor.patch` version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// The version of this crate.
    pub fn host() -> Self {
        Self {
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        }
    }
}

impl FromStr for Version {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u32, RegistryError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| invalid()),
                None => Ok(0),
            }
        };
        let version = Version::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl TryFrom<String> for Version {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Executes a node for one pixel-access request.
pub trait RunFilter {
    fn run(&self, ctx: &mut RunContext<'_>) -> anyhow::Result<()>;
}

/// Builds the cacheable per-node context from the node's options.
pub trait BuildContext {
    /// Context type tag. An empty string means "no context needed".
    fn context_type(&self) -> &str;

    fn build(&self, core: &FilterCore) -> anyhow::Result<Context>;
}

/// Human-readable description of a configured core.
pub trait DescribeUi {
    fn describe(&self, core: &FilterCore) -> String;
}

/// The subset of capabilities one module implements.
#[derive(Clone, Default)]
pub struct ModuleCapabilities {
    pub runner: Option<Rc<dyn RunFilter>>,
    pub context: Option<Rc<dyn BuildContext>>,
    pub ui: Option<Rc<dyn DescribeUi>>,
}

impl ModuleCapabilities {
    pub fn with_runner(mut self, runner: impl RunFilter + 'static) -> Self {
        self.runner = Some(Rc::new(runner));
        self
    }

    pub fn with_context(mut self, context: impl BuildContext + 'static) -> Self {
        self.context = Some(Rc::new(context));
        self
    }

    pub fn with_ui(mut self, ui: impl DescribeUi + 'static) -> Self {
        self.ui = Some(Rc::new(ui));
        self
    }

    /// Whether a module with these capabilities serves `api`.
    ///
    /// Every module can back a filter core, so `Ui` and `Any` always hold.
    pub fn supports(&self, api: ApiKind) -> bool {
        match api {
            ApiKind::Any | ApiKind::Ui => true,
            ApiKind::Run => self.runner.is_some(),
            ApiKind::Context => self.context.is_some(),
            ApiKind::MetaLoader | ApiKind::Device | ApiKind::Policy => false,
        }
    }
}

impl fmt::Debug for ModuleCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCapabilities")
            .field("runner", &self.runner.is_some())
            .field("context", &self.context.as_ref().map(|c| c.context_type().to_string()))
            .field("ui", &self.ui.is_some())
            .finish()
    }
}

/// Everything the registry knows about one filter implementation.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub backend: BackendTag,
    pub registration: String,
    pub name: String,
    pub category: String,
    pub compat_version: Version,
    pub plugs: Vec<Rc<Connector>>,
    /// How often the last plug connector may repeat.
    pub extra_plugs: usize,
    pub sockets: Vec<Rc<Connector>>,
    pub extra_sockets: usize,
    pub default_options: Vec<OptionEntry>,
    pub capabilities: ModuleCapabilities,
    /// Id of the source (file or builtin set) this came from.
    pub source: String,
}

impl ModuleDescriptor {
    pub fn new(backend: BackendTag, registration: impl Into<String>) -> Self {
        Self {
            backend,
            registration: registration.into(),
            name: String::new(),
            category: String::new(),
            compat_version: Version::host(),
            plugs: Vec::new(),
            extra_plugs: 0,
            sockets: Vec::new(),
            extra_sockets: 0,
            default_options: Vec::new(),
            capabilities: ModuleCapabilities::default(),
            source: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_compat_version(mut self, version: Version) -> Self {
        self.compat_version = version;
        self
    }

    /// Add a plug connector; the role is forced to `Plug`.
    pub fn with_plug(mut self, mut connector: Connector) -> Self {
        connector.role = ConnectorRole::Plug;
        self.plugs.push(Rc::new(connector));
        self
    }

    /// Add a socket connector; the role is forced to `Socket`.
    pub fn with_socket(mut self, mut connector: Connector) -> Self {
        connector.role = ConnectorRole::Socket;
        self.sockets.push(Rc::new(connector));
        self
    }

    pub fn with_extra_plugs(mut self, count: usize) -> Self {
        self.extra_plugs = count;
        self
    }

    pub fn with_extra_sockets(mut self, count: usize) -> Self {
        self.extra_sockets = count;
        self
    }

    pub fn with_option(mut self, registration: impl Into<String>, value: OptionValue) -> Self {
        self.default_options.push(OptionEntry {
            registration: registration.into(),
            value,
            source: OptionSource::Filter,
        });
        self
    }

    pub fn with_capabilities(mut self, capabilities: ModuleCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn plug_count(&self) -> usize {
        if self.plugs.is_empty() {
            0
        } else {
            self.plugs.len() + self.extra_plugs
        }
    }

    pub fn socket_count(&self) -> usize {
        if self.sockets.is_empty() {
            0
        } else {
            self.sockets.len() + self.extra_sockets
        }
    }

    /// Connector for plug position `pos`; repeated positions reuse the last one.
    pub fn plug_connector(&self, pos: usize) -> Option<Rc<Connector>> {
        Self::connector_at(&self.plugs, self.plug_count(), pos)
    }

    pub fn socket_connector(&self, pos: usize) -> Option<Rc<Connector>> {
        Self::connector_at(&self.sockets, self.socket_count(), pos)
    }

    fn connector_at(list: &[Rc<Connector>], count: usize, pos: usize) -> Option<Rc<Connector>> {
        if pos >= count {
            return None;
        }
        list.get(pos).or_else(|| list.last()).cloned()
    }

    /// Context type the module declares, empty when it needs none.
    pub fn context_type(&self) -> &str {
        self.capabilities
            .context
            .as_ref()
            .map(|c| c.context_type())
            .unwrap_or("")
    }
}
