//! # colorpipe: color-management pipeline core
//!
//! Builds and runs pixel-processing filter graphs whose nodes are backend
//! modules discovered at runtime.
//!
//! ## Architecture
//!
//! - **Registry**: meta-loaders list module sources (builtin tables, TOML
//!   manifests on the search path); registrations are ranked against
//!   patterns such as `//imaging/icc.lcms`
//! - **Pipeline**: filter nodes connected plug to socket, pulled from the
//!   output end with a [`PixelAccess`] ticket
//! - **Options**: observable key/value sets; changing one drops the cached
//!   contexts of the nodes using it
//! - **Observer**: synchronous signal bus shared by options and nodes
//!
//! ## Configuration
//!
//! [`EngineConfig`] lives in the platform config directory under
//! `org.colorpipe`:
//!
//! - **Linux**: `~/.config/org.colorpipe/colorpipe.toml`
//! - **macOS**: `~/Library/Application Support/org.colorpipe/colorpipe.toml`
//! - **Windows**: `%APPDATA%\org.colorpipe\colorpipe.toml`
//!
//! ## Example
//!
//! ```ignore
//! use colorpipe::{Conversion, EngineConfig, Image, PixelLayout, DataType};
//!
//! fn main() -> colorpipe::Result<()> {
//!     let config = EngineConfig::load_or_default();
//!     colorpipe::logging::init(&config.log_filter);
//!
//!     let registry = config.build_registry();
//!     let input = Image::new(64, 64, PixelLayout::new(DataType::Float, 3));
//!     let conversion = Conversion::basic(&registry, input, None, "//imaging/gain", None)?;
//!
//!     let ticket = conversion.run_pixels(None)?;
//!     println!("{} samples", ticket.map_or(0, |t| t.array().len()));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod image;
pub mod logging;
pub mod modules;
pub mod observer;
pub mod options;
pub mod pipeline;
pub mod registration;
pub mod registry;

// Re-export commonly used types
pub use config::EngineConfig;
pub use connector::Connector;
pub use error::{ColorPipeError, Result, ResultExt};
pub use image::{DataType, Image, PixelLayout};
pub use observer::{SignalHub, SignalKind};
pub use options::{OptionSource, OptionValue, Options};
pub use pipeline::{
    Conversion, FilterGraph, FilterNode, PipelineError, PixelAccess, Plug, Socket, Traversal,
};
pub use registration::ApiKind;
pub use registry::{ModuleCache, ModuleDescriptor, Registry, RegistryError};
