//! Error handling for colorpipe
//!
//! Layer errors ([`PipelineError`], [`RegistryError`]) convert into the
//! crate-level [`ColorPipeError`], which adds configuration, I/O and context
//! wrapping.

use crate::pipeline::PipelineError;
use crate::registry::RegistryError;
use thiserror::Error;

/// Main error type for colorpipe operations
#[derive(Error, Debug)]
pub enum ColorPipeError {
    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Graph construction or execution errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Module discovery errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ColorPipeError>,
    },
}

impl ColorPipeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ColorPipeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Status code of the innermost pipeline error, if any.
    pub fn pipeline_code(&self) -> Option<i32> {
        match self {
            ColorPipeError::Pipeline(err) => Some(err.code()),
            ColorPipeError::WithContext { source, .. } => source.pipeline_code(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ColorPipeError {
    fn from(err: serde_json::Error) -> Self {
        ColorPipeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ColorPipeError {
    fn from(err: toml::de::Error) -> Self {
        ColorPipeError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for ColorPipeError {
    fn from(err: toml::ser::Error) -> Self {
        ColorPipeError::Serialization(err.to_string())
    }
}

/// Result type alias for colorpipe operations
pub type Result<T> = std::result::Result<T, ColorPipeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ColorPipeError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ColorPipeError::with_context(e.into(), context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ColorPipeError::with_context(e.into(), f()))
    }
}
