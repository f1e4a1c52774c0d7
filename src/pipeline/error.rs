//! Pipeline-specific error types.

use crate::pipeline::id::{NodeId, PortId};
use thiserror::Error;

/// Errors that can occur while building or running filter graphs.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No backend module matches {registration:?}")]
    NoBackend { registration: String },

    #[error("Node {node_id} is incomplete: {message}")]
    IncompleteNode { node_id: NodeId, message: String },

    #[error("Connector {nick:?} not found on node {node_id}")]
    ConnectorNotFound { node_id: NodeId, nick: String },

    #[error("Incompatible connectors: {0}")]
    IncompatibleConnectors(String),

    #[error("Plug {0} is not connected")]
    NotConnected(PortId),

    #[error("Node {node_id} is still requested by {plugs} plug(s)")]
    NodeInUse { node_id: NodeId, plugs: usize },

    #[error("Node {node_id} has no socket {index}")]
    MissingSocket { node_id: NodeId, index: usize },

    #[error("Could not resolve image data for node {0}")]
    ResolutionFailed(NodeId),

    #[error("Cycle detected in filter graph at node {0}")]
    CycleDetected(NodeId),

    #[error("Module {registration} failed: {source}")]
    ModuleFault {
        registration: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid option {key}: {message}")]
    InvalidOption { key: String, message: String },
}

impl PipelineError {
    /// Numeric status. Negative codes mean "nothing matched", positive codes
    /// are structural, resolution or module failures.
    pub fn code(&self) -> i32 {
        match self {
            PipelineError::NoBackend { .. } => -1,
            PipelineError::ConnectorNotFound { .. } => -2,
            PipelineError::IncompatibleConnectors(_) => -3,
            PipelineError::IncompleteNode { .. } => 1,
            PipelineError::NotConnected(_) => 2,
            PipelineError::NodeInUse { .. } => 3,
            PipelineError::MissingSocket { .. } => 4,
            PipelineError::ResolutionFailed(_) => 5,
            PipelineError::CycleDetected(_) => 6,
            PipelineError::ModuleFault { .. } => 7,
            PipelineError::InvalidOption { .. } => 8,
        }
    }

    /// Wrap a module error. A `PipelineError` raised inside the module is
    /// passed through unchanged.
    pub fn from_module(registration: &str, err: anyhow::Error) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(inner) => inner,
            Err(source) => PipelineError::ModuleFault {
                registration: registration.to_string(),
                source,
            },
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
