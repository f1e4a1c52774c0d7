//! Filter graph engine.
//!
//! Nodes wrap a resolved module ([`FilterCore`]) with typed inputs (plugs)
//! and outputs (sockets). Data is pulled: a [`PixelAccess`] ticket created at
//! the output travels upstream, running each node on demand.
//!
//! # Architecture
//!
//! ```text
//! [root] ──socket──► plug [process] ──socket──► plug [output] ◄── ticket
//! ```
//!
//! # Ownership
//!
//! - A plug holds a strong handle to the socket it reads from, and with it
//!   the producing node.
//! - A socket keeps only weak links to its requesting plugs.
//! - [`FilterGraph`] is a snapshot; it holds node handles but never feeds
//!   back into the nodes.

pub mod conversion;
pub mod core;
pub mod dot;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod pixel_access;
pub mod port;

pub use self::core::{Context, FilterCore};
pub use conversion::Conversion;
pub use error::{PipelineError, PipelineResult};
pub use graph::{Edge, FilterGraph, Traversal, DIRTY_KEY};
pub use id::{EdgeId, NodeId, PortId};
pub use node::{FilterNode, RunContext, WeakNode, RESOLVE_SCOPE};
pub use pixel_access::{AccessPattern, PixelAccess, Rect};
pub use port::{EdgeFilter, Plug, PortEvent, PortSide, Socket};

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::rc::Rc;

    /// Fresh node of a built-in module: `root`, `copy`, `gain` or `output`.
    pub fn node(name: &str) -> FilterNode {
        let descriptor = match name {
            "root" => crate::modules::root::descriptor(),
            "copy" => crate::modules::copy::descriptor(),
            "gain" => crate::modules::gain::descriptor(),
            "output" => crate::modules::output::descriptor(),
            other => panic!("no builtin module {other}"),
        };
        FilterNode::new(FilterCore::new(Rc::new(descriptor), None))
    }

    /// Nodes connected in order through their `data` connectors.
    pub fn chain(names: &[&str]) -> Vec<FilterNode> {
        let nodes: Vec<FilterNode> = names.iter().map(|n| node(n)).collect();
        for pair in nodes.windows(2) {
            FilterNode::connect(&pair[0], "data", &pair[1], "data").unwrap();
        }
        nodes
    }
}
