//! Identity types for filter nodes, ports and graph edges.
//!
//! Node ids are process-unique and handed out in creation order. Edge ids
//! index into a `FilterGraph` snapshot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one `FilterNode`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const INVALID: NodeId = NodeId(u64::MAX);

    /// Allocate the next id. The counter is 64 bits wide and never reused.
    pub(crate) fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn skip(count: u64) {
        NEXT_NODE_ID.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "NodeId(INVALID)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plug or socket identifier: owning node plus connector position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId {
    node: NodeId,
    index: u16,
}

impl PortId {
    pub fn new(node: NodeId, port_index: u16) -> Self {
        Self {
            node,
            index: port_index,
        }
    }

    #[inline]
    pub fn node(self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn port_index(self) -> u16 {
        self.index
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PortId(node={}, port={})",
            self.node().0,
            self.port_index()
        )
    }
}

/// Index into `FilterGraph::edges`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub u32);

impl EdgeId {
    pub const INVALID: EdgeId = EdgeId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node().0, self.port_index())
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "EdgeId(INVALID)")
        } else {
            write!(f, "EdgeId({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId(42);
        assert!(id.is_valid());
        assert_eq!(id.index(), 42);
        assert!(!NodeId::INVALID.is_valid());
    }

    #[test]
    fn test_port_id_round_trip() {
        let node = NodeId(100);
        let port = PortId::new(node, 7);
        assert_eq!(port.node(), node);
        assert_eq!(port.port_index(), 7);
    }

    #[test]
    fn test_port_id_limits() {
        let node = NodeId(u32::MAX as u64 + 5);
        let port = PortId::new(node, u16::MAX);
        assert_eq!(port.node(), node);
        assert_eq!(port.port_index(), u16::MAX);
        assert_eq!(port.to_string(), format!("{}:65535", node));
    }

    #[test]
    fn test_ports_of_far_apart_nodes_differ() {
        let low = PortId::new(NodeId(1), 0);
        let high = PortId::new(NodeId(1 + (1 << 20)), 0);
        assert_ne!(low, high);
        assert_ne!(low.node(), high.node());
    }

    #[test]
    fn test_node_ids_are_distinct() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(a.is_valid() && b.is_valid());
        assert_eq!(PortId::new(b, 3).node(), b);
    }

    #[test]
    fn test_edge_id() {
        let id = EdgeId(5);
        assert!(id.is_valid());
        assert!(!EdgeId::INVALID.is_valid());
    }
}
