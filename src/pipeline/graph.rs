//! Filter graph snapshots.
//!
//! A [`FilterGraph`] is a value snapshot of every node reachable from a seed
//! node together with the plug→socket edges between them. It does not keep
//! itself in sync with later connection changes; rebuild it with
//! [`FilterGraph::set_from_node`].

use crate::options::{OptionSource, OptionValue, Options};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::id::{EdgeId, NodeId, PortId};
use crate::pipeline::node::FilterNode;
use crate::pipeline::port::{Plug, Socket};
use crate::registration::{self, ApiKind};
use std::collections::HashSet;
use std::fmt;

/// Graph option tracking whether contexts need preparing.
pub const DIRTY_KEY: &str = "org/colorpipe/graph/dirty";

/// Which connections to follow from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    Both,
    /// Follow plugs to their producers.
    Upstream,
    /// Follow sockets to their requesting plugs.
    Downstream,
}

impl Traversal {
    fn upstream(self) -> bool {
        matches!(self, Traversal::Both | Traversal::Upstream)
    }

    fn downstream(self) -> bool {
        matches!(self, Traversal::Both | Traversal::Downstream)
    }
}

/// A plug→socket connection.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub plug: Plug,
    pub socket: Socket,
}

impl Edge {
    pub fn producer(&self) -> &FilterNode {
        self.socket.node()
    }

    pub fn consumer(&self) -> &FilterNode {
        self.plug.node()
    }
}

pub struct FilterGraph {
    nodes: Vec<FilterNode>,
    edges: Vec<Edge>,
    options: Options,
}

impl FilterGraph {
    /// Empty graph.
    pub fn new() -> Self {
        let graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            options: Options::new(),
        };
        graph.set_dirty(false);
        graph
    }

    /// Snapshot everything reachable from `seed`.
    pub fn from_node(seed: &FilterNode, traversal: Traversal) -> Self {
        let mut graph = Self::new();
        graph.set_from_node(seed, traversal);
        graph
    }

    /// Rebuild the snapshot in place. Graph options are kept; the dirty flag
    /// is recomputed.
    pub fn set_from_node(&mut self, seed: &FilterNode, traversal: Traversal) {
        self.nodes.clear();
        self.edges.clear();

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut seen_edges: HashSet<(PortId, PortId)> = HashSet::new();
        let mut stack = vec![seed.clone()];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }

            let mut neighbours = Vec::new();
            if traversal.upstream() {
                for plug in node.plugs() {
                    if let Some(socket) = plug.remote() {
                        neighbours.push(socket.node().clone());
                        self.record_edge(&mut seen_edges, plug, socket);
                    }
                }
            }
            if traversal.downstream() {
                for socket in node.sockets() {
                    for plug in socket.requesting_plugs() {
                        neighbours.push(plug.node().clone());
                        self.record_edge(&mut seen_edges, plug, socket.clone());
                    }
                }
            }
            self.nodes.push(node);

            // Reverse so the first neighbour is visited first
            stack.extend(
                neighbours
                    .into_iter()
                    .rev()
                    .filter(|n| !visited.contains(&n.id())),
            );
        }

        let dirty = self.nodes.iter().any(FilterNode::needs_context);
        self.set_dirty(dirty);
        tracing::debug!(
            "Graph from node {}: {} nodes, {} edges",
            seed.id(),
            self.nodes.len(),
            self.edges.len()
        );
    }

    fn record_edge(&mut self, seen: &mut HashSet<(PortId, PortId)>, plug: Plug, socket: Socket) {
        if seen.insert((plug.id(), socket.id())) {
            self.edges.push(Edge {
                id: EdgeId(self.edges.len() as u32),
                plug,
                socket,
            });
        }
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, pos: usize) -> Option<&Edge> {
        self.edges.get(pos)
    }

    pub fn contains(&self, node: &FilterNode) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    fn selected<'a>(
        &'a self,
        registration: Option<&'a str>,
        mark: Option<&'a str>,
    ) -> impl Iterator<Item = &'a FilterNode> + 'a {
        self.nodes.iter().filter(move |node| {
            let reg_ok = registration
                .map_or(true, |r| registration::rank(node.registration(), r, ApiKind::Any) > 0);
            let mark_ok =
                mark.map_or(true, |m| node.tags().find_string(m).as_deref() == Some("true"));
            reg_ok && mark_ok
        })
    }

    /// The `pos`-th node matching `registration` and carrying tag `mark`.
    pub fn get_node(
        &self,
        pos: usize,
        registration: Option<&str>,
        mark: Option<&str>,
    ) -> Option<FilterNode> {
        self.selected(registration, mark).nth(pos).cloned()
    }

    pub fn count_nodes(&self, registration: Option<&str>, mark: Option<&str>) -> usize {
        self.selected(registration, mark).count()
    }

    /// Build contexts for nodes that need one. Returns the number built.
    pub fn prepare_contexts(&self, force: bool) -> PipelineResult<usize> {
        let mut built = 0;
        for node in &self.nodes {
            if node.prepare_context(force)? {
                built += 1;
            }
        }
        self.set_dirty(false);
        tracing::info!(
            "Prepared {} context(s) for {} node(s)",
            built,
            self.nodes.len()
        );
        Ok(built)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_dirty(&self) -> bool {
        self.options.find_string(DIRTY_KEY).as_deref() == Some("true")
    }

    fn set_dirty(&self, dirty: bool) {
        self.options.set(
            DIRTY_KEY,
            OptionValue::String(dirty.to_string()),
            OptionSource::None,
        );
    }

    /// Dot text of this graph. See [`crate::pipeline::dot`].
    pub fn to_text(
        &self,
        input: Option<&FilterNode>,
        output: Option<&FilterNode>,
        head_line: &str,
    ) -> String {
        crate::pipeline::dot::to_text(self, input, output, head_line)
    }
}

impl Default for FilterGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterGraph")
            .field("nodes", &self.nodes.iter().map(FilterNode::id).collect::<Vec<_>>())
            .field("edges", &self.edges.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_util::{chain, node};

    #[test]
    fn test_from_node_visits_chain_in_order() {
        let nodes = chain(&["root", "copy", "gain", "output"]);
        let graph = FilterGraph::from_node(&nodes[3], Traversal::Both);

        let ids: Vec<_> = graph.nodes().iter().map(FilterNode::id).collect();
        let expected: Vec<_> = nodes.iter().rev().map(FilterNode::id).collect();
        assert_eq!(ids, expected);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge(0).map(|e| e.consumer().id()), Some(nodes[3].id()));
    }

    #[test]
    fn test_traversal_direction() {
        let nodes = chain(&["root", "copy", "output"]);
        let up = FilterGraph::from_node(&nodes[1], Traversal::Upstream);
        let down = FilterGraph::from_node(&nodes[1], Traversal::Downstream);
        let both = FilterGraph::from_node(&nodes[1], Traversal::Both);

        assert_eq!(up.node_count(), 2);
        assert!(up.contains(&nodes[0]));
        assert_eq!(down.node_count(), 2);
        assert!(down.contains(&nodes[2]));
        assert_eq!(both.node_count(), 3);
        assert_eq!(both.edge_count(), 2);
    }

    #[test]
    fn test_fan_out_records_each_edge_once() {
        let root = node("root");
        let a = node("copy");
        let b = node("copy");
        FilterNode::connect(&root, "data", &a, "data").unwrap();
        FilterNode::connect(&root, "data", &b, "data").unwrap();

        let graph = FilterGraph::from_node(&a, Traversal::Both);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let ids: Vec<_> = graph.nodes().iter().map(FilterNode::id).collect();
        assert_eq!(ids, vec![a.id(), root.id(), b.id()]);
    }

    #[test]
    fn test_nodes_created_far_apart_stay_distinct() {
        let root = node("root");
        NodeId::skip(1 << 20);
        let output = node("output");
        assert_ne!(root.id(), output.id());
        FilterNode::connect(&root, "data", &output, "data").unwrap();

        let graph = FilterGraph::from_node(&root, Traversal::Both);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_feedback_cycle_terminates() {
        let a = node("copy");
        let b = node("copy");
        FilterNode::connect(&a, "data", &b, "data").unwrap();
        FilterNode::connect(&b, "data", &a, "data").unwrap();

        let graph = FilterGraph::from_node(&a, Traversal::Both);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);

        a.detach();
        b.detach();
    }

    #[test]
    fn test_get_node_by_registration_and_mark() {
        let nodes = chain(&["root", "copy", "output"]);
        nodes[1].tags().set(
            "org/colorpipe/graph/display_mode",
            OptionValue::String("true".into()),
            OptionSource::User,
        );
        let graph = FilterGraph::from_node(&nodes[0], Traversal::Both);

        assert_eq!(graph.count_nodes(None, None), 3);
        assert_eq!(graph.count_nodes(Some("//imaging/copy"), None), 1);
        assert_eq!(graph.count_nodes(None, Some("display_mode")), 1);
        assert_eq!(
            graph.get_node(0, None, Some("display_mode")).map(|n| n.id()),
            Some(nodes[1].id())
        );
        assert!(graph.get_node(1, Some("//imaging/copy"), None).is_none());
    }

    #[test]
    fn test_prepare_contexts_clears_dirty() {
        let nodes = chain(&["root", "gain", "output"]);
        let graph = FilterGraph::from_node(&nodes[2], Traversal::Both);
        assert!(graph.is_dirty());

        assert_eq!(graph.prepare_contexts(false).unwrap(), 1);
        assert!(!graph.is_dirty());
        assert!(nodes[1].context().is_some());
        assert_eq!(graph.prepare_contexts(false).unwrap(), 0);
        assert_eq!(graph.prepare_contexts(true).unwrap(), 1);
    }

    #[test]
    fn test_set_from_node_keeps_options() {
        let nodes = chain(&["root", "output"]);
        let mut graph = FilterGraph::from_node(&nodes[0], Traversal::Both);
        graph
            .options()
            .set("org/colorpipe/graph/label", OptionValue::String("x".into()), OptionSource::User);

        let other = node("copy");
        graph.set_from_node(&other, Traversal::Both);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.options().find_string("label").as_deref(), Some("x"));
        assert!(!graph.is_dirty());
    }
}
