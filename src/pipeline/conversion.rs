//! Conversions: the input/output node pair of one pipeline.

use crate::image::Image;
use crate::options::Options;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::{FilterGraph, Traversal};
use crate::pipeline::node::FilterNode;
use crate::pipeline::pixel_access::{AccessPattern, PixelAccess};
use crate::registry::Registry;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Conversion {
    input: Option<FilterNode>,
    output: Option<FilterNode>,
}

impl Conversion {
    pub fn new(input: Option<FilterNode>, output: Option<FilterNode>) -> Self {
        Self { input, output }
    }

    /// Chain `input image → registration → output` from registry modules.
    ///
    /// Without an output image the result is only available through the
    /// ticket array.
    pub fn basic(
        registry: &Registry,
        input: Image,
        output: Option<Image>,
        registration: &str,
        options: Option<&Options>,
    ) -> PipelineResult<Self> {
        let root = registry.create_node(crate::modules::root::REGISTRATION, None)?;
        let process = registry.create_node(registration, options)?;
        let out = registry.create_node(crate::modules::output::REGISTRATION, None)?;

        root.set_data(0, Some(Rc::new(input)))?;
        if let Some(image) = output {
            out.set_data(0, Some(Rc::new(image)))?;
        }

        let data = crate::modules::DATA;
        FilterNode::connect(&root, data, &process, data)?;
        FilterNode::connect(&process, data, &out, data)?;
        tracing::debug!(
            "Built conversion {} -> {} -> {}",
            root.id(),
            process.id(),
            out.id()
        );
        Ok(Self::new(Some(root), Some(out)))
    }

    pub fn input(&self) -> Option<&FilterNode> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&FilterNode> {
        self.output.as_ref()
    }

    /// Replace the input end, returning the previous one.
    pub fn set_input(&mut self, node: Option<FilterNode>) -> Option<FilterNode> {
        std::mem::replace(&mut self.input, node)
    }

    pub fn set_output(&mut self, node: Option<FilterNode>) -> Option<FilterNode> {
        std::mem::replace(&mut self.output, node)
    }

    /// Snapshot of everything connected to the conversion.
    pub fn graph(&self) -> FilterGraph {
        match self.output.as_ref().or(self.input.as_ref()) {
            Some(seed) => FilterGraph::from_node(seed, Traversal::Both),
            None => FilterGraph::new(),
        }
    }

    /// Whole-image ticket on the output node's first plug.
    pub fn ticket(&self) -> PipelineResult<PixelAccess> {
        let output = self.output_node()?;
        let plug = output.plug(0).ok_or_else(|| PipelineError::IncompleteNode {
            node_id: output.id(),
            message: "output node has no plug".to_string(),
        })?;
        PixelAccess::create(0.0, 0.0, &plug, AccessPattern::Image)
    }

    fn output_node(&self) -> PipelineResult<&FilterNode> {
        self.output
            .as_ref()
            .ok_or_else(|| PipelineError::IncompleteNode {
                node_id: crate::pipeline::NodeId::INVALID,
                message: "conversion has no output node".to_string(),
            })
    }

    /// Pull pixels through the graph.
    ///
    /// Without a ticket a whole-image ticket is used and returned. Contexts
    /// are prepared first when the ticket's graph is dirty.
    pub fn run_pixels(&self, ticket: Option<&mut PixelAccess>) -> PipelineResult<Option<PixelAccess>> {
        let output = self.output_node()?;
        let mut owned = None;
        let ticket = match ticket {
            Some(ticket) => ticket,
            None => owned.insert(self.ticket()?),
        };

        if ticket.graph().is_dirty() {
            ticket.graph().prepare_contexts(false)?;
        }
        output.run(None, ticket)?;
        Ok(owned)
    }

    /// Dot text of the conversion graph.
    pub fn to_text(&self, head_line: &str) -> String {
        self.graph()
            .to_text(self.input.as_ref(), self.output.as_ref(), head_line)
    }
}
