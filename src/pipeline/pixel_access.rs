//! PixelAccess tickets: pull requests travelling upstream through a graph.
//!
//! A ticket is created at a plug, usually the output node's first plug. It
//! carries the region of interest, a snapshot of the graph, the queue of
//! resolve requests gathered on the way upstream and the pixels read by the
//! last step.

use crate::image::{Image, PixelRect};
use crate::options::{BoolOp, Options};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::{FilterGraph, Traversal};
use crate::pipeline::id::NodeId;
use crate::pipeline::node::RESOLVE_SCOPE;
use crate::pipeline::port::Plug;
use std::rc::Rc;

/// How much of the image a ticket addresses per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPattern {
    Point,
    Line,
    #[default]
    Image,
}

/// Rectangle in units of the output image width.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

pub struct PixelAccess {
    start: (f64, f64),
    old_start: (f64, f64),
    roi: Rect,
    pattern: AccessPattern,
    array_xy: Option<[i32; 2]>,
    pixels_n: usize,
    output_image: Option<Rc<Image>>,
    graph: FilterGraph,
    request_queue: Options,
    array: Vec<f64>,
    visiting: Vec<NodeId>,
}

impl PixelAccess {
    /// Ticket for pulling through `plug`, starting at `(start_x, start_y)`.
    pub fn create(
        start_x: f64,
        start_y: f64,
        plug: &Plug,
        pattern: AccessPattern,
    ) -> PipelineResult<Self> {
        let socket = plug.remote().ok_or(PipelineError::NotConnected(plug.id()))?;
        let image = socket.data();

        let (width, height) = image
            .as_ref()
            .map_or((0, 0), |i| (i.width() as usize, i.height() as usize));
        let roi_height = if width > 0 {
            height as f64 / width as f64
        } else {
            0.0
        };

        let (array_xy, pixels_n) = match pattern {
            AccessPattern::Point => (Some([0, 0]), 1),
            AccessPattern::Line => (Some([1, 0]), width),
            AccessPattern::Image => (None, width * height),
        };

        let node = plug.node();
        let ticket = Self {
            start: (start_x, start_y),
            old_start: (start_x, start_y),
            roi: Rect::new(0.0, 0.0, 1.0, roi_height),
            pattern,
            array_xy,
            pixels_n,
            output_image: image,
            graph: FilterGraph::from_node(node, Traversal::Both),
            request_queue: node.options().filter(RESOLVE_SCOPE, BoolOp::Intersection),
            array: Vec::new(),
            visiting: Vec::new(),
        };
        tracing::debug!(
            "Created {:?} ticket at ({}, {}) on plug {}",
            pattern,
            start_x,
            start_y,
            plug.id()
        );
        Ok(ticket)
    }

    /// Move the ticket. The previous start is kept in `old_start`.
    pub fn change_rectangle(&mut self, start_x: f64, start_y: f64, roi: Option<Rect>) {
        self.old_start = self.start;
        self.start = (start_x, start_y);
        if let Some(roi) = roi {
            self.roi = roi;
        }
    }

    pub fn start(&self) -> (f64, f64) {
        self.start
    }

    pub fn old_start(&self) -> (f64, f64) {
        self.old_start
    }

    pub fn roi(&self) -> Rect {
        self.roi
    }

    pub fn pattern(&self) -> AccessPattern {
        self.pattern
    }

    /// Step between successive reads; `None` for whole-image access.
    pub fn array_xy(&self) -> Option<[i32; 2]> {
        self.array_xy
    }

    pub fn pixels_n(&self) -> usize {
        self.pixels_n
    }

    pub fn output_image(&self) -> Option<Rc<Image>> {
        self.output_image.clone()
    }

    pub fn set_output_image(&mut self, image: Option<Rc<Image>>) {
        self.output_image = image;
    }

    pub fn graph(&self) -> &FilterGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut FilterGraph {
        &mut self.graph
    }

    pub fn request_queue(&self) -> &Options {
        &self.request_queue
    }

    pub fn set_request_queue(&mut self, queue: Options) {
        self.request_queue = queue;
    }

    /// Samples read by the last run.
    pub fn array(&self) -> &[f64] {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Vec<f64> {
        &mut self.array
    }

    pub fn set_array(&mut self, array: Vec<f64>) {
        self.array = array;
    }

    /// The pixel rectangle of `image` this ticket addresses.
    pub fn pixel_rect(&self, image: &Image) -> PixelRect {
        let w = image.width() as f64;
        let to_px = |v: f64| (v * w).round().max(0.0) as u32;

        let x = to_px(self.start.0 + self.roi.x);
        let y = to_px(self.start.1 + self.roi.y);
        let (width, height) = match self.pattern {
            AccessPattern::Point => (1, 1),
            AccessPattern::Line => (to_px(self.roi.width), 1),
            AccessPattern::Image => (to_px(self.roi.width), to_px(self.roi.height)),
        };
        image.clamp_rect(PixelRect {
            x,
            y,
            width,
            height,
        })
    }

    pub(crate) fn is_visiting(&self, node: NodeId) -> bool {
        self.visiting.contains(&node)
    }

    pub(crate) fn enter(&mut self, node: NodeId) {
        self.visiting.push(node);
    }

    pub(crate) fn leave(&mut self, node: NodeId) {
        if let Some(pos) = self.visiting.iter().rposition(|&n| n == node) {
            self.visiting.remove(pos);
        }
    }
}

impl std::fmt::Debug for PixelAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelAccess")
            .field("start", &self.start)
            .field("roi", &self.roi)
            .field("pattern", &self.pattern)
            .field("pixels_n", &self.pixels_n)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}
