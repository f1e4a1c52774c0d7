//! Filter nodes: a filter core plus its plugs, sockets and cached context.
//!
//! `FilterNode` is a cheap `Rc` handle. A node lives as long as any handle,
//! socket handle or connected downstream plug refers to it. Dropping the last
//! reference disconnects its own plugs, firing RELEASED on each producer.

use crate::image::{Image, PixelLayout};
use crate::observer::{AsObserver, SignalEvent, SignalHub, SignalKind};
use crate::options::{BoolOp, Options};
use crate::pipeline::core::{Context, FilterCore};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{NodeId, PortId};
use crate::pipeline::pixel_access::PixelAccess;
use crate::pipeline::port::{EdgeFilter, Plug, PlugSlot, PortEvent, PortSide, Socket, SocketSlot};
use crate::registration::{self, ApiKind, RegField};
use crate::registry::ModuleCache;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

/// Option pattern selecting resolve-scoped requests.
pub const RESOLVE_SCOPE: &str = "////resolve";

pub(crate) struct NodeInner {
    pub(crate) id: NodeId,
    pub(crate) core: FilterCore,
    pub(crate) plugs: Vec<PlugSlot>,
    pub(crate) sockets: Vec<SocketSlot>,
    context: RefCell<Option<Context>>,
    context_key: RefCell<Option<String>>,
    tags: Rc<Options>,
    signals: SignalHub,
    cache: Option<Rc<ModuleCache>>,
}

impl NodeInner {
    /// Install `context` under `key`, releasing the previous one.
    fn install_context(&self, key: String, context: Context) {
        let old = self.context.borrow_mut().replace(context);
        let old_key = self.context_key.borrow_mut().replace(key);
        drop(old);
        self.release_key(old_key);
    }

    /// Drop the installed context. Returns whether there was one.
    fn drop_context(&self) -> bool {
        let old = self.context.borrow_mut().take();
        let had = old.is_some();
        drop(old);
        self.release_key(self.context_key.borrow_mut().take());
        had
    }

    fn release_key(&self, key: Option<String>) {
        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.release_context(&key);
        }
    }
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        self.drop_context();
        let me: *const NodeInner = self;
        for (index, slot) in self.plugs.iter().enumerate() {
            let Some(socket) = slot.remote.borrow_mut().take() else {
                continue;
            };
            socket.slot().unlink(me, index);
            let event = PortEvent {
                plug: PortId::new(self.id, index as u16),
                socket: socket.id(),
            };
            tracing::trace!("Node {} dropped, releasing socket {}", self.id, event.socket);
            socket.node().signals().signal(SignalKind::Released, Some(&event));
        }
    }
}

/// Context handed to a module's [`RunFilter`](crate::registry::RunFilter).
pub struct RunContext<'a> {
    /// The node being run.
    pub node: &'a FilterNode,
    /// The downstream plug that asked for data, `None` for the graph output.
    pub requestor: Option<&'a Plug>,
    pub ticket: &'a mut PixelAccess,
}

impl RunContext<'_> {
    /// The node's context, built before the module is invoked.
    pub fn context(&self) -> Option<Context> {
        self.node.context()
    }

    /// Resolve the image arriving at plug `plug_pos`, running upstream if needed.
    pub fn resolve_input(&mut self, plug_pos: usize) -> PipelineResult<Rc<Image>> {
        self.node.resolve_image(plug_pos, 0, self.ticket)
    }

    /// Resolve plug `plug_pos` and make sure its producer ran for this
    /// ticket. The producer runs at most once per call.
    pub fn pull_input(&mut self, plug_pos: usize) -> PipelineResult<Rc<Image>> {
        let (image, ran) = self.node.resolve_inner(plug_pos, 0, self.ticket)?;
        if !ran {
            self.run_input(plug_pos)?;
        }
        Ok(image)
    }

    /// Run the producer connected to plug `plug_pos` unconditionally.
    pub fn run_input(&mut self, plug_pos: usize) -> PipelineResult<()> {
        let plug = self
            .node
            .plug(plug_pos)
            .ok_or(PipelineError::NotConnected(PortId::new(self.node.id(), plug_pos as u16)))?;
        let socket = plug.remote().ok_or(PipelineError::NotConnected(plug.id()))?;
        socket.node().run(Some(&plug), self.ticket)
    }
}

#[derive(Clone)]
pub struct FilterNode {
    inner: Rc<NodeInner>,
}

/// Non-owning node handle.
#[derive(Clone)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<FilterNode> {
        self.inner.upgrade().map(FilterNode::from_inner)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl FilterNode {
    /// Node without a shared context cache.
    pub fn new(core: FilterCore) -> Self {
        Self::with_cache(core, None)
    }

    /// Node whose contexts are looked up in and stored to `cache`.
    pub fn with_cache(core: FilterCore, cache: Option<Rc<ModuleCache>>) -> Self {
        let descriptor = core.descriptor().clone();
        let plugs = (0..descriptor.plug_count())
            .filter_map(|i| descriptor.plug_connector(i))
            .map(PlugSlot::new)
            .collect();
        let sockets = (0..descriptor.socket_count())
            .filter_map(|i| descriptor.socket_connector(i))
            .map(SocketSlot::new)
            .collect();

        let node = Self {
            inner: Rc::new(NodeInner {
                id: NodeId::next(),
                core,
                plugs,
                sockets,
                context: RefCell::new(None),
                context_key: RefCell::new(None),
                tags: Rc::new(Options::new()),
                signals: SignalHub::new(),
                cache,
            }),
        };
        node.observe_options();
        tracing::debug!(
            "Added node {} of type {:?}",
            node.id(),
            node.registration()
        );
        node
    }

    pub(crate) fn from_inner(inner: Rc<NodeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &NodeInner {
        &self.inner
    }

    pub(crate) fn inner_rc(&self) -> &Rc<NodeInner> {
        &self.inner
    }

    fn observe_options(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.options().signals().add(
            self,
            None,
            Rc::new(move |event: &SignalEvent<'_>| {
                if event.kind != SignalKind::DataChanged {
                    return false;
                }
                match weak.upgrade() {
                    Some(inner) => {
                        FilterNode::from_inner(inner).options_changed();
                        true
                    }
                    None => false,
                }
            }),
        );
    }

    fn options_changed(&self) {
        if self.inner.drop_context() {
            tracing::debug!("Dropped context of node {}", self.id());
        }
        self.signal_to_graph(SignalKind::DataChanged);
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn registration(&self) -> &str {
        self.inner.core.registration()
    }

    pub fn core(&self) -> &FilterCore {
        &self.inner.core
    }

    pub fn options(&self) -> &Rc<Options> {
        self.inner.core.options()
    }

    /// Free-form marks, e.g. `"org/colorpipe/graph/display_mode" = "true"`.
    pub fn tags(&self) -> &Rc<Options> {
        &self.inner.tags
    }

    pub fn signals(&self) -> &SignalHub {
        &self.inner.signals
    }

    pub fn plug_count(&self) -> usize {
        self.inner.plugs.len()
    }

    pub fn socket_count(&self) -> usize {
        self.inner.sockets.len()
    }

    pub fn plug(&self, pos: usize) -> Option<Plug> {
        (pos < self.plug_count()).then(|| Plug::new(self.clone(), pos))
    }

    pub fn socket(&self, pos: usize) -> Option<Socket> {
        (pos < self.socket_count()).then(|| Socket::new(self.clone(), pos))
    }

    pub fn plugs(&self) -> Vec<Plug> {
        (0..self.plug_count())
            .map(|i| Plug::new(self.clone(), i))
            .collect()
    }

    pub fn sockets(&self) -> Vec<Socket> {
        (0..self.socket_count())
            .map(|i| Socket::new(self.clone(), i))
            .collect()
    }

    fn is_free(&self, side: PortSide, pos: usize) -> bool {
        match side {
            PortSide::Plug => self.inner.plugs[pos].remote.borrow().is_none(),
            PortSide::Socket => self
                .inner
                .sockets[pos]
                .requesting
                .borrow()
                .iter()
                .all(|link| link.node.strong_count() == 0),
        }
    }

    /// Position of the first connector with `nick`, optionally only free ones.
    pub fn connector_pos(&self, side: PortSide, nick: &str, free_only: bool) -> Option<usize> {
        let count = match side {
            PortSide::Plug => self.plug_count(),
            PortSide::Socket => self.socket_count(),
        };
        (0..count).find(|&pos| {
            let connector = match side {
                PortSide::Plug => &self.inner.plugs[pos].connector,
                PortSide::Socket => &self.inner.sockets[pos].connector,
            };
            connector.nick == nick && (!free_only || self.is_free(side, pos))
        })
    }

    /// Count plugs or sockets. For sockets `Connected` counts requesting plugs.
    pub fn edge_count(&self, side: PortSide, filter: EdgeFilter) -> usize {
        match (side, filter) {
            (PortSide::Plug, EdgeFilter::All) => self.plug_count(),
            (PortSide::Socket, EdgeFilter::All) => self.socket_count(),
            (PortSide::Plug, EdgeFilter::Connected) => {
                (0..self.plug_count()).filter(|&i| !self.is_free(side, i)).count()
            }
            (PortSide::Socket, EdgeFilter::Connected) => {
                self.sockets().iter().map(Socket::requesting_count).sum()
            }
            (_, EdgeFilter::Free) => {
                let count = match side {
                    PortSide::Plug => self.plug_count(),
                    PortSide::Socket => self.socket_count(),
                };
                (0..count).filter(|&i| self.is_free(side, i)).count()
            }
        }
    }

    /// Connect socket `socket_nick` of `producer` to plug `plug_nick` of
    /// `consumer`. A free plug is preferred. Nothing changes on failure.
    pub fn connect(
        producer: &FilterNode,
        socket_nick: &str,
        consumer: &FilterNode,
        plug_nick: &str,
    ) -> PipelineResult<()> {
        if producer.socket_count() == 0 {
            return Err(PipelineError::IncompleteNode {
                node_id: producer.id(),
                message: "module declares no sockets".to_string(),
            });
        }
        if consumer.plug_count() == 0 {
            return Err(PipelineError::IncompleteNode {
                node_id: consumer.id(),
                message: "module declares no plugs".to_string(),
            });
        }

        let socket_pos = producer
            .connector_pos(PortSide::Socket, socket_nick, false)
            .ok_or_else(|| PipelineError::ConnectorNotFound {
                node_id: producer.id(),
                nick: socket_nick.to_string(),
            })?;
        let plug_pos = consumer
            .connector_pos(PortSide::Plug, plug_nick, true)
            .or_else(|| consumer.connector_pos(PortSide::Plug, plug_nick, false))
            .ok_or_else(|| PipelineError::ConnectorNotFound {
                node_id: consumer.id(),
                nick: plug_nick.to_string(),
            })?;

        let socket = Socket::new(producer.clone(), socket_pos);
        let plug = Plug::new(consumer.clone(), plug_pos);

        if !producer.connector_match(socket_pos, &plug) {
            tracing::warn!(
                "Connectors do not match: {} ({}) -> {} ({})",
                socket.id(),
                producer.registration(),
                plug.id(),
                consumer.registration()
            );
            return Err(PipelineError::IncompatibleConnectors(format!(
                "{} -> {}",
                socket.id(),
                plug.id()
            )));
        }

        plug.connect_into_socket(&socket)?;

        // Hand the producer's artifact on to an empty consumer socket
        if let (Some(data), Some(target)) = (socket.data(), consumer.socket(0)) {
            if target.data().is_none() {
                *target.slot().data.borrow_mut() = Some(data);
            }
        }
        Ok(())
    }

    /// Whether socket `socket_pos` of this node can feed `plug`.
    pub fn connector_match(&self, socket_pos: usize, plug: &Plug) -> bool {
        let Some(slot) = self.inner.sockets.get(socket_pos) else {
            return false;
        };
        let plug_connector = plug.connector();
        if plug_connector.role != crate::connector::ConnectorRole::Plug {
            return false;
        }

        let plug_type = registration::field(&plug_connector.registration, RegField::Type).unwrap_or("");
        let pattern = format!("//{}", plug_type);
        if registration::rank(&slot.connector.registration, &pattern, ApiKind::Any) == 0 {
            return false;
        }

        let data = slot.data.borrow().clone();
        crate::connector::compatible(&slot.connector, plug_connector, data.as_deref())
    }

    /// Disconnect plug `plug_pos`.
    pub fn disconnect(&self, plug_pos: usize) -> PipelineResult<()> {
        let plug = self
            .plug(plug_pos)
            .ok_or(PipelineError::NotConnected(PortId::new(self.id(), plug_pos as u16)))?;
        plug.disconnect()
    }

    /// Disconnect every connected plug of this node.
    pub fn detach(&self) -> usize {
        self.plugs()
            .iter()
            .filter(|p| p.is_connected())
            .filter(|p| p.disconnect().is_ok())
            .count()
    }

    /// Give up this handle. Fails while downstream plugs still read from the
    /// node; the node stays fully connected in that case.
    pub fn release(self) -> PipelineResult<()> {
        let plugs = self.edge_count(PortSide::Socket, EdgeFilter::Connected);
        if plugs > 0 {
            return Err(PipelineError::NodeInUse {
                node_id: self.id(),
                plugs,
            });
        }
        if Rc::strong_count(&self.inner) == 1 {
            self.detach();
        }
        Ok(())
    }

    pub fn data(&self, socket_pos: usize) -> Option<Rc<Image>> {
        self.inner
            .sockets
            .get(socket_pos)
            .and_then(|slot| slot.data.borrow().clone())
    }

    /// Replace the artifact at a socket and tell downstream nodes.
    pub fn set_data(&self, socket_pos: usize, image: Option<Rc<Image>>) -> PipelineResult<()> {
        let slot = self
            .inner
            .sockets
            .get(socket_pos)
            .ok_or(PipelineError::MissingSocket {
                node_id: self.id(),
                index: socket_pos,
            })?;
        *slot.data.borrow_mut() = image;
        self.signals()
            .signal(SignalKind::StorageChanged, Some(&PortId::new(self.id(), socket_pos as u16)));
        Ok(())
    }

    pub fn context(&self) -> Option<Context> {
        self.inner.context.borrow().clone()
    }

    /// Whether the module wants a context that is not built yet.
    pub fn needs_context(&self) -> bool {
        !self.core().context_type().is_empty() && self.inner.context.borrow().is_none()
    }

    /// Build the module context if needed (or always with `force`).
    ///
    /// Contexts are shared through the module cache, keyed by registration
    /// and options text. Returns whether a context was installed.
    pub fn prepare_context(&self, force: bool) -> PipelineResult<bool> {
        let core = self.core();
        let context_type = core.context_type();
        if context_type.is_empty() || (!force && self.inner.context.borrow().is_some()) {
            return Ok(false);
        }
        let Some(builder) = core.descriptor().capabilities.context.clone() else {
            return Ok(false);
        };

        let key = ModuleCache::context_key(self.registration(), &self.options().to_text());
        if !force {
            if let Some(cached) = self.inner.cache.as_ref().and_then(|c| c.context(&key)) {
                tracing::debug!("Reused cached context for node {}", self.id());
                self.inner.install_context(key, cached);
                return Ok(true);
            }
        }

        let context = builder
            .build(core)
            .map_err(|e| PipelineError::from_module(self.registration(), e))?;
        if context.kind() != context_type {
            tracing::warn!(
                "Node {} built a {:?} context, expected {:?}",
                self.id(),
                context.kind(),
                context_type
            );
            self.signals().signal(SignalKind::IncompatibleContext, None);
        }
        if let Some(cache) = &self.inner.cache {
            cache.store_context(&key, context.clone());
        }
        tracing::debug!(
            "Built {} context ({} bytes) for node {}",
            context.kind(),
            context.size(),
            self.id()
        );
        self.inner.install_context(key, context);
        Ok(true)
    }

    /// Run the module for `ticket`. `requestor` is the downstream plug that
    /// pulled, `None` when this node is the graph output.
    pub fn run(&self, requestor: Option<&Plug>, ticket: &mut PixelAccess) -> PipelineResult<()> {
        if ticket.is_visiting(self.id()) {
            return Err(PipelineError::CycleDetected(self.id()));
        }
        let runner = self
            .core()
            .descriptor()
            .capabilities
            .runner
            .clone()
            .ok_or_else(|| PipelineError::IncompleteNode {
                node_id: self.id(),
                message: "module has no run capability".to_string(),
            })?;
        self.prepare_context(false)?;

        tracing::trace!("Running node {} ({})", self.id(), self.registration());
        ticket.enter(self.id());
        let result = {
            let mut ctx = RunContext {
                node: self,
                requestor,
                ticket: &mut *ticket,
            };
            runner.run(&mut ctx)
        };
        ticket.leave(self.id());

        result.map_err(|e| PipelineError::from_module(self.registration(), e))
    }

    /// Obtain the image arriving at plug `plug_pos`.
    ///
    /// Runs the upstream node when its socket is still empty, then fills this
    /// node's socket `socket_pos`: a new image of the requested pixel layout
    /// when reading from a root node, otherwise the same shared image.
    pub fn resolve_image(
        &self,
        plug_pos: usize,
        socket_pos: usize,
        ticket: &mut PixelAccess,
    ) -> PipelineResult<Rc<Image>> {
        self.resolve_inner(plug_pos, socket_pos, ticket)
            .map(|(image, _)| image)
    }

    /// [`resolve_image`](Self::resolve_image), also reporting whether the
    /// upstream node was run.
    pub(crate) fn resolve_inner(
        &self,
        plug_pos: usize,
        socket_pos: usize,
        ticket: &mut PixelAccess,
    ) -> PipelineResult<(Rc<Image>, bool)> {
        let plug = self
            .plug(plug_pos)
            .ok_or(PipelineError::NotConnected(PortId::new(self.id(), plug_pos as u16)))?;
        let remote = plug.remote().ok_or(PipelineError::NotConnected(plug.id()))?;
        let upstream = remote.node().clone();

        let ran = remote.data().is_none();
        if ran {
            let saved = ticket.request_queue().clone();
            let mine = self.options().filter(RESOLVE_SCOPE, BoolOp::Intersection);
            let theirs = upstream.options().filter(RESOLVE_SCOPE, BoolOp::Intersection);
            let queue = mine
                .combine(&theirs, BoolOp::Union)
                .combine(&saved, BoolOp::Union);
            ticket.set_request_queue(queue);

            let result = upstream.run(Some(&plug), ticket);
            ticket.set_request_queue(saved);
            result?;
        }

        let image = remote
            .data()
            .ok_or(PipelineError::ResolutionFailed(upstream.id()))?;

        if socket_pos < self.socket_count() && self.data(socket_pos).is_none() {
            let own = if upstream.plug_count() == 0 {
                let requests = self
                    .options()
                    .filter(RESOLVE_SCOPE, BoolOp::Intersection)
                    .combine(ticket.request_queue(), BoolOp::Union);
                match requests.find_int("pixel_layout") {
                    Some(bits) => {
                        let wanted = PixelLayout(bits as u32);
                        let channels = wanted.channels().max(image.color_channels());
                        let layout = PixelLayout::new(
                            wanted.data_type().unwrap_or(crate::image::DataType::U8),
                            channels,
                        );
                        Rc::new(image.reshaped(layout))
                    }
                    None => image.clone(),
                }
            } else {
                image.clone()
            };
            self.set_data(socket_pos, Some(own))?;
        }

        if ticket.output_image().is_none() {
            ticket.set_output_image(Some(image.clone()));
        }
        Ok((image, ran))
    }

    /// Send `kind` to this node's observers and to every node downstream.
    /// Returns the total handled count.
    /// Each node is signalled once, also across feedback connections.
    pub fn signal_to_graph(&self, kind: SignalKind) -> u32 {
        let mut visited = HashSet::new();
        let mut stack = vec![self.clone()];
        let mut handled = 0;

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            handled += node.signals().signal(kind, Some(&node.id()));
            for socket in node.sockets() {
                for plug in socket.requesting_plugs().into_iter().rev() {
                    stack.push(plug.node().clone());
                }
            }
        }
        handled
    }
}

impl PartialEq for FilterNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for FilterNode {}

impl AsObserver for FilterNode {
    fn as_observer(&self) -> Weak<dyn Any> {
        let weak: Weak<NodeInner> = Rc::downgrade(&self.inner);
        weak
    }
}

impl fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterNode")
            .field("id", &self.id())
            .field("registration", &self.registration())
            .field("plugs", &self.plug_count())
            .field("sockets", &self.socket_count())
            .finish()
    }
}
