//! Plugs and sockets: the two ends of a graph edge.
//!
//! A plug (consumer input) holds a strong [`Socket`] handle to the producer
//! it reads from, which keeps the producing node alive. The socket only
//! keeps weak links back to its requesting plugs, so ownership always points
//! upstream.

use crate::connector::Connector;
use crate::image::Image;
use crate::observer::SignalKind;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::PortId;
use crate::pipeline::node::{FilterNode, NodeInner};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Which connector list of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    Plug,
    Socket,
}

/// Selection for [`FilterNode::edge_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    All,
    Connected,
    Free,
}

/// Payload of CONNECTED and RELEASED signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortEvent {
    pub plug: PortId,
    pub socket: PortId,
}

pub(crate) struct PlugSlot {
    pub(crate) connector: Rc<Connector>,
    pub(crate) remote: RefCell<Option<Socket>>,
}

impl PlugSlot {
    pub(crate) fn new(connector: Rc<Connector>) -> Self {
        Self {
            connector,
            remote: RefCell::new(None),
        }
    }
}

pub(crate) struct PlugLink {
    pub(crate) node: Weak<NodeInner>,
    pub(crate) index: usize,
}

pub(crate) struct SocketSlot {
    pub(crate) connector: Rc<Connector>,
    pub(crate) requesting: RefCell<Vec<PlugLink>>,
    pub(crate) data: RefCell<Option<Rc<Image>>>,
}

impl SocketSlot {
    pub(crate) fn new(connector: Rc<Connector>) -> Self {
        Self {
            connector,
            requesting: RefCell::new(Vec::new()),
            data: RefCell::new(None),
        }
    }

    /// Drop the link of plug `index` on the node at `node`.
    pub(crate) fn unlink(&self, node: *const NodeInner, index: usize) {
        self.requesting
            .borrow_mut()
            .retain(|link| !(link.index == index && std::ptr::eq(link.node.as_ptr(), node)));
    }
}

/// Handle to one input of a node.
#[derive(Clone)]
pub struct Plug {
    node: FilterNode,
    index: usize,
}

impl Plug {
    pub(crate) fn new(node: FilterNode, index: usize) -> Self {
        Self { node, index }
    }

    fn slot(&self) -> &PlugSlot {
        &self.node.inner().plugs[self.index]
    }

    pub fn id(&self) -> PortId {
        PortId::new(self.node.id(), self.index as u16)
    }

    pub fn node(&self) -> &FilterNode {
        &self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn connector(&self) -> &Rc<Connector> {
        &self.slot().connector
    }

    /// The socket this plug reads from.
    pub fn remote(&self) -> Option<Socket> {
        self.slot().remote.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.slot().remote.borrow().is_some()
    }

    /// Connect to `socket`, releasing any previous connection first.
    ///
    /// RELEASED goes to the old producer, CONNECTED to the new one.
    pub fn connect_into_socket(&self, socket: &Socket) -> PipelineResult<()> {
        if self.connector().role != crate::connector::ConnectorRole::Plug
            || socket.connector().role != crate::connector::ConnectorRole::Socket
        {
            return Err(PipelineError::IncompatibleConnectors(format!(
                "{} -> {}: wrong connector roles",
                socket.id(),
                self.id()
            )));
        }

        if self.is_connected() {
            self.disconnect()?;
        }

        *self.slot().remote.borrow_mut() = Some(socket.clone());
        socket.slot().requesting.borrow_mut().push(PlugLink {
            node: Rc::downgrade(self.node.inner_rc()),
            index: self.index,
        });

        let event = PortEvent {
            plug: self.id(),
            socket: socket.id(),
        };
        tracing::debug!("Connected socket {} to plug {}", event.socket, event.plug);
        socket.node().signals().signal(SignalKind::Connected, Some(&event));
        Ok(())
    }

    /// Release the connection. Disconnecting twice is an error.
    pub fn disconnect(&self) -> PipelineResult<()> {
        let Some(socket) = self.slot().remote.borrow_mut().take() else {
            return Err(PipelineError::NotConnected(self.id()));
        };
        socket.slot().unlink(Rc::as_ptr(self.node.inner_rc()), self.index);

        let event = PortEvent {
            plug: self.id(),
            socket: socket.id(),
        };
        tracing::debug!("Released socket {} from plug {}", event.socket, event.plug);
        socket.node().signals().signal(SignalKind::Released, Some(&event));
        Ok(())
    }
}

impl PartialEq for Plug {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.index == other.index
    }
}

impl Eq for Plug {}

impl fmt::Debug for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plug({})", self.id())
    }
}

/// Handle to one output of a node. Holding it keeps the node alive.
#[derive(Clone)]
pub struct Socket {
    node: FilterNode,
    index: usize,
}

impl Socket {
    pub(crate) fn new(node: FilterNode, index: usize) -> Self {
        Self { node, index }
    }

    pub(crate) fn slot(&self) -> &SocketSlot {
        &self.node.inner().sockets[self.index]
    }

    pub fn id(&self) -> PortId {
        PortId::new(self.node.id(), self.index as u16)
    }

    pub fn node(&self) -> &FilterNode {
        &self.node
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn connector(&self) -> &Rc<Connector> {
        &self.slot().connector
    }

    /// The artifact produced at this socket.
    pub fn data(&self) -> Option<Rc<Image>> {
        self.slot().data.borrow().clone()
    }

    /// Live plugs reading from this socket, in connection order.
    pub fn requesting_plugs(&self) -> Vec<Plug> {
        self.slot()
            .requesting
            .borrow()
            .iter()
            .filter_map(|link| {
                let node = FilterNode::from_inner(link.node.upgrade()?);
                Some(Plug::new(node, link.index))
            })
            .collect()
    }

    pub fn requesting_count(&self) -> usize {
        self.slot()
            .requesting
            .borrow()
            .iter()
            .filter(|link| link.node.strong_count() > 0)
            .count()
    }
}

impl PartialEq for Socket {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.index == other.index
    }
}

impl Eq for Socket {}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Socket({})", self.id())
    }
}
