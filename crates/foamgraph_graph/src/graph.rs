// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.
//!
//! The graph is a plain adjacency structure. Connection order is significant:
//! fan-in sockets (container children, list elements) read their inputs in
//! the order the connections were created. Cycles are allowed while editing
//! and are rejected by validation.

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeError, NodeId, NodeKind, PropertyValue};
use crate::socket::{SocketCapacity, SocketDirection, SocketRef, SocketType};
use indexmap::IndexMap;

/// A node graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes, in creation order
    connections: IndexMap<ConnectionId, Connection>,
    /// Bumped on every mutation
    revision: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutation counter; any edit changes it
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Create a node of `kind` with an optional initial name
    pub fn create_node(&mut self, kind: NodeKind, name: Option<&str>) -> NodeId {
        let node = Node::new(kind).with_name(name.unwrap_or_default());
        self.add_node(node)
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        self.touch();
        id
    }

    /// Remove a node and its connections.
    ///
    /// The removed connections are returned with their former positions so
    /// the removal can be reverted exactly.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<RemovedNode> {
        let index = self.nodes.get_index_of(&node_id)?;

        let mut connections = Vec::new();
        let mut position = 0;
        self.connections.retain(|_, c| {
            let keep = !c.involves_node(node_id);
            if !keep {
                connections.push((position, c.clone()));
            }
            position += 1;
            keep
        });

        let node = self.nodes.shift_remove(&node_id)?;
        self.touch();
        Some(RemovedNode {
            index,
            node,
            connections,
        })
    }

    /// Put a removed node back at its former position, with its connections
    pub fn restore_node(&mut self, removed: RemovedNode) {
        let RemovedNode {
            index,
            node,
            connections,
        } = removed;
        let index = index.min(self.nodes.len());
        self.nodes.shift_insert(index, node.id, node);
        for (position, connection) in connections {
            self.restore_connection(position, connection);
        }
        self.touch();
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Position of a node in creation order
    pub fn node_index(&self, node_id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All terminal output nodes
    pub fn output_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.kind().is_output())
    }

    fn node_mut(&mut self, node_id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))
    }

    /// Rename a node, returning the previous name
    pub fn rename(&mut self, node_id: NodeId, name: impl Into<String>) -> Result<String, GraphError> {
        let previous = self.node_mut(node_id)?.rename(name)?;
        self.touch();
        Ok(previous)
    }

    /// Replace a name without the blank check (history replay)
    pub fn restore_name(&mut self, node_id: NodeId, name: String) -> Result<String, GraphError> {
        let previous = self.node_mut(node_id)?.restore_name(name);
        self.touch();
        Ok(previous)
    }

    /// Set a typed property, returning the previous value
    pub fn set_property(
        &mut self,
        node_id: NodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<PropertyValue, GraphError> {
        let previous = self.node_mut(node_id)?.set_property(key, value)?;
        self.touch();
        Ok(previous)
    }

    /// Move a node on the canvas
    pub fn set_position(&mut self, node_id: NodeId, position: [f32; 2]) -> Result<(), GraphError> {
        self.node_mut(node_id)?.position = position;
        Ok(())
    }

    /// Check whether `from` (an output) may be connected to `to` (an input)
    pub fn check_connection(&self, from: SocketRef, to: SocketRef) -> Result<(), ConnectionError> {
        // Validate nodes exist
        let source_node = self.nodes.get(&from.node)
            .ok_or(ConnectionError::NodeNotFound(from.node))?;
        let target_node = self.nodes.get(&to.node)
            .ok_or(ConnectionError::NodeNotFound(to.node))?;

        // Validate sockets exist
        let source = source_node.output(from.index)
            .ok_or(ConnectionError::SocketNotFound(from, SocketDirection::Output))?;
        let target = target_node.input(to.index)
            .ok_or(ConnectionError::SocketNotFound(to, SocketDirection::Input))?;

        if !source.can_connect(target) {
            return Err(ConnectionError::TypeMismatch {
                expected: target.socket_type,
                found: source.socket_type,
            });
        }

        if self.connections.values().any(|c| c.same_endpoints(from, to)) {
            return Err(ConnectionError::AlreadyConnected(from, to));
        }

        let count = self.connections_into(to).count();
        // Unbounded sockets always have room
        if !target.capacity.has_room(count) {
            return Err(match target.capacity {
                SocketCapacity::Multi(max) => ConnectionError::CapacityExceeded { socket: to, max },
                _ => ConnectionError::SocketOccupied(to),
            });
        }

        Ok(())
    }

    /// Add a connection from an output socket to an input socket.
    ///
    /// Cycles are not checked here; see [`crate::validation`].
    pub fn connect(&mut self, from: SocketRef, to: SocketRef) -> Result<ConnectionId, ConnectionError> {
        self.check_connection(from, to)?;

        let connection = Connection::new(from, to);
        let id = connection.id;
        self.connections.insert(id, connection);
        self.touch();
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.shift_remove(&connection_id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Re-insert a connection at a given position without checks (history replay)
    pub fn restore_connection(&mut self, index: usize, connection: Connection) {
        let index = index.min(self.connections.len());
        self.connections.shift_insert(index, connection.id, connection);
        self.touch();
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Position of a connection in creation order
    pub fn connection_index(&self, connection_id: ConnectionId) -> Option<usize> {
        self.connections.get_index_of(&connection_id)
    }

    /// Get all connections in creation order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections leaving an output socket
    pub fn connections_from(&self, socket: SocketRef) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.from == socket)
    }

    /// Get connections entering an input socket, in creation order
    pub fn connections_into(&self, socket: SocketRef) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.to == socket)
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Whether any output socket of `node_id` feeds a socket of `socket_type`
    pub fn feeds(&self, node_id: NodeId, socket_type: SocketType) -> bool {
        self.connections.values().any(|c| {
            c.from.node == node_id
                && self
                    .node(c.to.node)
                    .and_then(|n| n.input(c.to.index))
                    .is_some_and(|s| s.socket_type == socket_type)
        })
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// A node taken out of the graph together with its edges
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    /// Former position in node order
    pub index: usize,
    /// The node itself
    pub node: Node,
    /// Removed connections with their former positions, ascending
    pub connections: Vec<(usize, Connection)>,
}

/// Error when editing graph nodes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node rejected the edit
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Error when creating a connection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Socket not found
    #[error("No {dir} socket at {sock}", dir = .1.tag(), sock = .0)]
    SocketNotFound(SocketRef, SocketDirection),

    /// Incompatible socket types
    #[error("Type mismatch: input takes '{}', output gives '{}'", .expected.tag(), .found.tag())]
    TypeMismatch {
        /// Target socket type
        expected: SocketType,
        /// Source socket type
        found: SocketType,
    },

    /// Single-capacity input already connected
    #[error("Socket already connected: {0}")]
    SocketOccupied(SocketRef),

    /// Multi-capacity input at its maximum
    #[error("Socket {socket} accepts at most {max} connections")]
    CapacityExceeded {
        /// Target socket
        socket: SocketRef,
        /// Declared maximum
        max: usize,
    },

    /// Identical edge already present
    #[error("{0} is already connected to {1}")]
    AlreadyConnected(SocketRef, SocketRef),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_with_int(graph: &mut Graph, name: &str, value: i64) -> NodeId {
        let key = graph.create_node(NodeKind::KeyValue, Some(name));
        let int = graph.create_node(NodeKind::Int, None);
        graph.set_property(int, "value", PropertyValue::Int(value)).unwrap();
        graph.connect(SocketRef::new(int, 0), SocketRef::new(key, 0)).unwrap();
        key
    }

    #[test]
    fn test_connect_then_disconnect_restores_adjacency() {
        let mut graph = Graph::new();
        let container = graph.create_node(NodeKind::Container, Some("FoamFile"));
        let key = key_with_int(&mut graph, "x", 1);

        let before: Vec<Connection> = graph.connections().cloned().collect();
        let id = graph.connect(SocketRef::new(key, 0), SocketRef::new(container, 0)).unwrap();
        assert_eq!(graph.connections_into(SocketRef::new(container, 0)).count(), 1);

        graph.disconnect(id).unwrap();
        let after: Vec<Connection> = graph.connections().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(graph.connections_into(SocketRef::new(container, 0)).count(), 0);
        assert_eq!(graph.connections_from(SocketRef::new(key, 0)).count(), 0);
    }

    #[test]
    fn test_second_connect_into_single_socket_is_occupied() {
        let mut graph = Graph::new();
        let key = graph.create_node(NodeKind::KeyValue, Some("x"));
        let first = graph.create_node(NodeKind::Int, None);
        let second = graph.create_node(NodeKind::Float, None);

        let existing = graph.connect(SocketRef::new(first, 0), SocketRef::new(key, 0)).unwrap();
        let err = graph.connect(SocketRef::new(second, 0), SocketRef::new(key, 0)).unwrap_err();

        assert_eq!(err, ConnectionError::SocketOccupied(SocketRef::new(key, 0)));
        let remaining: Vec<_> = graph.connections_into(SocketRef::new(key, 0)).collect();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, existing);
        assert_eq!(remaining[0].from.node, first);
    }

    #[test]
    fn test_type_mismatch() {
        let mut graph = Graph::new();
        let vector = graph.create_node(NodeKind::Vector, None);
        let text = graph.create_node(NodeKind::Str, None);

        let err = graph.connect(SocketRef::new(text, 0), SocketRef::new(vector, 0)).unwrap_err();
        assert!(matches!(err, ConnectionError::TypeMismatch { .. }));
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_case_slot_capacity() {
        let mut graph = Graph::new();
        let case = graph.create_node(NodeKind::CaseOutput, None);
        let slot = SocketRef::new(case, 0);
        for _ in 0..crate::node::CASE_SLOT_CAPACITY {
            let file = graph.create_node(NodeKind::FileOutput, None);
            graph.connect(SocketRef::new(file, 0), slot).unwrap();
        }

        let extra = graph.create_node(NodeKind::FileOutput, None);
        let err = graph.connect(SocketRef::new(extra, 0), slot).unwrap_err();
        assert!(matches!(err, ConnectionError::CapacityExceeded { max: 4, .. }));
    }

    #[test]
    fn test_container_children_are_unbounded() {
        let mut graph = Graph::new();
        let container = graph.create_node(NodeKind::Container, Some("dict"));
        for i in 0..12 {
            let key = graph.create_node(NodeKind::KeyValue, Some(&format!("k{i}")));
            graph.connect(SocketRef::new(key, 0), SocketRef::new(container, 0)).unwrap();
        }
        assert_eq!(graph.connections_into(SocketRef::new(container, 0)).count(), 12);
    }

    #[test]
    fn test_cycles_are_allowed_while_editing() {
        let mut graph = Graph::new();
        let outer = graph.create_node(NodeKind::Container, Some("outer"));
        let inner = graph.create_node(NodeKind::Container, Some("inner"));
        graph.connect(SocketRef::new(inner, 0), SocketRef::new(outer, 0)).unwrap();
        assert!(graph.connect(SocketRef::new(outer, 0), SocketRef::new(inner, 0)).is_ok());
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let mut graph = Graph::new();
        let list = graph.create_node(NodeKind::List, None);
        let int = graph.create_node(NodeKind::Int, None);
        graph.connect(SocketRef::new(int, 0), SocketRef::new(list, 0)).unwrap();
        let err = graph.connect(SocketRef::new(int, 0), SocketRef::new(list, 0)).unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyConnected(..)));
    }

    #[test]
    fn test_remove_and_restore_node_keeps_order() {
        let mut graph = Graph::new();
        let container = graph.create_node(NodeKind::Container, Some("c"));
        let a = key_with_int(&mut graph, "a", 1);
        let b = key_with_int(&mut graph, "b", 2);
        graph.connect(SocketRef::new(a, 0), SocketRef::new(container, 0)).unwrap();
        graph.connect(SocketRef::new(b, 0), SocketRef::new(container, 0)).unwrap();

        let connections: Vec<Connection> = graph.connections().cloned().collect();
        let nodes: Vec<NodeId> = graph.node_ids().collect();

        let removed = graph.remove_node(a).unwrap();
        assert!(graph.node(a).is_none());
        assert_eq!(graph.connections_for_node(a).count(), 0);

        graph.restore_node(removed);
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), nodes);
        assert_eq!(graph.connections().cloned().collect::<Vec<_>>(), connections);
    }

    #[test]
    fn test_revision_changes_on_edit() {
        let mut graph = Graph::new();
        let start = graph.revision();
        let int = graph.create_node(NodeKind::Int, None);
        assert!(graph.revision() > start);

        let before = graph.revision();
        assert!(graph.set_property(int, "value", PropertyValue::Text("x".into())).is_err());
        assert_eq!(graph.revision(), before);
    }
}
