// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reversible graph edits.
//!
//! An [`Edit`] is recorded after it has been applied, carrying whatever it
//! needs to go both ways: removed nodes keep their position and their edges,
//! connections keep their index in creation order, property edits keep the
//! old value.

use crate::history::{HistoryError, OperationGroup};
use foamgraph_graph::{Connection, ConnectionId, Graph, GraphError, Node, NodeId, PropertyValue, RemovedNode};

/// Something that can be applied to a graph and reverted again
pub trait GraphCommand {
    /// Short description for the history list
    fn description(&self) -> String;

    /// Apply the change
    fn apply(&self, graph: &mut Graph) -> Result<(), CommandError>;

    /// Undo the change
    fn revert(&self, graph: &mut Graph) -> Result<(), CommandError>;
}

/// Error type for command execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Graph rejected the edit
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// History error
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Node to remove is gone
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Connection to remove is gone
    #[error("Connection not found: {0:?}")]
    ConnectionNotFound(ConnectionId),
}

/// One recorded edit
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// A node was added at the end of the node list
    CreateNode(Node),
    /// A node was removed together with its connections
    RemoveNode(RemovedNode),
    /// A connection was added
    Connect {
        /// Position in connection order
        index: usize,
        /// The connection
        connection: Connection,
    },
    /// A connection was removed
    Disconnect {
        /// Former position in connection order
        index: usize,
        /// The connection
        connection: Connection,
    },
    /// A property changed
    SetProperty {
        /// Edited node
        node: NodeId,
        /// Property key
        key: String,
        /// Old value
        before: PropertyValue,
        /// New value
        after: PropertyValue,
    },
    /// A node was renamed
    Rename {
        /// Edited node
        node: NodeId,
        /// Old name
        before: String,
        /// New name
        after: String,
    },
    /// A node was moved on the canvas
    Move {
        /// Moved node
        node: NodeId,
        /// Old position
        before: [f32; 2],
        /// New position
        after: [f32; 2],
    },
}

fn remove_node(graph: &mut Graph, node: NodeId) -> Result<(), CommandError> {
    graph
        .remove_node(node)
        .map(drop)
        .ok_or(CommandError::NodeNotFound(node))
}

fn disconnect(graph: &mut Graph, connection: ConnectionId) -> Result<(), CommandError> {
    graph
        .disconnect(connection)
        .map(drop)
        .ok_or(CommandError::ConnectionNotFound(connection))
}

impl GraphCommand for Edit {
    fn description(&self) -> String {
        match self {
            Edit::CreateNode(node) => format!("Create {}", node.kind().display_name()),
            Edit::RemoveNode(removed) => format!("Delete {}", removed.node.kind().display_name()),
            Edit::Connect { .. } => "Connect".to_string(),
            Edit::Disconnect { .. } => "Disconnect".to_string(),
            Edit::SetProperty { key, .. } => format!("Set {key}"),
            Edit::Rename { after, .. } => format!("Rename to '{after}'"),
            Edit::Move { .. } => "Move node".to_string(),
        }
    }

    fn apply(&self, graph: &mut Graph) -> Result<(), CommandError> {
        match self {
            Edit::CreateNode(node) => {
                graph.add_node(node.clone());
            }
            Edit::RemoveNode(removed) => remove_node(graph, removed.node.id)?,
            Edit::Connect { index, connection } => graph.restore_connection(*index, connection.clone()),
            Edit::Disconnect { connection, .. } => disconnect(graph, connection.id)?,
            Edit::SetProperty { node, key, after, .. } => {
                graph.set_property(*node, key, after.clone())?;
            }
            Edit::Rename { node, after, .. } => {
                graph.restore_name(*node, after.clone())?;
            }
            Edit::Move { node, after, .. } => graph.set_position(*node, *after)?,
        }
        Ok(())
    }

    fn revert(&self, graph: &mut Graph) -> Result<(), CommandError> {
        match self {
            Edit::CreateNode(node) => remove_node(graph, node.id)?,
            Edit::RemoveNode(removed) => graph.restore_node(removed.clone()),
            Edit::Connect { connection, .. } => disconnect(graph, connection.id)?,
            Edit::Disconnect { index, connection } => graph.restore_connection(*index, connection.clone()),
            Edit::SetProperty { node, key, before, .. } => {
                graph.set_property(*node, key, before.clone())?;
            }
            Edit::Rename { node, before, .. } => {
                graph.restore_name(*node, before.clone())?;
            }
            Edit::Move { node, before, .. } => graph.set_position(*node, *before)?,
        }
        Ok(())
    }
}

impl GraphCommand for OperationGroup {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn apply(&self, graph: &mut Graph) -> Result<(), CommandError> {
        self.edits.iter().try_for_each(|edit| edit.apply(graph))
    }

    fn revert(&self, graph: &mut Graph) -> Result<(), CommandError> {
        self.edits.iter().rev().try_for_each(|edit| edit.revert(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foamgraph_graph::{NodeKind, SocketRef};

    #[test]
    fn test_create_node_round_trip() {
        let mut graph = Graph::new();
        let node = Node::new(NodeKind::Int);
        let id = graph.add_node(node.clone());
        let edit = Edit::CreateNode(node);

        edit.revert(&mut graph).unwrap();
        assert!(graph.node(id).is_none());
        edit.apply(&mut graph).unwrap();
        assert!(graph.node(id).is_some());
    }

    #[test]
    fn test_remove_node_restores_connections_in_place() {
        let mut graph = Graph::new();
        let a = graph.create_node(NodeKind::Int, None);
        let b = graph.create_node(NodeKind::Int, None);
        let key = graph.create_node(NodeKind::KeyValue, Some("k"));
        let vector = graph.create_node(NodeKind::Vector, None);
        graph.connect(SocketRef::new(a, 0), SocketRef::new(vector, 0)).unwrap();
        graph.connect(SocketRef::new(vector, 0), SocketRef::new(key, 0)).unwrap();
        graph.connect(SocketRef::new(b, 0), SocketRef::new(vector, 1)).unwrap();
        let order: Vec<_> = graph.connections().map(|c| c.id).collect();

        let removed = graph.remove_node(vector).unwrap();
        assert_eq!(graph.connection_count(), 0);
        let edit = Edit::RemoveNode(removed);

        edit.revert(&mut graph).unwrap();
        assert_eq!(graph.node_index(vector), Some(3));
        assert_eq!(graph.connections().map(|c| c.id).collect::<Vec<_>>(), order);

        edit.apply(&mut graph).unwrap();
        assert!(graph.node(vector).is_none());
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut graph = Graph::new();
        let value = graph.create_node(NodeKind::Int, None);
        let key = graph.create_node(NodeKind::KeyValue, Some("x"));
        let id = graph.connect(SocketRef::new(value, 0), SocketRef::new(key, 0)).unwrap();
        let connection = graph.connection(id).cloned().unwrap();

        let edit = Edit::Connect { index: 0, connection };
        edit.revert(&mut graph).unwrap();
        assert_eq!(graph.connection_count(), 0);
        assert_eq!(edit.revert(&mut graph), Err(CommandError::ConnectionNotFound(id)));

        edit.apply(&mut graph).unwrap();
        assert!(graph.connection(id).is_some());
    }

    #[test]
    fn test_group_reverts_in_reverse_order() {
        let mut graph = Graph::new();
        let node = Node::new(NodeKind::KeyValue).with_name("a");
        let id = node.id;
        graph.add_node(node.clone());
        graph.rename(id, "b").unwrap();

        let mut group = OperationGroup::new(crate::history::OperationID(0), "Add key");
        group.push(Edit::CreateNode(node));
        group.push(Edit::Rename {
            node: id,
            before: "a".to_string(),
            after: "b".to_string(),
        });

        group.revert(&mut graph).unwrap();
        assert_eq!(graph.node_count(), 0);

        group.apply(&mut graph).unwrap();
        assert_eq!(graph.node(id).map(Node::name), Some("b"));
    }
}
