// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recursive descent from a root node to a [`Document`].
//!
//! The builder dispatches on [`NodeKind`] with a single exhaustive match.
//! It never substitutes defaults: a missing input is an error even when
//! validation should already have reported it.

use crate::connection::ConnectionId;
use crate::document::{Document, Scalar};
use crate::graph::Graph;
use crate::node::{
    Node, NodeId, NodeKind, PropertyValue, DIMENSION_COMPONENTS, TENSOR_COMPONENTS,
    VECTOR_COMPONENTS,
};
use crate::socket::SocketRef;
use crate::validation::Validation;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Builds documents from a graph
pub struct DocumentBuilder<'a> {
    graph: &'a Graph,
    /// Validation result used to skip blocked container children
    prune: Option<&'a Validation>,
}

impl<'a> DocumentBuilder<'a> {
    /// Create a strict builder
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph, prune: None }
    }

    /// Skip container children that `validation` blocked.
    ///
    /// Used for partial single-file generation only.
    pub fn pruned_by(mut self, validation: &'a Validation) -> Self {
        self.prune = Some(validation);
        self
    }

    /// Build the document produced by `root`
    pub fn build(&self, root: NodeId) -> Result<Document, BuildError> {
        let mut visiting = HashSet::new();
        self.build_node(root, &mut visiting)
    }

    fn build_node(&self, node_id: NodeId, visiting: &mut HashSet<NodeId>) -> Result<Document, BuildError> {
        let node = self
            .graph
            .node(node_id)
            .ok_or(BuildError::NodeNotFound(node_id))?;

        if !visiting.insert(node_id) {
            return Err(BuildError::Cycle(node_id));
        }
        let result = self.build_kind(node, visiting);
        visiting.remove(&node_id);
        result
    }

    fn build_kind(&self, node: &Node, visiting: &mut HashSet<NodeId>) -> Result<Document, BuildError> {
        match node.kind() {
            NodeKind::Int => match node.property("value") {
                Some(PropertyValue::Int(value)) => Ok(Scalar::Int(*value).into()),
                _ => Err(BuildError::MissingProperty(node.id, "value")),
            },
            NodeKind::Float => match node.property("value") {
                Some(PropertyValue::Float(value)) => Ok(Scalar::Float(*value).into()),
                _ => Err(BuildError::MissingProperty(node.id, "value")),
            },
            NodeKind::Str => Ok(Scalar::Str(node.text_property("value").to_string()).into()),
            NodeKind::Enum => {
                let selected = node.text_property("selected");
                if selected.is_empty() {
                    return Err(BuildError::UnsetSelection(node.id));
                }
                Ok(Scalar::Word(selected.to_string()).into())
            }
            NodeKind::KeyValue => {
                let name = self.key_name(node)?;
                let value = self.build_input(node, 0, visiting)?;
                Ok(Document::entry(name, value))
            }
            NodeKind::Container => {
                let name = self.key_name(node)?;
                let entries = self.fold_children(node, visiting)?;
                Ok(Document::entry(name, Document::Mapping(entries)))
            }
            NodeKind::List => {
                let items = self
                    .incoming(node.id, 0)
                    .into_iter()
                    .map(|(_, child)| self.build_node(child, visiting))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Document::List(items))
            }
            NodeKind::Vector => {
                let values = self.components(node, &VECTOR_COMPONENTS, visiting)?;
                Ok(Scalar::Vector([values[0], values[1], values[2]]).into())
            }
            NodeKind::Tensor => {
                let values = self.components(node, &TENSOR_COMPONENTS, visiting)?;
                let mut tensor = [0.0; 9];
                tensor.copy_from_slice(&values);
                Ok(Scalar::Tensor(tensor).into())
            }
            NodeKind::Dimensioned => {
                let values = self.components(node, &DIMENSION_COMPONENTS, visiting)?;
                let mut dimensions = [0.0; 7];
                dimensions.copy_from_slice(&values);
                let value_socket = DIMENSION_COMPONENTS.len();
                let value = match self.incoming(node.id, value_socket).first() {
                    Some((_, child)) => Some(self.number(node, "value", *child, visiting)?),
                    None => None,
                };
                Ok(Scalar::Dimensioned { dimensions, value }.into())
            }
            NodeKind::FileOutput => self.build_input(node, 0, visiting),
            NodeKind::CaseOutput => Err(BuildError::NotBuildable(node.kind())),
        }
    }

    fn key_name(&self, node: &Node) -> Result<String, BuildError> {
        if node.has_blank_name() {
            return Err(BuildError::EmptyName(node.id));
        }
        Ok(node.name().to_string())
    }

    /// Source nodes of the connections into one input socket, in creation order
    fn incoming(&self, node_id: NodeId, index: usize) -> Vec<(ConnectionId, NodeId)> {
        self.graph
            .connections_into(SocketRef::new(node_id, index))
            .map(|c| (c.id, c.from.node))
            .collect()
    }

    fn build_input(
        &self,
        node: &Node,
        index: usize,
        visiting: &mut HashSet<NodeId>,
    ) -> Result<Document, BuildError> {
        let Some((_, child)) = self.incoming(node.id, index).first().copied() else {
            let socket = node.input(index).map(|s| s.name.clone()).unwrap_or_default();
            return Err(BuildError::MissingInput { node: node.id, socket });
        };
        self.build_node(child, visiting)
    }

    fn fold_children(
        &self,
        node: &Node,
        visiting: &mut HashSet<NodeId>,
    ) -> Result<IndexMap<String, Document>, BuildError> {
        let mut entries: IndexMap<String, Document> = IndexMap::new();

        for (connection, child) in self.incoming(node.id, 0) {
            if self.prune.is_some_and(|v| v.is_blocked(connection)) {
                continue;
            }
            let Document::Mapping(built) = self.build_node(child, visiting)? else {
                return Err(BuildError::NotAnEntry(child));
            };
            for (key, value) in built {
                // First occurrence wins
                entries.entry(key).or_insert(value);
            }
        }

        let order = node
            .property("element_order")
            .and_then(PropertyValue::as_text_list)
            .unwrap_or_default();
        if order.is_empty() {
            return Ok(entries);
        }

        let mut ordered = IndexMap::with_capacity(entries.len());
        for name in order {
            if let Some(value) = entries.shift_remove(name) {
                ordered.insert(name.clone(), value);
            }
        }
        ordered.extend(entries);
        Ok(ordered)
    }

    fn components(
        &self,
        node: &Node,
        names: &[&'static str],
        visiting: &mut HashSet<NodeId>,
    ) -> Result<Vec<f64>, BuildError> {
        names
            .iter()
            .copied()
            .enumerate()
            .map(|(index, name)| {
                let Some((_, child)) = self.incoming(node.id, index).first().copied() else {
                    return Err(BuildError::MissingComponent { node: node.id, component: name });
                };
                self.number(node, name, child, visiting)
            })
            .collect()
    }

    fn number(
        &self,
        node: &Node,
        component: &'static str,
        child: NodeId,
        visiting: &mut HashSet<NodeId>,
    ) -> Result<f64, BuildError> {
        match self.build_node(child, visiting)? {
            Document::Scalar(scalar) => scalar
                .as_number()
                .ok_or(BuildError::NonNumericComponent { node: node.id, component }),
            _ => Err(BuildError::NonNumericComponent { node: node.id, component }),
        }
    }
}

/// Build a document strictly
pub fn build(graph: &Graph, root: NodeId) -> Result<Document, BuildError> {
    DocumentBuilder::new(graph).build(root)
}

/// Error when building a document
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node reached again while it is being built
    #[error("Node {0} is part of a cycle")]
    Cycle(NodeId),

    /// Key or container without a name
    #[error("Node {0} has no name")]
    EmptyName(NodeId),

    /// Required input without a connection
    #[error("Node {node} has no connection on input '{socket}'")]
    MissingInput {
        /// Node
        node: NodeId,
        /// Socket name
        socket: String,
    },

    /// Composite component without a connection
    #[error("Node {node} is missing component '{component}'")]
    MissingComponent {
        /// Composite node
        node: NodeId,
        /// Component name
        component: &'static str,
    },

    /// Composite component that is not a number
    #[error("Component '{component}' of node {node} is not a number")]
    NonNumericComponent {
        /// Composite node
        node: NodeId,
        /// Component name
        component: &'static str,
    },

    /// Enumeration without a selected option
    #[error("Enumeration {0} has no selected option")]
    UnsetSelection(NodeId),

    /// Parameter missing its value property
    #[error("Node {0} has no '{1}' property")]
    MissingProperty(NodeId, &'static str),

    /// Container child that does not produce a keyed entry
    #[error("Node {0} does not produce a keyed entry")]
    NotAnEntry(NodeId),

    /// Kind that has no document of its own
    #[error("{0} nodes do not produce a document")]
    NotBuildable(NodeKind),
}
