// SPDX-License-Identifier: MIT OR Apache-2.0
//! Instantiating parsed fragments.
//!
//! A case parser hands over node descriptions and connection hints. They are
//! instantiated with the same checks as hand-built nodes and edges, and
//! either all of them land in the graph or none do.

use crate::connection::ConnectionId;
use crate::document::{Document, Scalar};
use crate::graph::{ConnectionError, Graph, GraphError};
use crate::node::{
    Node, NodeId, NodeKind, PropertyValue, DIMENSION_COMPONENTS, TENSOR_COMPONENTS,
    VECTOR_COMPONENTS,
};
use crate::socket::SocketRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Horizontal distance between tree levels on the canvas
const LEVEL_SPACING: f32 = 180.0;
/// Vertical distance between siblings on the canvas
const ROW_SPACING: f32 = 50.0;

/// A node to create, identified by a fragment-local key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Fragment-local key referenced by connection hints
    pub key: String,
    /// Node kind
    pub kind: NodeKind,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Property values to set, in the order given
    #[serde(default)]
    pub properties: IndexMap<String, PropertyValue>,
    /// Canvas position
    #[serde(default)]
    pub position: [f32; 2],
}

/// An edge to create between two described nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHint {
    /// Source node key
    pub from: String,
    /// Source output socket index
    pub from_socket: usize,
    /// Target node key
    pub to: String,
    /// Target input socket index
    pub to_socket: usize,
}

/// Parsed nodes and edges ready to be instantiated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Nodes, in creation order
    pub nodes: Vec<NodeDescription>,
    /// Edges, in creation order
    pub connections: Vec<ConnectionHint>,
}

/// What an instantiated fragment added to the graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instantiated {
    /// Created nodes, in creation order
    pub nodes: Vec<NodeId>,
    /// Created connections, in creation order
    pub connections: Vec<ConnectionId>,
    /// Fragment keys mapped to the created node IDs
    pub keys: HashMap<String, NodeId>,
}

impl Fragment {
    /// Describe the nodes that would build `document`.
    ///
    /// Each top-level entry of a mapping becomes a root; a bare value becomes
    /// a single parameter or composite node.
    pub fn from_document(document: &Document) -> Result<Self, ImportError> {
        let mut lowering = Lowering::default();
        match document {
            Document::Mapping(entries) => {
                for (name, value) in entries {
                    lowering.entry(name, value, 0)?;
                }
            }
            other => {
                lowering.value(other, 0)?;
            }
        }
        let depth = lowering.max_depth;
        for node in &mut lowering.fragment.nodes {
            node.position[0] = (depth as f32 - node.position[0]) * LEVEL_SPACING;
        }
        Ok(lowering.fragment)
    }

    /// Keys of nodes nothing in the fragment consumes
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| !self.connections.iter().any(|c| c.from == n.key))
            .map(|n| n.key.as_str())
            .collect()
    }

    /// Add every described node and edge to `graph`.
    ///
    /// On error the graph is left untouched.
    pub fn instantiate(&self, graph: &mut Graph) -> Result<Instantiated, ImportError> {
        let mut scratch = graph.clone();
        let mut result = Instantiated::default();

        for description in &self.nodes {
            if result.keys.contains_key(&description.key) {
                return Err(ImportError::DuplicateKey(description.key.clone()));
            }
            let node = Node::new(description.kind)
                .with_name(description.name.clone())
                .with_position(description.position[0], description.position[1]);
            let id = scratch.add_node(node);
            for (key, value) in &description.properties {
                scratch
                    .set_property(id, key, value.clone())
                    .map_err(|source| ImportError::Property {
                        key: description.key.clone(),
                        source,
                    })?;
            }
            result.keys.insert(description.key.clone(), id);
            result.nodes.push(id);
        }

        for hint in &self.connections {
            let from = result
                .keys
                .get(&hint.from)
                .ok_or_else(|| ImportError::UnknownKey(hint.from.clone()))?;
            let to = result
                .keys
                .get(&hint.to)
                .ok_or_else(|| ImportError::UnknownKey(hint.to.clone()))?;
            let id = scratch.connect(
                SocketRef::new(*from, hint.from_socket),
                SocketRef::new(*to, hint.to_socket),
            )?;
            result.connections.push(id);
        }

        *graph = scratch;
        Ok(result)
    }
}

#[derive(Default)]
struct Lowering {
    fragment: Fragment,
    max_depth: usize,
    rows: HashMap<usize, usize>,
}

impl Lowering {
    fn push(&mut self, kind: NodeKind, name: &str, depth: usize) -> String {
        let key = format!("n{}", self.fragment.nodes.len());
        let row = self.rows.entry(depth).or_insert(0);
        // Depth is stored in x and flipped once the tree is complete
        let position = [depth as f32, *row as f32 * ROW_SPACING];
        *row += 1;
        self.max_depth = self.max_depth.max(depth);
        self.fragment.nodes.push(NodeDescription {
            key: key.clone(),
            kind,
            name: name.to_string(),
            properties: IndexMap::new(),
            position,
        });
        key
    }

    fn set(&mut self, key: &str, property: &str, value: PropertyValue) {
        if let Some(node) = self.fragment.nodes.iter_mut().find(|n| n.key == key) {
            node.properties.insert(property.to_string(), value);
        }
    }

    fn link(&mut self, from: &str, to: &str, to_socket: usize) {
        self.fragment.connections.push(ConnectionHint {
            from: from.to_string(),
            from_socket: 0,
            to: to.to_string(),
            to_socket,
        });
    }

    /// Lower `name: value` to a container or key node
    fn entry(&mut self, name: &str, value: &Document, depth: usize) -> Result<String, ImportError> {
        if let Document::Mapping(children) = value {
            let container = self.push(NodeKind::Container, name, depth);
            for (child_name, child) in children {
                let child = self.entry(child_name, child, depth + 1)?;
                self.link(&child, &container, 0);
            }
            return Ok(container);
        }

        let key = self.push(NodeKind::KeyValue, name, depth);
        let child = self.value(value, depth + 1)?;
        self.link(&child, &key, 0);
        Ok(key)
    }

    /// Lower a value to a parameter, composite or list node
    fn value(&mut self, value: &Document, depth: usize) -> Result<String, ImportError> {
        match value {
            Document::Scalar(scalar) => self.scalar(scalar, depth),
            Document::List(items) => {
                let list = self.push(NodeKind::List, "", depth);
                for item in items {
                    let element = match item {
                        Document::Mapping(map) if map.len() == 1 => {
                            let (name, value) = map
                                .first()
                                .ok_or(ImportError::UnsupportedListItem(map.len()))?;
                            self.entry(name, value, depth + 1)?
                        }
                        Document::Mapping(map) => {
                            return Err(ImportError::UnsupportedListItem(map.len()));
                        }
                        other => self.value(other, depth + 1)?,
                    };
                    self.link(&element, &list, 0);
                }
                Ok(list)
            }
            Document::Mapping(map) => Err(ImportError::UnsupportedListItem(map.len())),
        }
    }

    fn scalar(&mut self, scalar: &Scalar, depth: usize) -> Result<String, ImportError> {
        let key = match scalar {
            Scalar::Int(value) => {
                let key = self.push(NodeKind::Int, "", depth);
                self.set(&key, "value", PropertyValue::Int(*value));
                key
            }
            Scalar::Float(value) => self.float(*value, depth),
            Scalar::Str(value) => {
                let key = self.push(NodeKind::Str, "", depth);
                self.set(&key, "value", PropertyValue::Text(value.clone()));
                key
            }
            Scalar::Word(word) => {
                let key = self.push(NodeKind::Enum, "", depth);
                self.set(&key, "options", PropertyValue::TextList(vec![word.clone()]));
                self.set(&key, "selected", PropertyValue::Text(word.clone()));
                key
            }
            Scalar::Vector(values) => self.composite(NodeKind::Vector, VECTOR_COMPONENTS.len(), values, depth),
            Scalar::Tensor(values) => self.composite(NodeKind::Tensor, TENSOR_COMPONENTS.len(), values, depth),
            Scalar::Dimensioned { dimensions, value } => {
                let key = self.composite(NodeKind::Dimensioned, DIMENSION_COMPONENTS.len(), dimensions, depth);
                if let Some(value) = value {
                    let component = self.float(*value, depth + 1);
                    self.link(&component, &key, DIMENSION_COMPONENTS.len());
                }
                key
            }
        };
        Ok(key)
    }

    fn float(&mut self, value: f64, depth: usize) -> String {
        let key = self.push(NodeKind::Float, "", depth);
        self.set(&key, "value", PropertyValue::Float(value));
        key
    }

    fn composite(&mut self, kind: NodeKind, arity: usize, values: &[f64], depth: usize) -> String {
        let key = self.push(kind, "", depth);
        for (socket, value) in values.iter().take(arity).enumerate() {
            let component = self.float(*value, depth + 1);
            self.link(&component, &key, socket);
        }
        key
    }
}

/// Error when instantiating a fragment
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImportError {
    /// Two descriptions share a key
    #[error("Fragment key '{0}' is used twice")]
    DuplicateKey(String),

    /// Connection hint names a key that is not described
    #[error("Connection hint refers to unknown key '{0}'")]
    UnknownKey(String),

    /// Property rejected by the node
    #[error("Node '{key}': {source}")]
    Property {
        /// Fragment key
        key: String,
        /// Underlying error
        source: GraphError,
    },

    /// Connection rejected by the graph
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// List element that is a mapping with other than one entry
    #[error("List elements must be values or single entries, found a mapping with {0} entries")]
    UnsupportedListItem(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;

    fn transport_properties() -> Document {
        let mut inner = IndexMap::new();
        inner.insert("transportModel".to_string(), Document::from(Scalar::Word("Newtonian".into())));
        inner.insert(
            "nu".to_string(),
            Scalar::Dimensioned {
                dimensions: [0.0, 2.0, -1.0, 0.0, 0.0, 0.0, 0.0],
                value: Some(1e-5),
            }
            .into(),
        );
        inner.insert(
            "inlet".to_string(),
            Document::List(vec![Scalar::Vector([1.0, 0.0, 0.0]).into(), Scalar::Int(2).into()]),
        );
        Document::entry("transportProperties", Document::Mapping(inner))
    }

    #[test]
    fn test_document_round_trips_through_graph() {
        let document = transport_properties();
        let fragment = Fragment::from_document(&document).unwrap();
        assert_eq!(fragment.roots(), ["n0"]);

        let mut graph = Graph::new();
        let created = fragment.instantiate(&mut graph).unwrap();
        assert_eq!(created.nodes.len(), fragment.nodes.len());
        assert_eq!(created.connections.len(), fragment.connections.len());

        let root = created.keys["n0"];
        assert_eq!(build(&graph, root).unwrap(), document);
    }

    #[test]
    fn test_roots_are_placed_right_of_children() {
        let fragment = Fragment::from_document(&transport_properties()).unwrap();
        let root = &fragment.nodes[0];
        assert!(fragment.nodes[1..].iter().all(|n| n.position[0] < root.position[0]));
    }

    #[test]
    fn test_failed_instantiation_leaves_graph_untouched() {
        let mut graph = Graph::new();
        graph.create_node(NodeKind::Container, Some("existing"));
        let revision = graph.revision();

        let fragment = Fragment {
            nodes: vec![
                NodeDescription {
                    key: "text".into(),
                    kind: NodeKind::Str,
                    name: String::new(),
                    properties: IndexMap::new(),
                    position: [0.0, 0.0],
                },
                NodeDescription {
                    key: "vec".into(),
                    kind: NodeKind::Vector,
                    name: String::new(),
                    properties: IndexMap::new(),
                    position: [0.0, 0.0],
                },
            ],
            connections: vec![ConnectionHint {
                from: "text".into(),
                from_socket: 0,
                to: "vec".into(),
                to_socket: 0,
            }],
        };

        let err = fragment.instantiate(&mut graph).unwrap_err();
        assert!(matches!(err, ImportError::Connection(ConnectionError::TypeMismatch { .. })));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.revision(), revision);
    }

    #[test]
    fn test_unknown_key() {
        let fragment = Fragment {
            nodes: vec![],
            connections: vec![ConnectionHint {
                from: "a".into(),
                from_socket: 0,
                to: "b".into(),
                to_socket: 0,
            }],
        };
        assert_eq!(
            fragment.instantiate(&mut Graph::new()),
            Err(ImportError::UnknownKey("a".into()))
        );
    }
}
