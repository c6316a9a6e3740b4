// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted scene format.
//!
//! A scene file is JSON holding a version tag, node records and connection
//! records. Node positions are carried only for round-tripping. Connection
//! direction tags are checked on load but never drive compatibility.

use crate::graph::{ConnectionError, Graph, GraphError};
use crate::node::{Node, NodeId, NodeKind, PropertyValue};
use crate::socket::{SocketDirection, SocketRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Scene format version written by this crate
pub const SCENE_VERSION: &str = "1.0";

/// Producer tag written into every scene
pub const SCENE_CASE_TYPE: &str = "openfoam_case_generator";

/// Serialized scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    /// Format version
    pub version: String,
    /// Producer tag
    #[serde(default = "default_case_type")]
    pub case_type: String,
    /// Node records in graph order
    pub nodes: Vec<NodeRecord>,
    /// Connection records in creation order
    pub connections: Vec<ConnectionRecord>,
}

fn default_case_type() -> String {
    SCENE_CASE_TYPE.to_string()
}

/// Canvas position of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID, a UUID for scenes written here
    pub id: String,
    /// Node kind tag
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Canvas position
    pub position: Position,
    /// Name and properties
    #[serde(default)]
    pub pyvnt_data: NodeData,
}

/// Property bag of a serialized node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Display name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Properties in schema order
    #[serde(flatten)]
    pub properties: IndexMap<String, PropertyValue>,
}

/// Serialized connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Source node ID
    pub start_node: String,
    /// Target node ID
    pub end_node: String,
    /// Source output socket index
    pub start_socket: usize,
    /// Target input socket index
    pub end_socket: usize,
    /// Source socket direction tag
    #[serde(default = "output_tag")]
    pub start_socket_type: String,
    /// Target socket direction tag
    #[serde(default = "input_tag")]
    pub end_socket_type: String,
}

fn output_tag() -> String {
    SocketDirection::Output.tag().to_string()
}

fn input_tag() -> String {
    SocketDirection::Input.tag().to_string()
}

impl SceneFile {
    /// Capture a graph
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeRecord {
                id: node.id.to_string(),
                kind: node.kind(),
                position: Position {
                    x: node.position[0],
                    y: node.position[1],
                },
                pyvnt_data: NodeData {
                    name: node.name().to_string(),
                    properties: node.properties().clone(),
                },
            })
            .collect();

        let connections = graph
            .connections()
            .map(|c| ConnectionRecord {
                start_node: c.from.node.to_string(),
                end_node: c.to.node.to_string(),
                start_socket: c.from.index,
                end_socket: c.to.index,
                start_socket_type: output_tag(),
                end_socket_type: input_tag(),
            })
            .collect();

        Self {
            version: SCENE_VERSION.to_string(),
            case_type: SCENE_CASE_TYPE.to_string(),
            nodes,
            connections,
        }
    }

    /// Rebuild a graph.
    ///
    /// IDs that are not UUIDs get fresh ones. Every connection goes through
    /// the same checks as an interactive edit.
    pub fn to_graph(&self) -> Result<Graph, SceneError> {
        if self.version != SCENE_VERSION {
            return Err(SceneError::UnsupportedVersion(self.version.clone()));
        }

        let mut graph = Graph::new();
        let mut ids: HashMap<&str, NodeId> = HashMap::new();

        for record in &self.nodes {
            let id = Uuid::parse_str(&record.id).map(NodeId).unwrap_or_else(|_| NodeId::new());
            if ids.insert(record.id.as_str(), id).is_some() {
                return Err(SceneError::DuplicateNodeId(record.id.clone()));
            }

            let node = Node::new(record.kind)
                .with_id(id)
                .with_name(record.pyvnt_data.name.clone())
                .with_position(record.position.x, record.position.y);
            graph.add_node(node);

            // Schema order: options before the selection that must match one
            for key in record.kind.default_properties().keys() {
                let Some(value) = record.pyvnt_data.properties.get(key) else {
                    continue;
                };
                let expected = graph
                    .node(id)
                    .and_then(|n| n.property(key))
                    .map(PropertyValue::property_type);
                let value = match expected {
                    Some(target) => value.clone().coerce(target),
                    None => value.clone(),
                };
                graph
                    .set_property(id, key, value)
                    .map_err(|source| SceneError::Property {
                        node: record.id.clone(),
                        source,
                    })?;
            }
        }

        for record in &self.connections {
            if record.start_socket_type != output_tag() || record.end_socket_type != input_tag() {
                return Err(SceneError::DirectionTag {
                    start: record.start_socket_type.clone(),
                    end: record.end_socket_type.clone(),
                });
            }
            let from = ids
                .get(record.start_node.as_str())
                .ok_or_else(|| SceneError::UnknownNode(record.start_node.clone()))?;
            let to = ids
                .get(record.end_node.as_str())
                .ok_or_else(|| SceneError::UnknownNode(record.end_node.clone()))?;
            graph.connect(
                SocketRef::new(*from, record.start_socket),
                SocketRef::new(*to, record.end_socket),
            )?;
        }

        Ok(graph)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Error when loading or saving a scene
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Malformed JSON
    #[error("Invalid scene JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown format version
    #[error("Unsupported scene version '{0}'")]
    UnsupportedVersion(String),

    /// Two node records share an ID
    #[error("Duplicate node id '{0}'")]
    DuplicateNodeId(String),

    /// Connection refers to a node that is not in the scene
    #[error("Connection refers to unknown node '{0}'")]
    UnknownNode(String),

    /// Connection record with swapped or unknown direction tags
    #[error("Connection direction tags '{start}' -> '{end}' are not output -> input")]
    DirectionTag {
        /// Start tag
        start: String,
        /// End tag
        end: String,
    },

    /// Property rejected by the node
    #[error("Node '{node}': {source}")]
    Property {
        /// Node record ID
        node: String,
        /// Underlying error
        source: GraphError,
    },

    /// Connection rejected by the graph
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;

    fn sample_graph() -> (Graph, NodeId) {
        let mut graph = Graph::new();
        let container = graph.create_node(NodeKind::Container, Some("solvers"));
        let key = graph.create_node(NodeKind::KeyValue, Some("solver"));
        let choice = graph.create_node(NodeKind::Enum, None);
        graph
            .set_property(choice, "options", PropertyValue::TextList(vec!["PCG".into(), "GAMG".into()]))
            .unwrap();
        graph.set_property(choice, "selected", PropertyValue::Text("GAMG".into())).unwrap();
        let tol = graph.create_node(NodeKind::KeyValue, Some("tolerance"));
        let value = graph.create_node(NodeKind::Float, None);
        graph.set_property(value, "value", PropertyValue::Float(1.0)).unwrap();
        graph.set_position(value, [120.0, -40.5]).unwrap();

        graph.connect(SocketRef::new(choice, 0), SocketRef::new(key, 0)).unwrap();
        graph.connect(SocketRef::new(value, 0), SocketRef::new(tol, 0)).unwrap();
        graph.connect(SocketRef::new(tol, 0), SocketRef::new(container, 0)).unwrap();
        graph.connect(SocketRef::new(key, 0), SocketRef::new(container, 0)).unwrap();
        (graph, container)
    }

    #[test]
    fn test_round_trip() {
        let (graph, container) = sample_graph();
        let scene = SceneFile::from_graph(&graph);
        let json = scene.to_json().unwrap();

        let loaded = SceneFile::from_json(&json).unwrap();
        assert_eq!(loaded, scene);

        let rebuilt = loaded.to_graph().unwrap();
        assert_eq!(rebuilt.node_ids().collect::<Vec<_>>(), graph.node_ids().collect::<Vec<_>>());
        for node in graph.nodes() {
            assert_eq!(rebuilt.node(node.id), Some(node));
        }
        assert_eq!(SceneFile::from_graph(&rebuilt), scene);
        assert_eq!(build(&rebuilt, container), build(&graph, container));
    }

    #[test]
    fn test_enum_round_trips_after_rejected_option_shrink() {
        let mut graph = Graph::new();
        let choice = graph.create_node(NodeKind::Enum, None);
        graph
            .set_property(choice, "options", PropertyValue::TextList(vec!["PCG".into(), "GAMG".into()]))
            .unwrap();
        graph.set_property(choice, "selected", PropertyValue::Text("GAMG".into())).unwrap();
        assert!(graph
            .set_property(choice, "options", PropertyValue::TextList(vec!["PCG".into()]))
            .is_err());

        let rebuilt = SceneFile::from_graph(&graph).to_graph().unwrap();
        assert_eq!(rebuilt.node(choice), graph.node(choice));
        assert_eq!(rebuilt.node(choice).map(|n| n.text_property("selected")), Some("GAMG"));
    }

    #[test]
    fn test_integral_float_survives_round_trip() {
        let (graph, _) = sample_graph();
        let json = SceneFile::from_graph(&graph).to_json().unwrap();
        // 1.0 may come back from JSON as an integer
        let rebuilt = SceneFile::from_json(&json).unwrap().to_graph().unwrap();
        let float = rebuilt.nodes().find(|n| n.kind() == NodeKind::Float).unwrap();
        assert_eq!(float.property("value"), Some(&PropertyValue::Float(1.0)));
    }

    #[test]
    fn test_json_shape() {
        let (graph, _) = sample_graph();
        let value = serde_json::to_value(SceneFile::from_graph(&graph)).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["nodes"][0]["type"], "Node_C");
        assert_eq!(value["nodes"][0]["pyvnt_data"]["name"], "solvers");
        assert_eq!(value["nodes"][2]["pyvnt_data"]["selected"], "GAMG");
        assert_eq!(value["connections"][0]["start_socket_type"], "output");
        assert_eq!(value["connections"][0]["end_socket_type"], "input");
    }

    #[test]
    fn test_foreign_ids_are_remapped() {
        let json = r#"{
            "version": "1.0",
            "nodes": [
                {"id": "node_1", "type": "Key_C", "position": {"x": 0, "y": 0}, "pyvnt_data": {"name": "nu"}},
                {"id": "node_2", "type": "Flt_P", "position": {"x": 0, "y": 0}, "pyvnt_data": {"value": 2}}
            ],
            "connections": [
                {"start_node": "node_2", "end_node": "node_1", "start_socket": 0, "end_socket": 0,
                 "start_socket_type": "output", "end_socket_type": "input"}
            ]
        }"#;

        let graph = SceneFile::from_json(json).unwrap().to_graph().unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connection_count(), 1);
        let float = graph.nodes().find(|n| n.kind() == NodeKind::Float).unwrap();
        assert_eq!(float.property("value"), Some(&PropertyValue::Float(2.0)));
    }

    #[test]
    fn test_invalid_connection_is_rejected() {
        let json = r#"{
            "version": "1.0",
            "nodes": [
                {"id": "a", "type": "Str_P", "position": {"x": 0, "y": 0}},
                {"id": "b", "type": "Vector_P", "position": {"x": 0, "y": 0}}
            ],
            "connections": [
                {"start_node": "a", "end_node": "b", "start_socket": 0, "end_socket": 0}
            ]
        }"#;

        let err = SceneFile::from_json(json).unwrap().to_graph().unwrap_err();
        assert!(matches!(err, SceneError::Connection(ConnectionError::TypeMismatch { .. })));
    }

    #[test]
    fn test_unknown_version() {
        let mut scene = SceneFile::from_graph(&Graph::new());
        scene.version = "2.0".into();
        assert!(matches!(scene.to_graph(), Err(SceneError::UnsupportedVersion(_))));
    }
}
