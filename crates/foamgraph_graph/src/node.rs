// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! Node kinds form a closed set. Each kind fixes its socket layout and its
//! property schema at creation time; neither can change afterwards.

use crate::socket::{Socket, SocketCapacity, SocketType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Labels of the whole-case output slots, in socket order
pub const CASE_SLOT_LABELS: [&str; 4] = ["System", "Constant", "Initial (0/)", "Other"];

/// Maximum number of file outputs one whole-case slot accepts
pub const CASE_SLOT_CAPACITY: usize = 4;

/// Vector component socket names
pub const VECTOR_COMPONENTS: [&str; 3] = ["x", "y", "z"];

/// Tensor component socket names, row-major
pub const TENSOR_COMPONENTS: [&str; 9] = ["xx", "xy", "xz", "yx", "yy", "yz", "zx", "zy", "zz"];

/// Dimension exponent socket names in OpenFOAM order
pub const DIMENSION_COMPONENTS: [&str; 7] = [
    "mass",
    "length",
    "time",
    "temperature",
    "moles",
    "current",
    "luminous_intensity",
];

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Dictionary structure (containers, keys, lists)
    Container,
    /// Leaf parameters (numbers, strings, enumerations)
    Parameter,
    /// Fixed-arity composites assembled from scalar components
    Composite,
    /// Terminal output nodes
    Output,
}

/// Closed set of node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Dictionary container (`name { ... }`)
    #[serde(rename = "Node_C")]
    Container,
    /// Key-value pair (`name value;`)
    #[serde(rename = "Key_C")]
    KeyValue,
    /// Integer parameter
    #[serde(rename = "Int_P")]
    Int,
    /// Floating point parameter
    #[serde(rename = "Flt_P")]
    Float,
    /// String parameter
    #[serde(rename = "Str_P")]
    Str,
    /// Enumerated choice
    #[serde(rename = "Enm_P")]
    Enum,
    /// Three-component vector
    #[serde(rename = "Vector_P")]
    Vector,
    /// Nine-component tensor
    #[serde(rename = "Tensor_P")]
    Tensor,
    /// Dimension set with an optional value
    #[serde(rename = "Dim_Set_P")]
    Dimensioned,
    /// Homogeneous list
    #[serde(rename = "List_CP")]
    List,
    /// Single-file output terminal
    #[serde(rename = "Output")]
    FileOutput,
    /// Whole-case output terminal
    #[serde(rename = "Case_Folder")]
    CaseOutput,
}

impl NodeKind {
    /// All node kinds
    pub fn all() -> &'static [NodeKind] {
        &[
            NodeKind::Container,
            NodeKind::KeyValue,
            NodeKind::Int,
            NodeKind::Float,
            NodeKind::Str,
            NodeKind::Enum,
            NodeKind::Vector,
            NodeKind::Tensor,
            NodeKind::Dimensioned,
            NodeKind::List,
            NodeKind::FileOutput,
            NodeKind::CaseOutput,
        ]
    }

    /// Display name of this kind
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Container => "Container",
            NodeKind::KeyValue => "Key",
            NodeKind::Int => "Integer",
            NodeKind::Float => "Float",
            NodeKind::Str => "String",
            NodeKind::Enum => "Enumeration",
            NodeKind::Vector => "Vector",
            NodeKind::Tensor => "Tensor",
            NodeKind::Dimensioned => "Dimension Set",
            NodeKind::List => "List",
            NodeKind::FileOutput => "Output",
            NodeKind::CaseOutput => "Case Folder",
        }
    }

    /// Category of this kind
    pub fn category(&self) -> NodeCategory {
        match self {
            NodeKind::Container | NodeKind::KeyValue | NodeKind::List => NodeCategory::Container,
            NodeKind::Int | NodeKind::Float | NodeKind::Str | NodeKind::Enum => {
                NodeCategory::Parameter
            }
            NodeKind::Vector | NodeKind::Tensor | NodeKind::Dimensioned => NodeCategory::Composite,
            NodeKind::FileOutput | NodeKind::CaseOutput => NodeCategory::Output,
        }
    }

    /// Whether nodes of this kind contribute a key and so need a name
    pub fn requires_name(&self) -> bool {
        matches!(self, NodeKind::Container | NodeKind::KeyValue)
    }

    /// Whether this kind is a terminal output node
    pub fn is_output(&self) -> bool {
        self.category() == NodeCategory::Output
    }

    /// Input sockets for this kind
    pub fn inputs(&self) -> Vec<Socket> {
        fn components(names: &[&str]) -> Vec<Socket> {
            names
                .iter()
                .map(|name| Socket::input(*name, SocketType::Scalar).required())
                .collect()
        }

        match self {
            NodeKind::Container => vec![
                Socket::input("Children", SocketType::Entry).with_capacity(SocketCapacity::Unbounded),
            ],
            NodeKind::KeyValue => vec![Socket::input("Value", SocketType::Value).required()],
            NodeKind::Int | NodeKind::Float | NodeKind::Str | NodeKind::Enum => vec![],
            NodeKind::Vector => components(&VECTOR_COMPONENTS),
            NodeKind::Tensor => components(&TENSOR_COMPONENTS),
            NodeKind::Dimensioned => {
                let mut sockets = components(&DIMENSION_COMPONENTS);
                sockets.push(Socket::input("value", SocketType::Scalar));
                sockets
            }
            NodeKind::List => vec![
                Socket::input("Elements", SocketType::Element).with_capacity(SocketCapacity::Unbounded),
            ],
            NodeKind::FileOutput => vec![Socket::input("Document", SocketType::Document).required()],
            NodeKind::CaseOutput => CASE_SLOT_LABELS
                .iter()
                .map(|label| {
                    Socket::input(*label, SocketType::CaseFile)
                        .with_capacity(SocketCapacity::Multi(CASE_SLOT_CAPACITY))
                })
                .collect(),
        }
    }

    /// Output sockets for this kind
    pub fn outputs(&self) -> Vec<Socket> {
        match self {
            NodeKind::Container | NodeKind::KeyValue => vec![Socket::output("Entry", SocketType::Entry)],
            NodeKind::Int | NodeKind::Float => vec![Socket::output("Value", SocketType::Scalar)],
            NodeKind::Str
            | NodeKind::Enum
            | NodeKind::Vector
            | NodeKind::Tensor
            | NodeKind::Dimensioned
            | NodeKind::List => vec![Socket::output("Value", SocketType::Value)],
            NodeKind::FileOutput => vec![Socket::output("File", SocketType::CaseFile)],
            NodeKind::CaseOutput => vec![],
        }
    }

    /// Declared properties with their default values
    pub fn default_properties(&self) -> IndexMap<String, PropertyValue> {
        let entries: Vec<(&str, PropertyValue)> = match self {
            NodeKind::Container => vec![("element_order", PropertyValue::TextList(Vec::new()))],
            NodeKind::Int => vec![("value", PropertyValue::Int(0))],
            NodeKind::Float => vec![("value", PropertyValue::Float(0.0))],
            NodeKind::Str => vec![("value", PropertyValue::Text(String::new()))],
            NodeKind::Enum => vec![
                ("options", PropertyValue::TextList(Vec::new())),
                ("labels", PropertyValue::TextList(Vec::new())),
                ("selected", PropertyValue::Text(String::new())),
            ],
            NodeKind::FileOutput => vec![
                ("path", PropertyValue::Text(String::new())),
                ("filename", PropertyValue::Text(String::new())),
            ],
            NodeKind::CaseOutput => vec![
                ("case_name", PropertyValue::Text(String::new())),
                ("overwrite", PropertyValue::Bool(false)),
            ],
            NodeKind::KeyValue
            | NodeKind::Vector
            | NodeKind::Tensor
            | NodeKind::Dimensioned
            | NodeKind::List => vec![],
        };

        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    /// Boolean flag
    Bool,
    /// Integer
    Int,
    /// Floating point
    Float,
    /// Text
    Text,
    /// Ordered list of texts
    TextList,
}

/// Value stored in a node property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Text(String),
    /// List of texts
    TextList(Vec<String>),
}

impl PropertyValue {
    /// Get the declared type this value satisfies
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Bool(_) => PropertyType::Bool,
            Self::Int(_) => PropertyType::Int,
            Self::Float(_) => PropertyType::Float,
            Self::Text(_) => PropertyType::Text,
            Self::TextList(_) => PropertyType::TextList,
        }
    }

    /// Widen a loaded value to `target` where no information is lost.
    ///
    /// Persisted floats with an integral value come back as integers.
    pub fn coerce(self, target: PropertyType) -> Self {
        match (self, target) {
            (Self::Int(value), PropertyType::Float) => Self::Float(value as f64),
            (value, _) => value,
        }
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Text list content, if this is a text list value
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(items) => Some(items),
            _ => None,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node kind, fixed at creation
    kind: NodeKind,
    /// Display name; the document key for containers and key-value pairs
    name: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Input sockets
    inputs: Vec<Socket>,
    /// Output sockets
    outputs: Vec<Socket>,
    /// Typed properties, in schema order
    properties: IndexMap<String, PropertyValue>,
}

impl Node {
    /// Create a new node of `kind` with its sockets and default properties
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            name: String::new(),
            position: [0.0, 0.0],
            inputs: kind.inputs(),
            outputs: kind.outputs(),
            properties: kind.default_properties(),
        }
    }

    /// Set the initial name without the blank-name check
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a specific ID
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the name is blank after trimming
    pub fn has_blank_name(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Rename the node, returning the previous name
    pub fn rename(&mut self, name: impl Into<String>) -> Result<String, NodeError> {
        let name = name.into();
        if self.kind.requires_name() && name.trim().is_empty() {
            return Err(NodeError::EmptyName(self.id));
        }
        Ok(std::mem::replace(&mut self.name, name))
    }

    /// Replace the name unconditionally (history replay)
    pub(crate) fn restore_name(&mut self, name: String) -> String {
        std::mem::replace(&mut self.name, name)
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    /// Input sockets in position order
    pub fn inputs(&self) -> &[Socket] {
        &self.inputs
    }

    /// Output sockets in position order
    pub fn outputs(&self) -> &[Socket] {
        &self.outputs
    }

    /// Get a property value
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Text property, empty when absent
    pub fn text_property(&self, key: &str) -> &str {
        self.property(key).and_then(PropertyValue::as_text).unwrap_or_default()
    }

    /// All properties in schema order
    pub fn properties(&self) -> &IndexMap<String, PropertyValue> {
        &self.properties
    }

    /// Set a property, returning the previous value.
    ///
    /// The value must match the declared type of `key` and floats must be
    /// finite. An enumeration's `selected` value must be one of its options
    /// (or empty), and its options cannot drop the current selection.
    pub fn set_property(&mut self, key: &str, value: PropertyValue) -> Result<PropertyValue, NodeError> {
        let current = self
            .properties
            .get(key)
            .ok_or_else(|| NodeError::UnknownProperty {
                kind: self.kind,
                key: key.to_string(),
            })?;

        let expected = current.property_type();
        let found = value.property_type();
        if expected != found {
            return Err(NodeError::InvalidPropertyType {
                key: key.to_string(),
                expected,
                found,
            });
        }

        if let PropertyValue::Float(number) = &value {
            if !number.is_finite() {
                return Err(NodeError::NonFiniteValue(key.to_string()));
            }
        }
        if self.kind == NodeKind::Enum {
            match key {
                "selected" => self.check_option(&value)?,
                "options" => self.check_selection_kept(&value)?,
                _ => {}
            }
        }

        let slot = self
            .properties
            .get_mut(key)
            .ok_or_else(|| NodeError::UnknownProperty {
                kind: self.kind,
                key: key.to_string(),
            })?;
        Ok(std::mem::replace(slot, value))
    }

    /// A new option list must still contain the current selection
    fn check_selection_kept(&self, options: &PropertyValue) -> Result<(), NodeError> {
        let selected = self.text_property("selected");
        if selected.is_empty() {
            return Ok(());
        }
        let options = options.as_text_list().unwrap_or_default();
        if options.iter().any(|option| option == selected) {
            Ok(())
        } else {
            Err(NodeError::SelectionRemoved(selected.to_string()))
        }
    }

    fn check_option(&self, value: &PropertyValue) -> Result<(), NodeError> {
        let Some(selected) = value.as_text() else {
            return Ok(());
        };
        if selected.is_empty() {
            return Ok(());
        }
        let options = self
            .property("options")
            .and_then(PropertyValue::as_text_list)
            .unwrap_or_default();
        if options.iter().any(|option| option == selected) {
            Ok(())
        } else {
            Err(NodeError::UnknownOption(selected.to_string()))
        }
    }
}

/// Error when editing a node
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeError {
    /// Value does not match the declared property type
    #[error("Invalid type for property '{key}': expected {expected:?}, got {found:?}")]
    InvalidPropertyType {
        /// Property key
        key: String,
        /// Declared type
        expected: PropertyType,
        /// Type of the rejected value
        found: PropertyType,
    },

    /// Blank name on a kind that requires one
    #[error("Node {0} requires a non-empty name")]
    EmptyName(NodeId),

    /// Property not declared for this kind
    #[error("{kind} nodes have no property '{key}'")]
    UnknownProperty {
        /// Node kind
        kind: NodeKind,
        /// Property key
        key: String,
    },

    /// Enumeration selection outside the option list
    #[error("'{0}' is not one of the enumeration options")]
    UnknownOption(String),

    /// Option list would drop the current selection
    #[error("'{0}' is selected and cannot be removed from the options")]
    SelectionRemoved(String),

    /// NaN or infinite float
    #[error("Property '{0}' must be a finite number")]
    NonFiniteValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_from_str() {
        let id = NodeId::new();
        assert_eq!(id.to_string().parse::<NodeId>().unwrap(), id);
        assert!("not-a-uuid".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_sockets_per_kind() {
        let vector = Node::new(NodeKind::Vector);
        assert_eq!(vector.inputs().len(), 3);
        assert!(vector.inputs().iter().all(|s| s.required));

        let dims = Node::new(NodeKind::Dimensioned);
        assert_eq!(dims.inputs().len(), 8);
        assert!(!dims.input(7).unwrap().required);

        let case = Node::new(NodeKind::CaseOutput);
        assert_eq!(case.inputs().len(), 4);
        assert!(case.outputs().is_empty());
        assert_eq!(case.input(0).unwrap().capacity, SocketCapacity::Multi(CASE_SLOT_CAPACITY));
    }

    #[test]
    fn test_set_property_checks_type() {
        let mut node = Node::new(NodeKind::Int);
        assert_eq!(node.set_property("value", PropertyValue::Int(3)), Ok(PropertyValue::Int(0)));

        let err = node.set_property("value", PropertyValue::Float(1.5)).unwrap_err();
        assert!(matches!(err, NodeError::InvalidPropertyType { .. }));
        assert_eq!(node.property("value"), Some(&PropertyValue::Int(3)));

        let err = node.set_property("missing", PropertyValue::Int(1)).unwrap_err();
        assert!(matches!(err, NodeError::UnknownProperty { .. }));
    }

    #[test]
    fn test_float_must_be_finite() {
        let mut node = Node::new(NodeKind::Float);
        assert_eq!(
            node.set_property("value", PropertyValue::Float(f64::NAN)),
            Err(NodeError::NonFiniteValue("value".into()))
        );
        assert!(node.set_property("value", PropertyValue::Float(f64::INFINITY)).is_err());
        assert_eq!(node.property("value"), Some(&PropertyValue::Float(0.0)));
    }

    #[test]
    fn test_options_cannot_drop_selection() {
        let mut node = Node::new(NodeKind::Enum);
        node.set_property("options", PropertyValue::TextList(vec!["PCG".into(), "GAMG".into()]))
            .unwrap();
        node.set_property("selected", PropertyValue::Text("GAMG".into())).unwrap();

        assert_eq!(
            node.set_property("options", PropertyValue::TextList(vec!["PCG".into()])),
            Err(NodeError::SelectionRemoved("GAMG".into()))
        );
        assert_eq!(
            node.property("options"),
            Some(&PropertyValue::TextList(vec!["PCG".into(), "GAMG".into()]))
        );

        // Clearing the selection first makes the shrink legal
        node.set_property("selected", PropertyValue::Text(String::new())).unwrap();
        assert!(node.set_property("options", PropertyValue::TextList(vec!["PCG".into()])).is_ok());
    }

    #[test]
    fn test_rename_rejects_blank_for_keys() {
        let mut key = Node::new(NodeKind::KeyValue).with_name("solver");
        assert!(matches!(key.rename("   "), Err(NodeError::EmptyName(_))));
        assert_eq!(key.name(), "solver");
        assert_eq!(key.rename("tolerance").unwrap(), "solver");

        // Parameters do not contribute keys
        let mut value = Node::new(NodeKind::Float).with_name("x");
        assert!(value.rename("").is_ok());
    }

    #[test]
    fn test_enum_selection_must_be_an_option() {
        let mut node = Node::new(NodeKind::Enum);
        node.set_property(
            "options",
            PropertyValue::TextList(vec!["PCG".into(), "smoothSolver".into()]),
        )
        .unwrap();

        assert!(node.set_property("selected", PropertyValue::Text("PCG".into())).is_ok());
        assert_eq!(
            node.set_property("selected", PropertyValue::Text("GAMG".into())),
            Err(NodeError::UnknownOption("GAMG".into()))
        );
    }

    #[test]
    fn test_coerce_integral_float() {
        assert_eq!(PropertyValue::Int(2).coerce(PropertyType::Float), PropertyValue::Float(2.0));
        assert_eq!(PropertyValue::Int(2).coerce(PropertyType::Int), PropertyValue::Int(2));
    }
}
