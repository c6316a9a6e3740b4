// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

impl SocketDirection {
    /// Tag used by the scene format
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Kind-class that flows through a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    /// Numeric scalar (int or float parameter)
    Scalar,
    /// Any value-producing node (scalars, strings, enums, composites, lists)
    Value,
    /// Keyed entry (key-value pair or container)
    Entry,
    /// List element: a value or a keyed entry
    Element,
    /// Document root of a single-file output
    Document,
    /// Built file handed from a single-file output to a whole-case output
    CaseFile,
}

impl SocketType {
    /// Tag written next to connections in the scene format
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Value => "value",
            Self::Entry => "entry",
            Self::Element => "element",
            Self::Document => "document",
            Self::CaseFile => "case_file",
        }
    }

    /// Check if an input of this type accepts an output of `source` type
    pub fn accepts(&self, source: SocketType) -> bool {
        if *self == source {
            return true;
        }

        match (self, source) {
            // Numeric parameters are values too
            (Self::Value, Self::Scalar) => true,
            (Self::Element, Self::Scalar | Self::Value | Self::Entry) => true,
            (Self::Document, Self::Entry) => true,
            _ => false,
        }
    }
}

/// How many incoming connections an input socket takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketCapacity {
    /// Exactly one incoming connection
    Single,
    /// Multi-input with a declared maximum
    Multi(usize),
    /// Ordered fan-in without limit (container children, list elements)
    Unbounded,
}

impl SocketCapacity {
    /// Whether `count` existing connections leave room for one more
    pub fn has_room(&self, count: usize) -> bool {
        match self {
            Self::Single => count == 0,
            Self::Multi(max) => count < *max,
            Self::Unbounded => true,
        }
    }
}

/// A socket on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Socket {
    /// Socket name
    pub name: String,
    /// Socket direction
    pub direction: SocketDirection,
    /// Kind-class tag used for compatibility checks
    pub socket_type: SocketType,
    /// Incoming connection capacity (outputs always fan out)
    pub capacity: SocketCapacity,
    /// Whether this socket must be connected (for inputs)
    pub required: bool,
}

impl Socket {
    /// Create a new single-capacity input socket
    pub fn input(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            direction: SocketDirection::Input,
            socket_type,
            capacity: SocketCapacity::Single,
            required: false,
        }
    }

    /// Create a new output socket
    pub fn output(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            direction: SocketDirection::Output,
            socket_type,
            capacity: SocketCapacity::Unbounded, // Outputs can have multiple connections
            required: false,
        }
    }

    /// Set the incoming capacity
    pub fn with_capacity(mut self, capacity: SocketCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check if a connection from this output to `target` is valid
    pub fn can_connect(&self, target: &Socket) -> bool {
        self.direction == SocketDirection::Output
            && target.direction == SocketDirection::Input
            && target.socket_type.accepts(self.socket_type)
    }
}

/// Address of a socket: owning node plus position index on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketRef {
    /// Owning node
    pub node: NodeId,
    /// Position index among the node's inputs or outputs
    pub index: usize,
}

impl SocketRef {
    /// Create a socket address
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for SocketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node, self.index)
    }
}
