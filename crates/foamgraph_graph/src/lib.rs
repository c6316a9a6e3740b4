// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph model for foamgraph.
//!
//! This crate turns a user-built graph of typed nodes into hierarchical
//! OpenFOAM dictionary documents:
//! - Typed nodes with fixed socket layouts and property schemas
//! - Connections checked for type and capacity at edit time
//! - Structural validation (cycles, names, duplicate keys, missing inputs)
//! - Document building by recursive descent
//! - Scene persistence and parsed-fragment import
//!
//! ## Architecture
//!
//! Editing is permissive: cycles and dangling inputs may exist while a graph
//! is being composed. [`Validator`] reports them as findings, and
//! [`DocumentBuilder`] only runs on roots that validated cleanly.

pub mod builder;
pub mod connection;
pub mod document;
pub mod graph;
pub mod import;
pub mod node;
pub mod scene;
pub mod socket;
pub mod validation;

pub use builder::{build, BuildError, DocumentBuilder};
pub use connection::{Connection, ConnectionId};
pub use document::{Document, Scalar};
pub use graph::{ConnectionError, Graph, GraphError, RemovedNode};
pub use import::{ConnectionHint, Fragment, ImportError, Instantiated, NodeDescription};
pub use node::{Node, NodeCategory, NodeError, NodeId, NodeKind, PropertyType, PropertyValue};
pub use scene::{SceneError, SceneFile};
pub use socket::{Socket, SocketCapacity, SocketDirection, SocketRef, SocketType};
pub use validation::{Finding, FindingKind, Severity, Validation, Validator};
