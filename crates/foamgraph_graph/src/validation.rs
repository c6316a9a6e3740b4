// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural validation of the subgraph below a root node.
//!
//! Validation walks input connections depth-first from the root and collects
//! every finding instead of stopping at the first one. It never mutates the
//! graph.

use crate::connection::ConnectionId;
use crate::graph::{Graph, GraphError};
use crate::node::{Node, NodeId, NodeKind};
use crate::socket::SocketRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Reported, does not block generation
    Warning,
    /// Blocks generation of the affected root
    Error,
}

/// Kind of structural defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    /// An input connection leads back to a node being visited
    CyclicGraph,
    /// Container or key without a name
    EmptyName,
    /// Sibling key already used under the same container
    DuplicateKey,
    /// Required input socket without a connection
    UnresolvedInput,
    /// Enumeration without a selected option
    UnsetSelection,
    /// Container without children
    EmptyContainer,
    /// File name not found in the case classification table
    Unclassified,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity
    pub severity: Severity,
    /// Defect kind
    pub kind: FindingKind,
    /// Node the finding is attributed to
    pub node: NodeId,
    /// Human-readable description
    pub message: String,
}

impl Finding {
    /// Create an error finding
    pub fn error(kind: FindingKind, node: NodeId, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            node,
            message: message.into(),
        }
    }

    /// Create a warning finding
    pub fn warning(kind: FindingKind, node: NodeId, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            node,
            message: message.into(),
        }
    }

    /// Whether this finding blocks generation
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Result of validating one root
#[derive(Debug, Clone, Default)]
pub struct Validation {
    findings: Vec<Finding>,
    /// Nodes with a blocking finding on themselves or below them
    tainted: HashSet<NodeId>,
    /// Container child edges whose subtree must not be built
    blocked_edges: HashSet<ConnectionId>,
    /// Nodes reached, in first-visit order
    visited: Vec<NodeId>,
}

impl Validation {
    /// All findings in traversal order
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Consume into the findings list
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    /// Blocking findings
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_blocking())
    }

    /// Non-blocking findings
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_blocking())
    }

    /// Whether no blocking finding was reported
    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Whether a cycle was found
    pub fn has_cycle(&self) -> bool {
        self.findings.iter().any(|f| f.kind == FindingKind::CyclicGraph)
    }

    /// Number of findings of `kind`
    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }

    /// Whether the node and everything below it is free of blocking findings
    pub fn is_eligible(&self, node: NodeId) -> bool {
        !self.tainted.contains(&node)
    }

    /// Whether the node itself carries a blocking finding
    pub fn has_own_errors(&self, node: NodeId) -> bool {
        self.findings.iter().any(|f| f.node == node && f.is_blocking())
    }

    /// Whether a container child edge was excluded by validation
    pub fn is_blocked(&self, connection: ConnectionId) -> bool {
        self.blocked_edges.contains(&connection)
    }

    /// Nodes reached from the root, in first-visit order
    pub fn visited(&self) -> &[NodeId] {
        &self.visited
    }
}

/// Depth-first structural validator
pub struct Validator<'a> {
    graph: &'a Graph,
}

impl<'a> Validator<'a> {
    /// Create a validator over `graph`
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Validate everything reachable from `root` through input connections
    pub fn validate(&self, root: NodeId) -> Result<Validation, GraphError> {
        if self.graph.node(root).is_none() {
            return Err(GraphError::NodeNotFound(root));
        }

        let mut walk = Walk {
            graph: self.graph,
            visiting: HashSet::new(),
            done: HashMap::new(),
            report: Validation::default(),
        };
        walk.visit(root);
        Ok(walk.report)
    }
}

struct Walk<'a> {
    graph: &'a Graph,
    /// Nodes on the current DFS path
    visiting: HashSet<NodeId>,
    /// Finished nodes and whether their subtree is clean
    done: HashMap<NodeId, bool>,
    report: Validation,
}

impl Walk<'_> {
    fn visit(&mut self, node_id: NodeId) -> bool {
        if let Some(clean) = self.done.get(&node_id) {
            return *clean;
        }
        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            return false;
        };

        self.visiting.insert(node_id);
        self.report.visited.push(node_id);

        let mut clean = self.check_node(node);
        let mut keys: HashMap<String, NodeId> = HashMap::new();

        for index in 0..node.inputs().len() {
            let socket = SocketRef::new(node_id, index);
            let incoming: Vec<_> = graph
                .connections_into(socket)
                .map(|c| (c.id, c.from.node))
                .collect();

            for (connection, child_id) in incoming {
                if self.visiting.contains(&child_id) {
                    let child_name = graph.node(child_id).map(Node::name).unwrap_or_default();
                    self.push(Finding::error(
                        FindingKind::CyclicGraph,
                        node_id,
                        format!(
                            "'{}' input {} leads back to '{}'",
                            display_name(node),
                            index,
                            child_name
                        ),
                    ));
                    self.report.blocked_edges.insert(connection);
                    clean = false;
                    continue;
                }

                let mut child_clean = self.visit(child_id);

                if node.kind() == NodeKind::Container {
                    if let Some(child) = graph.node(child_id) {
                        if !child.has_blank_name() {
                            if let Some(first) = keys.get(child.name()) {
                                if *first != child_id {
                                    self.push(Finding::error(
                                        FindingKind::DuplicateKey,
                                        child_id,
                                        format!(
                                            "Key '{}' is already defined in '{}'",
                                            child.name(),
                                            node.name()
                                        ),
                                    ));
                                    child_clean = false;
                                }
                            } else {
                                keys.insert(child.name().to_string(), child_id);
                            }
                        }
                    }
                }

                if !child_clean {
                    self.report.blocked_edges.insert(connection);
                    clean = false;
                }
            }
        }

        self.visiting.remove(&node_id);
        self.done.insert(node_id, clean);
        if !clean {
            self.report.tainted.insert(node_id);
        }
        clean
    }

    /// Checks on the node itself; returns false on a blocking finding
    fn check_node(&mut self, node: &Node) -> bool {
        let before = self.report.findings.len();

        if node.kind().requires_name() && node.has_blank_name() {
            self.push(Finding::error(
                FindingKind::EmptyName,
                node.id,
                format!("{} node has no name", node.kind()),
            ));
        }

        for (index, socket) in node.inputs().iter().enumerate() {
            if socket.required
                && self.graph.connections_into(SocketRef::new(node.id, index)).next().is_none()
            {
                self.push(Finding::error(
                    FindingKind::UnresolvedInput,
                    node.id,
                    format!("'{}' input '{}' is not connected", display_name(node), socket.name),
                ));
            }
        }

        match node.kind() {
            NodeKind::Container => {
                if self.graph.connections_into(SocketRef::new(node.id, 0)).next().is_none() {
                    self.push(Finding::warning(
                        FindingKind::EmptyContainer,
                        node.id,
                        format!("'{}' has no children and will generate an empty block", node.name()),
                    ));
                }
            }
            NodeKind::Enum => {
                if node.text_property("selected").is_empty() {
                    self.push(Finding::error(
                        FindingKind::UnsetSelection,
                        node.id,
                        format!("'{}' has no selected option", display_name(node)),
                    ));
                }
            }
            NodeKind::CaseOutput => {
                let connected = (0..node.inputs().len()).any(|index| {
                    self.graph.connections_into(SocketRef::new(node.id, index)).next().is_some()
                });
                if !connected {
                    self.push(Finding::error(
                        FindingKind::UnresolvedInput,
                        node.id,
                        "No files connected to the case folder",
                    ));
                }
            }
            NodeKind::KeyValue
            | NodeKind::Int
            | NodeKind::Float
            | NodeKind::Str
            | NodeKind::Vector
            | NodeKind::Tensor
            | NodeKind::Dimensioned
            | NodeKind::List
            | NodeKind::FileOutput => {}
        }

        !self.report.findings[before..].iter().any(Finding::is_blocking)
    }

    fn push(&mut self, finding: Finding) {
        self.report.findings.push(finding);
    }
}

fn display_name(node: &Node) -> String {
    if node.has_blank_name() {
        node.kind().display_name().to_string()
    } else {
        node.name().to_string()
    }
}
