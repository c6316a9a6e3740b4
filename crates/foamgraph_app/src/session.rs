// SPDX-License-Identifier: MIT OR Apache-2.0
//! The editing session: one graph with its history, document cache and
//! project settings.
//!
//! Every structural or content edit made through a [`Session`] is recorded
//! for undo, except the explicit dialog path
//! ([`Session::set_property_unrecorded`], [`Session::set_element_order`]).

use crate::commands::{CommandError, Edit, GraphCommand};
use crate::history::{History, HistoryError, HistoryStats};
use crate::project::ProjectSettings;
use foamgraph_case::{
    CacheStats, CaseReport, DocumentCache, FileReport, GenerateError, GenerationReport, Generator,
};
use foamgraph_graph::{
    BuildError, ConnectionError, ConnectionId, Document, DocumentBuilder, Fragment, Graph, GraphError,
    ImportError, Instantiated, Node, NodeId, NodeKind, PropertyValue, SceneError, SceneFile, SocketRef,
    Validation, Validator,
};
use std::path::{Path, PathBuf};

/// Container property holding the custom child order
const ELEMENT_ORDER: &str = "element_order";

/// An open graph and everything edited alongside it
#[derive(Debug)]
pub struct Session {
    graph: Graph,
    history: History,
    cache: DocumentCache,
    settings: ProjectSettings,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ProjectSettings::default())
    }
}

impl Session {
    /// Start an empty session
    pub fn new(settings: ProjectSettings) -> Self {
        Self::with_graph(Graph::new(), settings)
    }

    /// Start a session on an existing graph
    pub fn with_graph(graph: Graph, settings: ProjectSettings) -> Self {
        Self {
            graph,
            history: History::with_max_depth(settings.history_depth),
            cache: DocumentCache::new(),
            settings,
        }
    }

    /// Open a scene file
    pub fn open(path: &Path, settings: ProjectSettings) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = SceneFile::from_json(&json)?.to_graph()?;
        tracing::info!(
            "Opened {} ({} nodes, {} connections)",
            path.display(),
            graph.node_count(),
            graph.connection_count()
        );
        Ok(Self::with_graph(graph, settings))
    }

    /// Write the graph as a scene file
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = SceneFile::from_graph(&self.graph).to_json()?;
        std::fs::write(path, json).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved {}", path.display());
        Ok(())
    }

    /// The graph being edited
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Project settings
    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    /// Mutable project settings
    pub fn settings_mut(&mut self) -> &mut ProjectSettings {
        &mut self.settings
    }

    /// History counters
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Document cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn record(&mut self, edit: Edit) {
        let mut group = self.history.begin_operation(edit.description());
        group.push(edit);
        self.history.commit(group);
    }

    // ------------------------------------------------------------------
    // Recorded edits
    // ------------------------------------------------------------------

    /// Create a node
    pub fn create_node(&mut self, kind: NodeKind, name: Option<&str>) -> NodeId {
        let node = Node::new(kind).with_name(name.unwrap_or_default());
        let id = self.graph.add_node(node.clone());
        self.record(Edit::CreateNode(node));
        id
    }

    /// Delete a node and its connections
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), SessionError> {
        let removed = self
            .graph
            .remove_node(node)
            .ok_or(GraphError::NodeNotFound(node))?;
        self.cache.invalidate(node);
        self.record(Edit::RemoveNode(removed));
        Ok(())
    }

    /// Rename a node
    pub fn rename(&mut self, node: NodeId, name: &str) -> Result<(), SessionError> {
        let before = self.graph.rename(node, name)?;
        if before != name {
            self.record(Edit::Rename {
                node,
                before,
                after: name.to_string(),
            });
        }
        Ok(())
    }

    /// Set a typed property
    pub fn set_property(&mut self, node: NodeId, key: &str, value: PropertyValue) -> Result<(), SessionError> {
        let before = self.graph.set_property(node, key, value.clone())?;
        if before != value {
            self.record(Edit::SetProperty {
                node,
                key: key.to_string(),
                before,
                after: value,
            });
        }
        Ok(())
    }

    /// Move a node on the canvas
    pub fn move_node(&mut self, node: NodeId, position: [f32; 2]) -> Result<(), SessionError> {
        let before = self
            .graph
            .node(node)
            .map(|n| n.position)
            .ok_or(GraphError::NodeNotFound(node))?;
        self.graph.set_position(node, position)?;
        self.record(Edit::Move {
            node,
            before,
            after: position,
        });
        Ok(())
    }

    /// Connect an output socket to an input socket
    pub fn connect(&mut self, from: SocketRef, to: SocketRef) -> Result<ConnectionId, SessionError> {
        let id = self.graph.connect(from, to)?;
        if let (Some(index), Some(connection)) = (self.graph.connection_index(id), self.graph.connection(id)) {
            let connection = connection.clone();
            self.record(Edit::Connect { index, connection });
        }
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection: ConnectionId) -> Result<(), SessionError> {
        let index = self
            .graph
            .connection_index(connection)
            .ok_or(CommandError::ConnectionNotFound(connection))?;
        let removed = self
            .graph
            .disconnect(connection)
            .ok_or(CommandError::ConnectionNotFound(connection))?;
        self.record(Edit::Disconnect {
            index,
            connection: removed,
        });
        Ok(())
    }

    /// Add a parsed fragment as a single undo step
    pub fn instantiate(&mut self, fragment: &Fragment) -> Result<Instantiated, SessionError> {
        let created = fragment.instantiate(&mut self.graph)?;

        let mut group = self.history.begin_operation(format!("Import {} nodes", created.nodes.len()));
        for id in &created.nodes {
            if let Some(node) = self.graph.node(*id) {
                group.push(Edit::CreateNode(node.clone()));
            }
        }
        for id in &created.connections {
            if let (Some(index), Some(connection)) = (self.graph.connection_index(*id), self.graph.connection(*id)) {
                group.push(Edit::Connect {
                    index,
                    connection: connection.clone(),
                });
            }
        }
        self.history.commit(group);

        tracing::info!(
            "Imported {} nodes and {} connections",
            created.nodes.len(),
            created.connections.len()
        );
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Dialog edits, not recorded
    // ------------------------------------------------------------------

    /// Set a property from a modal dialog without recording it
    pub fn set_property_unrecorded(
        &mut self,
        node: NodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), SessionError> {
        self.graph.set_property(node, key, value)?;
        Ok(())
    }

    /// Set a container's custom child order from the order dialog
    pub fn set_element_order(&mut self, node: NodeId, order: Vec<String>) -> Result<(), SessionError> {
        self.set_property_unrecorded(node, ELEMENT_ORDER, PropertyValue::TextList(order))
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Revert the most recent step, returning its description.
    ///
    /// The step is replayed on a copy of the graph; if any edit fails the
    /// graph is unchanged and the step stays on the undo stack.
    pub fn undo(&mut self) -> Result<String, SessionError> {
        let group = self.history.undo()?;
        let mut graph = self.graph.clone();
        if let Err(e) = group.revert(&mut graph) {
            tracing::warn!("Cannot undo '{}': {}", group.description, e);
            self.history.push_undo(group);
            return Err(e.into());
        }
        self.graph = graph;
        let description = group.description.clone();
        self.history.push_redo(group);
        tracing::debug!("Undo: {}", description);
        Ok(description)
    }

    /// Re-apply the most recently undone step, returning its description.
    ///
    /// Like [`Session::undo`], a failed step leaves the graph unchanged and
    /// stays on the redo stack.
    pub fn redo(&mut self) -> Result<String, SessionError> {
        let group = self.history.redo()?;
        let mut graph = self.graph.clone();
        if let Err(e) = group.apply(&mut graph) {
            tracing::warn!("Cannot redo '{}': {}", group.description, e);
            self.history.push_redo(group);
            return Err(e.into());
        }
        self.graph = graph;
        let description = group.description.clone();
        self.history.push_undo(group);
        tracing::debug!("Redo: {}", description);
        Ok(description)
    }

    /// Whether undo is possible
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is possible
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ------------------------------------------------------------------
    // Validation, build and generation
    // ------------------------------------------------------------------

    /// Validate the subgraph under `root`
    pub fn validate(&self, root: NodeId) -> Result<Validation, SessionError> {
        Ok(Validator::new(&self.graph).validate(root)?)
    }

    /// Validate and build the document under `root`.
    ///
    /// Validation findings that block the build are returned as the
    /// validation itself.
    pub fn build(&self, root: NodeId) -> Result<Result<Document, Validation>, SessionError> {
        let validation = self.validate(root)?;
        if !validation.is_clean() {
            return Ok(Err(validation));
        }
        Ok(Ok(DocumentBuilder::new(&self.graph).build(root)?))
    }

    fn generator(&mut self) -> Generator<'_> {
        Generator::new(&self.graph, &self.settings.generator, &mut self.cache)
    }

    /// Generate one file output
    pub fn generate_file(&mut self, node: NodeId) -> Result<FileReport, SessionError> {
        Ok(self.generator().generate_file(node)?)
    }

    /// Generate one case output into its configured case directory
    pub fn generate_case(&mut self, node: NodeId) -> Result<CaseReport, SessionError> {
        Ok(self.generator().generate_case(node)?)
    }

    /// Generate one case output into `case_dir`
    pub fn generate_case_into(&mut self, node: NodeId, case_dir: &Path) -> Result<CaseReport, SessionError> {
        Ok(self.generator().generate_case_into(node, case_dir)?)
    }

    /// Generate a terminal node of either kind
    pub fn generate(&mut self, node: NodeId) -> Result<GenerationReport, SessionError> {
        let kind = self
            .graph
            .node(node)
            .map(Node::kind)
            .ok_or(GraphError::NodeNotFound(node))?;
        match kind {
            NodeKind::FileOutput => Ok(GenerationReport::File(self.generate_file(node)?)),
            NodeKind::CaseOutput => Ok(GenerationReport::Case(self.generate_case(node)?)),
            other => Err(SessionError::NotTerminal(node, other)),
        }
    }

    /// Generate every terminal node
    pub fn generate_all(&mut self) -> Result<Vec<GenerationReport>, SessionError> {
        Ok(self.generator().generate_all()?)
    }
}

/// Error from a session operation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Scene or other file could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Edit rejected
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Connection rejected
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Undo or redo replay failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Nothing to undo or redo
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Fragment could not be added
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Scene file is invalid
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Build failed after validation passed
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Generation aborted
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// Node is not a file or case output
    #[error("Node {0} is a {1} node, not an output")]
    NotTerminal(NodeId, NodeKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MAX_HISTORY;
    use foamgraph_graph::Scalar;

    fn int_key(session: &mut Session, name: &str, value: i64) -> NodeId {
        let key = session.create_node(NodeKind::KeyValue, Some(name));
        let int = session.create_node(NodeKind::Int, None);
        session.set_property(int, "value", PropertyValue::Int(value)).unwrap();
        session.connect(SocketRef::new(int, 0), SocketRef::new(key, 0)).unwrap();
        key
    }

    #[test]
    fn test_undo_redo_edits() {
        let mut session = Session::default();
        let key = int_key(&mut session, "x", 1);
        let before = session.graph().clone();

        session.rename(key, "y").unwrap();
        assert_eq!(session.graph().node(key).map(Node::name), Some("y"));

        assert_eq!(session.undo().unwrap(), "Rename to 'y'");
        assert_eq!(session.graph().node(key).map(Node::name), Some("x"));
        assert_eq!(session.graph().nodes().collect::<Vec<_>>(), before.nodes().collect::<Vec<_>>());

        session.redo().unwrap();
        assert_eq!(session.graph().node(key).map(Node::name), Some("y"));
    }

    #[test]
    fn test_connect_then_disconnect_restores_adjacency() {
        let mut session = Session::default();
        let key = int_key(&mut session, "x", 1);
        let container = session.create_node(NodeKind::Container, Some("FoamFile"));
        let before: Vec<_> = session.graph().connections().cloned().collect();

        let id = session.connect(SocketRef::new(key, 0), SocketRef::new(container, 0)).unwrap();
        session.disconnect(id).unwrap();
        assert_eq!(session.graph().connections().cloned().collect::<Vec<_>>(), before);

        session.undo().unwrap();
        assert!(session.graph().connection(id).is_some());
        session.undo().unwrap();
        assert_eq!(session.graph().connections().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_remove_node_undo() {
        let mut session = Session::default();
        let key = int_key(&mut session, "x", 1);
        let connections = session.graph().connection_count();

        session.remove_node(key).unwrap();
        assert_eq!(session.graph().connection_count(), 0);

        session.undo().unwrap();
        assert!(session.graph().node(key).is_some());
        assert_eq!(session.graph().connection_count(), connections);
    }

    #[test]
    fn test_rejected_edits_are_not_recorded() {
        let mut session = Session::default();
        let key = session.create_node(NodeKind::KeyValue, Some("x"));
        let depth = session.history_stats().undo_count;

        assert!(session.rename(key, "  ").is_err());
        assert!(session
            .set_property(key, "value", PropertyValue::Int(1))
            .is_err());
        assert_eq!(session.history_stats().undo_count, depth);
    }

    #[test]
    fn test_history_capacity() {
        let mut session = Session::default();
        let int = session.create_node(NodeKind::Int, None);
        for i in 1..=30 {
            session.set_property(int, "value", PropertyValue::Int(i)).unwrap();
        }
        assert_eq!(session.history_stats().undo_count, MAX_HISTORY);

        while session.can_undo() {
            session.undo().unwrap();
        }
        assert_eq!(
            session.graph().node(int).and_then(|n| n.property("value")),
            Some(&PropertyValue::Int(10))
        );
    }

    #[test]
    fn test_dialog_edits_not_recorded() {
        let mut session = Session::default();
        let container = session.create_node(NodeKind::Container, Some("dict"));
        let depth = session.history_stats().undo_count;

        session
            .set_element_order(container, vec!["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(session.history_stats().undo_count, depth);
        assert_eq!(
            session.graph().node(container).and_then(|n| n.property("element_order")),
            Some(&PropertyValue::TextList(vec!["b".to_string(), "a".to_string()]))
        );
    }

    fn solver_choice(session: &mut Session) -> NodeId {
        let choice = session.create_node(NodeKind::Enum, None);
        session
            .set_property(
                choice,
                "options",
                PropertyValue::TextList(vec!["PCG".to_string(), "GAMG".to_string()]),
            )
            .unwrap();
        choice
    }

    #[test]
    fn test_undo_after_rejected_option_shrink() {
        let mut session = Session::default();
        let choice = solver_choice(&mut session);
        session
            .set_property(choice, "selected", PropertyValue::Text("GAMG".to_string()))
            .unwrap();
        assert!(session
            .set_property(choice, "options", PropertyValue::TextList(vec!["PCG".to_string()]))
            .is_err());

        session
            .set_property(choice, "selected", PropertyValue::Text("PCG".to_string()))
            .unwrap();
        session.undo().unwrap();
        let node = session.graph().node(choice).unwrap();
        assert_eq!(node.text_property("selected"), "GAMG");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        session.save(&path).unwrap();
        let reopened = Session::open(&path, ProjectSettings::default()).unwrap();
        assert_eq!(reopened.graph().node(choice), session.graph().node(choice));
    }

    #[test]
    fn test_failed_undo_keeps_graph_and_step() {
        let mut session = Session::default();
        let choice = solver_choice(&mut session);
        // The dialog path selects an option the recorded history never saw
        session
            .set_property_unrecorded(choice, "selected", PropertyValue::Text("GAMG".to_string()))
            .unwrap();
        let before = session.graph().clone();
        let depth = session.history_stats().undo_count;

        let err = session.undo().unwrap_err();
        assert!(matches!(err, SessionError::Command(CommandError::Graph(_))));
        assert_eq!(session.graph().nodes().collect::<Vec<_>>(), before.nodes().collect::<Vec<_>>());
        assert_eq!(session.history_stats().undo_count, depth);
        assert!(!session.can_redo());

        session
            .set_property_unrecorded(choice, "selected", PropertyValue::Text(String::new()))
            .unwrap();
        session.undo().unwrap();
        assert_eq!(
            session.graph().node(choice).and_then(|n| n.property("options")),
            Some(&PropertyValue::TextList(Vec::new()))
        );
    }

    #[test]
    fn test_import_is_one_step() {
        let mut session = Session::default();
        let document = Document::entry(
            "FoamFile",
            Document::Mapping(
                [
                    ("x".to_string(), Scalar::Int(1).into()),
                    ("y".to_string(), Scalar::Float(2.0).into()),
                ]
                .into_iter()
                .collect(),
            ),
        );
        let fragment = Fragment::from_document(&document).unwrap();

        let created = session.instantiate(&fragment).unwrap();
        assert_eq!(session.history_stats().undo_count, 1);
        let root = created.keys[fragment.roots()[0]];
        assert_eq!(session.build(root).unwrap().unwrap(), document);

        session.undo().unwrap();
        assert_eq!(session.graph().node_count(), 0);
        assert_eq!(session.graph().connection_count(), 0);

        session.redo().unwrap();
        assert_eq!(session.graph().node_count(), created.nodes.len());
        assert_eq!(session.build(root).unwrap().unwrap(), document);
    }

    #[test]
    fn test_build_reports_findings() {
        let mut session = Session::default();
        let key = session.create_node(NodeKind::KeyValue, Some("x"));
        let validation = session.build(key).unwrap().unwrap_err();
        assert!(!validation.is_clean());
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let mut session = Session::default();
        let key = int_key(&mut session, "x", 3);
        session.save(&path).unwrap();

        let reopened = Session::open(&path, ProjectSettings::default()).unwrap();
        assert_eq!(reopened.graph().node_count(), 2);
        assert_eq!(reopened.graph().connection_count(), 1);
        assert!(!reopened.can_undo());
        assert_eq!(
            reopened.build(key).unwrap().unwrap(),
            Document::entry("x", Scalar::Int(3).into())
        );
    }

    #[test]
    fn test_generate_rejects_non_terminal() {
        let mut session = Session::default();
        let int = session.create_node(NodeKind::Int, None);
        assert!(matches!(
            session.generate(int),
            Err(SessionError::NotTerminal(_, NodeKind::Int))
        ));
    }

    #[test]
    fn test_generate_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = ProjectSettings::default();
        settings.generator.output_dir = dir.path().to_path_buf();
        let mut session = Session::new(settings);

        let key = int_key(&mut session, "x", 1);
        let dict = session.create_node(NodeKind::Container, Some("controlDict"));
        session.connect(SocketRef::new(key, 0), SocketRef::new(dict, 0)).unwrap();
        let output = session.create_node(NodeKind::FileOutput, None);
        session.connect(SocketRef::new(dict, 0), SocketRef::new(output, 0)).unwrap();

        let report = session.generate(output).unwrap();
        assert!(matches!(report, GenerationReport::File(ref r) if r.succeeded()));
        let text = std::fs::read_to_string(dir.path().join("controlDict")).unwrap();
        assert_eq!(text, "x               1;\n");
    }
}
