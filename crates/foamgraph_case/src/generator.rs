// SPDX-License-Identifier: MIT OR Apache-2.0
//! File and case generation.
//!
//! A file output either writes its document directly (standalone mode) or,
//! when it feeds a case output, only builds it into the [`DocumentCache`]
//! (validation mode). A case output pulls each connected file's document
//! from the cache, so no document is built twice for one graph revision.

use crate::cache::DocumentCache;
use crate::case_dir::{backup_file, resolve_case_path, CaseDirError, CaseSummary};
use crate::category::{classify_or_system, Category};
use crate::settings::{GeneratorSettings, SettingsError};
use crate::writer::to_foam_string;
use foamgraph_graph::{
    build, BuildError, Document, DocumentBuilder, Finding, FindingKind, Graph, GraphError, Node,
    NodeId, NodeKind, PropertyValue, SocketRef, SocketType, Validation, Validator,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a file output runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerateMode {
    /// Build and write the file
    Standalone,
    /// Build into the cache for a downstream case output
    Validation,
}

/// Progress of one generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationState {
    /// Not started
    Idle,
    /// Running the validator
    Validating,
    /// Building a document
    Building,
    /// Writing a file
    Writing,
    /// Finished; per-file failures are in the report
    Done,
    /// Blocked by validation findings
    Failed,
}

/// Why a file was not written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Case slot without a connection
    EmptySlot,
    /// Target exists and overwriting is off
    Exists,
    /// File output already handled through another slot
    Duplicate,
}

/// Result for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    /// Written to disk
    Written,
    /// Built into the cache, nothing written
    Cached,
    /// Not written
    Skipped(SkipReason),
    /// Write error, attributed to this file
    Failed(String),
}

/// One file of a case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    /// Case slot index
    pub slot: usize,
    /// File output node, absent for an empty slot
    pub node: Option<NodeId>,
    /// Category the file went to
    pub category: Option<Category>,
    /// Target path
    pub path: Option<PathBuf>,
    /// What happened
    pub outcome: FileOutcome,
}

impl FileEntry {
    fn empty_slot(slot: usize) -> Self {
        Self {
            slot,
            node: None,
            category: None,
            path: None,
            outcome: FileOutcome::Skipped(SkipReason::EmptySlot),
        }
    }
}

/// Report of a single-file generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// File output node
    pub node: NodeId,
    /// Mode it ran in
    pub mode: GenerateMode,
    /// Final state
    pub state: GenerationState,
    /// States entered, in order
    pub transitions: Vec<GenerationState>,
    /// Validation findings
    pub findings: Vec<Finding>,
    /// Whether blocked children were left out
    pub partial: bool,
    /// Target path in standalone mode
    pub path: Option<PathBuf>,
    /// Outcome once past validation
    pub outcome: Option<FileOutcome>,
    /// Error that stopped the call before it produced an outcome
    pub error: Option<String>,
}

impl FileReport {
    fn new(node: NodeId, mode: GenerateMode) -> Self {
        Self {
            node,
            mode,
            state: GenerationState::Idle,
            transitions: Vec::new(),
            findings: Vec::new(),
            partial: false,
            path: None,
            outcome: None,
            error: None,
        }
    }

    fn aborted(node: NodeId, mode: GenerateMode, error: &GenerateError) -> Self {
        let mut report = Self::new(node, mode);
        report.error = Some(error.to_string());
        report.enter(GenerationState::Failed);
        report
    }

    fn enter(&mut self, state: GenerationState) {
        tracing::debug!("Output {}: {:?} -> {:?}", self.node, self.state, state);
        self.state = state;
        self.transitions.push(state);
    }

    /// Whether the file was written or cached
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, Some(FileOutcome::Written | FileOutcome::Cached))
    }
}

/// Report of a whole-case generation call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    /// Case output node
    pub node: NodeId,
    /// Case directory
    pub case_dir: PathBuf,
    /// Final state
    pub state: GenerationState,
    /// States entered, in order
    pub transitions: Vec<GenerationState>,
    /// Validation findings plus classification warnings
    pub findings: Vec<Finding>,
    /// Files already present before generation
    pub existing_files: usize,
    /// Per-file results in slot order
    pub files: Vec<FileEntry>,
    /// Error that stopped the call before any file was handled
    pub error: Option<String>,
}

impl CaseReport {
    fn new(node: NodeId, case_dir: &Path) -> Self {
        Self {
            node,
            case_dir: case_dir.to_path_buf(),
            state: GenerationState::Idle,
            transitions: Vec::new(),
            findings: Vec::new(),
            existing_files: 0,
            files: Vec::new(),
            error: None,
        }
    }

    fn aborted(node: NodeId, error: &GenerateError) -> Self {
        let mut report = Self::new(node, Path::new(""));
        report.error = Some(error.to_string());
        report.enter(GenerationState::Failed);
        report
    }

    fn enter(&mut self, state: GenerationState) {
        if self.state != state {
            tracing::debug!("Case {}: {:?} -> {:?}", self.node, self.state, state);
            self.state = state;
            self.transitions.push(state);
        }
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| predicate(&f.outcome)).count()
    }

    /// Files written
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written))
    }

    /// Empty slots, existing files kept and duplicate outputs
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped(_)))
    }

    /// Files that failed to write
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    /// Whether generation ran and every attempted write succeeded
    pub fn succeeded(&self) -> bool {
        self.state == GenerationState::Done && self.failed() == 0
    }
}

/// Report of any terminal node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GenerationReport {
    /// Single-file output
    File(FileReport),
    /// Whole-case output
    Case(CaseReport),
}

/// Runs generation over a graph
pub struct Generator<'a> {
    graph: &'a Graph,
    settings: &'a GeneratorSettings,
    cache: &'a mut DocumentCache,
}

impl<'a> Generator<'a> {
    /// Create a generator
    pub fn new(graph: &'a Graph, settings: &'a GeneratorSettings, cache: &'a mut DocumentCache) -> Self {
        Self {
            graph,
            settings,
            cache,
        }
    }

    fn node(&self, id: NodeId, expected: NodeKind) -> Result<&'a Node, GenerateError> {
        let graph = self.graph;
        let node = graph.node(id).ok_or(GenerateError::NodeNotFound(id))?;
        if node.kind() != expected {
            return Err(GenerateError::WrongKind {
                node: id,
                expected,
                found: node.kind(),
            });
        }
        Ok(node)
    }

    /// Mode a file output runs in: validation when it feeds a case output
    pub fn mode_of(&self, node: NodeId) -> GenerateMode {
        if self.graph.feeds(node, SocketType::CaseFile) {
            GenerateMode::Validation
        } else {
            GenerateMode::Standalone
        }
    }

    /// Generate a file output in the mode its connections imply
    pub fn generate_file(&mut self, node: NodeId) -> Result<FileReport, GenerateError> {
        let mode = self.mode_of(node);
        self.generate_file_in(node, mode)
    }

    /// Generate a file output in an explicit mode
    pub fn generate_file_in(&mut self, node: NodeId, mode: GenerateMode) -> Result<FileReport, GenerateError> {
        self.settings.validate()?;
        let output = self.node(node, NodeKind::FileOutput)?;
        match mode {
            GenerateMode::Standalone => self.standalone(output),
            GenerateMode::Validation => self.validation_only(output),
        }
    }

    fn validation_only(&mut self, output: &Node) -> Result<FileReport, GenerateError> {
        let mut report = FileReport::new(output.id, GenerateMode::Validation);
        report.enter(GenerationState::Validating);
        let validation = Validator::new(self.graph).validate(output.id)?;
        let clean = validation.is_clean();
        report.findings = validation.into_findings();
        if !clean {
            tracing::warn!("Output {} failed validation", output.id);
            report.enter(GenerationState::Failed);
            return Ok(report);
        }

        report.enter(GenerationState::Building);
        self.cached_build(output.id)?;
        report.outcome = Some(FileOutcome::Cached);
        report.enter(GenerationState::Done);
        Ok(report)
    }

    fn standalone(&mut self, output: &Node) -> Result<FileReport, GenerateError> {
        let mut report = FileReport::new(output.id, GenerateMode::Standalone);
        report.enter(GenerationState::Validating);
        let validation = Validator::new(self.graph).validate(output.id)?;

        let document = if validation.is_clean() {
            report.enter(GenerationState::Building);
            self.cached_build(output.id)?
        } else if self.allows_partial(output, &validation) {
            report.enter(GenerationState::Building);
            report.partial = true;
            tracing::warn!(
                "Output {}: leaving out {} invalid entries",
                output.id,
                validation.errors().count()
            );
            let document = DocumentBuilder::new(self.graph)
                .pruned_by(&validation)
                .build(output.id)
                .map_err(|source| GenerateError::Internal {
                    node: output.id,
                    source,
                })?;
            Arc::new(document)
        } else {
            tracing::warn!("Output {} failed validation", output.id);
            report.findings = validation.into_findings();
            report.enter(GenerationState::Failed);
            return Ok(report);
        };
        report.findings = validation.into_findings();

        report.enter(GenerationState::Writing);
        let path = match self.standalone_path(output, &document) {
            Ok(path) => path,
            Err(message) => {
                tracing::warn!("Output {}: {}", output.id, message);
                report.outcome = Some(FileOutcome::Failed(message));
                report.enter(GenerationState::Done);
                return Ok(report);
            }
        };
        let outcome = self.write_file(&path, &document, true);
        report.path = Some(path);
        report.outcome = Some(outcome);
        report.enter(GenerationState::Done);
        Ok(report)
    }

    /// Partial output needs a usable root: no cycle anywhere, no findings on
    /// the output or its direct input, and a container to prune under.
    fn allows_partial(&self, output: &Node, validation: &Validation) -> bool {
        if validation.has_cycle() || validation.has_own_errors(output.id) {
            return false;
        }
        let Some(root) = self
            .graph
            .connections_into(SocketRef::new(output.id, 0))
            .next()
            .map(|c| c.from.node)
        else {
            return false;
        };
        if validation.has_own_errors(root) {
            return false;
        }
        let is_container = self
            .graph
            .node(root)
            .is_some_and(|n| n.kind() == NodeKind::Container);
        is_container || validation.is_eligible(root)
    }

    /// Target of a standalone write: the `path` property when it names a
    /// file, else the file name inside that directory or the output directory
    fn standalone_path(&self, output: &Node, document: &Document) -> Result<PathBuf, String> {
        let custom = output.text_property("path").trim();
        let mut dir = self.settings.output_dir.clone();
        if !custom.is_empty() {
            let mut path = PathBuf::from(custom);
            if path.is_relative() {
                path = self.settings.output_dir.join(path);
            }
            if !custom.ends_with(['/', '\\']) && !path.is_dir() {
                return Ok(path);
            }
            dir = path;
        }
        let stem = file_stem(output, document)?.ok_or("No file name: set one on the output node")?;
        Ok(dir.join(self.settings.file_name(&stem)))
    }

    /// Generate a case output into the directory its case name resolves to
    pub fn generate_case(&mut self, node: NodeId) -> Result<CaseReport, GenerateError> {
        let case = self.node(node, NodeKind::CaseOutput)?;
        let dir = resolve_case_path(case.text_property("case_name"), &self.settings.output_dir)?;
        self.generate_case_into(node, &dir)
    }

    /// Generate a case output into `case_dir`
    pub fn generate_case_into(&mut self, node: NodeId, case_dir: &Path) -> Result<CaseReport, GenerateError> {
        self.settings.validate()?;
        let case = self.node(node, NodeKind::CaseOutput)?;
        let mut report = CaseReport::new(node, case_dir);

        report.enter(GenerationState::Validating);
        let validation = Validator::new(self.graph).validate(node)?;
        let clean = validation.is_clean();
        report.findings = validation.into_findings();
        if !clean {
            tracing::warn!("Case {} failed validation, nothing written", node);
            report.enter(GenerationState::Failed);
            return Ok(report);
        }

        let overwrite =
            self.settings.overwrite || matches!(case.property("overwrite"), Some(PropertyValue::Bool(true)));
        let existing = CaseSummary::scan(case_dir)?;
        report.existing_files = existing.file_count();
        if !existing.is_empty() {
            tracing::info!("{} already holds {} case files", case_dir.display(), existing.file_count());
        }

        let mut seen = HashSet::new();
        let mut claimed = HashSet::new();
        for slot in 0..case.inputs().len() {
            let sources: Vec<NodeId> = self
                .graph
                .connections_into(SocketRef::new(node, slot))
                .map(|c| c.from.node)
                .collect();
            if sources.is_empty() {
                report.files.push(FileEntry::empty_slot(slot));
                continue;
            }

            for source in sources {
                let mut entry = FileEntry {
                    slot,
                    node: Some(source),
                    category: None,
                    path: None,
                    outcome: FileOutcome::Skipped(SkipReason::Duplicate),
                };
                if !seen.insert(source) {
                    tracing::warn!("Output {} is connected to the case more than once", source);
                    report.files.push(entry);
                    continue;
                }

                report.enter(GenerationState::Building);
                let document = self.cached_build(source)?;
                let stem = match self.graph.node(source).map(|output| file_stem(output, &document)) {
                    Some(Ok(Some(stem))) => stem,
                    Some(Err(message)) => {
                        tracing::warn!("Output {}: {}", source, message);
                        entry.outcome = FileOutcome::Failed(message);
                        report.files.push(entry);
                        continue;
                    }
                    _ => {
                        entry.outcome = FileOutcome::Failed("No file name".into());
                        report.files.push(entry);
                        continue;
                    }
                };

                let (category, known) = classify_or_system(&stem);
                if !known {
                    tracing::warn!("'{}' is not a known case file, placing it in system/", stem);
                    report.findings.push(Finding::warning(
                        FindingKind::Unclassified,
                        source,
                        format!("'{stem}' is not a known case file and was placed in system/"),
                    ));
                }
                let file_name = self.settings.file_name(&stem);
                let path = case_dir.join(category.dir_name()).join(&file_name);
                entry.category = Some(category);
                entry.path = Some(path.clone());

                report.enter(GenerationState::Writing);
                entry.outcome = if !claimed.insert(path.clone()) {
                    tracing::warn!("Output {} collides with another output at {}", source, path.display());
                    FileOutcome::Failed(format!(
                        "Another output in this case already writes {}/{}",
                        category.dir_name(),
                        file_name
                    ))
                } else if existing.contains(category, &file_name) && !overwrite {
                    tracing::warn!("{} exists, skipping", path.display());
                    FileOutcome::Skipped(SkipReason::Exists)
                } else {
                    self.write_file(&path, &document, self.settings.backup_existing)
                };
                report.files.push(entry);
            }
        }

        report.enter(GenerationState::Done);
        tracing::info!(
            "Case {}: {} written, {} skipped, {} failed",
            case_dir.display(),
            report.written(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }

    /// Generate every terminal node: file outputs first so case outputs
    /// reuse their documents.
    ///
    /// A terminal whose call fails gets a `Failed` report carrying the error
    /// and the run moves on to the next one.
    pub fn generate_all(&mut self) -> Result<Vec<GenerationReport>, GenerateError> {
        self.settings.validate()?;
        let graph = self.graph;
        let mut reports = Vec::new();
        for output in graph.output_nodes().filter(|n| n.kind() == NodeKind::FileOutput) {
            let report = self.generate_file(output.id).unwrap_or_else(|e| {
                tracing::error!("Output {}: {}", output.id, e);
                FileReport::aborted(output.id, self.mode_of(output.id), &e)
            });
            reports.push(GenerationReport::File(report));
        }
        for case in graph.output_nodes().filter(|n| n.kind() == NodeKind::CaseOutput) {
            let report = self.generate_case(case.id).unwrap_or_else(|e| {
                tracing::error!("Case {}: {}", case.id, e);
                CaseReport::aborted(case.id, &e)
            });
            reports.push(GenerationReport::Case(report));
        }
        Ok(reports)
    }

    fn cached_build(&mut self, node: NodeId) -> Result<Arc<Document>, GenerateError> {
        let graph = self.graph;
        self.cache
            .get_or_try_build(node, graph.revision(), || build(graph, node))
            .map_err(|source| GenerateError::Internal { node, source })
    }

    /// Write one file; failures are reported, never propagated
    fn write_file(&self, path: &Path, document: &Document, backup: bool) -> FileOutcome {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            if backup && path.is_file() {
                let copy = backup_file(path)?;
                tracing::info!("Backed up {} to {}", path.display(), copy.display());
            }
            fs::write(path, to_foam_string(document))
        })();

        match result {
            Ok(()) => {
                tracing::info!("Wrote {}", path.display());
                FileOutcome::Written
            }
            Err(e) => {
                tracing::error!("Failed to write {}: {}", path.display(), e);
                FileOutcome::Failed(e.to_string())
            }
        }
    }
}

/// File name for an output: its `filename` property, else the document's root key.
///
/// A name that could leave its directory is an error.
fn file_stem(output: &Node, document: &Document) -> Result<Option<String>, String> {
    let custom = output.text_property("filename").trim();
    let stem = if custom.is_empty() { document.root_key() } else { Some(custom) };
    match stem {
        Some(stem) if stem == "." || stem == ".." || stem.contains(['/', '\\']) => {
            Err(format!("'{stem}' is not a plain file name"))
        }
        stem => Ok(stem.map(str::to_string)),
    }
}

/// Error that aborts a generation call
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node is not the expected terminal kind
    #[error("Node {node} is a {found} node, expected {expected}")]
    WrongKind {
        /// Node
        node: NodeId,
        /// Expected kind
        expected: NodeKind,
        /// Actual kind
        found: NodeKind,
    },

    /// Graph query failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Case directory could not be resolved or scanned
    #[error(transparent)]
    CaseDir(#[from] CaseDirError),

    /// Settings cannot produce valid paths
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Build failed after validation passed
    #[error("Internal error building {node}: {source}")]
    Internal {
        /// Node being built
        node: NodeId,
        /// Build failure
        source: BuildError,
    },
}
