// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history for graph edits.
//!
//! Each step is an [`OperationGroup`]: one or more [`Edit`] records applied
//! together and reverted together in reverse order. The stack is bounded;
//! the oldest group is dropped once the depth is exceeded.

use crate::commands::Edit;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default number of undo steps kept
pub const MAX_HISTORY: usize = 20;

/// Error type for history operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Unique identifier for an operation group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationID(pub u64);

/// Edits undone and redone as one step
#[derive(Debug, Clone)]
pub struct OperationGroup {
    /// Group ID
    pub id: OperationID,
    /// Description shown in the history list
    pub description: String,
    /// Edits in the order they were applied
    pub edits: Vec<Edit>,
    /// Seconds since the Unix epoch when the group was committed
    pub timestamp: u64,
}

impl OperationGroup {
    /// Create an empty group
    pub fn new(id: OperationID, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            edits: Vec::new(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    /// Append an already applied edit
    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Whether the group holds no edits
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Bounded undo/redo stacks
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<OperationGroup>,
    redo_stack: VecDeque<OperationGroup>,
    next_id: u64,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create a history with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create a history keeping at most `max_depth` undo steps
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 0,
            max_depth: max_depth.max(1),
        }
    }

    /// Start a new group; commit it once its edits are applied
    pub fn begin_operation(&mut self, description: impl Into<String>) -> OperationGroup {
        let id = OperationID(self.next_id);
        self.next_id += 1;
        OperationGroup::new(id, description)
    }

    /// Record an applied group. Empty groups are dropped.
    pub fn commit(&mut self, group: OperationGroup) {
        if group.is_empty() {
            return;
        }
        self.redo_stack.clear();
        self.undo_stack.push_back(group);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Take the most recent group to revert
    pub fn undo(&mut self) -> Result<OperationGroup> {
        self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)
    }

    /// Take the most recently undone group to re-apply
    pub fn redo(&mut self) -> Result<OperationGroup> {
        self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)
    }

    /// Put a reverted group on the redo stack
    pub fn push_redo(&mut self, group: OperationGroup) {
        self.redo_stack.push_back(group);
    }

    /// Put a re-applied group back on the undo stack without clearing redo
    pub fn push_undo(&mut self, group: OperationGroup) {
        self.undo_stack.push_back(group);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Whether undo is possible
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether redo is possible
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undo steps
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redo steps
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum number of undo steps
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Description of the next undo step
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|g| g.description.as_str())
    }

    /// Description of the next redo step
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|g| g.description.as_str())
    }

    /// Summary counters
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
            edit_count: self
                .undo_stack
                .iter()
                .chain(self.redo_stack.iter())
                .map(|g| g.edits.len())
                .sum(),
        }
    }
}

/// History summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    /// Undo steps available
    pub undo_count: usize,
    /// Redo steps available
    pub redo_count: usize,
    /// Configured depth
    pub max_depth: usize,
    /// Edit records held on both stacks
    pub edit_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use foamgraph_graph::{NodeId, PropertyValue};

    fn group(history: &mut History, description: &str) -> OperationGroup {
        let mut group = history.begin_operation(description);
        group.push(Edit::SetProperty {
            node: NodeId::new(),
            key: "value".to_string(),
            before: PropertyValue::Int(0),
            after: PropertyValue::Int(1),
        });
        group
    }

    #[test]
    fn test_commit_and_undo() {
        let mut history = History::new();
        let g = group(&mut history, "Set value");
        history.commit(g);

        assert!(history.can_undo());
        assert_eq!(history.undo_description(), Some("Set value"));

        let undone = history.undo().unwrap();
        history.push_redo(undone);
        assert!(!history.can_undo());
        assert_eq!(history.redo_description(), Some("Set value"));
    }

    #[test]
    fn test_max_depth() {
        let mut history = History::new();
        for i in 0..25 {
            let g = group(&mut history, &format!("Edit {i}"));
            history.commit(g);
        }
        assert_eq!(history.undo_depth(), MAX_HISTORY);
        assert_eq!(history.undo_description(), Some("Edit 24"));
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut history = History::with_max_depth(5);
        let g = group(&mut history, "a");
        history.commit(g);
        let undone = history.undo().unwrap();
        history.push_redo(undone);
        assert!(history.can_redo());

        let g = group(&mut history, "b");
        history.commit(g);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_group_not_recorded() {
        let mut history = History::new();
        let g = history.begin_operation("nothing");
        history.commit(g);
        assert!(!history.can_undo());
        assert!(matches!(history.undo(), Err(HistoryError::NothingToUndo)));
    }

    #[test]
    fn test_stats() {
        let mut history = History::with_max_depth(3);
        let g = group(&mut history, "a");
        history.commit(g);
        assert_eq!(
            history.stats(),
            HistoryStats {
                undo_count: 1,
                redo_count: 0,
                max_depth: 3,
                edit_count: 1,
            }
        );
        history.clear();
        assert!(matches!(history.redo(), Err(HistoryError::NothingToRedo)));
    }
}
