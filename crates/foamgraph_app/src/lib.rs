// SPDX-License-Identifier: MIT OR Apache-2.0
//! foamgraph editing session.
//!
//! Ties a node graph to its undo history, its document cache and the
//! project settings:
//! - Reversible edit records and a bounded undo/redo stack
//! - RON project settings with embedded generator settings
//! - A [`Session`] that records edits and runs validation, builds and
//!   generation

pub mod commands;
pub mod history;
pub mod project;
pub mod session;

pub use commands::{CommandError, Edit, GraphCommand};
pub use history::{History, HistoryError, HistoryStats, OperationGroup, OperationID, MAX_HISTORY};
pub use project::{ProjectError, ProjectSettings, PROJECT_FILE_NAME};
pub use session::{Session, SessionError};
