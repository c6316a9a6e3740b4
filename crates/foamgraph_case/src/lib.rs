// SPDX-License-Identifier: MIT OR Apache-2.0
//! OpenFOAM case generation for foamgraph.
//!
//! This crate takes validated graphs from `foamgraph_graph` and writes them
//! to disk:
//! - OpenFOAM dictionary text for built documents
//! - Classification of files into `0/`, `constant/` and `system/`
//! - A document cache shared by chained file and case outputs
//! - Case directory naming, existing-content scans and backups

pub mod cache;
pub mod case_dir;
pub mod category;
pub mod generator;
pub mod settings;
pub mod writer;

pub use cache::{CacheStats, DocumentCache};
pub use case_dir::{CaseDirError, CaseSummary};
pub use category::Category;
pub use generator::{
    CaseReport, FileEntry, FileOutcome, FileReport, GenerateError, GenerateMode, GenerationReport,
    GenerationState, Generator, SkipReason,
};
pub use settings::{GeneratorSettings, SettingsError};
pub use writer::to_foam_string;
