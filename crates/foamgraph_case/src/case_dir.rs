// SPDX-License-Identifier: MIT OR Apache-2.0
//! Case directory utilities: naming, path resolution, existing content and
//! backups.

use crate::category::Category;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Characters no case name may contain
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Longest accepted case name
const MAX_NAME_LEN: usize = 255;

fn is_reserved(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let stem = upper.split('.').next().unwrap_or_default();
    matches!(stem, "CON" | "PRN" | "AUX" | "NUL")
        || ["COM", "LPT"].iter().any(|prefix| {
            stem.strip_prefix(prefix)
                .is_some_and(|digit| digit.len() == 1 && matches!(digit.as_bytes()[0], b'1'..=b'9'))
        })
}

/// Check a bare case name for portability
pub fn validate_case_name(name: &str) -> Result<(), CaseDirError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CaseDirError::EmptyName);
    }
    if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
        return Err(CaseDirError::InvalidCharacter(c));
    }
    if is_reserved(name) {
        return Err(CaseDirError::ReservedName(name.to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CaseDirError::NameTooLong(name.chars().count()));
    }
    Ok(())
}

/// Resolve a case name or path to the case directory.
///
/// A bare name is validated and placed under `output_dir`; anything with a
/// path separator or an absolute path is used as given.
pub fn resolve_case_path(input: &str, output_dir: &Path) -> Result<PathBuf, CaseDirError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CaseDirError::EmptyName);
    }

    let path = Path::new(input);
    if path.is_absolute() || input.contains(['/', '\\']) {
        return Ok(path.to_path_buf());
    }

    validate_case_name(input)?;
    Ok(output_dir.join(input))
}

/// Files already present in a case directory, per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseSummary {
    /// File names per category, sorted
    pub files: BTreeMap<Category, Vec<String>>,
}

impl CaseSummary {
    /// Scan the category directories of `case_dir`
    pub fn scan(case_dir: &Path) -> Result<Self, CaseDirError> {
        let mut files = BTreeMap::new();
        for category in Category::ALL {
            let dir = case_dir.join(category.dir_name());
            if !dir.is_dir() {
                continue;
            }
            let mut names = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| CaseDirError::Scan {
                    path: dir.clone(),
                    message: e.to_string(),
                })?;
                if entry.file_type().is_file() {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            if !names.is_empty() {
                files.insert(category, names);
            }
        }
        Ok(Self { files })
    }

    /// Whether a file is already present
    pub fn contains(&self, category: Category, file_name: &str) -> bool {
        self.files
            .get(&category)
            .is_some_and(|names| names.iter().any(|n| n == file_name))
    }

    /// Total number of files found
    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Whether no files were found
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Copy `path` to the first free `<path>.backup`, `<path>.backup.1`, ...
pub fn backup_file(path: &Path) -> io::Result<PathBuf> {
    let base = path.as_os_str().to_string_lossy().into_owned();
    let mut backup = PathBuf::from(format!("{base}.backup"));
    let mut counter = 1;
    while backup.exists() {
        backup = PathBuf::from(format!("{base}.backup.{counter}"));
        counter += 1;
    }
    fs::copy(path, &backup)?;
    Ok(backup)
}

/// Error from case directory handling
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseDirError {
    /// Blank case name
    #[error("Case name cannot be empty")]
    EmptyName,

    /// Name contains a character that is not portable
    #[error("Case name cannot contain '{0}'")]
    InvalidCharacter(char),

    /// Name is a reserved device name on Windows
    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    /// Name too long for common filesystems
    #[error("Case name is {0} characters long, the limit is 255")]
    NameTooLong(usize),

    /// Directory could not be listed
    #[error("Cannot scan {}: {message}", path.display())]
    Scan {
        /// Directory being scanned
        path: PathBuf,
        /// Underlying error
        message: String,
    },
}
