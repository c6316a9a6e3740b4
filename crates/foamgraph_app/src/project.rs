// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project settings, stored as RON next to the scene files.

use crate::history::MAX_HISTORY;
use foamgraph_case::{GeneratorSettings, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current project format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Project file name inside a project directory
pub const PROJECT_FILE_NAME: &str = "foamgraph.ron";

/// Per-project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Format version
    pub version: u32,
    /// Project name
    pub name: String,
    /// Undo steps kept by an editing session
    pub history_depth: usize,
    /// Where and how generated files are written
    pub generator: GeneratorSettings,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            version: PROJECT_FORMAT_VERSION,
            name: "Untitled".to_string(),
            history_depth: MAX_HISTORY,
            generator: GeneratorSettings::default(),
        }
    }
}

impl ProjectSettings {
    /// Create new project settings with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load project settings from a file
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: ProjectSettings = ron::from_str(&content)?;

        if settings.version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: settings.version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }
        settings.generator.validate()?;

        tracing::debug!("Loaded project settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ProjectError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No project file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save project settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;

        std::fs::write(path, content).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the project file path for a project directory
    pub fn project_file_path(project_dir: &Path) -> PathBuf {
        project_dir.join(PROJECT_FILE_NAME)
    }
}

/// Error when loading or saving project settings
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// File could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid RON
    #[error("Invalid project file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Cannot serialize project settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Generator settings are unusable
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = ProjectSettings::project_file_path(dir.path());

        let mut settings = ProjectSettings::new("pitzDaily");
        settings.history_depth = 5;
        settings.generator.output_dir = PathBuf::from("cases");
        settings.generator.file_extension = Some("txt".to_string());
        settings.save(&path).unwrap();

        let loaded = ProjectSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: ProjectSettings = ron::from_str("(name: \"cavity\")").unwrap();
        assert_eq!(settings.name, "cavity");
        assert_eq!(settings.history_depth, MAX_HISTORY);
        assert_eq!(settings.generator, GeneratorSettings::default());
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ProjectSettings::load_or_default(&dir.path().join("missing.ron")).unwrap();
        assert_eq!(settings, ProjectSettings::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.ron");
        std::fs::write(&path, "(version: 99)").unwrap();
        assert!(matches!(
            ProjectSettings::load(&path),
            Err(ProjectError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
