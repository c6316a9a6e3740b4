// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generator settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings shared by every generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Directory that bare case names and relative output paths resolve against
    pub output_dir: PathBuf,
    /// Extension appended to generated file names, without the dot
    pub file_extension: Option<String>,
    /// Overwrite existing case files even when the case node does not ask to
    pub overwrite: bool,
    /// Copy an existing file to `<file>.backup` before overwriting it
    pub backup_existing: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            file_extension: None,
            overwrite: false,
            backup_existing: true,
        }
    }
}

impl GeneratorSettings {
    /// Check the settings for values that cannot produce valid paths
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(SettingsError::EmptyOutputDir);
        }
        if let Some(extension) = &self.file_extension {
            if extension.is_empty()
                || extension.starts_with('.')
                || extension.contains(['/', '\\'])
            {
                return Err(SettingsError::InvalidExtension(extension.clone()));
            }
        }
        Ok(())
    }

    /// Append the configured extension to a file name
    pub fn file_name(&self, stem: &str) -> String {
        match &self.file_extension {
            Some(extension) => format!("{stem}.{extension}"),
            None => stem.to_string(),
        }
    }
}

/// Invalid generator settings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// Output directory is empty
    #[error("Output directory must not be empty")]
    EmptyOutputDir,

    /// Extension with a dot or a path separator
    #[error("Invalid file extension '{0}': give it without a leading dot or separators")]
    InvalidExtension(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GeneratorSettings::default();
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert!(settings.backup_existing);
        assert!(!settings.overwrite);
        assert_eq!(settings.file_name("controlDict"), "controlDict");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_extension() {
        let settings = GeneratorSettings {
            file_extension: Some("txt".into()),
            ..Default::default()
        };
        assert_eq!(settings.file_name("U"), "U.txt");

        let bad = GeneratorSettings {
            file_extension: Some(".txt".into()),
            ..Default::default()
        };
        assert_eq!(bad.validate(), Err(SettingsError::InvalidExtension(".txt".into())));
    }
}
