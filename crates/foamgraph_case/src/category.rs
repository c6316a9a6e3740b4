// SPDX-License-Identifier: MIT OR Apache-2.0
//! Assignment of generated files to case directories.
//!
//! Classification looks at the file name only. Field names match exactly,
//! dictionary names match by case-insensitive substring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level directory of an OpenFOAM case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Initial and boundary conditions (`0/`)
    Initial,
    /// Physical properties and mesh (`constant/`)
    Constant,
    /// Solver control (`system/`)
    System,
}

impl Category {
    /// All categories in directory listing order
    pub const ALL: [Category; 3] = [Category::Initial, Category::Constant, Category::System];

    /// Directory name inside the case
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Initial => "0",
            Category::Constant => "constant",
            Category::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.dir_name())
    }
}

const SYSTEM_KEYWORDS: &[&str] = &[
    "controldict",
    "fvsolution",
    "fvschemes",
    "blockmeshdict",
    "decomposepardict",
    "snappyhexmeshdict",
    "meshing",
];

const CONSTANT_KEYWORDS: &[&str] = &[
    "transportproperties",
    "turbulenceproperties",
    "thermophysicalproperties",
    "transport",
    "turbulence",
    "thermophysical",
    "properties",
];

/// Field files, matched exactly so that one-letter names do not swallow
/// every other name
const FIELD_NAMES: &[&str] = &["p", "u", "t", "k", "omega", "epsilon", "nut", "alphat"];

const FIELD_KEYWORDS: &[&str] = &["velocity", "pressure", "temperature", "field"];

/// Category for a file name, `None` when the name is not recognized
pub fn classify(file_name: &str) -> Option<Category> {
    let name = file_name.to_lowercase();

    if SYSTEM_KEYWORDS.iter().any(|k| name.contains(k)) {
        return Some(Category::System);
    }
    if CONSTANT_KEYWORDS.iter().any(|k| name.contains(k)) {
        return Some(Category::Constant);
    }
    if FIELD_NAMES.contains(&name.as_str()) || FIELD_KEYWORDS.iter().any(|k| name.contains(k)) {
        return Some(Category::Initial);
    }
    None
}

/// Category for a file name, falling back to `system/`
pub fn classify_or_system(file_name: &str) -> (Category, bool) {
    match classify(file_name) {
        Some(category) => (category, true),
        None => (Category::System, false),
    }
}
