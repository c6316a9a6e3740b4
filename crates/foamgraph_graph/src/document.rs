// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchical documents built from the graph.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A typed leaf value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Quoted string
    Str(String),
    /// Bare word (enumeration choice)
    Word(String),
    /// Three-component vector
    Vector([f64; 3]),
    /// Nine-component tensor, row-major
    Tensor([f64; 9]),
    /// Dimension exponents with an optional value
    Dimensioned {
        /// Exponents in OpenFOAM order
        dimensions: [f64; 7],
        /// Value carrying the dimensions
        value: Option<f64>,
    },
}

impl Scalar {
    /// Numeric value, for use as a composite component
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

/// Immutable hierarchical value produced by the document builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    /// Leaf value
    Scalar(Scalar),
    /// Ordered sequence
    List(Vec<Document>),
    /// Ordered mapping from keys to values
    Mapping(IndexMap<String, Document>),
}

impl Document {
    /// Single-entry mapping `{key: value}`
    pub fn entry(key: impl Into<String>, value: Document) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(key.into(), value);
        Self::Mapping(map)
    }

    /// Mapping content, if this is a mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Document>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key of a mapping
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Key of a single-entry mapping, i.e. the name of the node it came from
    pub fn root_key(&self) -> Option<&str> {
        match self {
            Self::Mapping(map) if map.len() == 1 => map.keys().next().map(String::as_str),
            _ => None,
        }
    }

    /// Number of leaf values below this document
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::List(items) => items.iter().map(Document::leaf_count).sum(),
            Self::Mapping(map) => map.values().map(Document::leaf_count).sum(),
        }
    }
}

impl From<Scalar> for Document {
    fn from(scalar: Scalar) -> Self {
        Self::Scalar(scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_key() {
        let doc = Document::entry("controlDict", Document::Mapping(IndexMap::new()));
        assert_eq!(doc.root_key(), Some("controlDict"));
        assert_eq!(Document::Scalar(Scalar::Int(1)).root_key(), None);
    }

    #[test]
    fn test_json_shape() {
        let inner = Document::entry("x", Scalar::Int(1).into());
        let doc = Document::entry("FoamFile", inner);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json, serde_json::json!({"FoamFile": {"x": {"Int": 1}}}));
    }
}
