// SPDX-License-Identifier: MIT OR Apache-2.0
//! OpenFOAM dictionary text.
//!
//! A document rooted at `{name: {..}}` is written as a file whose top level
//! holds the inner entries; the root name becomes the file name. A root
//! key-value pair is written as a single `name value;` line.

use foamgraph_graph::{Document, Scalar};
use std::fmt::Write;

const INDENT: &str = "    ";
/// Keys shorter than this are padded so values line up
const KEY_WIDTH: usize = 16;

/// Render a document as OpenFOAM dictionary text
pub fn to_foam_string(document: &Document) -> String {
    let mut out = String::new();
    match document {
        Document::Mapping(map) if map.len() == 1 => {
            for (name, value) in map {
                match value {
                    Document::Mapping(entries) => write_entries(&mut out, entries, 0),
                    other => write_entry(&mut out, name, other, 0),
                }
            }
        }
        Document::Mapping(entries) => write_entries(&mut out, entries, 0),
        other => {
            write_value(&mut out, other, 0);
            out.push('\n');
        }
    }
    out
}

fn write_entries(out: &mut String, entries: &indexmap::IndexMap<String, Document>, depth: usize) {
    for (name, value) in entries {
        write_entry(out, name, value, depth);
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_entry(out: &mut String, name: &str, value: &Document, depth: usize) {
    indent(out, depth);
    match value {
        Document::Mapping(entries) => {
            out.push_str(name);
            out.push('\n');
            indent(out, depth);
            out.push_str("{\n");
            write_entries(out, entries, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
            if depth == 0 {
                out.push('\n');
            }
        }
        Document::List(items) if !is_inline(items) => {
            out.push_str(name);
            out.push('\n');
            write_block_list(out, items, depth);
            out.push_str(";\n");
        }
        other => {
            let _ = write!(out, "{name:<KEY_WIDTH$}");
            if name.len() >= KEY_WIDTH {
                out.push(' ');
            }
            write_value(out, other, depth);
            out.push_str(";\n");
        }
    }
}

/// Lists of plain scalars go on one line
fn is_inline(items: &[Document]) -> bool {
    items.len() <= 10 && items.iter().all(|item| matches!(item, Document::Scalar(_)))
}

fn write_block_list(out: &mut String, items: &[Document], depth: usize) {
    indent(out, depth);
    out.push_str("(\n");
    for item in items {
        match item {
            Document::Mapping(entries) => write_entries(out, entries, depth + 1),
            other => {
                indent(out, depth + 1);
                write_value(out, other, depth + 1);
                out.push('\n');
            }
        }
    }
    indent(out, depth);
    out.push(')');
}

fn write_value(out: &mut String, value: &Document, depth: usize) {
    match value {
        Document::Scalar(scalar) => write_scalar(out, scalar),
        Document::List(items) if is_inline(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item, depth);
            }
            out.push(')');
        }
        Document::List(items) => {
            out.push('\n');
            write_block_list(out, items, depth);
        }
        Document::Mapping(entries) => {
            out.push_str("{\n");
            write_entries(out, entries, depth + 1);
            indent(out, depth);
            out.push('}');
        }
    }
}

fn write_scalar(out: &mut String, scalar: &Scalar) {
    match scalar {
        Scalar::Int(value) => {
            let _ = write!(out, "{value}");
        }
        Scalar::Float(value) => out.push_str(&float(*value)),
        Scalar::Str(text) => {
            let _ = write!(out, "\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""));
        }
        Scalar::Word(word) => out.push_str(word),
        Scalar::Vector(values) => write_tuple(out, values),
        Scalar::Tensor(values) => write_tuple(out, values),
        Scalar::Dimensioned { dimensions, value } => {
            out.push('[');
            for (i, exponent) in dimensions.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&exponent_text(*exponent));
            }
            out.push(']');
            if let Some(value) = value {
                out.push(' ');
                out.push_str(&float(*value));
            }
        }
    }
}

fn write_tuple(out: &mut String, values: &[f64]) {
    out.push('(');
    let parts: Vec<String> = values.iter().map(|v| float(*v)).collect();
    out.push_str(&parts.join(" "));
    out.push(')');
}

/// Shortest text that reads back as the same float.
///
/// Graph property edits reject NaN and infinities, so documents built from
/// a graph only carry finite numbers.
fn float(value: f64) -> String {
    format!("{value:?}")
}

fn exponent_text(exponent: f64) -> String {
    if exponent.fract() == 0.0 {
        format!("{}", exponent as i64)
    } else {
        float(exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn mapping(entries: Vec<(&str, Document)>) -> Document {
        Document::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<IndexMap<_, _>>(),
        )
    }

    #[test]
    fn test_root_entries_at_top_level() {
        let doc = Document::entry(
            "controlDict",
            mapping(vec![
                ("application", Scalar::Word("simpleFoam".into()).into()),
                ("endTime", Scalar::Int(2000).into()),
                ("deltaT", Scalar::Float(1.0).into()),
            ]),
        );

        let text = to_foam_string(&doc);
        assert_eq!(
            text,
            "application     simpleFoam;\nendTime         2000;\ndeltaT          1.0;\n"
        );
    }

    #[test]
    fn test_nested_blocks_and_composites() {
        let doc = Document::entry(
            "transportProperties",
            mapping(vec![
                (
                    "nu",
                    Scalar::Dimensioned {
                        dimensions: [0.0, 2.0, -1.0, 0.0, 0.0, 0.0, 0.0],
                        value: Some(1e-5),
                    }
                    .into(),
                ),
                (
                    "inlet",
                    mapping(vec![("U", Scalar::Vector([1.0, 0.0, 0.0]).into())]),
                ),
            ]),
        );

        let text = to_foam_string(&doc);
        assert!(text.contains("nu              [0 2 -1 0 0 0 0] 1e-5;\n"), "{text}");
        assert!(text.contains("inlet\n{\n    U               (1.0 0.0 0.0);\n}\n"), "{text}");
    }

    #[test]
    fn test_strings_are_quoted_and_words_bare() {
        let doc = mapping(vec![
            ("title", Scalar::Str("pitz \"daily\"".into()).into()),
            ("solver", Scalar::Word("PCG".into()).into()),
        ]);
        let text = to_foam_string(&doc);
        assert!(text.contains("title           \"pitz \\\"daily\\\"\";"));
        assert!(text.contains("solver          PCG;"));
    }

    #[test]
    fn test_lists() {
        let doc = mapping(vec![
            ("values", Document::List(vec![Scalar::Int(1).into(), Scalar::Int(2).into()])),
            (
                "patches",
                Document::List(vec![Document::entry(
                    "inlet",
                    mapping(vec![("type", Scalar::Word("patch".into()).into())]),
                )]),
            ),
        ]);
        let text = to_foam_string(&doc);
        assert!(text.contains("values          (1 2);\n"), "{text}");
        assert!(
            text.contains("patches\n(\n    inlet\n    {\n        type            patch;\n    }\n);\n"),
            "{text}"
        );
    }

    #[test]
    fn test_key_value_root() {
        let doc = Document::entry("nu", Scalar::Float(0.01).into());
        assert_eq!(to_foam_string(&doc), "nu              0.01;\n");
    }
}
