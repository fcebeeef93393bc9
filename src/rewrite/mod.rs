//! Docstring insertion into on-disk modules.
//!
//! Rewrites are byte-range splices against a fresh parse of the current
//! module text: only the docstring positions of the target definition
//! change, every other byte is kept. The result is re-parsed before it is
//! handed back.

pub mod class;
pub mod function;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use tree_sitter::Node;

use crate::parser::literal::render_docstring;
use crate::parser::{
    body_of, definition_name, docstring_statement, first_statement, parse_source,
    top_level_definitions, ParseError, ParsedModule, UnitKind,
};

pub use class::rewrite_class;
pub use function::rewrite_function;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{kind} {name:?} not found in {path}")]
    UnitNotFound {
        kind: UnitKind,
        name: String,
        path: PathBuf,
    },

    #[error("no generated docstring for method {method:?} of class {class:?}")]
    MissingMethodDoc { class: String, method: String },

    #[error("no usable documentation for {0}")]
    NoDocumentation(String),

    #[error("rewritten module {path} no longer parses: {source}")]
    InvalidOutput {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Replace `start..end` with `replacement`. Insertions have `start == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// Apply non-overlapping edits, back to front so offsets stay valid.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = source.to_string();
    for edit in edits {
        out.replace_range(edit.start..edit.end, &edit.replacement);
    }
    out
}

/// First top-level definition of `kind` named `name`.
pub fn find_definition<'t>(
    module: &'t ParsedModule,
    kind: UnitKind,
    name: &str,
) -> Result<Node<'t>, RewriteError> {
    let source = module.bytes();
    let matching: Vec<Node<'t>> = top_level_definitions(module.root())
        .into_iter()
        .filter(|(k, node)| *k == kind && definition_name(*node, source) == Some(name))
        .map(|(_, node)| node)
        .collect();

    if matching.len() > 1 {
        warn!(
            module = %module.path.display(),
            unit = name,
            count = matching.len(),
            "duplicate {} definitions, rewriting the first",
            kind
        );
    }

    matching
        .into_iter()
        .next()
        .ok_or_else(|| RewriteError::UnitNotFound {
            kind,
            name: name.to_string(),
            path: module.path.clone(),
        })
}

fn line_start(source: &str, byte: usize) -> usize {
    source[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

fn leading_whitespace(source: &str, from: usize) -> &str {
    let line = &source[from..];
    let len = line.len() - line.trim_start_matches(|c: char| c == ' ' || c == '\t').len();
    &line[..len]
}

/// True when only indentation precedes `byte` on its line.
fn starts_line(source: &str, byte: usize) -> bool {
    source[line_start(source, byte)..byte]
        .chars()
        .all(|c| c == ' ' || c == '\t')
}

/// Indentation for statements of `definition`'s body.
fn body_indent(source: &str, definition: Node, statement: Node) -> String {
    if starts_line(source, statement.start_byte()) {
        leading_whitespace(source, line_start(source, statement.start_byte())).to_string()
    } else {
        let header = leading_whitespace(source, line_start(source, definition.start_byte()));
        format!("{header}    ")
    }
}

/// Edit that puts `text` as the docstring of `definition`.
///
/// An existing docstring is replaced only when `overwrite` is set; otherwise
/// `None` is returned and the definition stays untouched.
pub fn docstring_edit(definition: Node, source: &str, text: &str, overwrite: bool) -> Option<Edit> {
    if let Some(stmt) = docstring_statement(definition, source.as_bytes()) {
        if !overwrite {
            return None;
        }
        let indent = body_indent(source, definition, stmt);
        return Some(Edit {
            start: stmt.start_byte(),
            end: stmt.end_byte(),
            replacement: render_docstring(text, &indent),
        });
    }

    let body = body_of(definition)?;
    let first = first_statement(body).unwrap_or(body);
    let indent = body_indent(source, definition, first);
    let literal = render_docstring(text, &indent);

    if starts_line(source, first.start_byte()) {
        let at = line_start(source, first.start_byte());
        return Some(Edit {
            start: at,
            end: at,
            replacement: format!("{indent}{literal}\n"),
        });
    }

    // Body on the header line: move it onto its own indented line.
    let gap_end = first.start_byte();
    let gap_start = source[..gap_end].trim_end_matches(|c: char| c == ' ' || c == '\t').len();
    Some(Edit {
        start: gap_start,
        end: gap_end,
        replacement: format!("\n{indent}{literal}\n{indent}"),
    })
}

/// Apply edits and verify the result still parses.
pub fn finish(path: &Path, source: &str, edits: Vec<Edit>) -> Result<String, RewriteError> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }
    let rewritten = apply_edits(source, edits);
    parse_source(path, rewritten.clone()).map_err(|source| RewriteError::InvalidOutput {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(rewritten)
}
