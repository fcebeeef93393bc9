//! Tree-sitter parsing of Python modules.
//!
//! This module provides:
//! - `ParsedModule`: a parsed tree kept together with its source text
//! - strict parsing for on-disk modules and lenient parsing for generated text
//! - node helpers shared by unit extraction, docstring extraction and rewriting

pub mod docstring;
pub mod literal;
pub mod units;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tree_sitter::{Language, Node, Parser as TsParser, Tree};

pub use docstring::{ClassDocs, Extraction, ExtractionError};
pub use units::{CodeUnit, MethodSummary, ModuleUnits};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("invalid query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("parser produced no tree for {0}")]
    NoTree(PathBuf),

    #[error("syntax error in {path} at line {line}, column {column}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
    },
}

/// The two kinds of top-level definition the pipeline documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Function,
    Class,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Function => "function",
            UnitKind::Class => "class",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds a parsed tree together with the text it was parsed from.
pub struct ParsedModule {
    pub tree: Tree,
    pub source: String,
    pub path: PathBuf,
}

impl ParsedModule {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

pub fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

fn parse_tree(path: &Path, source: &str) -> Result<Tree, ParseError> {
    let mut parser = TsParser::new();
    parser.set_language(&python_language())?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParseError::NoTree(path.to_path_buf()))
}

/// Parse source text, rejecting anything with a syntax error.
pub fn parse_source(path: &Path, source: String) -> Result<ParsedModule, ParseError> {
    let tree = parse_tree(path, &source)?;
    if let Some(node) = first_error(tree.root_node()) {
        let pos = node.start_position();
        return Err(ParseError::Syntax {
            path: path.to_path_buf(),
            line: pos.row + 1,
            column: pos.column + 1,
        });
    }
    Ok(ParsedModule {
        tree,
        source,
        path: path.to_path_buf(),
    })
}

/// Parse text that may be partial or broken, keeping whatever tree-sitter
/// recovers.
pub fn parse_lenient(path: &Path, source: String) -> Result<ParsedModule, ParseError> {
    let tree = parse_tree(path, &source)?;
    Ok(ParsedModule {
        tree,
        source,
        path: path.to_path_buf(),
    })
}

/// Read a module from disk and parse it strictly.
pub fn read_module(path: &Path) -> Result<ParsedModule, ParseError> {
    let source = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_source(path, source)
}

/// First ERROR or MISSING node in document order.
fn first_error(node: Node) -> Option<Node> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    Some(node)
}

/// Resolve a statement to the function or class it defines, looking through
/// decorators.
pub fn definition_of(node: Node) -> Option<(UnitKind, Node)> {
    match node.kind() {
        "function_definition" => Some((UnitKind::Function, node)),
        "class_definition" => Some((UnitKind::Class, node)),
        "decorated_definition" => node.child_by_field_name("definition").and_then(definition_of),
        _ => None,
    }
}

/// Top-level function and class definitions, in source order.
pub fn top_level_definitions(root: Node) -> Vec<(UnitKind, Node)> {
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter_map(definition_of)
        .collect()
}

pub fn definition_name<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
}

pub fn body_of(node: Node) -> Option<Node> {
    node.child_by_field_name("body")
}

/// Functions defined directly in a class body.
pub fn class_methods(class: Node) -> Vec<Node> {
    let Some(body) = body_of(class) else {
        return Vec::new();
    };
    let mut cursor = body.walk();
    body.named_children(&mut cursor)
        .filter_map(definition_of)
        .filter(|(kind, _)| *kind == UnitKind::Function)
        .map(|(_, node)| node)
        .collect()
}

/// First non-comment statement of a block.
pub fn first_statement(body: Node) -> Option<Node> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    first
}

/// The statement holding a definition's docstring, if it has one.
///
/// A docstring is a first statement made of a single plain string literal
/// (or implicit concatenation of them); f-strings and bytes do not count.
pub fn docstring_statement<'a>(definition: Node<'a>, source: &[u8]) -> Option<Node<'a>> {
    let stmt = first_statement(body_of(definition)?)?;
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return None;
    }
    let expr = stmt.named_child(0)?;
    let plain = match expr.kind() {
        "string" => literal::is_plain_string(expr.utf8_text(source).ok()?),
        "concatenated_string" => {
            let mut cursor = expr.walk();
            let parts: Vec<_> = expr.named_children(&mut cursor).collect();
            !parts.is_empty()
                && parts.iter().all(|part| {
                    part.kind() == "string"
                        && part
                            .utf8_text(source)
                            .map(literal::is_plain_string)
                            .unwrap_or(false)
                })
        }
        _ => false,
    };
    plain.then_some(stmt)
}

/// Decoded and cleaned docstring of a definition.
pub fn docstring_text(definition: Node, source: &[u8]) -> Option<String> {
    let stmt = docstring_statement(definition, source)?;
    let expr = stmt.named_child(0)?;
    let raw = match expr.kind() {
        "string" => literal::decode_string(expr.utf8_text(source).ok()?)?,
        _ => {
            let mut cursor = expr.walk();
            let mut joined = String::new();
            for part in expr.named_children(&mut cursor) {
                joined.push_str(&literal::decode_string(part.utf8_text(source).ok()?)?);
            }
            joined
        }
    };
    Some(literal::clean_docstring(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedModule {
        parse_source(Path::new("test.py"), src.to_string()).unwrap()
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = parse_source(Path::new("bad.py"), "def f(:\n    pass\n".to_string())
            .err()
            .expect("expected a syntax error");
        match err {
            ParseError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lenient_parse_accepts_broken_text() {
        let parsed = parse_lenient(Path::new("gen.py"), "def f(:\n".to_string()).unwrap();
        assert!(parsed.root().has_error());
    }

    #[test]
    fn test_top_level_definitions_include_decorated_and_async() {
        let module = parse(
            "import os\n\n@cache\ndef a():\n    pass\n\nasync def b():\n    pass\n\nclass C:\n    def m(self):\n        pass\n",
        );
        let defs = top_level_definitions(module.root());
        let names: Vec<_> = defs
            .iter()
            .map(|(kind, node)| (*kind, definition_name(*node, module.bytes()).unwrap()))
            .collect();
        assert_eq!(
            names,
            vec![
                (UnitKind::Function, "a"),
                (UnitKind::Function, "b"),
                (UnitKind::Class, "C"),
            ]
        );
    }

    #[test]
    fn test_docstring_detection() {
        let module = parse(
            "def a():\n    \"\"\"Doc.\"\"\"\n\ndef b():\n    # note\n    'single'\n\ndef c():\n    f\"no {x}\"\n\ndef d():\n    x = 'no'\n",
        );
        let defs = top_level_definitions(module.root());
        let docs: Vec<_> = defs
            .iter()
            .map(|(_, node)| docstring_text(*node, module.bytes()))
            .collect();
        assert_eq!(
            docs,
            vec![Some("Doc.".to_string()), Some("single".to_string()), None, None]
        );
    }

    #[test]
    fn test_class_methods() {
        let module = parse(
            "class C:\n    x = 1\n\n    def a(self):\n        pass\n\n    @property\n    def b(self):\n        return 1\n",
        );
        let (_, class) = top_level_definitions(module.root())[0];
        let names: Vec<_> = class_methods(class)
            .into_iter()
            .map(|m| definition_name(m, module.bytes()).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
