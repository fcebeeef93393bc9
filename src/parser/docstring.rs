//! Docstring extraction from generated text.
//!
//! Generation output is freeform: usually the unit re-emitted with
//! docstrings, sometimes wrapped in markdown fences, occasionally prose.
//! It is parsed leniently and searched for the first definition of the
//! requested kind.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use streaming_iterator::StreamingIterator;
use thiserror::Error;
use tree_sitter::{Node, Query, QueryCursor};

use super::literal::clean_docstring;
use super::{
    class_methods, definition_name, docstring_text, parse_lenient, python_language,
    top_level_definitions, ParseError, ParsedModule, UnitKind,
};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

const FUNCTION_QUERY: &str = "(function_definition) @function";
const CLASS_QUERY: &str = "(class_definition) @class";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no function definition in generated text")]
    NoFunction,

    #[error("no class definition in generated text")]
    NoClass,

    #[error("generated {kind} {name:?} has no docstring")]
    NoDocstring { kind: UnitKind, name: String },

    #[error("empty generated text")]
    Empty,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Outcome of function docstring extraction; the rewrite step matches on it.
#[derive(Debug)]
pub enum Extraction {
    /// Docstring taken from the generated function definition.
    Extracted(String),
    /// No usable definition; the generated text itself is the docstring.
    Fallback(String),
    Failed(ExtractionError),
}

impl Extraction {
    /// Docstring text to insert, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Extraction::Extracted(text) | Extraction::Fallback(text) => Some(text),
            Extraction::Failed(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback(_))
    }
}

/// Class docstring plus docstrings of the methods found in the generated
/// class. Methods without a generated docstring are absent from the map.
///
/// A name defined more than once (a property getter and its setter) keeps
/// one docstring per definition, in source order.
#[derive(Debug, Clone, Default)]
pub struct ClassDocs {
    pub docstring: Option<String>,
    pub methods: HashMap<String, Vec<String>>,
}

impl ClassDocs {
    pub fn new(docstring: Option<String>) -> Self {
        Self {
            docstring,
            methods: HashMap::new(),
        }
    }

    /// Record the next generated docstring for `name`.
    pub fn add_method(&mut self, name: impl Into<String>, doc: impl Into<String>) {
        self.methods.entry(name.into()).or_default().push(doc.into());
    }

    /// Docstring for the first definition of `name`.
    pub fn method(&self, name: &str) -> Option<&str> {
        self.method_at(name, 0)
    }

    /// Docstring for the `occurrence`-th definition of `name` (0-based).
    /// Occurrences past the generated ones reuse the last generated docstring.
    pub fn method_at(&self, name: &str, occurrence: usize) -> Option<&str> {
        let docs = self.methods.get(name)?;
        docs.get(occurrence).or_else(|| docs.last()).map(String::as_str)
    }
}

/// Unwrap the first markdown code fence, or return the trimmed text.
pub fn strip_code_fences(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => text.trim(),
    }
}

fn parse_generated(text: &str) -> Result<ParsedModule, ParseError> {
    parse_lenient(Path::new("<generated>"), strip_code_fences(text).to_string())
}

/// First top-level definition of `kind`, looking through decorators.
fn first_top_level(root: Node<'_>, kind: UnitKind) -> Option<Node<'_>> {
    top_level_definitions(root)
        .into_iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, node)| node)
}

/// First definition of `kind` in the generated text. Top-level definitions
/// win; the query search over the whole tree only covers output that
/// tree-sitter wrapped in error nodes.
fn find_definition<'tree>(
    kind: UnitKind,
    root: Node<'tree>,
    source: &[u8],
) -> Result<Option<Node<'tree>>, ParseError> {
    if let Some(node) = first_top_level(root, kind) {
        return Ok(Some(node));
    }
    let query = match kind {
        UnitKind::Function => FUNCTION_QUERY,
        UnitKind::Class => CLASS_QUERY,
    };
    first_match(query, root, source)
}

/// First node matching a single-capture query, in document order.
fn first_match<'tree>(
    query_src: &str,
    root: Node<'tree>,
    source: &[u8],
) -> Result<Option<Node<'tree>>, ParseError> {
    let query = Query::new(&python_language(), query_src)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, source);

    if let Some(m) = matches.next() {
        if let Some(capture) = m.captures.first() {
            return Ok(Some(capture.node));
        }
    }
    Ok(None)
}

/// Docstring of the first function definition in the generated text.
pub fn function_docstring(text: &str) -> Result<String, ExtractionError> {
    let module = parse_generated(text)?;
    let source = module.bytes();
    let function = find_definition(UnitKind::Function, module.root(), source)?
        .ok_or(ExtractionError::NoFunction)?;

    docstring_text(function, source)
        .filter(|doc| !doc.is_empty())
        .ok_or_else(|| ExtractionError::NoDocstring {
            kind: UnitKind::Function,
            name: definition_name(function, source).unwrap_or_default().to_string(),
        })
}

/// Function extraction with fallback to the raw generated text.
pub fn extract_function_docstring(text: &str) -> Extraction {
    match function_docstring(text) {
        Ok(doc) => Extraction::Extracted(doc),
        Err(err) => {
            let raw = clean_docstring(text.trim());
            if raw.is_empty() {
                Extraction::Failed(match err {
                    ExtractionError::NoFunction => ExtractionError::Empty,
                    other => other,
                })
            } else {
                tracing::debug!("falling back to raw generated text: {}", err);
                Extraction::Fallback(raw)
            }
        }
    }
}

/// Docstrings of the first class in the generated text and of its methods.
pub fn extract_class_docstrings(text: &str) -> Result<ClassDocs, ExtractionError> {
    let module = parse_generated(text)?;
    let source = module.bytes();
    let class = find_definition(UnitKind::Class, module.root(), source)?
        .ok_or(ExtractionError::NoClass)?;

    let mut docs = ClassDocs::new(docstring_text(class, source).filter(|doc| !doc.is_empty()));
    for method in class_methods(class) {
        let (Some(name), Some(doc)) = (definition_name(method, source), docstring_text(method, source))
        else {
            continue;
        };
        if !doc.is_empty() {
            docs.add_method(name, doc);
        }
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_docstring_from_fenced_response() {
        let response = "Here you go:\n\n```python\ndef add(a, b):\n    \"\"\"\n    Add two numbers.\n\n    Returns\n    -------\n    int\n    \"\"\"\n    return a + b\n```\n";
        match extract_function_docstring(response) {
            Extraction::Extracted(doc) => {
                assert_eq!(doc, "Add two numbers.\n\nReturns\n-------\nint")
            }
            other => panic!("expected extracted docstring, got {other:?}"),
        }
    }

    #[test]
    fn test_async_function_is_found() {
        let doc = function_docstring("async def fetch():\n    '''Fetch it.'''\n").unwrap();
        assert_eq!(doc, "Fetch it.");
    }

    #[test]
    fn test_fallback_to_raw_text() {
        let response = "  Compute the total.\n  Returns the sum.  ";
        match extract_function_docstring(response) {
            Extraction::Fallback(doc) => assert_eq!(doc, "Compute the total.\nReturns the sum."),
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_function_without_docstring_falls_back() {
        let extraction = extract_function_docstring("def f():\n    return 1\n");
        assert!(extraction.is_fallback());
    }

    #[test]
    fn test_empty_response_fails() {
        assert!(matches!(
            extract_function_docstring("   \n"),
            Extraction::Failed(ExtractionError::Empty)
        ));
    }

    #[test]
    fn test_class_docstrings_and_method_map() {
        let response = r#"
class Stack:
    """A LIFO stack."""

    def push(self, item):
        """Push an item."""
        self.items.append(item)

    def pop(self):
        return self.items.pop()

    @property
    def size(self):
        """Number of items."""
        return len(self.items)
"#;
        let docs = extract_class_docstrings(response).unwrap();
        assert_eq!(docs.docstring.as_deref(), Some("A LIFO stack."));
        assert_eq!(docs.method("push"), Some("Push an item."));
        assert_eq!(docs.method("size"), Some("Number of items."));
        assert_eq!(docs.method("pop"), None);
    }

    #[test]
    fn test_function_ignores_methods_of_leading_class() {
        let response = "class Helper:\n    def m(self):\n        \"\"\"Method doc.\"\"\"\n\ndef f():\n    \"\"\"Top-level doc.\"\"\"\n";
        assert_eq!(function_docstring(response).unwrap(), "Top-level doc.");
    }

    #[test]
    fn test_decorated_top_level_function() {
        let response = "@cache\ndef f():\n    \"\"\"Cached.\"\"\"\n";
        assert_eq!(function_docstring(response).unwrap(), "Cached.");
    }

    #[test]
    fn test_class_ignores_class_nested_in_function() {
        let response = "def outer():\n    class Inner:\n        \"\"\"Inner doc.\"\"\"\n\nclass Target:\n    \"\"\"Target doc.\"\"\"\n";
        let docs = extract_class_docstrings(response).unwrap();
        assert_eq!(docs.docstring.as_deref(), Some("Target doc."));
    }

    #[test]
    fn test_nested_function_used_when_nothing_at_top_level() {
        let response = "if True:\n    def f():\n        \"\"\"Nested.\"\"\"\n";
        assert_eq!(function_docstring(response).unwrap(), "Nested.");
    }

    #[test]
    fn test_property_getter_and_setter_keep_their_docstrings() {
        let response = r#"
class Temp:
    @property
    def celsius(self):
        """Temperature in degrees Celsius."""
        return self._c

    @celsius.setter
    def celsius(self, value):
        """Set the temperature in degrees Celsius."""
        self._c = value
"#;
        let docs = extract_class_docstrings(response).unwrap();
        assert_eq!(docs.method_at("celsius", 0), Some("Temperature in degrees Celsius."));
        assert_eq!(
            docs.method_at("celsius", 1),
            Some("Set the temperature in degrees Celsius.")
        );
        assert_eq!(
            docs.method_at("celsius", 2),
            Some("Set the temperature in degrees Celsius.")
        );
    }

    #[test]
    fn test_class_missing() {
        assert!(matches!(
            extract_class_docstrings("def f():\n    pass\n"),
            Err(ExtractionError::NoClass)
        ));
    }
}
