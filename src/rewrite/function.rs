//! Function-level rewriting.

use std::path::Path;

use super::{docstring_edit, find_definition, finish, RewriteError};
use crate::parser::{docstring_statement, parse_source, Extraction, UnitKind};

/// Insert (or replace, with `overwrite`) the docstring of top-level function
/// `name` in `source`, returning the full module text.
///
/// A function that already has a docstring is left alone when `overwrite`
/// is off, whatever the extraction outcome.
pub fn rewrite_function(
    path: &Path,
    source: &str,
    name: &str,
    extraction: &Extraction,
    overwrite: bool,
) -> Result<String, RewriteError> {
    let module = parse_source(path, source.to_string())?;
    let function = find_definition(&module, UnitKind::Function, name)?;

    if !overwrite && docstring_statement(function, module.bytes()).is_some() {
        return Ok(source.to_string());
    }

    let text = match extraction {
        Extraction::Extracted(text) | Extraction::Fallback(text) => text,
        Extraction::Failed(reason) => {
            return Err(RewriteError::NoDocumentation(format!(
                "function {name}: {reason}"
            )))
        }
    };

    let edits = docstring_edit(function, source, text, overwrite)
        .into_iter()
        .collect();
    finish(path, source, edits)
}
