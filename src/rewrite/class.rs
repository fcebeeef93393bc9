//! Class-level rewriting: the class docstring plus one docstring per method.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::{docstring_edit, find_definition, finish, RewriteError};
use crate::config::OverwritePolicy;
use crate::parser::{
    class_methods, definition_name, docstring_statement, parse_source, ClassDocs, UnitKind,
};

/// Document top-level class `name` and its direct methods.
///
/// The class docstring follows `policy.class`, each method follows
/// `policy.class_methods`. A method is looked up in `docs` only when it
/// needs a docstring; a missing entry fails the whole class and nothing is
/// written.
pub fn rewrite_class(
    path: &Path,
    source: &str,
    name: &str,
    docs: &ClassDocs,
    policy: &OverwritePolicy,
) -> Result<String, RewriteError> {
    let module = parse_source(path, source.to_string())?;
    let bytes = module.bytes();
    let class = find_definition(&module, UnitKind::Class, name)?;
    let mut edits = Vec::new();

    if policy.class || docstring_statement(class, bytes).is_none() {
        let text = docs
            .docstring
            .as_deref()
            .ok_or_else(|| RewriteError::NoDocumentation(format!("class {name}")))?;
        edits.extend(docstring_edit(class, source, text, policy.class));
    }

    // Same-named definitions (getter, setter) take generated docstrings in order.
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for method in class_methods(class) {
        let Some(method_name) = definition_name(method, bytes) else {
            continue;
        };
        let occurrence = seen.entry(method_name).or_insert(0);
        let index = *occurrence;
        *occurrence += 1;
        if !policy.class_methods && docstring_statement(method, bytes).is_some() {
            continue;
        }
        let text = docs
            .method_at(method_name, index)
            .ok_or_else(|| RewriteError::MissingMethodDoc {
                class: name.to_string(),
                method: method_name.to_string(),
            })?;
        edits.extend(docstring_edit(method, source, text, policy.class_methods));
    }

    debug!(class = name, edits = edits.len(), "class rewrite planned");
    finish(path, source, edits)
}
