//! Top-level unit extraction.
//!
//! A module is read once; each top-level function and class becomes a
//! `CodeUnit` carrying the exact source span of its definition.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::{
    class_methods, definition_name, docstring_statement, read_module, top_level_definitions,
    ParseError, ParsedModule, UnitKind,
};
use crate::config::OverwritePolicy;

/// Docstring state of one method inside a class unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSummary {
    pub name: String,
    pub has_docstring: bool,
}

/// An addressable definition: module path, name, kind and source text.
#[derive(Debug, Clone, Serialize)]
pub struct CodeUnit {
    pub module_path: PathBuf,
    pub name: String,
    pub kind: UnitKind,
    /// Definition text, decorators excluded.
    pub source: String,
    /// 1-indexed line of the definition header.
    pub line: usize,
    pub has_docstring: bool,
    /// Direct methods; empty for functions.
    pub methods: Vec<MethodSummary>,
}

impl CodeUnit {
    /// Whether the rewrite step would change anything under `policy`.
    pub fn needs_documentation(&self, policy: &OverwritePolicy) -> bool {
        match self.kind {
            UnitKind::Function => policy.function || !self.has_docstring,
            UnitKind::Class => {
                policy.class
                    || !self.has_docstring
                    || (!self.methods.is_empty() && policy.class_methods)
                    || self.methods.iter().any(|m| !m.has_docstring)
            }
        }
    }
}

/// Units of one module, split by kind.
#[derive(Debug, Default)]
pub struct ModuleUnits {
    pub functions: Vec<CodeUnit>,
    pub classes: Vec<CodeUnit>,
}

impl ModuleUnits {
    pub fn len(&self) -> usize {
        self.functions.len() + self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read, parse and extract a module from disk.
pub fn extract_units(path: &Path) -> Result<ModuleUnits, ParseError> {
    let module = read_module(path)?;
    Ok(units_of(&module))
}

/// Extract units from already-parsed source.
pub fn units_of(module: &ParsedModule) -> ModuleUnits {
    let source = module.bytes();
    let mut units = ModuleUnits::default();
    let mut seen: HashSet<(UnitKind, String)> = HashSet::new();

    for (kind, node) in top_level_definitions(module.root()) {
        let Some(name) = definition_name(node, source) else {
            continue;
        };
        if !seen.insert((kind, name.to_string())) {
            // Later definitions shadow earlier ones at runtime, but the rewrite
            // step targets the first occurrence; one unit per name is enough.
            warn!(
                module = %module.path.display(),
                unit = name,
                "duplicate {} definition, only the first is documented",
                kind
            );
            continue;
        }

        let methods = match kind {
            UnitKind::Function => Vec::new(),
            UnitKind::Class => class_methods(node)
                .into_iter()
                .filter_map(|method| {
                    Some(MethodSummary {
                        name: definition_name(method, source)?.to_string(),
                        has_docstring: docstring_statement(method, source).is_some(),
                    })
                })
                .collect(),
        };

        let unit = CodeUnit {
            module_path: module.path.clone(),
            name: name.to_string(),
            kind,
            source: module.node_text(node).to_string(),
            line: node.start_position().row + 1,
            has_docstring: docstring_statement(node, source).is_some(),
            methods,
        };

        match kind {
            UnitKind::Function => units.functions.push(unit),
            UnitKind::Class => units.classes.push(unit),
        }
    }

    debug!(
        module = %module.path.display(),
        functions = units.functions.len(),
        classes = units.classes.len(),
        "extracted units"
    );
    units
}
