//! docstring-generator - LLM-written docstrings for Python sources.
//!
//! Walks a source tree, finds top-level functions and classes lacking
//! documentation, asks a text-generation service for docstrings in the
//! configured style, and splices them into the original files.
//!
//! # Architecture
//!
//! - `discover`: breadth-first discovery of candidate `.py` modules
//! - `parser`: tree-sitter parsing, unit extraction, docstring extraction
//! - `generate`: the `GenerationClient` capability and its OpenAI client
//! - `rewrite`: byte-range docstring insertion for functions and classes
//! - `persist`: writing modules back and running the formatter
//! - `pipeline`: the concurrent queue network tying the stages together
//! - `config`: YAML configuration
//! - `report`: output formatting (text, JSON)

pub mod cli;
pub mod config;
pub mod discover;
pub mod generate;
pub mod parser;
pub mod persist;
pub mod pipeline;
pub mod report;
pub mod rewrite;

pub use config::{Config, DocumentationStyle, OverwritePolicy};
pub use discover::{ModuleDiscovery, ModuleTask};
pub use generate::{GenerationClient, GenerationError, GenerationRequest, OpenAiClient};
pub use parser::{CodeUnit, Extraction, UnitKind};
pub use persist::Persister;
pub use pipeline::{Failure, Pipeline, RunReport, Stage};
pub use rewrite::RewriteError;
