//! YAML-backed run configuration.
//!
//! A `Config` is assembled once (file, then CLI overrides), validated, and
//! then shared read-only by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Extension of the files the discovery stage accepts.
pub const SOURCE_EXTENSION: &str = "py";

/// Config file names looked up in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["docstring-generator.yaml", "docstring-generator.yml"];

/// Directories skipped by default during discovery.
pub const DEFAULT_DIRECTORIES_IGNORE: &[&str] =
    &["venv", ".venv", "__pycache__", ".git", "build", "dist", "docs"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no source paths given")]
    NoPaths,

    #[error("source path does not exist: {0}")]
    MissingPath(PathBuf),

    #[error("worker count for {0} must be at least 1")]
    ZeroWorkers(&'static str),

    #[error("generation timeout must be greater than zero")]
    ZeroTimeout,

    #[error("unknown documentation style {0:?} (expected Numpy-Style, Google-Style or Sphinx-Style)")]
    UnknownStyle(String),
}

/// Docstring convention requested from the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentationStyle {
    #[default]
    #[serde(rename = "Numpy-Style", alias = "numpy")]
    Numpy,
    #[serde(rename = "Google-Style", alias = "google")]
    Google,
    #[serde(rename = "Sphinx-Style", alias = "sphinx")]
    Sphinx,
}

impl DocumentationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentationStyle::Numpy => "Numpy-Style",
            DocumentationStyle::Google => "Google-Style",
            DocumentationStyle::Sphinx => "Sphinx-Style",
        }
    }
}

impl fmt::Display for DocumentationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentationStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized.strip_suffix("-style").unwrap_or(normalized.as_str());
        match normalized {
            "numpy" => Ok(DocumentationStyle::Numpy),
            "google" => Ok(DocumentationStyle::Google),
            "sphinx" => Ok(DocumentationStyle::Sphinx),
            _ => Err(ConfigError::UnknownStyle(s.to_string())),
        }
    }
}

/// The three overwrite toggles, copied out of `Config` for the rewrite step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverwritePolicy {
    pub function: bool,
    pub class: bool,
    pub class_methods: bool,
}

/// Number of long-lived workers per stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_extraction_workers")]
    pub extraction: usize,
    #[serde(default = "default_unit_workers")]
    pub function: usize,
    #[serde(default = "default_unit_workers")]
    pub class: usize,
}

fn default_extraction_workers() -> usize {
    2
}

fn default_unit_workers() -> usize {
    4
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            extraction: default_extraction_workers(),
            function: default_unit_workers(),
            class: default_unit_workers(),
        }
    }
}

/// Settings for the chat-completions client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after the first one, for retryable errors only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> Option<u32> {
    Some(2048)
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

fn default_directories_ignore() -> BTreeSet<String> {
    DEFAULT_DIRECTORIES_IGNORE.iter().map(|s| s.to_string()).collect()
}

fn default_formatter() -> Vec<String> {
    vec!["black".to_string()]
}

/// Full run configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Source roots: files or directories.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub overwrite_function_docstring: bool,
    #[serde(default)]
    pub overwrite_class_docstring: bool,
    #[serde(default)]
    pub overwrite_class_methods_docstring: bool,
    #[serde(default)]
    pub documentation_style: DocumentationStyle,
    /// Directory basenames never descended into.
    #[serde(default = "default_directories_ignore")]
    pub directories_ignore: BTreeSet<String>,
    /// File paths (or bare file names) never emitted.
    #[serde(default)]
    pub files_ignore: BTreeSet<String>,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Formatter argv; the module path is appended. Empty disables formatting.
    #[serde(default = "default_formatter")]
    pub formatter: Vec<String>,
    /// Write through a temporary file and rename it over the target.
    #[serde(default)]
    pub atomic_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            overwrite_function_docstring: false,
            overwrite_class_docstring: false,
            overwrite_class_methods_docstring: false,
            documentation_style: DocumentationStyle::default(),
            directories_ignore: default_directories_ignore(),
            files_ignore: BTreeSet::new(),
            workers: WorkerConfig::default(),
            generation: GenerationConfig::default(),
            formatter: default_formatter(),
            atomic_writes: false,
        }
    }
}

impl Config {
    /// Parse a YAML config file. User-listed ignore directories are merged
    /// into the default set rather than replacing it.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse_str(content: &str) -> Result<Self, serde_yaml::Error> {
        let mut config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.directories_ignore.extend(default_directories_ignore());
        Ok(config)
    }

    /// Locate a config file: the working directory first, then the per-user
    /// config directory.
    pub fn discover_file() -> Option<PathBuf> {
        for name in DEFAULT_CONFIG_NAMES {
            let candidate = PathBuf::from(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        let dirs = directories::ProjectDirs::from("", "", "docstring-generator")?;
        let candidate = dirs.config_dir().join("config.yaml");
        candidate.is_file().then_some(candidate)
    }

    /// Load from an explicit path, a discovered file, or fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => match Self::discover_file() {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "using discovered config file");
                    Self::parse_file(path)
                }
                None => Ok(Self::default()),
            },
        }
    }

    pub fn overwrite_policy(&self) -> OverwritePolicy {
        OverwritePolicy {
            function: self.overwrite_function_docstring,
            class: self.overwrite_class_docstring,
            class_methods: self.overwrite_class_methods_docstring,
        }
    }

    pub fn ignore_set(&self) -> IgnoreSet {
        IgnoreSet::new(
            self.directories_ignore.iter().cloned(),
            self.files_ignore.iter().cloned(),
        )
    }

    /// Check the finished value before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::NoPaths);
        }
        for path in &self.paths {
            if !path.exists() {
                return Err(ConfigError::MissingPath(path.clone()));
            }
        }
        if self.workers.extraction == 0 {
            return Err(ConfigError::ZeroWorkers("extraction"));
        }
        if self.workers.function == 0 {
            return Err(ConfigError::ZeroWorkers("function"));
        }
        if self.workers.class == 0 {
            return Err(ConfigError::ZeroWorkers("class"));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Exact-match exclusion lists used by discovery.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    directories: BTreeSet<String>,
    files: BTreeSet<PathBuf>,
}

impl IgnoreSet {
    pub fn new<D, F>(directories: D, files: F) -> Self
    where
        D: IntoIterator<Item = String>,
        F: IntoIterator<Item = String>,
    {
        Self {
            directories: directories.into_iter().collect(),
            files: files.into_iter().map(|f| normalize(Path::new(&f))).collect(),
        }
    }

    /// True when a directory's basename is listed.
    pub fn is_directory_ignored(&self, name: &str) -> bool {
        self.directories.contains(name)
    }

    /// True when the file's path is listed, or its basename is listed as a
    /// single-component entry.
    pub fn is_file_ignored(&self, path: &Path) -> bool {
        let normalized = normalize(path);
        if self.files.contains(&normalized) {
            return true;
        }
        match path.file_name() {
            Some(name) => self.files.contains(Path::new(name)),
            None => false,
        }
    }
}

/// Drop `.` components so `./a.py` and `a.py` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
