//! Command-line interface for docstring-generator.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, DocumentationStyle};
use crate::generate::OpenAiClient;
use crate::persist::Persister;
use crate::pipeline::Pipeline;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default config file written by `init`.
const DEFAULT_CONFIG_FILE: &str = "docstring-generator.yaml";

/// Commented default configuration.
const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Generate Python docstrings with an LLM and write them into the source.
///
/// Walks the given paths, finds top-level functions and classes without
/// docstrings, asks a chat-completions model for documentation in the
/// chosen style, and inserts the result in place.
#[derive(Parser)]
#[command(name = "docstring-generator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate docstrings for Python sources
    #[command(visible_alias = "run")]
    Generate(GenerateArgs),
    /// Write a default configuration file
    Init(InitArgs),
}

/// Arguments for the generate command.
#[derive(Parser)]
pub struct GenerateArgs {
    /// Files or directories to document (default: config paths, else ".")
    pub paths: Vec<PathBuf>,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// API key for the generation service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Replace existing function docstrings
    #[arg(long)]
    pub overwrite_function_docstring: bool,

    /// Replace existing class docstrings
    #[arg(long)]
    pub overwrite_class_docstring: bool,

    /// Replace existing method docstrings
    #[arg(long)]
    pub overwrite_class_methods_docstring: bool,

    /// Documentation style: Numpy-Style, Google-Style or Sphinx-Style
    #[arg(short = 's', long)]
    pub documentation_style: Option<DocumentationStyle>,

    /// Extra directory names to skip
    #[arg(long, num_args = 1..)]
    pub directories_ignore: Vec<String>,

    /// Extra file paths to skip
    #[arg(long, num_args = 1..)]
    pub files_ignore: Vec<String>,

    /// Timeout per generation request, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Extra attempts for retryable generation failures
    #[arg(long)]
    pub retries: Option<u32>,

    /// Workers per unit queue (function and class)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Do not run the formatter on rewritten files
    #[arg(long)]
    pub no_format: bool,

    /// Write through a temporary file and rename it into place
    #[arg(long)]
    pub atomic_writes: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Set up tracing on stderr. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default = if verbose {
        "docstring_generator=debug"
    } else {
        "docstring_generator=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Merge CLI flags over the loaded config.
pub fn build_config(args: &GenerateArgs) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;

    if !args.paths.is_empty() {
        config.paths = args.paths.clone();
    } else if config.paths.is_empty() {
        config.paths = vec![PathBuf::from(".")];
    }

    config.overwrite_function_docstring |= args.overwrite_function_docstring;
    config.overwrite_class_docstring |= args.overwrite_class_docstring;
    config.overwrite_class_methods_docstring |= args.overwrite_class_methods_docstring;
    if let Some(style) = args.documentation_style {
        config.documentation_style = style;
    }

    config
        .directories_ignore
        .extend(args.directories_ignore.iter().cloned());
    config.files_ignore.extend(args.files_ignore.iter().cloned());

    if let Some(model) = &args.model {
        config.generation.model = model.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.generation.base_url = base_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.generation.timeout_secs = timeout;
    }
    if let Some(retries) = args.retries {
        config.generation.max_retries = retries;
    }
    if let Some(workers) = args.workers {
        config.workers.function = workers;
        config.workers.class = workers;
    }
    if args.no_format {
        config.formatter.clear();
    }
    config.atomic_writes |= args.atomic_writes;

    Ok(config)
}

/// Run the generate command.
pub fn run_generate(args: &GenerateArgs) -> anyhow::Result<i32> {
    init_logging(args.verbose);

    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let config = match build_config(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {}", e);
        return Ok(EXIT_ERROR);
    }

    let api_key = match args.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            eprintln!("Error: no API key given");
            eprintln!("Set OPENAI_API_KEY or pass --api-key");
            return Ok(EXIT_ERROR);
        }
    };

    let client = OpenAiClient::new(api_key, &config.generation)?;
    let persister = Persister::from_config(&config);
    let paths = config.paths.clone();
    let style = config.documentation_style;
    let pipeline = Pipeline::new(config, Arc::new(client)).with_persister(persister);

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(pipeline.run());

    match args.format.as_str() {
        "json" => report::write_json(&paths, style, &result)?,
        _ => report::write_pretty(&paths, style, &result),
    }

    // Return appropriate exit code
    if result.is_success() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Use --force to replace it or --output to choose another path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, DEFAULT_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to suit your project", args.output.display());
    println!(
        "  2. Run: docstring-generator generate --config {}",
        args.output.display()
    );

    Ok(EXIT_SUCCESS)
}
