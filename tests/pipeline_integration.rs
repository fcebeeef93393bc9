//! End-to-end pipeline tests.
//!
//! Every test runs the full discovery → extraction → generation → rewrite
//! network over a temporary source tree, with a scripted generation client
//! standing in for the chat-completions service.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use docstring_generator::{
    Config, DocumentationStyle, GenerationClient, GenerationError, GenerationRequest, Pipeline,
    Stage, UnitKind,
};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;

static METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]+(?:async[ \t]+)?def[ \t]+(\w+)").unwrap());

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync>;

/// Answers every request with `respond` and records what was asked.
struct ScriptedClient {
    respond: Responder,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Re-emits each unit with a docstring on it and on every method.
    fn documenting() -> Arc<Self> {
        Self::new(|request| Ok(documented(request)))
    }

    fn requested_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl GenerationClient for ScriptedClient {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            (self.respond)(request)
        })
    }
}

fn documented(request: &GenerationRequest) -> String {
    match request.kind {
        UnitKind::Function => format!(
            "Here you go:\n\n```python\ndef {name}():\n    \"\"\"Documented {name}.\"\"\"\n    pass\n```\n",
            name = request.name
        ),
        UnitKind::Class => {
            let mut out = format!(
                "```python\nclass {name}:\n    \"\"\"Documented {name}.\"\"\"\n",
                name = request.name
            );
            for method in METHOD.captures_iter(&request.source) {
                out.push_str(&format!(
                    "\n    def {m}(self):\n        \"\"\"Documented {name}.{m}.\"\"\"\n        pass\n",
                    m = &method[1],
                    name = request.name
                ));
            }
            out.push_str("```\n");
            out
        }
    }
}

fn config_for(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths = vec![root.to_path_buf()];
    config.formatter.clear();
    config
}

fn write(dir: &TempDir, rel: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ============================================================================
// Functions
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_undocumented_function_gains_docstring() {
    let dir = TempDir::new().unwrap();
    let module = write(&dir, "a.py", "import os\n\n\ndef f(x):\n    return x + 1\n");

    let client = ScriptedClient::documenting();
    let report = Pipeline::new(config_for(dir.path()), client.clone()).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.modules_discovered, 1);
    assert_eq!(report.modules_parsed, 1);
    assert_eq!(report.units_updated, 1);
    assert_eq!(
        read(&module),
        "import os\n\n\ndef f(x):\n    \"\"\"Documented f.\"\"\"\n    return x + 1\n"
    );

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].style, DocumentationStyle::Numpy);
    assert!(
        requests[0].prompt().contains("Numpy-Style"),
        "Expected the style in the prompt"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_raw_text_fallback_is_inserted() {
    let dir = TempDir::new().unwrap();
    let module = write(&dir, "calc.py", "def total(items):\n    return sum(items)\n");

    let client = ScriptedClient::new(|_| Ok("Add up all items.".to_string()));
    let report = Pipeline::new(config_for(dir.path()), client).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.fallbacks, 1);
    assert_eq!(
        read(&module),
        "def total(items):\n    \"\"\"Add up all items.\"\"\"\n    return sum(items)\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_documented_function_is_skipped_without_overwrite() {
    let dir = TempDir::new().unwrap();
    let source = "def f():\n    \"\"\"Already here.\"\"\"\n    return 1\n";
    let module = write(&dir, "a.py", source);

    let client = ScriptedClient::documenting();
    let report = Pipeline::new(config_for(dir.path()), client.clone()).run().await;

    assert!(report.is_success());
    assert_eq!(report.units_skipped, 1);
    assert_eq!(report.units_queued, 0);
    assert!(client.requests().is_empty(), "Expected no generation calls");
    assert_eq!(read(&module), source);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overwrite_replaces_existing_function_docstring() {
    let dir = TempDir::new().unwrap();
    let module = write(&dir, "a.py", "def f():\n    \"\"\"Old.\"\"\"\n    return 1\n");

    let mut config = config_for(dir.path());
    config.overwrite_function_docstring = true;
    let report = Pipeline::new(config, ScriptedClient::documenting()).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.units_updated, 1);
    assert_eq!(
        read(&module),
        "def f():\n    \"\"\"Documented f.\"\"\"\n    return 1\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let module = write(
        &dir,
        "pkg/shapes.py",
        "def area(r):\n    return r * r\n\n\nclass Box:\n    def size(self):\n        return 1\n",
    );

    let pipeline = Pipeline::new(config_for(dir.path()), ScriptedClient::documenting());
    let first = pipeline.run().await;
    assert!(first.is_success(), "Unexpected failures: {:?}", first.failures);
    assert_eq!(first.units_updated, 2);
    let after_first = read(&module);

    let client = ScriptedClient::documenting();
    let second = Pipeline::new(config_for(dir.path()), client.clone()).run().await;
    assert!(second.is_success());
    assert_eq!(second.units_updated, 0);
    assert_eq!(second.units_skipped, 2);
    assert!(client.requests().is_empty(), "Expected no generation calls");
    assert_eq!(read(&module), after_first);
}

// ============================================================================
// Classes
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_class_and_methods_documented() {
    let dir = TempDir::new().unwrap();
    let module = write(
        &dir,
        "point.py",
        "class Point:\n    def __init__(self, x):\n        self.x = x\n\n    def norm(self):\n        return abs(self.x)\n",
    );

    let report = Pipeline::new(config_for(dir.path()), ScriptedClient::documenting())
        .run()
        .await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(
        read(&module),
        "class Point:\n    \"\"\"Documented Point.\"\"\"\n    def __init__(self, x):\n        \"\"\"Documented Point.__init__.\"\"\"\n        self.x = x\n\n    def norm(self):\n        \"\"\"Documented Point.norm.\"\"\"\n        return abs(self.x)\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_extra_generated_methods_are_ignored() {
    let dir = TempDir::new().unwrap();
    let module = write(
        &dir,
        "pair.py",
        "class Pair:\n    def a(self):\n        return 1\n\n    def b(self):\n        return 2\n",
    );

    let client = ScriptedClient::new(|_| {
        Ok("class Pair:\n    \"\"\"Two things.\"\"\"\n    def a(self):\n        \"\"\"First.\"\"\"\n    def b(self):\n        \"\"\"Second.\"\"\"\n    def c(self):\n        \"\"\"Invented.\"\"\"\n".to_string())
    });
    let report = Pipeline::new(config_for(dir.path()), client).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    let rewritten = read(&module);
    assert!(rewritten.contains("\"\"\"First.\"\"\""));
    assert!(rewritten.contains("\"\"\"Second.\"\"\""));
    assert!(!rewritten.contains("Invented"), "Method c must not be added");
    assert!(!rewritten.contains("def c"), "Method c must not be added");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_method_docstring_fails_class() {
    let dir = TempDir::new().unwrap();
    let source = "class Pair:\n    def a(self):\n        return 1\n\n    def b(self):\n        return 2\n";
    let module = write(&dir, "pair.py", source);

    let client = ScriptedClient::new(|_| {
        Ok("class Pair:\n    \"\"\"Two things.\"\"\"\n    def a(self):\n        \"\"\"First.\"\"\"\n".to_string())
    });
    let report = Pipeline::new(config_for(dir.path()), client).run().await;

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.stage, Stage::Rewrite);
    assert_eq!(failure.unit.as_deref(), Some("Pair"));
    assert!(
        failure.message.contains("\"b\""),
        "Expected the missing method in {:?}",
        failure.message
    );
    assert_eq!(read(&module), source, "Module must be left untouched");
    assert!(report.failed_modules().contains(&module));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_function_and_class_in_same_module() {
    let dir = TempDir::new().unwrap();
    let module = write(
        &dir,
        "mixed.py",
        "def one():\n    return 1\n\n\nclass Two:\n    def value(self):\n        return 2\n\n\ndef three():\n    return 3\n",
    );

    let mut config = config_for(dir.path());
    config.workers.function = 3;
    config.workers.class = 2;
    let report = Pipeline::new(config, ScriptedClient::documenting()).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.units_updated, 3);
    let rewritten = read(&module);
    for doc in [
        "Documented one.",
        "Documented Two.",
        "Documented Two.value.",
        "Documented three.",
    ] {
        assert!(rewritten.contains(doc), "Missing {:?} in:\n{}", doc, rewritten);
    }
}

// ============================================================================
// Discovery, parsing and generation failures
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ignored_paths_are_never_touched() {
    let dir = TempDir::new().unwrap();
    let kept = write(&dir, "app.py", "def run():\n    return 0\n");
    let skipped_file = write(&dir, "skip.py", "def skipped():\n    return 0\n");
    let venv_file = write(&dir, "venv/lib.py", "def vendored():\n    return 0\n");
    let custom_dir = write(&dir, "fixtures/data.py", "def fixture():\n    return 0\n");

    let mut config = config_for(dir.path());
    config.files_ignore.insert("skip.py".to_string());
    config.directories_ignore.insert("fixtures".to_string());
    let client = ScriptedClient::documenting();
    let report = Pipeline::new(config, client.clone()).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.modules_discovered, 1);
    assert_eq!(client.requested_names(), vec!["run".to_string()]);
    assert!(read(&kept).contains("Documented run."));
    assert_eq!(read(&skipped_file), "def skipped():\n    return 0\n");
    assert_eq!(read(&venv_file), "def vendored():\n    return 0\n");
    assert_eq!(read(&custom_dir), "def fixture():\n    return 0\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unparsable_module_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let broken = write(&dir, "broken.py", "def incomplete(:\n    return None\n");
    let good = write(&dir, "good.py", "def fine():\n    return 1\n");

    let report = Pipeline::new(config_for(dir.path()), ScriptedClient::documenting())
        .run()
        .await;

    assert_eq!(report.modules_discovered, 2);
    assert_eq!(report.modules_parsed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, Stage::Parse);
    assert_eq!(report.failures[0].module, broken);
    assert!(read(&good).contains("Documented fine."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_generation_error_is_reported_per_unit() {
    let dir = TempDir::new().unwrap();
    let source = "def bad():\n    return 0\n\n\ndef good():\n    return 1\n";
    let module = write(&dir, "mod.py", source);

    let client = ScriptedClient::new(|request| {
        if request.name == "bad" {
            Err(GenerationError::Api {
                status: 400,
                message: "rejected".to_string(),
            })
        } else {
            Ok(documented(request))
        }
    });
    let report = Pipeline::new(config_for(dir.path()), client).run().await;

    assert_eq!(report.units_updated, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, Stage::Generation);
    assert_eq!(report.failures[0].unit.as_deref(), Some("bad"));
    let rewritten = read(&module);
    assert!(rewritten.contains("Documented good."));
    assert!(rewritten.starts_with("def bad():\n    return 0\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_empty_generation_is_an_extraction_failure() {
    let dir = TempDir::new().unwrap();
    let source = "def f():\n    return 1\n";
    let module = write(&dir, "a.py", source);

    let client = ScriptedClient::new(|_| Ok("  \n\t\n".to_string()));
    let report = Pipeline::new(config_for(dir.path()), client).run().await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, Stage::Extraction);
    assert_eq!(read(&module), source);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_file_root() {
    let dir = TempDir::new().unwrap();
    let module = write(&dir, "venv/script.py", "def main():\n    return 0\n");

    let mut config = config_for(dir.path());
    config.paths = vec![module.clone()];
    let report = Pipeline::new(config, ScriptedClient::documenting()).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.modules_discovered, 1);
    assert!(read(&module).contains("Documented main."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_roots_process_module_once() {
    let dir = TempDir::new().unwrap();
    let module = write(&dir, "a.py", "def f(x):\n    return x\n");

    let mut config = config_for(dir.path());
    config.paths = vec![dir.path().to_path_buf(), module.clone()];
    let client = ScriptedClient::documenting();
    let report = Pipeline::new(config, client.clone()).run().await;

    assert!(report.is_success(), "Unexpected failures: {:?}", report.failures);
    assert_eq!(report.modules_discovered, 1);
    assert_eq!(report.units_queued, 1);
    assert_eq!(client.requested_names(), vec!["f".to_string()]);
    assert_eq!(
        read(&module),
        "def f(x):\n    \"\"\"Documented f.\"\"\"\n    return x\n"
    );
}
