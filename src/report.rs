//! Output formatting for run results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::DocumentationStyle;
use crate::pipeline::{Failure, RunReport, Stage};

/// JSON report structure.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub paths: &'a [PathBuf],
    pub documentation_style: DocumentationStyle,
    pub passed: bool,
    #[serde(flatten)]
    pub summary: &'a RunReport,
    pub failed_modules: Vec<PathBuf>,
}

pub fn json_report<'a>(
    paths: &'a [PathBuf],
    style: DocumentationStyle,
    report: &'a RunReport,
) -> JsonReport<'a> {
    JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        paths,
        documentation_style: style,
        passed: report.is_success(),
        summary: report,
        failed_modules: report.failed_modules().into_iter().collect(),
    }
}

/// Write results in JSON format.
pub fn write_json(
    paths: &[PathBuf],
    style: DocumentationStyle,
    report: &RunReport,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&json_report(paths, style, report))?;
    println!("{}", json);
    Ok(())
}

/// Write results with colors for terminal display.
pub fn write_pretty(paths: &[PathBuf], style: DocumentationStyle, report: &RunReport) {
    // Header
    println!();
    print!("  ");
    print!("{}", "docstring-generator".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Paths: ".dimmed());
    println!("{}", join_paths(paths));
    print!("  {}", "Style: ".dimmed());
    println!("{}", style);
    println!();

    write_summary(report);
    println!();

    if !report.failures.is_empty() {
        write_failures(&report.failures);
        println!();
    }

    if report.is_success() {
        println!("  {}", "✓ DONE".green());
    } else {
        let modules = report.failed_modules().len();
        let plural = if modules != 1 { "s" } else { "" };
        println!(
            "  {}  {}",
            "✗ FAILED".red(),
            format!("{} module{} with failures", modules, plural).dimmed()
        );
    }
    println!();
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_summary(report: &RunReport) {
    println!("  {}", "Summary:".bold());
    println!(
        "    {:<20} {:>5}  {}",
        "modules",
        report.modules_discovered,
        format!("({} parsed)", report.modules_parsed).dimmed()
    );
    println!("    {:<20} {:>5}", "units queued", report.units_queued);
    print!("    {:<20} ", "units updated");
    println!("{}", format!("{:>5}", report.units_updated).green());
    println!("    {:<20} {:>5}", "already documented", report.units_skipped);
    if report.units_unchanged > 0 {
        println!("    {:<20} {:>5}", "unchanged", report.units_unchanged);
    }
    if report.fallbacks > 0 {
        print!("    {:<20} ", "raw-text fallbacks");
        println!("{}", format!("{:>5}", report.fallbacks).yellow());
    }
    let failed = report.failures.len();
    print!("    {:<20} ", "failures");
    if failed == 0 {
        println!("{:>5}", failed);
    } else {
        println!("{}", format!("{:>5}", failed).red());
    }
}

fn write_failures(failures: &[Failure]) {
    println!("  {} ({}):", "Failures".bold(), failures.len());
    println!();

    for f in failures {
        write_stage_tag(f.stage);
        print!("{}", display_path(&f.module).blue());
        if let Some(unit) = &f.unit {
            print!("{}", format!("::{}", unit).dimmed());
        }
        println!();

        // Message on next line, indented
        println!("            {}", f.message);
        println!();
    }
}

fn write_stage_tag(stage: Stage) {
    let tag = format!("{:<11}", stage.as_str().to_uppercase());
    match stage {
        Stage::Generation | Stage::Extraction => print!("    {} ", tag.yellow()),
        _ => print!("    {} ", tag.red()),
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
