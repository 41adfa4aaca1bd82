// CLI commands for checking generated programs offline
use anyhow::{bail, Context, Result};
use blockcheck_common::config::VerifierConfig;
use blockcheck_common::types::{ComparisonOutcome, LevelMetadata, TestSuiteReport};
use blockcheck_engine::classifier::classify as classify_source;
use blockcheck_engine::locator::{extract_unit, top_level_function_names};
use blockcheck_engine::{extract_function_name, run_test_suite, SuiteInput};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_source(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<VerifierConfig> {
    match path {
        Some(path) => VerifierConfig::load(path),
        None => VerifierConfig::load_default(),
    }
}

fn print_outcome(outcome: &ComparisonOutcome) {
    let mark = if outcome.passed { "✅" } else { "❌" };
    let primary = if outcome.is_primary { " (primary)" } else { "" };
    let actual = outcome
        .actual
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "undefined".to_string());
    println!(
        "  {} #{} {}{} [{}] expected {} got {}",
        mark, outcome.test_id, outcome.test_name, primary, outcome.mode, outcome.expected, actual
    );
    if let Some(failure) = outcome.failure {
        match &outcome.error {
            Some(error) => println!("      {}: {}", failure.describe(), error),
            None => println!("      {}", failure.describe()),
        }
    }
}

fn print_report(report: &TestSuiteReport) {
    let family = report
        .family
        .map(|f| f.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("📋 Function: {}  Family: {}\n", report.function_name, family);

    let mut outcomes: Vec<&ComparisonOutcome> =
        report.passed_tests.iter().chain(report.failed_tests.iter()).collect();
    outcomes.sort_by_key(|o| o.test_id);
    for outcome in outcomes {
        print_outcome(outcome);
    }

    let mark = if report.passed { "✅" } else { "❌" };
    println!("\n{} {}", mark, report.message);
}

/// Verify a submission file and print the report
pub async fn verify(submission: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let input: SuiteInput = read_json(submission)?;
    let config = load_config(config)?;

    let report = run_test_suite(input, &config).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.passed {
        bail!("Submission failed verification: {}", report.message);
    }
    Ok(())
}

pub fn function_name(source: &Path) -> Result<()> {
    let text = read_source(source)?;
    match extract_function_name(&text) {
        Some(name) => println!("{}", name),
        None => bail!("No function declaration found in {}", source.display()),
    }
    Ok(())
}

/// Print the detection flags and the resolved family
pub fn classify(source: &Path, level: Option<&Path>) -> Result<()> {
    let text = read_source(source)?;
    let level: LevelMetadata = match level {
        Some(path) => read_json(path)?,
        None => LevelMetadata::default(),
    };

    let flags = classify_source(&text, &level);
    println!("🔍 Detection flags:");
    println!("  coinChange:    {}", flags.coin_change);
    println!("  subsetSum:     {}", flags.subset_sum);
    println!("  knapsack:      {}", flags.knapsack);
    println!("  nQueens:       {}", flags.n_queens);
    println!("  ropePartition: {}", flags.rope_partition);
    println!("  graph:         {}", flags.graph);
    println!("\nFamily: {}", flags.family());
    Ok(())
}

pub fn locate(source: &Path, name: &str) -> Result<()> {
    let text = read_source(source)?;
    let Some(unit) = extract_unit(&text, name) else {
        let available = top_level_function_names(&text);
        if available.is_empty() {
            bail!("Function '{}' not found; the source declares no functions", name);
        }
        bail!("Function '{}' not found; available: {}", name, available.join(", "));
    };

    println!(
        "// {}{}({})",
        if unit.is_async { "async " } else { "" },
        unit.name,
        unit.params.join(", ")
    );
    println!("{}", unit.text);
    Ok(())
}
