/// Suite Executor - Library Entry Point
///
/// **Responsibility:**
/// Turn one submission (generated source, the level's test cases, optional
/// graph data and the full run's return value) into a `TestSuiteReport`.
///
/// **Architecture:**
/// 1. Resolve the target function name (given, or the first top-level function)
/// 2. Classify the algorithm family (classifier.rs)
/// 3. Hand off to the TestRunner (runner.rs), which patches, executes and judges
///
/// This module is the glue layer. It never returns an error: every fault
/// ends up in the report.

use blockcheck_common::config::VerifierConfig;
use blockcheck_common::types::{LevelMetadata, TestCase, TestSuiteReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use crate::classifier::classify;
use crate::locator::extract_function_name;
use crate::runner::{SuiteContext, TestRunner};
use crate::sandbox::Capability;

/// One verification request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuiteInput {
    /// Return value of the learner's full run, reused for the primary case when trusted
    pub executed_return_value: Option<Value>,
    pub test_cases: Vec<TestCase>,
    /// Empty means "the first top-level function in the source"
    pub function_name: String,
    pub source_text: String,
    pub capability_overrides: BTreeMap<String, Capability>,
    pub graph_map: Value,
    pub all_nodes: Value,
    pub level: LevelMetadata,
}

/// Verify a submission against its test cases
#[instrument(skip_all, fields(test_count = input.test_cases.len()))]
pub async fn run_test_suite(input: SuiteInput, config: &VerifierConfig) -> TestSuiteReport {
    let function_name = if input.function_name.trim().is_empty() {
        extract_function_name(&input.source_text)
    } else {
        Some(input.function_name.trim().to_string())
    };

    let Some(function_name) = function_name else {
        warn!("No function declaration found in generated code");
        return TestSuiteReport {
            passed: false,
            passed_tests: Vec::new(),
            failed_tests: Vec::new(),
            message: "No function found in generated code".to_string(),
            function_name: String::new(),
            family: None,
        };
    };

    let flags = classify(&input.source_text, &input.level);
    let family = flags.family();
    info!(function = %function_name, family = %family, "Verifying submission");

    let suite = SuiteContext {
        source_text: &input.source_text,
        function_name: &function_name,
        family,
        level: &input.level,
        graph_map: &input.graph_map,
        all_nodes: &input.all_nodes,
        capability_overrides: &input.capability_overrides,
        executed_return_value: input.executed_return_value.as_ref(),
    };

    TestRunner::new(config).run_tests(&suite, &input.test_cases).await
}
