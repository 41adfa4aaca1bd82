use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// How an actual value is judged against `expectedOutput`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonMode {
    #[default]
    Exact,
    ArraySetEquals,
    NumberEquals,
    BooleanEquals,
}

impl ComparisonMode {
    /// Unrecognized names degrade to `Exact`
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "arraysetequals" | "arrayset" | "set" => ComparisonMode::ArraySetEquals,
            "numberequals" | "number" | "numeric" => ComparisonMode::NumberEquals,
            "booleanequals" | "boolean" | "bool" => ComparisonMode::BooleanEquals,
            _ => ComparisonMode::Exact,
        }
    }
}

impl<'de> Deserialize<'de> for ComparisonMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(ComparisonMode::parse).unwrap_or_default())
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparisonMode::Exact => "exact",
            ComparisonMode::ArraySetEquals => "arraySetEquals",
            ComparisonMode::NumberEquals => "numberEquals",
            ComparisonMode::BooleanEquals => "booleanEquals",
        };
        write!(f, "{}", name)
    }
}

/// Instructor-authored test case, as stored by the level backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
    pub function_name: String,
    /// Either a JSON object or a string holding one
    #[serde(default)]
    pub input_params: Value,
    #[serde(default)]
    pub expected_output: Value,
    #[serde(default)]
    pub comparison_mode: ComparisonMode,
    #[serde(default)]
    pub display_order: i32,
}

impl TestCase {
    /// Decode `input_params` into an ordered map.
    ///
    /// `null` and the empty string mean "no parameters". A string is parsed as JSON.
    pub fn input_params_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match &self.input_params {
            Value::Null => Ok(Map::new()),
            Value::String(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Value::String(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Null => Ok(Map::new()),
                other => serde_json::from_value(other),
            },
            other => serde_json::from_value(other.clone()),
        }
    }

    /// Expected output with JSON-encoded arrays/objects decoded
    pub fn expected_value(&self) -> Value {
        if let Value::String(raw) = &self.expected_output {
            let trimmed = raw.trim();
            if trimmed.starts_with('[') || trimmed.starts_with('{') {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    return parsed;
                }
            }
        }
        self.expected_output.clone()
    }
}

/// Structured per-family data attached to a level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelMetadata {
    pub knapsack_data: Option<Value>,
    pub subset_sum_data: Option<Value>,
    pub coin_change_data: Option<Value>,
    pub nqueen_data: Option<Value>,
    pub rope_partition_data: Option<Value>,
    pub graph_data: Option<Value>,
}

/// Supported algorithm categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlgorithmFamily {
    CoinChange,
    SubsetSum,
    Knapsack,
    NQueens,
    RopePartition,
    Graph,
    Generic,
}

impl AlgorithmFamily {
    pub const ALL: [AlgorithmFamily; 7] = [
        AlgorithmFamily::CoinChange,
        AlgorithmFamily::SubsetSum,
        AlgorithmFamily::Knapsack,
        AlgorithmFamily::NQueens,
        AlgorithmFamily::RopePartition,
        AlgorithmFamily::Graph,
        AlgorithmFamily::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmFamily::CoinChange => "coinChange",
            AlgorithmFamily::SubsetSum => "subsetSum",
            AlgorithmFamily::Knapsack => "knapsack",
            AlgorithmFamily::NQueens => "nQueens",
            AlgorithmFamily::RopePartition => "ropePartition",
            AlgorithmFamily::Graph => "graph",
            AlgorithmFamily::Generic => "generic",
        }
    }
}

impl fmt::Display for AlgorithmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// End-of-run state the sandbox exposes for result recovery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FallbackSources {
    /// Shared `result` slot
    pub result: Option<Value>,
    /// Shared `solution` array
    pub solution: Option<Value>,
    /// Values pushed through `captureSolution`
    pub captured: Vec<Value>,
    /// 2D `board` grid snapshot
    pub board: Option<Value>,
}

/// Outcome of one bounded sandbox run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Direct return value; `None` when the function returned `undefined`
    pub value: Option<Value>,
    /// Message of the error the run raised, if any
    pub raised: Option<String>,
    pub timed_out: bool,
    pub call_count_exceeded: bool,
    pub call_count: u64,
    pub fallback: FallbackSources,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.call_count_exceeded {
            Some(FailureKind::CallCountExceeded)
        } else if self.timed_out {
            Some(FailureKind::Timeout)
        } else if self.raised.is_some() {
            Some(FailureKind::RuntimeError)
        } else {
            None
        }
    }
}

/// Why a test case failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailed,
    RuntimeError,
    Timeout,
    CallCountExceeded,
    Mismatch,
}

impl FailureKind {
    /// Short learner-facing description
    pub fn describe(&self) -> &'static str {
        match self {
            FailureKind::ExtractionFailed => "function not found in generated code",
            FailureKind::RuntimeError => "runtime error",
            FailureKind::Timeout => "execution timeout (possible infinite loop)",
            FailureKind::CallCountExceeded => "too many executions (possible infinite loop)",
            FailureKind::Mismatch => "wrong result",
        }
    }

    pub fn is_runaway(&self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::CallCountExceeded)
    }
}

/// Judgement for a single test case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonOutcome {
    pub test_id: u64,
    pub test_name: String,
    pub is_primary: bool,
    pub passed: bool,
    pub actual: Option<Value>,
    pub expected: Value,
    pub mode: ComparisonMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated verdict for one submission against one level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteReport {
    pub passed: bool,
    pub passed_tests: Vec<ComparisonOutcome>,
    pub failed_tests: Vec<ComparisonOutcome>,
    pub message: String,
    pub function_name: String,
    pub family: Option<AlgorithmFamily>,
}

impl TestSuiteReport {
    pub fn total(&self) -> usize {
        self.passed_tests.len() + self.failed_tests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_case(input_params: Value) -> TestCase {
        TestCase {
            id: 1,
            name: "case".to_string(),
            is_primary: false,
            function_name: "dijkstra".to_string(),
            input_params,
            expected_output: Value::Null,
            comparison_mode: ComparisonMode::Exact,
            display_order: 0,
        }
    }

    #[test]
    fn test_comparison_mode_parse() {
        assert_eq!(ComparisonMode::parse("arraySetEquals"), ComparisonMode::ArraySetEquals);
        assert_eq!(ComparisonMode::parse("number_equals"), ComparisonMode::NumberEquals);
        assert_eq!(ComparisonMode::parse("BooleanEquals"), ComparisonMode::BooleanEquals);
        assert_eq!(ComparisonMode::parse("fuzzy"), ComparisonMode::Exact);
    }

    #[test]
    fn test_unknown_mode_deserializes_to_exact() {
        let case: TestCase = serde_json::from_value(json!({
            "functionName": "bfs",
            "comparisonMode": "somethingElse"
        }))
        .unwrap();
        assert_eq!(case.comparison_mode, ComparisonMode::Exact);

        let case: TestCase = serde_json::from_value(json!({
            "functionName": "bfs",
            "comparisonMode": null
        }))
        .unwrap();
        assert_eq!(case.comparison_mode, ComparisonMode::Exact);
    }

    #[test]
    fn test_input_params_object_and_string() {
        let from_object = make_case(json!({"start": "A", "end": "C"}));
        let map = from_object.input_params_map().unwrap();
        assert_eq!(map.get("start"), Some(&json!("A")));

        let from_string = make_case(json!("{\"n\": 4}"));
        let map = from_string.input_params_map().unwrap();
        assert_eq!(map.get("n"), Some(&json!(4)));
    }

    #[test]
    fn test_input_params_preserve_order() {
        let case = make_case(json!("{\"weights\": [1], \"values\": [2], \"capacity\": 3}"));
        let keys: Vec<String> = case.input_params_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["weights", "values", "capacity"]);
    }

    #[test]
    fn test_input_params_malformed() {
        assert!(make_case(json!("{not json")).input_params_map().is_err());
        assert!(make_case(json!([1, 2])).input_params_map().is_err());
        assert!(make_case(Value::Null).input_params_map().unwrap().is_empty());
        assert!(make_case(json!("  ")).input_params_map().unwrap().is_empty());
    }

    #[test]
    fn test_expected_value_decodes_json_arrays() {
        let mut case = make_case(Value::Null);
        case.expected_output = json!("[[0,1],[1,3]]");
        assert_eq!(case.expected_value(), json!([[0, 1], [1, 3]]));

        case.expected_output = json!("5");
        assert_eq!(case.expected_value(), json!("5"));

        case.expected_output = json!("[broken");
        assert_eq!(case.expected_value(), json!("[broken"));
    }

    #[test]
    fn test_failure_kind_priority() {
        let result = ExecutionResult {
            raised: Some("Too many executions".to_string()),
            timed_out: true,
            call_count_exceeded: true,
            ..Default::default()
        };
        assert_eq!(result.failure_kind(), Some(FailureKind::CallCountExceeded));
        assert!(FailureKind::Timeout.is_runaway());
        assert!(!FailureKind::Mismatch.is_runaway());
    }

    #[test]
    fn test_level_metadata_camel_case() {
        let level: LevelMetadata = serde_json::from_value(json!({
            "nqueenData": {"n": 4},
            "knapsackData": null
        }))
        .unwrap();
        assert!(level.nqueen_data.is_some());
        assert!(level.knapsack_data.is_none());
    }
}
