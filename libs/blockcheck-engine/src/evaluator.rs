/// Result Comparator - Mode-Aware Judging of Normalized Values
///
/// **Core Responsibility:**
/// Decide whether an actual value satisfies a test case, then aggregate the
/// per-case verdicts into one suite report.
///
/// **Critical Properties:**
/// - Knows nothing about the sandbox or how the value was produced
/// - Never panics, whatever shape the values have
/// - `undefined` (no value at all) never matches
///
/// **Comparison Modes:**
/// - `exact`: deep equality; array order and object key sets matter; `1 == 1.0`
/// - `arraySetEquals`: arrays of numeric pairs compare as unordered sets,
///   anything else element by element
/// - `numberEquals`: numeric coercion (`"5"` is 5); NaN and junk fail
/// - `booleanEquals`: only `true`/`false` and `"true"`/`"false"`
///
/// **N-Queens:**
/// Many boards are correct. When the actual value is a placement (one column
/// per row, `[row, col]` pairs, or a 0/1 grid) it is checked for validity
/// instead of being compared literally.
///
/// **Aggregation:**
/// With a primary case, the suite passes iff the primary passes. Without one,
/// every case must pass.

use blockcheck_common::types::{
    AlgorithmFamily, ComparisonMode, ComparisonOutcome, FailureKind, TestCase, TestSuiteReport,
};
use serde_json::Value;
use std::collections::HashSet;

/// Side information some comparisons need
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonHint {
    pub family: Option<AlgorithmFamily>,
    /// Board size for placement validation, when the level states it
    pub board_size: Option<usize>,
}

pub fn compare(actual: Option<&Value>, expected: &Value, mode: ComparisonMode, hint: ComparisonHint) -> bool {
    let Some(actual) = actual else {
        return false;
    };

    if hint.family == Some(AlgorithmFamily::NQueens) {
        if let Some(placements) = placements(actual) {
            let n = hint
                .board_size
                .or_else(|| expected.as_array().map(Vec::len))
                .unwrap_or(placements.len());
            return is_valid_placement(&placements, n);
        }
    }

    match mode {
        ComparisonMode::Exact => deep_equal(actual, expected),
        ComparisonMode::ArraySetEquals => array_set_equals(actual, expected),
        ComparisonMode::NumberEquals => match (as_number(actual), as_number(expected)) {
            (Some(a), Some(b)) => (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0),
            _ => false,
        },
        ComparisonMode::BooleanEquals => match (as_boolean(actual), as_boolean(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Deep equality with numbers compared by value
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| deep_equal(v, w)))
        }
        _ => a == b,
    }
}

fn numeric_pairs(value: &Value) -> Option<Vec<(i64, i64)>> {
    value
        .as_array()?
        .iter()
        .map(|item| match item.as_array()?.as_slice() {
            [a, b] => Some((as_integer(a)?, as_integer(b)?)),
            _ => None,
        })
        .collect()
}

fn array_set_equals(actual: &Value, expected: &Value) -> bool {
    match (numeric_pairs(actual), numeric_pairs(expected)) {
        (Some(a), Some(b)) => {
            let a: HashSet<(i64, i64)> = a.into_iter().collect();
            let b: HashSet<(i64, i64)> = b.into_iter().collect();
            a == b
        }
        _ => deep_equal(actual, expected),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    let n = value.as_f64()?;
    (n.fract() == 0.0).then_some(n as i64)
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (!n.is_nan()).then_some(n)
}

fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Queen coordinates from any of the accepted placement shapes
fn placements(value: &Value) -> Option<Vec<(i64, i64)>> {
    let rows = value.as_array()?;
    if rows.is_empty() {
        return None;
    }

    // One column per row
    if rows.iter().all(|v| v.is_number()) {
        return rows
            .iter()
            .enumerate()
            .map(|(r, c)| Some((r as i64, as_integer(c)?)))
            .collect();
    }

    // 0/1 grid; square and larger than a pair so it cannot be mistaken for coordinates
    let is_grid = rows.iter().all(|row| {
        row.as_array().is_some_and(|cells| {
            cells.len() == rows.len() && cells.iter().all(|c| matches!(as_integer(c), Some(0 | 1)))
        })
    });
    if is_grid && rows.len() > 2 {
        let mut queens = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.as_array()?.iter().enumerate() {
                if as_integer(cell) == Some(1) {
                    queens.push((r as i64, c as i64));
                }
            }
        }
        return Some(queens);
    }

    numeric_pairs(value)
}

/// N queens on an N x N board, no two sharing a row, column or diagonal
pub fn is_valid_placement(queens: &[(i64, i64)], n: usize) -> bool {
    if n == 0 || queens.len() != n {
        return false;
    }
    let n = n as i64;
    let mut rows = HashSet::new();
    let mut cols = HashSet::new();
    let mut diagonals = HashSet::new();
    let mut anti_diagonals = HashSet::new();
    queens.iter().all(|&(r, c)| {
        (0..n).contains(&r)
            && (0..n).contains(&c)
            && rows.insert(r)
            && cols.insert(c)
            && diagonals.insert(r - c)
            && anti_diagonals.insert(r + c)
    })
}

/// Judge one case given the value recovered for it
pub fn evaluate_case(
    case: &TestCase,
    actual: Option<Value>,
    failure: Option<FailureKind>,
    error: Option<String>,
    hint: ComparisonHint,
) -> ComparisonOutcome {
    let expected = case.expected_value();
    let passed = failure.is_none() && compare(actual.as_ref(), &expected, case.comparison_mode, hint);
    let failure = match (passed, failure) {
        (true, _) => None,
        (false, Some(kind)) => Some(kind),
        (false, None) => Some(FailureKind::Mismatch),
    };

    ComparisonOutcome {
        test_id: case.id,
        test_name: case.name.clone(),
        is_primary: case.is_primary,
        passed,
        actual,
        expected,
        mode: case.comparison_mode,
        failure,
        error,
    }
}

fn failure_summary(outcome: &ComparisonOutcome) -> String {
    let kind = outcome.failure.unwrap_or(FailureKind::Mismatch);
    match &outcome.error {
        Some(error) if kind == FailureKind::RuntimeError => format!("{}: {}", kind.describe(), error),
        _ => kind.describe().to_string(),
    }
}

/// Aggregate per-case outcomes into the suite verdict and message
pub fn aggregate(
    function_name: &str,
    family: Option<AlgorithmFamily>,
    outcomes: Vec<ComparisonOutcome>,
) -> TestSuiteReport {
    let total = outcomes.len();
    let primary = outcomes.iter().find(|o| o.is_primary).cloned();
    let (passed_tests, failed_tests): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(|o| o.passed);

    let (passed, message) = if total == 0 {
        (true, "No test cases to check".to_string())
    } else if failed_tests.is_empty() {
        (true, format!("All {} test cases passed", total))
    } else {
        match primary {
            Some(primary) if primary.passed => {
                let secondary_total = total - 1;
                let secondary_passed = passed_tests.len() - 1;
                (
                    true,
                    format!(
                        "Primary test passed, {}/{} secondary tests passed",
                        secondary_passed, secondary_total
                    ),
                )
            }
            Some(primary) => (false, format!("Primary test failed: {}", failure_summary(&primary))),
            None => (false, format!("{}/{} test cases passed", passed_tests.len(), total)),
        }
    };

    TestSuiteReport {
        passed,
        passed_tests,
        failed_tests,
        message,
        function_name: function_name.to_string(),
        family,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper to create a test case
    fn make_test_case(id: u64, expected: Value, mode: ComparisonMode, is_primary: bool) -> TestCase {
        TestCase {
            id,
            name: format!("case {}", id),
            is_primary,
            function_name: "solve".to_string(),
            input_params: Value::Null,
            expected_output: expected,
            comparison_mode: mode,
            display_order: id as i32,
        }
    }

    fn queens_hint(n: usize) -> ComparisonHint {
        ComparisonHint {
            family: Some(AlgorithmFamily::NQueens),
            board_size: Some(n),
        }
    }

    #[test]
    fn test_exact_compares_numbers_by_value() {
        assert!(compare(Some(&json!(1)), &json!(1.0), ComparisonMode::Exact, ComparisonHint::default()));
        assert!(compare(
            Some(&json!({"a": [1, 2], "b": null})),
            &json!({"b": null, "a": [1.0, 2]}),
            ComparisonMode::Exact,
            ComparisonHint::default()
        ));
        assert!(!compare(Some(&json!([1, 2])), &json!([2, 1]), ComparisonMode::Exact, ComparisonHint::default()));
        assert!(!compare(Some(&json!({"a": 1})), &json!({"a": 1, "b": 2}), ComparisonMode::Exact, ComparisonHint::default()));
    }

    #[test]
    fn test_undefined_never_matches() {
        for mode in [ComparisonMode::Exact, ComparisonMode::BooleanEquals, ComparisonMode::NumberEquals] {
            assert!(!compare(None, &Value::Null, mode, ComparisonHint::default()));
        }
    }

    #[test]
    fn test_comparison_is_reflexive() {
        let values = [json!(0), json!("A"), json!([1, [2, 3]]), json!({"k": [true]}), Value::Null];
        for value in &values {
            assert!(compare(Some(value), value, ComparisonMode::Exact, ComparisonHint::default()));
            assert!(compare(Some(value), value, ComparisonMode::ArraySetEquals, ComparisonHint::default()));
        }
    }

    #[test]
    fn test_array_set_equals_ignores_order() {
        let expected = json!([[0, 1], [1, 3], [2, 0]]);
        assert!(compare(
            Some(&json!([[2, 0], [0, 1], [1, 3]])),
            &expected,
            ComparisonMode::ArraySetEquals,
            ComparisonHint::default()
        ));
        assert!(!compare(
            Some(&json!([[2, 0], [0, 1]])),
            &expected,
            ComparisonMode::ArraySetEquals,
            ComparisonHint::default()
        ));
        // Not pairs: falls back to ordered comparison
        assert!(!compare(
            Some(&json!(["B", "A"])),
            &json!(["A", "B"]),
            ComparisonMode::ArraySetEquals,
            ComparisonHint::default()
        ));
    }

    #[test]
    fn test_number_equals_coerces() {
        let hint = ComparisonHint::default();
        assert!(compare(Some(&json!("5")), &json!(5), ComparisonMode::NumberEquals, hint));
        assert!(compare(Some(&json!(0.1)), &json!("0.1"), ComparisonMode::NumberEquals, hint));
        assert!(!compare(Some(&json!("NaN")), &json!("NaN"), ComparisonMode::NumberEquals, hint));
        assert!(!compare(Some(&json!("five")), &json!(5), ComparisonMode::NumberEquals, hint));
    }

    #[test]
    fn test_boolean_equals_is_strict() {
        let hint = ComparisonHint::default();
        assert!(compare(Some(&json!(true)), &json!("true"), ComparisonMode::BooleanEquals, hint));
        assert!(!compare(Some(&json!(false)), &json!("true"), ComparisonMode::BooleanEquals, hint));
        assert!(!compare(Some(&json!(1)), &json!(true), ComparisonMode::BooleanEquals, hint));
        assert!(!compare(Some(&json!("yes")), &json!(true), ComparisonMode::BooleanEquals, hint));
    }

    #[test]
    fn test_n_queens_accepts_any_valid_board() {
        let expected = json!([1, 3, 0, 2]);
        for actual in [
            json!([1, 3, 0, 2]),
            json!([2, 0, 3, 1]),
            json!([[0, 2], [1, 0], [2, 3], [3, 1]]),
            json!([[0, 1, 0, 0], [0, 0, 0, 1], [1, 0, 0, 0], [0, 0, 1, 0]]),
        ] {
            assert!(compare(Some(&actual), &expected, ComparisonMode::Exact, queens_hint(4)), "{}", actual);
        }
    }

    #[test]
    fn test_n_queens_rejects_clashes() {
        let expected = json!([1, 3, 0, 2]);
        // (0,0) and (1,1) share a diagonal
        assert!(!compare(Some(&json!([0, 1, 3, 2])), &expected, ComparisonMode::Exact, queens_hint(4)));
        assert!(!compare(Some(&json!([1, 3, 0])), &expected, ComparisonMode::Exact, queens_hint(4)));
        assert!(!compare(Some(&json!([1, 1, 0, 2])), &expected, ComparisonMode::Exact, queens_hint(4)));
    }

    #[test]
    fn test_n_queens_board_size_falls_back_to_expected_length() {
        let hint = ComparisonHint {
            family: Some(AlgorithmFamily::NQueens),
            board_size: None,
        };
        assert!(compare(Some(&json!([2, 0, 3, 1])), &json!([1, 3, 0, 2]), ComparisonMode::Exact, hint));
        // Counting solutions is still a literal comparison
        assert!(compare(Some(&json!(true)), &json!(true), ComparisonMode::BooleanEquals, hint));
    }

    #[test]
    fn test_evaluate_case_reports_failure_kind() {
        let case = make_test_case(1, json!(7), ComparisonMode::Exact, false);
        let outcome = evaluate_case(&case, Some(json!(6)), None, None, ComparisonHint::default());
        assert!(!outcome.passed);
        assert_eq!(outcome.failure, Some(FailureKind::Mismatch));

        let outcome = evaluate_case(&case, None, Some(FailureKind::Timeout), None, ComparisonHint::default());
        assert_eq!(outcome.failure, Some(FailureKind::Timeout));

        let outcome = evaluate_case(&case, Some(json!(7)), None, None, ComparisonHint::default());
        assert!(outcome.passed);
        assert_eq!(outcome.failure, None);
    }

    fn outcome(id: u64, is_primary: bool, passed: bool) -> ComparisonOutcome {
        let case = make_test_case(id, json!(1), ComparisonMode::Exact, is_primary);
        let actual = if passed { json!(1) } else { json!(2) };
        evaluate_case(&case, Some(actual), None, None, ComparisonHint::default())
    }

    #[test]
    fn test_aggregate_messages() {
        let report = aggregate("bfs", None, vec![outcome(1, true, true), outcome(2, false, true)]);
        assert!(report.passed);
        assert_eq!(report.message, "All 2 test cases passed");

        let report = aggregate(
            "bfs",
            None,
            vec![outcome(1, true, true), outcome(2, false, false), outcome(3, false, true)],
        );
        assert!(report.passed);
        assert_eq!(report.message, "Primary test passed, 1/2 secondary tests passed");

        let report = aggregate("bfs", None, vec![outcome(1, true, false), outcome(2, false, true)]);
        assert!(!report.passed);
        assert_eq!(report.message, "Primary test failed: wrong result");
    }

    #[test]
    fn test_primary_less_suite_requires_unanimity() {
        let all = aggregate("f", None, vec![outcome(1, false, true), outcome(2, false, true), outcome(3, false, true)]);
        assert!(all.passed);

        let one_off = aggregate("f", None, vec![outcome(1, false, true), outcome(2, false, false), outcome(3, false, true)]);
        assert!(!one_off.passed);
        assert_eq!(one_off.message, "2/3 test cases passed");
        assert_eq!(one_off.failed_tests.len(), 1);
    }

    #[test]
    fn test_empty_suite_passes_trivially() {
        let report = aggregate("f", None, Vec::new());
        assert!(report.passed);
        assert_eq!(report.message, "No test cases to check");
        assert_eq!(report.total(), 0);
    }
}
