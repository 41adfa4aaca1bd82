use blockcheck_common::types::FallbackSources;
use serde_json::{json, Value};

/// Recover the value a run produced.
///
/// A non-null direct return always wins. Otherwise, in order: the shared
/// `result` slot, a non-empty shared `solution`, the capture buffer (a single
/// entry is unwrapped), then queen placements read off a `board` grid.
pub fn normalize(raw: Option<&Value>, fallback: &FallbackSources) -> Option<Value> {
    if let Some(value) = raw.filter(|v| !v.is_null()) {
        return Some(value.clone());
    }
    if let Some(result) = fallback.result.as_ref().filter(|v| !v.is_null()) {
        return Some(result.clone());
    }
    if let Some(solution) = fallback.solution.as_ref().filter(|v| !is_empty(v)) {
        return Some(solution.clone());
    }
    match fallback.captured.as_slice() {
        [] => {}
        [single] => return Some(single.clone()),
        many => return Some(Value::Array(many.to_vec())),
    }
    fallback.board.as_ref().and_then(placements_from_board)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// `[row, col]` of every cell equal to 1; `None` for an empty or malformed grid
pub fn placements_from_board(board: &Value) -> Option<Value> {
    let rows = board.as_array()?;
    let mut placements = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.as_array()?.iter().enumerate() {
            let occupied = cell.as_f64() == Some(1.0) || cell.as_bool() == Some(true);
            if occupied {
                placements.push(json!([r, c]));
            }
        }
    }
    (!placements.is_empty()).then_some(Value::Array(placements))
}
