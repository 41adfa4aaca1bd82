/// Semantic Patcher
///
/// Rewrites a located function before it runs, correcting the defects the
/// block compiler is known to introduce. Rules run in a fixed order and only
/// when the family profile enables them:
///
/// **Self-reference repair:** N-Queens learners often reuse the solver block
/// for the safety check and the board updates, so `solve(row, col)` shows up
/// where `isSafe`, `placeQueen` or `removeQueen` was meant.
///
/// **Re-localization:** the compiler hoists every variable to the program
/// scope, so recursive frames clobber each other's loop counters.
///
/// **Missing return:** a base case that stores its answer but never returns it.
///
/// **Duplicate return:** repeated terminators that follow an identical
/// unconditional one.
///
/// Every rule is idempotent and leaves code alone when its precondition fails.

use blockcheck_common::types::AlgorithmFamily;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

use crate::family::{profile, FamilyProfile, PatchRule};
use crate::locator::{self, FunctionUnit};
use crate::scan::{self, find_matching, mask_non_code, next_code_byte};

lazy_static! {
    static ref ASSIGNMENT: Regex =
        Regex::new(r"(?:^|[^\w$.])([A-Za-z_$][\w$]*)\s*(?:(?:[-+*/%]?=[^=])|\+\+|--)").unwrap();
    static ref PREFIX_UPDATE: Regex = Regex::new(r"(?:\+\+|--)\s*([A-Za-z_$][\w$]*)").unwrap();
    static ref LOCAL_DECLARATION: Regex = Regex::new(r"\b(?:var|let|const)\s+([^;\n]+)").unwrap();
    static ref IF_OPEN: Regex = Regex::new(r"(?:^|[^\w$.])if\s*\(").unwrap();
    static ref STATEMENT_ASSIGNMENT: Regex =
        Regex::new(r"^([A-Za-z_$][\w$]*)\s*([-+*/%]?=)(?:[^=]|$)").unwrap();
    static ref RETURN_STATEMENT: Regex = Regex::new(r"\breturn\s+([\w$]+)\s*;").unwrap();
    static ref RETURN_WORD: Regex = Regex::new(r"\breturn\b").unwrap();
}

const N_QUEENS_ROLES: [(&str, &str); 3] = [
    (
        "isSafe",
        r#"function isSafe(row, col) {
  var size = board.length;
  for (var k = 0; k < size; k++) {
    if (board[row][k] === 1 || board[k][col] === 1) return false;
  }
  for (var r = 0; r < size; r++) {
    for (var c = 0; c < size; c++) {
      if (board[r][c] === 1 && Math.abs(r - row) === Math.abs(c - col)) return false;
    }
  }
  return true;
}"#,
    ),
    (
        "placeQueen",
        "function placeQueen(row, col) { board[row][col] = 1; return true; }",
    ),
    (
        "removeQueen",
        "function removeQueen(row, col) { board[row][col] = 0; return true; }",
    ),
];

/// What the patcher knows about the program a unit was taken from
#[derive(Debug, Clone, Default)]
pub struct PatchContext<'a> {
    pub source: &'a str,
    pub outer_declarations: BTreeSet<String>,
}

impl<'a> PatchContext<'a> {
    pub fn from_source(source: &'a str) -> Self {
        Self {
            source,
            outer_declarations: locator::outer_declarations(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    /// Synthesized functions that must be in scope for `text` to run
    pub helpers: Vec<String>,
    pub applied: Vec<PatchRule>,
}

pub fn patch(unit: &FunctionUnit, family: AlgorithmFamily, ctx: &PatchContext<'_>) -> PatchOutcome {
    let profile = profile(family);
    let mut outcome = PatchOutcome {
        text: unit.text.clone(),
        helpers: Vec::new(),
        applied: Vec::new(),
    };

    if profile.applies(PatchRule::SelfReferenceRepair) {
        if let Some(text) = repair_self_references(&outcome.text, unit) {
            outcome.text = text;
            outcome.applied.push(PatchRule::SelfReferenceRepair);
            for (name, helper) in N_QUEENS_ROLES {
                if locator::locate(ctx.source, name).is_none() {
                    outcome.helpers.push(helper.to_string());
                }
            }
        }
    }

    let recursive = is_recursive(&outcome.text, &unit.name);

    if recursive && profile.applies(PatchRule::Relocalize) {
        if let Some(text) = relocalize(&outcome.text, unit, profile, ctx) {
            outcome.text = text;
            outcome.applied.push(PatchRule::Relocalize);
        }
    }

    if recursive && profile.applies(PatchRule::MissingReturn) {
        if let Some(text) = insert_missing_returns(&outcome.text, &unit.name, profile) {
            outcome.text = text;
            outcome.applied.push(PatchRule::MissingReturn);
        }
    }

    if profile.applies(PatchRule::DuplicateReturn) {
        if let Some(text) = collapse_duplicate_returns(&outcome.text, &unit.name) {
            outcome.text = text;
            outcome.applied.push(PatchRule::DuplicateReturn);
        }
    }

    if !outcome.applied.is_empty() {
        debug!(function = %unit.name, family = %family, applied = ?outcome.applied, "Patched function");
    }
    outcome
}

/// Call sites of `name` inside the body: (identifier start, open paren)
fn call_sites(text: &str, name: &str) -> Vec<(usize, usize)> {
    let Some(span) = locator::locate(text, name) else {
        return Vec::new();
    };
    let Ok(pattern) = Regex::new(&format!(r"(?:^|[^\w$.])({})\s*\(", regex::escape(name))) else {
        return Vec::new();
    };
    let masked = mask_non_code(text);
    let body_start = span.body_start + 1;
    pattern
        .captures_iter(&masked[body_start..span.end])
        .filter_map(|caps| {
            let ident = caps.get(1)?;
            let whole = caps.get(0)?;
            Some((body_start + ident.start(), body_start + whole.end() - 1))
        })
        .collect()
}

pub fn is_recursive(text: &str, name: &str) -> bool {
    !call_sites(text, name).is_empty()
}

fn repair_self_references(text: &str, unit: &FunctionUnit) -> Option<String> {
    if unit.params.len() == 2 {
        return None;
    }
    let masked = mask_non_code(text);
    let mut rewrites: Vec<(usize, &'static str)> = Vec::new();

    for (start, open) in call_sites(text, &unit.name) {
        let Some(close) = find_matching(text, open, b'(', b')') else {
            continue;
        };
        if scan::split_top_level_args(&text[open + 1..close]).len() != 2 {
            continue;
        }
        let role = if is_sole_if_predicate(text, &masked, start, close) {
            "isSafe"
        } else if inside_else_block(&masked, start) {
            "removeQueen"
        } else {
            "placeQueen"
        };
        rewrites.push((start, role));
    }

    if rewrites.is_empty() {
        return None;
    }
    let mut patched = text.to_string();
    for (start, role) in rewrites.into_iter().rev() {
        patched.replace_range(start..start + unit.name.len(), role);
    }
    Some(patched)
}

fn is_sole_if_predicate(text: &str, masked: &str, start: usize, close: usize) -> bool {
    let mut before = masked[..start].trim_end();
    if let Some(stripped) = before.strip_suffix("await") {
        if stripped.ends_with(|c: char| c.is_whitespace() || c == '(') {
            before = stripped.trim_end();
        }
    }
    let Some(before_paren) = before.strip_suffix('(') else {
        return false;
    };
    let Some(head) = before_paren.trim_end().strip_suffix("if") else {
        return false;
    };
    if head.ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return false;
    }
    matches!(next_code_byte(text, close + 1), Some((_, b')')))
}

fn inside_else_block(masked: &str, pos: usize) -> bool {
    match scan::enclosing_block_open(masked, pos) {
        Some(open) => {
            let before = masked[..open].trim_end();
            before.ends_with("else")
                && !before[..before.len() - 4]
                    .ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        None => false,
    }
}

fn declared_names(masked_body: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for caps in LOCAL_DECLARATION.captures_iter(masked_body) {
        let Some(list) = caps.get(1) else { continue };
        for part in scan::split_top_level_args(list.as_str()) {
            let lhs = part.split('=').next().unwrap_or("");
            if let Some(name) = lhs.split_whitespace().next() {
                if scan::is_identifier(name) {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names
}

fn assigned_names(masked_body: &str) -> BTreeSet<String> {
    ASSIGNMENT
        .captures_iter(masked_body)
        .chain(PREFIX_UPDATE.captures_iter(masked_body))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn relocalize(
    text: &str,
    unit: &FunctionUnit,
    profile: &FamilyProfile,
    ctx: &PatchContext<'_>,
) -> Option<String> {
    let span = locator::locate(text, &unit.name)?;
    let masked = mask_non_code(text);
    let body = &masked[span.body_start + 1..span.end];
    let local = declared_names(body);

    let targets: Vec<String> = assigned_names(body)
        .into_iter()
        .filter(|name| ctx.outer_declarations.contains(name))
        .filter(|name| !unit.params.contains(name))
        .filter(|name| !local.contains(name))
        .filter(|name| !profile.is_shared(name))
        .collect();

    if targets.is_empty() {
        return None;
    }
    debug!(function = %unit.name, variables = ?targets, "Re-localizing outer variables");
    let mut patched = text.to_string();
    patched.insert_str(span.body_start + 1, &format!("\n  let {};", targets.join(", ")));
    Some(patched)
}

/// Top-level statements of a block, split on `;` outside nested brackets
fn top_level_statements(masked_block: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, b) in masked_block.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b';' if depth == 0 => {
                statements.push(masked_block[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(masked_block[start..].trim());
    statements.retain(|s| !s.is_empty());
    statements
}

fn insert_missing_returns(text: &str, name: &str, profile: &FamilyProfile) -> Option<String> {
    let span = locator::locate(text, name)?;
    let masked = mask_non_code(text);
    let mut insertions: Vec<(usize, String)> = Vec::new();

    for m in IF_OPEN.find_iter(&masked[span.body_start + 1..span.end]) {
        let open_paren = span.body_start + 1 + m.end() - 1;
        let Some(close_paren) = find_matching(text, open_paren, b'(', b')') else {
            continue;
        };
        let Some((block_open, b'{')) = next_code_byte(text, close_paren + 1) else {
            continue;
        };
        let Some(block_close) = find_matching(text, block_open, b'{', b'}') else {
            continue;
        };
        let inner = &masked[block_open + 1..block_close];
        if RETURN_WORD.is_match(inner) {
            continue;
        }

        let assignments: Vec<(&str, &str)> = top_level_statements(inner)
            .into_iter()
            .filter_map(|statement| {
                let caps = STATEMENT_ASSIGNMENT.captures(statement)?;
                Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
            })
            .collect();
        let [(variable, "=")] = assignments.as_slice() else {
            continue;
        };
        if !profile.is_result_variable(variable) {
            continue;
        }

        let trimmed = text[block_open + 1..block_close].trim_end();
        let at = block_open + 1 + trimmed.len();
        let separator = if trimmed.ends_with(';') || trimmed.ends_with('}') { "" } else { ";" };
        insertions.push((at, format!("{} return {};", separator, variable)));
    }

    if insertions.is_empty() {
        return None;
    }
    let mut patched = text.to_string();
    for (at, insertion) in insertions.into_iter().rev() {
        patched.insert_str(at, &insertion);
    }
    Some(patched)
}

fn collapse_duplicate_returns(text: &str, name: &str) -> Option<String> {
    let span = locator::locate(text, name)?;
    let masked = mask_non_code(text);
    let body_offset = span.body_start + 1;
    let body = &masked[body_offset..span.end];

    let mut removals: Vec<(usize, usize)> = Vec::new();
    // (end of the last kept or removed return, its operand)
    let mut anchor: Option<(usize, &str)> = None;

    for caps in RETURN_STATEMENT.captures_iter(body) {
        let (Some(whole), Some(operand)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let operand = operand.as_str();
        match anchor {
            Some((end, previous))
                if previous == operand && body[end..whole.start()].trim().is_empty() =>
            {
                removals.push((body_offset + end, body_offset + whole.end()));
                anchor = Some((whole.end(), operand));
            }
            _ => {
                let preceding = body[..whole.start()].trim_end();
                let unconditional = preceding.is_empty()
                    || preceding.ends_with(';')
                    || preceding.ends_with('{')
                    || preceding.ends_with('}');
                anchor = unconditional.then_some((whole.end(), operand));
            }
        }
    }

    if removals.is_empty() {
        return None;
    }
    let mut patched = text.to_string();
    for (start, end) in removals.into_iter().rev() {
        patched.replace_range(start..end, "");
    }
    Some(patched)
}
