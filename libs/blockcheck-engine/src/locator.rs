/// Function Locator
///
/// Finds a named function declaration inside generated source and reports its
/// exact byte span. Unbalanced bodies are reported as not found rather than
/// guessed at; callers turn that into a per-case failure.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use crate::scan::{self, find_matching, mask_non_code, next_code_byte};

lazy_static! {
    static ref ANY_FUNCTION: Regex =
        Regex::new(r"(?:\basync\s+)?\bfunction\s+([A-Za-z_$][\w$]*)\s*\(").unwrap();
    static ref DECLARATION: Regex = Regex::new(r"\b(var|let|const)\s+").unwrap();
    static ref AWAIT: Regex = Regex::new(r"\bawait\b").unwrap();
    static ref CALL_SITE: Regex = Regex::new(r"([A-Za-z_$][\w$]*)\s*\(").unwrap();
}

/// Byte span of one function declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpan {
    /// First byte of the signature (`async` or `function`)
    pub start: usize,
    /// Offset of the body's opening brace
    pub body_start: usize,
    /// Offset of the body's closing brace, inclusive
    pub end: usize,
}

impl FunctionSpan {
    /// The whole declaration, signature through closing brace
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..=self.end]
    }

    /// Statements between the braces
    pub fn body<'a>(&self, source: &'a str) -> &'a str {
        &source[self.body_start + 1..self.end]
    }

    fn params<'a>(&self, source: &'a str) -> &'a str {
        let signature = &source[self.start..self.body_start];
        match (signature.find('('), signature.rfind(')')) {
            (Some(open), Some(close)) if open < close => &signature[open + 1..close],
            _ => "",
        }
    }
}

/// One located function with its declared parameter names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionUnit {
    pub name: String,
    pub params: Vec<String>,
    pub is_async: bool,
    pub text: String,
}

impl FunctionUnit {
    pub fn from_span(name: &str, source: &str, span: FunctionSpan) -> Self {
        let params = scan::split_top_level_args(span.params(source))
            .into_iter()
            .map(|param| {
                // Defaults and rest syntax: keep the bare identifier
                let bare = param.split('=').next().unwrap_or("").trim();
                bare.trim_start_matches("...").to_string()
            })
            .filter(|p| !p.is_empty())
            .collect();
        let text = span.text(source).to_string();
        let is_async = text.trim_start().starts_with("async");
        Self {
            name: name.to_string(),
            params,
            is_async,
            text,
        }
    }

    /// Body statements of this unit's text
    pub fn body(&self) -> &str {
        match locate(&self.text, &self.name) {
            Some(span) => span.body(&self.text),
            None => "",
        }
    }
}

/// Locate the first declaration of `function_name`; `None` if that declaration is unbalanced
pub fn locate(source: &str, function_name: &str) -> Option<FunctionSpan> {
    let masked = mask_non_code(source);
    let pattern = Regex::new(&format!(
        r"(?:\basync\s+)?\bfunction\s+{}\s*\(",
        regex::escape(function_name)
    ))
    .ok()?;

    let m = pattern.find(&masked)?;
    let open_paren = m.end() - 1;
    let close_paren = find_matching(source, open_paren, b'(', b')')?;
    let (body_start, b) = next_code_byte(source, close_paren + 1)?;
    if b != b'{' {
        return None;
    }
    let end = find_matching(source, body_start, b'{', b'}')?;
    Some(FunctionSpan {
        start: m.start(),
        body_start,
        end,
    })
}

/// Locate and package a function with its parameter list
pub fn extract_unit(source: &str, function_name: &str) -> Option<FunctionUnit> {
    locate(source, function_name).map(|span| FunctionUnit::from_span(function_name, source, span))
}

/// Name of the first function declared at top level
pub fn extract_function_name(source: &str) -> Option<String> {
    top_level_function_names(source).into_iter().next()
}

/// Names of all top-level function declarations, in source order
pub fn top_level_function_names(source: &str) -> Vec<String> {
    let masked = mask_non_code(source);
    let depths = scan::brace_depths(&masked);
    ANY_FUNCTION
        .captures_iter(&masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if depths.get(whole.start()).copied().unwrap_or(0) != 0 {
                return None;
            }
            caps.get(1).map(|m| m.as_str().to_string())
        })
        .collect()
}

/// One top-level `var`/`let`/`const` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterDeclaration {
    /// Statement text as written, with `let`/`const` rewritten to `var`
    pub statement: String,
    /// Declared identifiers and whether each has an initializer
    pub bindings: Vec<(String, bool)>,
}

// A newline ends a statement unless the expression is visibly unfinished
fn continues_expression(last: Option<u8>, next: Option<u8>) -> bool {
    let dangling = matches!(
        last,
        Some(b',' | b'=' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'?' | b':' | b'<' | b'>' | b'!')
    );
    let leading = matches!(next, Some(b'.' | b',' | b'?' | b':' | b'+' | b'-' | b'*' | b'/' | b'=' | b'&' | b'|'));
    dangling || leading
}

fn statement_end(masked: &[u8], from: usize) -> usize {
    let mut depth = 0i32;
    let mut last = None;
    let mut i = from;
    while i < masked.len() {
        match masked[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth < 0 {
                    return i;
                }
            }
            b';' if depth == 0 => return i + 1,
            b'\n' if depth == 0 => {
                let next = masked[i..].iter().copied().find(|b| !b.is_ascii_whitespace());
                if !continues_expression(last, next) {
                    return i;
                }
            }
            _ => {}
        }
        if !masked[i].is_ascii_whitespace() {
            last = Some(masked[i]);
        }
        i += 1;
    }
    masked.len()
}

/// Top-level declaration statements in source order, initializers included
///
/// Only statement-position declarations count: a `for (let i ...)` header at
/// top level is part of its loop, not an outer declaration.
pub fn outer_declaration_statements(source: &str) -> Vec<OuterDeclaration> {
    let masked = mask_non_code(source);
    let bytes = masked.as_bytes();
    let depths = scan::brace_depths(&masked);
    let mut declarations = Vec::new();
    let mut resume = 0usize;

    for caps in DECLARATION.captures_iter(&masked) {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() < resume || depths.get(whole.start()).copied().unwrap_or(0) != 0 {
            continue;
        }
        let previous = bytes[..whole.start()].iter().rposition(|b| !b.is_ascii_whitespace());
        let after_statement = match previous {
            None => true,
            Some(at) => at < resume || matches!(bytes[at], b';' | b'}'),
        };
        if !after_statement {
            continue;
        }

        let end = statement_end(bytes, whole.end());
        resume = end;
        let declarators = source[whole.end()..end].trim().trim_end_matches(';');
        let bindings: Vec<(String, bool)> = scan::split_top_level_args(declarators)
            .into_iter()
            .filter_map(|part| {
                let mut sides = part.splitn(2, '=');
                let name = sides.next().unwrap_or("").trim();
                let initialized = sides.next().is_some_and(|rhs| !rhs.trim().is_empty());
                scan::is_identifier(name).then(|| (name.to_string(), initialized))
            })
            .collect();

        // `await` is not valid in a script body; keep only the names
        if AWAIT.is_match(&masked[whole.end()..end]) {
            if bindings.is_empty() {
                continue;
            }
            let names: Vec<&str> = bindings.iter().map(|(name, _)| name.as_str()).collect();
            declarations.push(OuterDeclaration {
                statement: format!("var {};", names.join(", ")),
                bindings: bindings.into_iter().map(|(name, _)| (name, false)).collect(),
            });
            continue;
        }

        let mut statement = format!("var {}", source[keyword.end()..end].trim());
        if !statement.ends_with(';') {
            statement.push(';');
        }
        declarations.push(OuterDeclaration { statement, bindings });
    }
    declarations
}

/// Identifiers declared by top-level `var`/`let`/`const` statements
pub fn outer_declarations(source: &str) -> BTreeSet<String> {
    outer_declaration_statements(source)
        .into_iter()
        .flat_map(|declaration| declaration.bindings.into_iter().map(|(name, _)| name))
        .collect()
}

/// Other top-level functions reachable from `function_name`, in source order
pub fn extract_callees(source: &str, function_name: &str) -> Vec<FunctionUnit> {
    let declared: Vec<String> = top_level_function_names(source);
    let mut units: HashMap<String, FunctionUnit> = HashMap::new();
    let mut pending = vec![function_name.to_string()];
    let mut seen = BTreeSet::new();
    seen.insert(function_name.to_string());

    while let Some(current) = pending.pop() {
        let Some(unit) = extract_unit(source, &current) else {
            continue;
        };
        let masked_body = mask_non_code(unit.body());
        for caps in CALL_SITE.captures_iter(&masked_body) {
            let Some(callee) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if declared.iter().any(|d| d == callee) && seen.insert(callee.to_string()) {
                pending.push(callee.to_string());
            }
        }
        if current != function_name {
            units.insert(current.clone(), unit);
        }
    }

    declared
        .into_iter()
        .filter_map(|name| units.remove(&name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = r#"var i, j, dist, visited;

async function dijkstra(graph, start, end) {
  // a comment with a stray } brace
  var label = "{ not a block }";
  dist = {};
  for (var node in graph) {
    dist[node] = Infinity;
  }
  /* another } */
  return dist;
}

function helper(x) { return x + 1; }
"#;

    #[test]
    fn test_locate_exact_boundaries() {
        let span = locate(PROGRAM, "dijkstra").unwrap();
        let text = span.text(PROGRAM);
        assert!(text.starts_with("async function dijkstra"));
        assert!(text.ends_with("return dist;\n}"));
        assert!(span.body(PROGRAM).contains("dist[node] = Infinity;"));
    }

    #[test]
    fn test_relocating_extracted_text_is_identical() {
        let span = locate(PROGRAM, "dijkstra").unwrap();
        let extracted = span.text(PROGRAM);
        let wrapped = format!("// prologue {{\nvar x = '}}';\n{}\nvar tail = 1;\n", extracted);
        let again = locate(&wrapped, "dijkstra").unwrap();
        assert_eq!(again.text(&wrapped), extracted);
    }

    #[test]
    fn test_locate_plain_function() {
        let span = locate(PROGRAM, "helper").unwrap();
        assert_eq!(span.text(PROGRAM), "function helper(x) { return x + 1; }");
    }

    #[test]
    fn test_locate_ignores_suffixed_names_and_strings() {
        let src = "var s = 'function solve() {'; function solve2(n) { return n; }";
        assert!(locate(src, "solve").is_none());
        assert!(locate(src, "solve2").is_some());
    }

    #[test]
    fn test_unbalanced_body_is_not_found() {
        let src = "function broken(a) { if (a) { return 1; }";
        assert!(locate(src, "broken").is_none());
    }

    #[test]
    fn test_extract_function_name_skips_nested() {
        let src = "var x;\nasync function outer() { function inner() {} }\nfunction later() {}";
        assert_eq!(extract_function_name(src), Some("outer".to_string()));
        assert_eq!(top_level_function_names(src), vec!["outer", "later"]);
        assert_eq!(extract_function_name("var x = 1;"), None);
    }

    #[test]
    fn test_unit_params() {
        let src = "async function knapsack(weights, values, capacity = 10, ...rest) { return 0; }";
        let unit = extract_unit(src, "knapsack").unwrap();
        assert_eq!(unit.params, vec!["weights", "values", "capacity", "rest"]);
        assert!(unit.is_async);
        assert_eq!(unit.body().trim(), "return 0;");
    }

    #[test]
    fn test_outer_declarations() {
        let src = "var i, j = 0, best;\nlet memo = {};\nfunction f() { var local; }";
        let names = outer_declarations(src);
        assert!(names.contains("i"));
        assert!(names.contains("j"));
        assert!(names.contains("best"));
        assert!(names.contains("memo"));
        assert!(!names.contains("local"));
    }

    #[test]
    fn test_outer_statements_keep_initializers() {
        let src = "var order = [];\nlet graph = {\n  A: [\"B\"],\n  B: []\n};\nconst LIMIT = 3\nvar a, b = 2;\nfor (let i = 0; i < 2; i++) {}\nfunction f() { let local = 1; }";
        let declarations = outer_declaration_statements(src);
        let statements: Vec<&str> = declarations.iter().map(|d| d.statement.as_str()).collect();
        assert_eq!(
            statements,
            vec![
                "var order = [];",
                "var graph = {\n  A: [\"B\"],\n  B: []\n};",
                "var LIMIT = 3;",
                "var a, b = 2;",
            ]
        );
        assert_eq!(declarations[3].bindings, vec![("a".to_string(), false), ("b".to_string(), true)]);
        assert_eq!(declarations[0].bindings, vec![("order".to_string(), true)]);
    }

    #[test]
    fn test_multiline_initializer_continues_across_operators() {
        let src = "var total = 1 +\n  2;\nvar label = 'a;b'\n  .toUpperCase();\nvar done;";
        let statements: Vec<String> = outer_declaration_statements(src)
            .into_iter()
            .map(|d| d.statement)
            .collect();
        assert_eq!(
            statements,
            vec!["var total = 1 +\n  2;", "var label = 'a;b'\n  .toUpperCase();", "var done;"]
        );
    }

    #[test]
    fn test_awaited_initializer_keeps_only_names() {
        let declarations = outer_declaration_statements("var path = await bfs(graph, 'A');");
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].statement, "var path;");
        assert_eq!(declarations[0].bindings, vec![("path".to_string(), false)]);
    }

    #[test]
    fn test_extract_callees_transitive() {
        let src = r#"
function isSafe(r, c) { return check(r) && c >= 0; }
function check(r) { return r >= 0; }
function unused() {}
async function solve(row) { if (isSafe(row, 0)) { return solve(row + 1); } }
"#;
        let names: Vec<String> = extract_callees(src, "solve")
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["isSafe", "check"]);
    }
}
