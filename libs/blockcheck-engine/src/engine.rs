/// Bounded Executor - Runs One Function Call in a Fresh JavaScript Context
///
/// **Core Responsibility:**
/// Execute a patched function with positional arguments and report what
/// happened: the settled value, the raised error, and the end-of-run state
/// the normalizer may fall back on.
///
/// **Isolation:**
/// - Every run builds a new `boa_engine::Context`; nothing survives a run
/// - The interpreter runs on a blocking thread, raced against a tokio timeout
/// - At most `SANDBOX_SLOTS` interpreters run at once; an abandoned run keeps
///   its slot until its thread actually returns
/// - Movement capabilities count calls and check a deadline from inside the
///   sandbox, so a runaway recursion that animates is stopped deterministically
/// - Boa's loop iteration and recursion limits stop loops that never reach a
///   capability. The loop limit shrinks with the timeout, see
///   [`effective_loop_limit`]
///
/// The engine does not judge results. That is the evaluator's job.

use blockcheck_common::config::ExecutionLimits;
use blockcheck_common::types::{ExecutionResult, FallbackSources};
use boa_engine::{js_string, Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Source};
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::primitives::{decode_args, Primitive};
use crate::sandbox::{js_literal, CapabilityMap};

/// Loop iterations a single loop may run per millisecond of timeout
pub const LOOP_ITERATIONS_PER_MS: u64 = 100;

lazy_static! {
    static ref SANDBOX_SLOTS: Arc<Semaphore> = Arc::new(Semaphore::new(
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .max(2)
    ));
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Execution timeout after {0}ms")]
    Timeout(u64),
    #[error("Too many executions: more than {0} capability calls")]
    CallBudgetExceeded(u64),
    #[error("{0}")]
    Runtime(String),
    #[error("Function did not complete")]
    Unsettled,
    #[error("Sandbox failure: {0}")]
    Internal(String),
}

impl SandboxError {
    fn apply(&self, result: &mut ExecutionResult) {
        match self {
            SandboxError::Timeout(_) => result.timed_out = true,
            SandboxError::CallBudgetExceeded(_) => result.call_count_exceeded = true,
            _ => {}
        }
        result.raised = Some(self.to_string());
    }
}

/// Everything needed to run one call
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Patched target plus the helpers and callees it needs
    pub source_text: String,
    pub function_name: String,
    pub capabilities: CapabilityMap,
    /// Outer-scope names the generated program declares
    pub outer_declarations: Vec<String>,
    /// Top-level declaration statements, initializers included, run before the source
    pub outer_statements: Vec<String>,
    pub positional_args: Vec<Value>,
    /// Graph used by the one-argument neighbour primitives
    pub graph_map: Value,
    pub all_nodes: Value,
}

/// End-of-run state read back out of the context
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snapshot {
    settled: bool,
    has_value: bool,
    value: Option<Value>,
    error: Option<String>,
    timed_out: bool,
    budget_exceeded: bool,
    calls: u64,
    result: Option<Value>,
    solution: Option<Value>,
    board: Option<Value>,
    captured: Vec<Value>,
}

const RUNTIME: &str = r#"
var __env = { settled: false, hasValue: false, value: null, error: null, timedOut: false, budgetExceeded: false };
var __calls = 0;
var __captured = [];
function __checkDeadline() {
  if (Date.now() > __deadline) { __env.timedOut = true; throw new Error("Execution timeout"); }
}
function __tick(name) {
  __checkDeadline();
  __calls += 1;
  if (__calls > __MAX_CALLS) { __env.budgetExceeded = true; throw new Error("Too many executions: " + name); }
}
function __plain(v) {
  if (v instanceof Set) { return Array.from(v); }
  if (v instanceof Map) { var o = {}; v.forEach(function (val, key) { o[key] = val; }); return o; }
  return v;
}
function __primitive(name, args) {
  __checkDeadline();
  return JSON.parse(__native_primitive(name, JSON.stringify(args.map(__plain))));
}
"#;

const SNAPSHOT: &str = r#"
(function () {
  var snap = {
    settled: __env.settled, hasValue: __env.hasValue, value: __env.value, error: __env.error,
    timedOut: __env.timedOut, budgetExceeded: __env.budgetExceeded, calls: __calls,
    result: typeof result === "undefined" ? null : __plain(result),
    solution: typeof solution === "undefined" ? null : __plain(solution),
    board: typeof board === "undefined" ? null : board,
    captured: __captured
  };
  try {
    return JSON.stringify(snap);
  } catch (e) {
    snap.value = String(snap.value); snap.result = null; snap.solution = null; snap.board = null;
    return JSON.stringify(snap);
  }
})()
"#;

/// Prelude script: runtime, limits, outer declarations, capabilities
fn render_prelude(request: &ExecutionRequest, limits: &ExecutionLimits) -> String {
    let mut script = String::new();
    script.push_str(&format!("var __MAX_CALLS = {};\n", limits.max_call_count));
    script.push_str(&format!("var __deadline = Date.now() + {};\n", limits.timeout_ms));
    script.push_str(&format!("var __graph = {};\n", js_literal(&request.graph_map)));
    script.push_str(&format!("var __nodes = {};\n", js_literal(&request.all_nodes)));
    script.push_str(RUNTIME);
    if !request.outer_declarations.is_empty() {
        script.push_str(&format!("var {};\n", request.outer_declarations.join(", ")));
    }
    script.push_str(&request.capabilities.render_prelude());
    script.push('\n');
    script
}

/// Program script: outer initializers, data re-applied over them, learner code,
/// then an async invocation that settles into `__env`
fn render_program(request: &ExecutionRequest) -> String {
    // A throwing initializer leaves its names undefined instead of aborting the run
    let declarations: String = request
        .outer_statements
        .iter()
        .map(|statement| format!("try {{ {} }} catch (__e) {{}}\n", statement))
        .collect();
    format!(
        r#"{declarations}{data}
{source}
var __args = {args};
(async function () {{ return await {name}.apply(null, __args); }})().then(
  function (v) {{ __env.settled = true; __env.hasValue = v !== undefined; __env.value = __plain(v); }},
  function (e) {{ __env.settled = true; __env.error = String(e && e.message !== undefined ? e.message : e); }}
);
"#,
        declarations = declarations,
        data = request.capabilities.render_data_assignments(),
        source = request.source_text,
        args = js_literal(&Value::Array(request.positional_args.clone())),
        name = request.function_name,
    )
}

/// Bridge from sandbox adapters to the Rust primitives: `(name, argsJson) -> resultJson`
fn native_primitive(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let name = string_arg(args, 0, context)?;
    let raw = string_arg(args, 1, context)?;
    let Some(primitive) = Primitive::from_name(&name) else {
        return Err(JsNativeError::typ()
            .with_message(format!("Unknown primitive: {}", name))
            .into());
    };
    let output = primitive.invoke(&decode_args(&raw));
    Ok(JsValue::from(JsString::from(js_literal(&output).as_str())))
}

fn string_arg(args: &[JsValue], index: usize, context: &mut Context) -> JsResult<String> {
    match args.get(index) {
        Some(value) => Ok(value.to_string(context)?.to_std_string_escaped()),
        None => Ok(String::new()),
    }
}

const LOOP_LIMIT_MESSAGE: &str = "Maximum loop iteration limit";
const RECURSION_LIMIT_MESSAGES: [&str; 2] = [
    "exceeded maximum number of recursive calls",
    "exceeded maximum call stack length",
];

/// Limit errors raised by the interpreter itself rather than by learner code
///
/// Matches boa's own messages exactly; a learner error that merely mentions
/// recursion stays a runtime error.
fn interpreter_limit(message: &str) -> Option<SandboxError> {
    if message.contains(LOOP_LIMIT_MESSAGE) {
        Some(SandboxError::Timeout(0))
    } else if RECURSION_LIMIT_MESSAGES.iter().any(|m| message.contains(m)) {
        Some(SandboxError::CallBudgetExceeded(0))
    } else {
        None
    }
}

/// Per-loop iteration cap: the configured limit, lowered to what fits the timeout
///
/// Boa cannot be interrupted from outside, so this is what ends a run whose
/// timeout already fired.
pub fn effective_loop_limit(limits: &ExecutionLimits) -> u64 {
    limits
        .loop_iteration_limit
        .min(limits.timeout_ms.saturating_mul(LOOP_ITERATIONS_PER_MS))
        .max(1)
}

fn run_in_context(request: &ExecutionRequest, limits: &ExecutionLimits) -> Result<Snapshot, SandboxError> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(effective_loop_limit(limits));
    context
        .runtime_limits_mut()
        .set_recursion_limit(limits.recursion_limit);
    context
        .register_global_callable(
            js_string!("__native_primitive"),
            2,
            NativeFunction::from_fn_ptr(native_primitive),
        )
        .map_err(|e| SandboxError::Internal(e.to_string()))?;

    let prelude = render_prelude(request, limits);
    context
        .eval(Source::from_bytes(prelude.as_bytes()))
        .map_err(|e| SandboxError::Internal(format!("prelude: {}", e)))?;

    let program = render_program(request);
    let program_error = context
        .eval(Source::from_bytes(program.as_bytes()))
        .err()
        .map(|e| e.to_string());
    let _ = context.run_jobs();

    let snapshot = context
        .eval(Source::from_bytes(SNAPSHOT.as_bytes()))
        .map_err(|e| SandboxError::Internal(format!("snapshot: {}", e)))?;
    let text = snapshot
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| SandboxError::Internal("snapshot was not a string".to_string()))?;

    let mut snapshot: Snapshot =
        serde_json::from_str(&text).map_err(|e| SandboxError::Internal(e.to_string()))?;
    if snapshot.error.is_none() {
        snapshot.error = program_error;
    }
    Ok(snapshot)
}

/// Classify a finished run; call budget beats timeout beats plain errors
fn outcome(snapshot: &Snapshot, limits: &ExecutionLimits) -> Result<(), SandboxError> {
    let limit = snapshot.error.as_deref().and_then(interpreter_limit);
    if snapshot.budget_exceeded || matches!(limit, Some(SandboxError::CallBudgetExceeded(_))) {
        return Err(SandboxError::CallBudgetExceeded(limits.max_call_count));
    }
    if snapshot.timed_out || matches!(limit, Some(SandboxError::Timeout(_))) {
        return Err(SandboxError::Timeout(limits.timeout_ms));
    }
    if let Some(message) = &snapshot.error {
        return Err(SandboxError::Runtime(message.clone()));
    }
    if !snapshot.settled {
        return Err(SandboxError::Unsettled);
    }
    Ok(())
}

/// Run one call under `limits`. Never fails: faults are reported in the result.
#[instrument(skip_all, fields(function = %request.function_name))]
pub async fn execute(request: ExecutionRequest, limits: ExecutionLimits) -> ExecutionResult {
    let start = Instant::now();
    let timeout_ms = limits.timeout_ms;
    let deadline = Duration::from_millis(timeout_ms);
    let mut result = ExecutionResult::default();

    let permit = match tokio::time::timeout(deadline, SANDBOX_SLOTS.clone().acquire_owned()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(e)) => {
            SandboxError::Internal(e.to_string()).apply(&mut result);
            result.elapsed_ms = start.elapsed().as_millis() as u64;
            return result;
        }
        Err(_) => {
            warn!(timeout_ms, "No sandbox slot freed before the deadline");
            SandboxError::Timeout(timeout_ms).apply(&mut result);
            result.elapsed_ms = start.elapsed().as_millis() as u64;
            return result;
        }
    };
    let remaining = deadline.saturating_sub(start.elapsed());
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        run_in_context(&request, &limits)
    });

    match tokio::time::timeout(remaining, handle).await {
        Ok(Ok(Ok(snapshot))) => {
            result.call_count = snapshot.calls;
            if let Err(e) = outcome(&snapshot, &limits) {
                e.apply(&mut result);
            }
            if snapshot.has_value {
                result.value = Some(snapshot.value.clone().unwrap_or(Value::Null));
            }
            result.fallback = FallbackSources {
                result: snapshot.result,
                solution: snapshot.solution,
                captured: snapshot.captured,
                board: snapshot.board,
            };
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "Sandbox run failed");
            e.apply(&mut result);
        }
        Ok(Err(join_error)) => {
            warn!(error = %join_error, "Sandbox thread panicked");
            SandboxError::Internal(join_error.to_string()).apply(&mut result);
        }
        Err(_) => {
            // The thread keeps its slot until a deadline check or the loop limit stops it
            SandboxError::Timeout(timeout_ms).apply(&mut result);
        }
    }

    result.elapsed_ms = start.elapsed().as_millis() as u64;
    debug!(
        elapsed_ms = result.elapsed_ms,
        calls = result.call_count,
        failure = ?result.failure_kind(),
        "Sandbox run finished"
    );
    result
}
