//! Mutable per-invocation state threaded through a workflow run: the
//! variable table, tool-call budget, cancellation token, and recursion
//! depth counter described in spec's "Run context" data model.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// One scope in the run-context chain. Reads walk up through `parent`;
/// writes always land in the local `vars` table, so a nested workflow call,
/// loop iteration, or parallel branch can never clobber a sibling's or
/// parent's binding.
pub struct RunContext {
    parent: Option<Arc<RunContext>>,
    vars: Mutex<HashMap<String, Value>>,
    input: Value,
    env: HashMap<String, String>,
    tool_budget: AtomicI64,
    cancellation: CancellationToken,
    depth: u32,
    recursion_calls: Arc<AtomicU32>,
}

impl RunContext {
    /// Builds the root scope for a top-level workflow invocation.
    pub fn root(
        input: Value,
        env: HashMap<String, String>,
        cancellation: CancellationToken,
        tool_call_budget: u32,
        depth: u32,
    ) -> Self {
        Self {
            parent: None,
            vars: Mutex::new(HashMap::new()),
            input,
            env,
            tool_budget: AtomicI64::new(tool_call_budget as i64),
            cancellation,
            depth,
            recursion_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Builds a child scope (nested template call, loop iteration, or
    /// parallel branch) whose reads fall through to `self`.
    pub fn child(self: &Arc<Self>, input: Value, env: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(self.clone()),
            vars: Mutex::new(HashMap::new()),
            input,
            env,
            tool_budget: AtomicI64::new(self.tool_budget.load(Ordering::Relaxed)),
            cancellation: self.cancellation.clone(),
            depth: self.depth + 1,
            recursion_calls: self.recursion_calls.clone(),
        })
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// This scope's bound `input`, for building a child scope that should
    /// see the same input rather than a narrower per-iteration one.
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// This scope's declared `env` map, for threading into a child scope
    /// (reads of `env` never fall through to `parent`, unlike every other
    /// name, so a child must be given its own copy to see it at all).
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Binds `name` to `value` in this scope only.
    pub fn set(&self, name: &str, value: Value) {
        self.vars.lock().expect("run context vars mutex poisoned").insert(name.to_string(), value);
    }

    /// Resolves a root identifier: `input`, `env` (the whole map), or a
    /// step/loop name bound in this scope or an ancestor.
    pub fn resolve_root(&self, name: &str) -> Option<Value> {
        match name {
            "input" => Some(self.input.clone()),
            "env" => Some(serde_json::to_value(&self.env).unwrap_or(Value::Null)),
            _ => {
                if let Some(v) = self.vars.lock().expect("run context vars mutex poisoned").get(name).cloned() {
                    return Some(v);
                }
                self.parent.as_ref().and_then(|p| p.resolve_root(name))
            }
        }
    }

    /// Attempts to spend one unit of the shared tool-call budget. Returns
    /// `false` once exhausted; callers must then stop exposing tools to the
    /// model rather than letting it request another `tool_use`.
    pub fn try_spend_tool_call(&self) -> bool {
        let remaining = self.tool_budget.fetch_sub(1, Ordering::SeqCst);
        if remaining > 0 {
            true
        } else {
            self.tool_budget.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    /// Increments the shared recursion counter for a nested `template` step
    /// invocation, returning the depth reached.
    pub fn enter_nested_call(&self) -> u32 {
        self.recursion_calls.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn child_reads_through_but_writes_stay_local() {
        let root = Arc::new(RunContext::root(json!(null), HashMap::new(), CancellationToken::new(), 5, 0));
        root.set("draft", json!("parent value"));
        let child = root.child(json!(null), HashMap::new());

        assert_eq!(child.resolve_root("draft"), Some(json!("parent value")));

        child.set("draft", json!("child value"));
        assert_eq!(child.resolve_root("draft"), Some(json!("child value")));
        assert_eq!(root.resolve_root("draft"), Some(json!("parent value")));
    }

    #[test]
    fn tool_budget_refuses_once_exhausted() {
        let ctx = RunContext::root(json!(null), HashMap::new(), CancellationToken::new(), 1, 0);
        assert!(ctx.try_spend_tool_call());
        assert!(!ctx.try_spend_tool_call());
    }
}
