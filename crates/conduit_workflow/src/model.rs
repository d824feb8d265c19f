//! The static workflow definition: `Workflow`, `Step`, `Loop`, and their
//! supporting config types. Deserialized directly from the YAML documents
//! the registry loads from `workflows/*.yaml`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Matches a workflow/step `name`: lowercase, digits, underscore, hyphen.
pub const NAME_PATTERN: &str = "^[a-z0-9_-]+$";

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(format!("'{name}' does not match {NAME_PATTERN}"))
    }
}

/// Execution defaults, set at the workflow level and overridable per step.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExecutionDefaults {
    /// Provider ids tried in order (failover chain).
    #[serde(default)]
    pub providers: Vec<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Downstream MCP servers whose tools prompt steps may call.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Sandboxed skills steps in this workflow may invoke.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Per-run budget of downstream tool invocations across all prompt steps.
    #[serde(default = "default_tool_call_budget")]
    pub tool_call_budget: u32,
}

fn default_tool_call_budget() -> u32 {
    25
}

/// What happens to the rest of the DAG when a step/loop fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    #[default]
    Stop,
    Continue,
}

/// How a parallel fan-out's per-item outputs combine into one step output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    #[default]
    List,
    Merge,
    First,
    Last,
}

/// Agreement rule a consensus step aggregates its N executions under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusRequire {
    Unanimous,
    Majority,
    Any,
}

/// The capability-specific body of a step.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// One LLM call, optionally exposing downstream tools and looping on
    /// `tool_use` until the model reaches a natural end-of-turn.
    Prompt {
        run: String,
        #[serde(default)]
        servers: Vec<String>,
        #[serde(default)]
        providers: Vec<String>,
        model: Option<String>,
        temperature: Option<f32>,
    },
    /// N parallel executions of the same prompt, aggregated by `require`.
    Consensus {
        run: String,
        n: u32,
        require: ConsensusRequire,
        #[serde(default)]
        providers: Vec<String>,
        model: Option<String>,
        temperature: Option<f32>,
    },
    /// Invoke a nested workflow with `with:` bindings evaluated against the
    /// current scope.
    Template {
        workflow: String,
        #[serde(default)]
        with: HashMap<String, String>,
    },
    /// Direct call to a downstream MCP tool.
    Tool {
        server: String,
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    /// Code execution inside the skill sandbox.
    Skill {
        skill: String,
        language: Option<String>,
        code: String,
        #[serde(default)]
        files: HashMap<String, String>,
    },
}

/// A unit of work in a workflow.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    pub name: String,
    /// Prior step/loop names this one depends on. Implicit dependencies are
    /// additionally inferred from `{{var}}` references at DAG build time.
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub on_failure: OnFailure,
    /// Overrides `execution.tool_call_budget` for this step's prompt turns.
    pub max_iterations: Option<u32>,
    #[serde(flatten)]
    pub kind: StepKind,
    /// When set, the step body runs once per element of the array this
    /// expression resolves to, fanned out concurrently.
    pub for_each: Option<String>,
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub aggregate: Aggregate,
}

/// A step-group repeated until a semantic exit condition is met.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Loop {
    pub name: String,
    #[serde(default)]
    pub needs: Vec<String>,
    pub workflow: String,
    #[serde(default)]
    pub with: HashMap<String, String>,
    pub max_iterations: u32,
    pub until: String,
    #[serde(default)]
    pub on_failure: OnFailure,
    /// Provider id the `until` evaluator uses; defaults to the workflow's
    /// execution provider chain when unset.
    pub evaluator: Option<String>,
}

/// The static workflow definition loaded from one YAML document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub execution: ExecutionDefaults,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// JSON Schema describing this workflow's `input`, surfaced verbatim as
    /// the wrapping MCP tool's `inputSchema`.
    #[serde(default)]
    pub input_schema: Option<Value>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub loops: Vec<Loop>,
    /// Named output expressions evaluated against the final run context.
    /// When absent, the workflow's result is the last step/loop's output.
    #[serde(default)]
    pub outputs: Option<HashMap<String, String>>,
}

impl Workflow {
    /// Validates the invariants `serde` itself can't express: name shape,
    /// non-empty step list, and that every `needs` reference resolves to a
    /// node defined earlier in this same workflow.
    pub fn validate_shape(&self) -> Result<(), String> {
        validate_name(&self.name)?;
        if self.steps.is_empty() && self.loops.is_empty() {
            return Err("workflow defines no steps".to_string());
        }

        let mut known = std::collections::HashSet::new();
        for step in &self.steps {
            for need in &step.needs {
                if !known.contains(need) {
                    return Err(format!(
                        "step '{}' needs '{}', which is not defined earlier in the workflow",
                        step.name, need
                    ));
                }
            }
            known.insert(step.name.clone());
        }
        for l in &self.loops {
            for need in &l.needs {
                if !known.contains(need) {
                    return Err(format!(
                        "loop '{}' needs '{}', which is not defined earlier in the workflow",
                        l.name, need
                    ));
                }
            }
            known.insert(l.name.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_names() {
        assert!(validate_name("My Workflow").is_err());
        assert!(validate_name("my-workflow_1").is_ok());
    }

    #[test]
    fn parses_a_minimal_workflow() {
        let yaml = r#"
name: summarize
steps:
  - name: draft
    type: prompt
    run: "Summarize: {{input.text}}"
"#;
        let workflow: Workflow = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(workflow.steps.len(), 1);
        assert!(workflow.validate_shape().is_ok());
    }

    #[test]
    fn rejects_needs_referencing_a_later_step() {
        let yaml = r#"
name: bad
steps:
  - name: a
    type: prompt
    run: "{{b}}"
    needs: [b]
  - name: b
    type: prompt
    run: "hi"
"#;
        let workflow: Workflow = serde_yaml::from_str(yaml).unwrap();
        assert!(workflow.validate_shape().is_err());
    }
}
