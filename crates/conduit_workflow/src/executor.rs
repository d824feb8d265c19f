//! Walks an [`ExecutionPlan`] and actually runs each step/loop, wiring
//! together the provider chain, the downstream MCP client, and the skill
//! sandbox behind the five [`StepKind`] variants.
//!
//! A `template` step and a `loop`'s nested workflow both recurse back into
//! [`WorkflowRuntime::run_workflow`]; the recursion is broken with
//! `Box::pin` at each call site so the future doesn't need an infinite size.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use conduit_core::{GenerateRequest, Input, Message, Output, Role};
use conduit_error::{WorkflowError, WorkflowErrorKind};
use conduit_interface::ToolExecutor;
use conduit_mcp_client::DownstreamClient;
use conduit_sandbox::{Sandbox, SkillInvocation};

use crate::consensus;
use crate::context::RunContext;
use crate::dag::{build_plan, Node};
use crate::interpolate::{interpolate, interpolate_value};
use crate::model::{Aggregate, ConsensusRequire, Loop, OnFailure, Step, StepKind, Workflow};
use crate::providers::ProviderRegistry;
use crate::registry::WorkflowRegistry;

/// A nested `template` call or `loop` iteration may not recurse deeper than
/// this many scopes.
const MAX_RECURSION_DEPTH: u32 = 10;

/// Across one top-level run, no more than this many nested workflow
/// invocations total (template steps plus loop iterations), regardless of
/// how shallow any single chain of them is.
const MAX_NESTED_CALLS: u32 = 200;

/// A `prompt` step's agentic tool-calling loop runs at most this many turns
/// unless the step sets its own `max_iterations`.
const DEFAULT_PROMPT_MAX_ITERATIONS: u32 = 10;

/// Owns everything a workflow run needs to actually execute: the set of
/// loadable workflows (for `template` steps and top-level invocation), the
/// configured providers, the downstream MCP client, and the skill sandbox.
/// Cheaply cloneable so a parallel `for_each` fan-out can hand one copy to
/// each spawned task.
#[derive(Clone)]
pub struct WorkflowRuntime {
    workflows: WorkflowRegistry,
    providers: ProviderRegistry,
    downstream: DownstreamClient,
    sandbox: Sandbox,
}

impl WorkflowRuntime {
    pub fn new(
        workflows: WorkflowRegistry,
        providers: ProviderRegistry,
        downstream: DownstreamClient,
        sandbox: Sandbox,
    ) -> Self {
        Self { workflows, providers, downstream, sandbox }
    }

    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.workflows
    }

    /// Runs the named workflow as a fresh top-level invocation.
    #[instrument(skip(self, input, cancellation), fields(workflow = %name))]
    pub async fn run(
        &self,
        name: &str,
        input: Value,
        cancellation: CancellationToken,
    ) -> Result<Value, WorkflowError> {
        let workflow = self
            .workflows
            .get(name)
            .ok_or_else(|| WorkflowError::new(WorkflowErrorKind::UnresolvedTemplate(name.to_string())))?
            .clone();
        let ctx = Arc::new(RunContext::root(
            input,
            workflow.env.clone(),
            cancellation,
            workflow.execution.tool_call_budget,
            0,
        ));
        self.run_workflow(&workflow, &ctx).await
    }

    /// Executes every node of `workflow`'s plan in stable topological order,
    /// then resolves the run's final output.
    fn run_workflow<'a>(
        &'a self,
        workflow: &'a Workflow,
        ctx: &'a Arc<RunContext>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value, WorkflowError>> + Send + 'a>> {
        Box::pin(async move {
            let plan = build_plan(workflow)?;
            for node in plan.order.iter().copied() {
                if ctx.cancellation().is_cancelled() {
                    return Err(WorkflowError::new(WorkflowErrorKind::StepFailed {
                        step: node.name().to_string(),
                        message: "run was cancelled".to_string(),
                    }));
                }
                match node {
                    Node::Step(step) => self.execute_step(workflow, step, ctx).await?,
                    Node::Loop(l) => self.execute_loop(workflow, l, ctx).await?,
                }
            }

            match &workflow.outputs {
                Some(map) => {
                    let mut out = serde_json::Map::with_capacity(map.len());
                    for (key, expr) in map {
                        out.insert(key.clone(), interpolate(expr, ctx)?);
                    }
                    Ok(Value::Object(out))
                }
                None => match plan.order.last() {
                    Some(node) => Ok(ctx.resolve_root(node.name()).unwrap_or(Value::Null)),
                    None => Ok(Value::Null),
                },
            }
        })
    }

    #[instrument(skip(self, workflow, ctx), fields(step = %step.name))]
    async fn execute_step(
        &self,
        workflow: &Workflow,
        step: &Step,
        ctx: &Arc<RunContext>,
    ) -> Result<(), WorkflowError> {
        let result = if let Some(expr) = &step.for_each {
            let items = interpolate(expr, ctx)?;
            let items = items.as_array().cloned().ok_or_else(|| {
                WorkflowError::new(WorkflowErrorKind::StepFailed {
                    step: step.name.clone(),
                    message: format!("for_each expression '{expr}' did not resolve to an array"),
                })
            })?;
            self.run_for_each(workflow, step, items, ctx).await
        } else {
            self.run_step_kind(workflow, step, ctx).await
        };

        match result {
            Ok(value) => {
                ctx.set(&step.name, value);
                Ok(())
            }
            Err(e) if step.on_failure == OnFailure::Continue => {
                warn!(step = %step.name, error = %e, "step failed, continuing per on_failure: continue");
                ctx.set(&step.name, Value::Null);
                Ok(())
            }
            Err(e) => {
                ctx.cancellation().cancel();
                Err(e)
            }
        }
    }

    /// Runs `step`'s body once per element of `items`, capped at
    /// `max_concurrent` concurrent executions, and folds the per-item
    /// outputs together with `aggregate`.
    async fn run_for_each(
        &self,
        workflow: &Workflow,
        step: &Step,
        items: Vec<Value>,
        ctx: &Arc<RunContext>,
    ) -> Result<Value, WorkflowError> {
        let limit = step.max_concurrent.unwrap_or(items.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let semaphore = semaphore.clone();
            let child_ctx = ctx.child(item, ctx.env().clone());
            let runtime = self.clone();
            let workflow = workflow.clone();
            let step = step.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("for_each semaphore never closed");
                runtime.run_step_kind(&workflow, &step, &child_ctx).await
            }));
        }

        let mut values = Vec::with_capacity(handles.len());
        let mut first_err = None;
        for handle in handles {
            match handle.await.expect("for_each branch task panicked") {
                Ok(v) => values.push(v),
                Err(e) => {
                    if step.on_failure != OnFailure::Continue {
                        ctx.cancellation().cancel();
                    }
                    first_err.get_or_insert(e);
                    values.push(Value::Null);
                }
            }
        }

        if let Some(e) = first_err {
            if step.on_failure != OnFailure::Continue {
                return Err(e);
            }
        }

        aggregate_values(values, step.aggregate)
    }

    async fn run_step_kind(&self, workflow: &Workflow, step: &Step, ctx: &Arc<RunContext>) -> Result<Value, WorkflowError> {
        match &step.kind {
            StepKind::Prompt { run, servers, providers, model, temperature } => {
                self.run_prompt(workflow, step, run, servers, providers, model.as_deref(), *temperature, ctx).await
            }
            StepKind::Consensus { run, n, require, providers, model, temperature } => {
                self.run_consensus(workflow, step, run, *n, *require, providers, model.as_deref(), *temperature, ctx).await
            }
            StepKind::Template { workflow: name, with } => self.run_template(name, with, ctx).await,
            StepKind::Tool { server, tool, arguments } => self.run_tool(step, server, tool, arguments, ctx).await,
            StepKind::Skill { skill, language, code, files } => {
                self.run_skill(step, skill, language.as_deref(), code, files, ctx).await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_prompt(
        &self,
        workflow: &Workflow,
        step: &Step,
        run: &str,
        servers: &[String],
        providers: &[String],
        model: Option<&str>,
        temperature: Option<f32>,
        ctx: &Arc<RunContext>,
    ) -> Result<Value, WorkflowError> {
        let provider_ids: &[String] = if providers.is_empty() { workflow.execution.providers.as_slice() } else { providers };
        let chain = self.providers.chain(provider_ids)?;

        let scoped_servers: &[String] = if servers.is_empty() { workflow.execution.servers.as_slice() } else { servers };
        let executor = if scoped_servers.is_empty() {
            None
        } else {
            Some(self.downstream.scoped(scoped_servers).await.map_err(|e| {
                WorkflowError::new(WorkflowErrorKind::StepFailed { step: step.name.clone(), message: e.to_string() })
            })?)
        };

        let prompt_text = render_text(run, ctx)?;
        let mut messages = vec![Message { role: Role::User, content: vec![Input::Text(prompt_text)] }];

        let max_iterations = step.max_iterations.unwrap_or(DEFAULT_PROMPT_MAX_ITERATIONS);
        let mut budget_exhausted = false;

        for _ in 0..max_iterations.max(1) {
            let tools = match (&executor, budget_exhausted) {
                (Some(e), false) => e.tools().into_iter().map(to_tool_spec).collect(),
                _ => Vec::new(),
            };
            let request = GenerateRequest {
                messages: messages.clone(),
                temperature: temperature.or(workflow.execution.temperature),
                model: model.map(str::to_string).or_else(|| workflow.execution.model.clone()),
                tools,
                ..Default::default()
            };

            let response = chain.generate(&request, ctx.cancellation()).await.map_err(|e| {
                WorkflowError::new(WorkflowErrorKind::StepFailed { step: step.name.clone(), message: e.to_string() })
            })?;

            let tool_calls: Vec<_> = response
                .outputs
                .iter()
                .filter_map(|o| if let Output::ToolCalls(calls) = o { Some(calls.clone()) } else { None })
                .flatten()
                .collect();

            if tool_calls.is_empty() {
                return Ok(outputs_to_value(&response.outputs));
            }

            let Some(executor) = &executor else {
                // No scoped executor to satisfy the request; surface what the
                // model produced rather than looping forever on tool calls
                // nothing can answer.
                return Ok(outputs_to_value(&response.outputs));
            };

            let mut assistant_content = Vec::new();
            for output in &response.outputs {
                match output {
                    Output::Text(t) => assistant_content.push(Input::Text(t.clone())),
                    Output::ToolCalls(calls) => {
                        for call in calls {
                            assistant_content.push(Input::ToolUse {
                                id: call.id.clone(),
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
            messages.push(Message { role: Role::Assistant, content: assistant_content });

            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                if !ctx.try_spend_tool_call() {
                    budget_exhausted = true;
                    results.push(Input::ToolResult {
                        tool_call_id: call.id.clone(),
                        content: Value::String("tool call budget exhausted for this run".to_string()),
                        is_error: true,
                    });
                    continue;
                }
                let outcome = executor.call(&call.name, call.arguments.clone()).await;
                results.push(match outcome {
                    Ok(value) => Input::ToolResult { tool_call_id: call.id.clone(), content: value, is_error: false },
                    Err(e) => Input::ToolResult {
                        tool_call_id: call.id.clone(),
                        content: Value::String(e.to_string()),
                        is_error: true,
                    },
                });
            }
            messages.push(Message { role: Role::User, content: results });
        }

        Err(WorkflowError::new(WorkflowErrorKind::StepFailed {
            step: step.name.clone(),
            message: format!("prompt step exceeded {max_iterations} turns without reaching end_turn"),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_consensus(
        &self,
        workflow: &Workflow,
        step: &Step,
        run: &str,
        n: u32,
        require: ConsensusRequire,
        providers: &[String],
        model: Option<&str>,
        temperature: Option<f32>,
        ctx: &Arc<RunContext>,
    ) -> Result<Value, WorkflowError> {
        let provider_ids: &[String] = if providers.is_empty() { workflow.execution.providers.as_slice() } else { providers };
        let chain = self.providers.chain(provider_ids)?;
        let prompt_text = render_text(run, ctx)?;

        let mut votes = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let chain = chain.clone();
            let request = GenerateRequest {
                messages: vec![Message { role: Role::User, content: vec![Input::Text(prompt_text.clone())] }],
                temperature: temperature.or(workflow.execution.temperature),
                model: model.map(str::to_string).or_else(|| workflow.execution.model.clone()),
                ..Default::default()
            };
            let cancellation = ctx.cancellation().clone();
            votes.push(async move { chain.generate(&request, &cancellation).await });
        }

        let mut outputs = Vec::with_capacity(n as usize);
        for result in join_all(votes).await {
            let response = result.map_err(|e| {
                WorkflowError::new(WorkflowErrorKind::StepFailed { step: step.name.clone(), message: e.to_string() })
            })?;
            outputs.push(outputs_to_single_output(response.outputs));
        }

        let result = consensus::aggregate(outputs, require, &chain, ctx.cancellation()).await?;
        Ok(outputs_to_value(std::slice::from_ref(&result.value)))
    }

    async fn run_template(
        &self,
        workflow_name: &str,
        with: &HashMap<String, String>,
        ctx: &Arc<RunContext>,
    ) -> Result<Value, WorkflowError> {
        let workflow = self
            .workflows
            .get(workflow_name)
            .ok_or_else(|| WorkflowError::new(WorkflowErrorKind::UnresolvedTemplate(workflow_name.to_string())))?
            .clone();

        let mut input = serde_json::Map::with_capacity(with.len());
        for (key, expr) in with {
            input.insert(key.clone(), interpolate(expr, ctx)?);
        }
        let child_ctx = ctx.child(Value::Object(input), ctx.env().clone());
        check_recursion(&child_ctx)?;

        self.run_workflow(&workflow, &child_ctx).await
    }

    async fn run_tool(
        &self,
        step: &Step,
        server: &str,
        tool: &str,
        arguments: &Value,
        ctx: &Arc<RunContext>,
    ) -> Result<Value, WorkflowError> {
        let args = interpolate_value(arguments, ctx)?;
        self.downstream
            .call_tool(server, tool, args)
            .await
            .map_err(|e| WorkflowError::new(WorkflowErrorKind::StepFailed { step: step.name.clone(), message: e.to_string() }))
    }

    async fn run_skill(
        &self,
        step: &Step,
        skill: &str,
        language: Option<&str>,
        code: &str,
        files: &HashMap<String, String>,
        ctx: &Arc<RunContext>,
    ) -> Result<Value, WorkflowError> {
        let rendered_code = render_text(code, ctx)?;
        let mut rendered_files = HashMap::with_capacity(files.len());
        for (path, content) in files {
            rendered_files.insert(path.clone(), render_text(content, ctx)?);
        }

        let invocation = SkillInvocation {
            skill: skill.to_string(),
            language: language.map(str::to_string),
            code: rendered_code,
            files: rendered_files,
        };

        let outcome = self.sandbox.execute(invocation).await.map_err(|e| {
            WorkflowError::new(WorkflowErrorKind::StepFailed { step: step.name.clone(), message: e.to_string() })
        })?;

        Ok(serde_json::json!({
            "exit_code": outcome.exit_code,
            "stdout": outcome.stdout,
            "stderr": outcome.stderr,
            "stdout_truncated": outcome.stdout_truncated,
            "stderr_truncated": outcome.stderr_truncated,
            "succeeded": outcome.succeeded(),
        }))
    }

    #[instrument(skip(self, workflow, l, ctx), fields(loop_name = %l.name))]
    async fn execute_loop(&self, workflow: &Workflow, l: &Loop, ctx: &Arc<RunContext>) -> Result<(), WorkflowError> {
        let nested = self
            .workflows
            .get(&l.workflow)
            .ok_or_else(|| WorkflowError::new(WorkflowErrorKind::UnresolvedTemplate(l.workflow.clone())))?
            .clone();

        let evaluator_ids = match &l.evaluator {
            Some(id) => std::slice::from_ref(id),
            None => workflow.execution.providers.as_slice(),
        };
        let evaluator = self.providers.chain(evaluator_ids)?;

        let mut history: Vec<Value> = Vec::new();
        let mut last_output = Value::Null;

        for iteration in 0..l.max_iterations {
            let mut input = serde_json::Map::with_capacity(l.with.len());
            for (key, expr) in &l.with {
                input.insert(key.clone(), interpolate(expr, ctx)?);
            }
            let child_ctx = ctx.child(Value::Object(input), ctx.env().clone());
            child_ctx.set(
                "loop",
                serde_json::json!({
                    "iteration": iteration + 1,
                    "last": { "output": last_output },
                    "history": history,
                }),
            );
            check_recursion(&child_ctx)?;

            last_output = self.run_workflow(&nested, &child_ctx).await?;
            history.push(last_output.clone());

            let candidate = match &last_output {
                Value::String(s) => s.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            };
            if consensus::evaluate_until(&l.until, &candidate, &evaluator, ctx.cancellation()).await? {
                ctx.set(&l.name, last_output);
                return Ok(());
            }
        }

        match l.on_failure {
            OnFailure::Continue => {
                ctx.set(&l.name, last_output);
                Ok(())
            }
            OnFailure::Stop => Err(WorkflowError::new(WorkflowErrorKind::LoopExhausted {
                step: l.name.clone(),
                iterations: l.max_iterations,
            })),
        }
    }
}

/// Checks and records one nested-invocation step (a `template` step or one
/// loop iteration) against the two recursion guards: per-chain depth and
/// total nested-call count across the whole run.
fn check_recursion(child_ctx: &Arc<RunContext>) -> Result<(), WorkflowError> {
    if child_ctx.depth() > MAX_RECURSION_DEPTH {
        return Err(WorkflowError::new(WorkflowErrorKind::RecursionLimitExceeded(MAX_RECURSION_DEPTH)));
    }
    if child_ctx.enter_nested_call() > MAX_NESTED_CALLS {
        return Err(WorkflowError::new(WorkflowErrorKind::RecursionLimitExceeded(MAX_NESTED_CALLS)));
    }
    Ok(())
}

fn render_text(expr: &str, ctx: &RunContext) -> Result<String, WorkflowError> {
    match interpolate(expr, ctx)? {
        Value::String(s) => Ok(s),
        other => Ok(serde_json::to_string(&other).unwrap_or_default()),
    }
}

fn to_tool_spec(descriptor: conduit_interface::ToolDescriptor) -> conduit_core::ToolSpec {
    conduit_core::ToolSpec {
        name: descriptor.name,
        description: descriptor.description,
        input_schema: descriptor.input_schema,
    }
}

/// Collapses one response's outputs into the single [`Output`] a consensus
/// vote is judged on: the first `Text`/`Json` output, or the whole vector
/// re-wrapped as `Json` when no single output stands for it.
fn outputs_to_single_output(outputs: Vec<Output>) -> Output {
    outputs
        .iter()
        .find(|o| matches!(o, Output::Text(_) | Output::Json(_)))
        .cloned()
        .unwrap_or_else(|| Output::Json(serde_json::to_value(&outputs).unwrap_or(Value::Null)))
}

/// Renders a step's final outputs as the `Value` bound to its name in the
/// run context: a `Json` output wins outright, otherwise every `Text`
/// output is joined, otherwise the raw output list is serialized.
fn outputs_to_value(outputs: &[Output]) -> Value {
    if let Some(Output::Json(v)) = outputs.iter().find(|o| matches!(o, Output::Json(_))) {
        return v.clone();
    }
    let texts: Vec<&str> = outputs.iter().filter_map(|o| if let Output::Text(t) = o { Some(t.as_str()) } else { None }).collect();
    if !texts.is_empty() {
        return Value::String(texts.join("\n"));
    }
    serde_json::to_value(outputs).unwrap_or(Value::Null)
}

/// Folds a `for_each` fan-out's ordered per-item values under `rule`.
fn aggregate_values(values: Vec<Value>, rule: Aggregate) -> Result<Value, WorkflowError> {
    Ok(match rule {
        Aggregate::List => Value::Array(values),
        Aggregate::First => values.into_iter().next().unwrap_or(Value::Null),
        Aggregate::Last => values.into_iter().next_back().unwrap_or(Value::Null),
        Aggregate::Merge => {
            let mut merged = serde_json::Map::new();
            for value in values {
                if let Value::Object(map) = value {
                    merged.extend(map);
                }
            }
            Value::Object(merged)
        }
    })
}
