//! End-to-end runs of [`WorkflowRuntime`] over in-memory registries and a
//! stub provider, covering prompt/template/for_each/consensus step
//! semantics without touching any real vendor API or container runtime.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use conduit_core::{GenerateRequest, GenerateResponse, Output, StreamEvent};
use conduit_interface::{Provider, ProviderResult};
use conduit_mcp_client::DownstreamClient;
use conduit_rate_limit::RetryPolicy;
use conduit_sandbox::{Sandbox, SandboxConfig, SkillRegistry};
use conduit_workflow::{ProviderRegistry, Workflow, WorkflowRegistry, WorkflowRuntime};

/// Always answers with the same canned text, echoing the last user message
/// into it so a test can assert the prompt was actually rendered.
struct EchoingStubProvider {
    id: &'static str,
    reply: fn(&str) -> String,
}

#[async_trait]
impl Provider for EchoingStubProvider {
    fn id(&self) -> &str {
        self.id
    }
    fn model(&self) -> &str {
        "stub"
    }
    async fn generate(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        let last_text = request
            .messages
            .last()
            .and_then(|m| m.content.first())
            .map(|input| format!("{input:?}"))
            .unwrap_or_default();
        Ok(GenerateResponse { outputs: vec![Output::Text((self.reply)(&last_text))], stop_reason: None, usage: None })
    }
    async fn stream(&self, _request: GenerateRequest) -> ProviderResult<BoxStream<'static, ProviderResult<StreamEvent>>> {
        unimplemented!("streaming is not exercised by the workflow executor")
    }
}

fn stub_runtime(workflows: Vec<Workflow>, reply: fn(&str) -> String) -> WorkflowRuntime {
    let providers = ProviderRegistry::new(
        vec![Arc::new(EchoingStubProvider { id: "stub", reply }) as Arc<dyn Provider>],
        RetryPolicy::default(),
    );
    let registry = WorkflowRegistry::from_workflows(workflows);
    let downstream = DownstreamClient::new(Vec::new());
    let base = tempfile::tempdir().unwrap();
    let sandbox = Sandbox::new(
        SandboxConfig::new(base.path().join("base"), base.path().join("outputs"), base.path().join("skills")),
        SkillRegistry::from_descriptors(vec![]).unwrap(),
    );
    WorkflowRuntime::new(registry, providers, downstream, sandbox)
}

fn workflow_from_yaml(yaml: &str) -> Workflow {
    serde_yaml::from_str(yaml).unwrap()
}

#[tokio::test]
async fn a_single_prompt_step_interpolates_input_and_returns_its_text() {
    let workflow = workflow_from_yaml(
        r#"
name: summarize
execution:
  providers: [stub]
steps:
  - name: draft
    type: prompt
    run: "Summarize: {{input.text}}"
"#,
    );
    let runtime = stub_runtime(vec![workflow], |_| "a summary".to_string());

    let result = runtime.run("summarize", json!({"text": "hello world"}), CancellationToken::new()).await.unwrap();
    assert_eq!(result, json!("a summary"));
}

#[tokio::test]
async fn a_template_step_nests_a_child_workflow_with_bound_input() {
    let child = workflow_from_yaml(
        r#"
name: child
execution:
  providers: [stub]
steps:
  - name: reply
    type: prompt
    run: "Echo: {{input.greeting}}"
"#,
    );
    let parent = workflow_from_yaml(
        r#"
name: parent
execution:
  providers: [stub]
steps:
  - name: call_child
    type: template
    workflow: child
    with:
      greeting: "{{input.name}}"
"#,
    );
    let runtime = stub_runtime(vec![parent, child], |_| "echoed".to_string());

    let result = runtime.run("parent", json!({"name": "ada"}), CancellationToken::new()).await.unwrap();
    assert_eq!(result, json!("echoed"));
}

#[tokio::test]
async fn for_each_fans_out_and_aggregates_as_a_list() {
    let workflow = workflow_from_yaml(
        r#"
name: batch
execution:
  providers: [stub]
steps:
  - name: per_item
    type: prompt
    run: "Process: {{input}}"
    for_each: "{{input.items}}"
    aggregate: list
"#,
    );
    let runtime = stub_runtime(vec![workflow], |_| "processed".to_string());

    let result = runtime.run("batch", json!({"items": [1, 2, 3]}), CancellationToken::new()).await.unwrap();
    assert_eq!(result, json!(["processed", "processed", "processed"]));
}

#[tokio::test]
async fn consensus_step_requires_unanimous_agreement_to_resolve() {
    let workflow = workflow_from_yaml(
        r#"
name: vote
execution:
  providers: [stub]
steps:
  - name: ask
    type: consensus
    run: "Is the sky blue?"
    n: 3
    require: unanimous
"#,
    );
    let runtime = stub_runtime(vec![workflow], |_| "yes".to_string());

    let result = runtime.run("vote", json!({}), CancellationToken::new()).await.unwrap();
    assert_eq!(result, json!("yes"));
}

#[tokio::test]
async fn a_failing_step_cancels_the_run_unless_on_failure_is_continue() {
    let workflow = workflow_from_yaml(
        r#"
name: broken
execution:
  providers: [missing_provider]
steps:
  - name: will_fail
    type: prompt
    run: "hi"
"#,
    );
    let runtime = stub_runtime(vec![workflow], |_| "unused".to_string());

    let result = runtime.run("broken", json!({}), CancellationToken::new()).await;
    assert!(result.is_err(), "an undefined provider id must fail the step");
}

#[tokio::test]
async fn unresolved_template_reference_fails_the_run() {
    let workflow = workflow_from_yaml(
        r#"
name: dangling
steps:
  - name: call_missing
    type: template
    workflow: does_not_exist
"#,
    );
    let runtime = stub_runtime(vec![workflow], |_| "unused".to_string());

    let result = runtime.run("dangling", json!({}), CancellationToken::new()).await;
    assert!(result.is_err());
}
