//! Builds a realistic configuration directory on disk and drives it through
//! [`conduit::config::load`] and workflow-tool construction exactly as
//! `conduit::serve::run` does, without actually accepting connections or
//! calling out to a vendor API.

use std::io::Write;

use conduit::config;
use conduit_mcp_client::DownstreamClient;
use conduit_workflow::{build_workflow_tools, WorkflowRuntime};

fn write(path: &std::path::Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn sample_config_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        &root.join("workflows/summarize.yaml"),
        r#"
name: summarize
description: Summarizes the given text.
input_schema:
  type: object
  properties:
    text:
      type: string
  required: [text]
execution:
  providers: [local]
steps:
  - name: draft
    type: prompt
    run: "Summarize: {{input.text}}"
"#,
    );

    write(
        &root.join("providers/local.yaml"),
        "id: local\nkind: ollama\nmodel: llama3\n",
    );

    write(&root.join("settings.yaml"), "skills:\n  outputs_dir: ./outputs\n");

    dir
}

#[test]
fn loading_a_config_directory_yields_the_workflows_it_declares() {
    let dir = sample_config_dir();
    let loaded = config::load(dir.path(), 3).unwrap();

    assert_eq!(loaded.workflows.names().collect::<Vec<_>>(), vec!["summarize"]);
    assert!(loaded.providers.get("local").is_some());
    assert!(loaded.servers.is_empty());
}

#[test]
fn a_loaded_config_builds_one_mcp_tool_per_workflow_with_its_declared_schema() {
    let dir = sample_config_dir();
    let loaded = config::load(dir.path(), 3).unwrap();

    let downstream = DownstreamClient::new(loaded.servers);
    let runtime = WorkflowRuntime::new(loaded.workflows, loaded.providers, downstream, loaded.sandbox);
    let tools = build_workflow_tools(&runtime);

    assert_eq!(tools.len(), 1);
    let tool = &tools[0];
    assert_eq!(tool.name(), "summarize");
    assert_eq!(tool.description(), "Summarizes the given text.");
    assert_eq!(
        tool.input_schema(),
        serde_json::json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"],
        })
    );
}

#[test]
fn a_bare_workflows_only_directory_loads_with_empty_providers_and_servers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("workflows")).unwrap();

    let loaded = config::load(dir.path(), 3).unwrap();
    assert!(loaded.workflows.names().next().is_none());
    assert!(loaded.providers.get("anything").is_none());
    assert!(loaded.servers.is_empty());
}

#[test]
fn a_missing_workflows_directory_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let result = config::load(dir.path(), 3);
    assert!(result.is_err());
}
