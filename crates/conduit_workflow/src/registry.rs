//! Loads every `*.yaml`/`*.yml` document under a directory tree at startup
//! and indexes the resulting [`Workflow`]s by name.

use std::collections::HashMap;
use std::path::Path;

use conduit_error::{WorkflowError, WorkflowErrorKind};
use tracing::{debug, instrument};

use crate::model::Workflow;

/// All workflows known to this process, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Workflow>,
}

impl WorkflowRegistry {
    /// Walks `dir` recursively, parsing every `.yaml`/`.yml` file as a
    /// [`Workflow`]. A file that fails to parse aborts the whole load: a
    /// registry with only some of its intended workflows would silently
    /// misroute `template` steps at runtime.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, WorkflowError> {
        let dir = dir.as_ref();
        let mut workflows = HashMap::new();
        let mut paths = Vec::new();
        collect_yaml_files(dir, &mut paths)?;

        for path in paths {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| WorkflowError::new(WorkflowErrorKind::FileRead(format!("{}: {e}", path.display()))))?;
            let workflow: Workflow = serde_yaml::from_str(&content)
                .map_err(|e| WorkflowError::new(WorkflowErrorKind::YamlParse(format!("{}: {e}", path.display()))))?;
            workflow
                .validate_shape()
                .map_err(|e| WorkflowError::new(WorkflowErrorKind::YamlParse(format!("{}: {e}", path.display()))))?;
            crate::dag::build_plan(&workflow)?;

            debug!(name = %workflow.name, path = %path.display(), "loaded workflow");
            if let Some(existing) = workflows.insert(workflow.name.clone(), workflow) {
                return Err(WorkflowError::new(WorkflowErrorKind::YamlParse(format!(
                    "duplicate workflow name '{}' ({})",
                    existing.name,
                    path.display()
                ))));
            }
        }

        Ok(Self { workflows })
    }

    /// Builds a registry from an in-memory set, bypassing the filesystem.
    /// Used by tests and by a `template` step's own nested-workflow lookups
    /// when the caller already holds a loaded registry.
    pub fn from_workflows(workflows: Vec<Workflow>) -> Self {
        Self { workflows: workflows.into_iter().map(|w| (w.name.clone(), w)).collect() }
    }

    pub fn get(&self, name: &str) -> Option<&Workflow> {
        self.workflows.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<(), WorkflowError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| WorkflowError::new(WorkflowErrorKind::FileRead(format!("{}: {e}", dir.display()))))?;
    for entry in entries {
        let entry = entry
            .map_err(|e| WorkflowError::new(WorkflowErrorKind::FileRead(format!("{}: {e}", dir.display()))))?;
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")) {
            out.push(path);
        }
    }
    out.sort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_indexes_workflows_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("summarize.yaml")).unwrap();
        write!(
            file,
            r#"
name: summarize
steps:
  - name: draft
    type: prompt
    run: "Summarize: {{{{input.text}}}}"
"#
        )
        .unwrap();

        let registry = WorkflowRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("summarize").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn rejects_duplicate_workflow_names_across_files() {
        let dir = tempfile::tempdir().unwrap();
        for fname in ["a.yaml", "b.yaml"] {
            let mut file = std::fs::File::create(dir.path().join(fname)).unwrap();
            write!(
                file,
                r#"
name: dup
steps:
  - name: draft
    type: prompt
    run: "hi"
"#
            )
            .unwrap();
        }
        assert!(WorkflowRegistry::load_dir(dir.path()).is_err());
    }

    #[test]
    fn recurses_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let mut file = std::fs::File::create(dir.path().join("nested/inner.yaml")).unwrap();
        write!(
            file,
            r#"
name: inner
steps:
  - name: draft
    type: prompt
    run: "hi"
"#
        )
        .unwrap();

        let registry = WorkflowRegistry::load_dir(dir.path()).unwrap();
        assert!(registry.get("inner").is_some());
    }
}
