//! One sandbox invocation end to end (spec.md §3 "Sandbox invocation",
//! §4.I): workspace materialization, argv build, container launch, output
//! capture, and unconditional workspace cleanup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use conduit_error::{SandboxError, SandboxErrorKind};
use tracing::instrument;

use crate::container::{self, DEFAULT_OUTPUT_CAP_BYTES};
use crate::descriptor::SkillRegistry;
use crate::workspace::Workspace;

/// Host-side configuration the sandbox needs regardless of which skill is
/// invoked: where scratch workspaces live, where the shared persistent
/// outputs directory is, and where skill source directories live
/// (`settings.yaml`'s `skills.outputs_dir` plus the `skills/` tree).
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub base_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub skills_dir: PathBuf,
    pub output_cap_bytes: usize,
}

impl SandboxConfig {
    pub fn new(base_dir: PathBuf, outputs_dir: PathBuf, skills_dir: PathBuf) -> Self {
        Self { base_dir, outputs_dir, skills_dir, output_cap_bytes: DEFAULT_OUTPUT_CAP_BYTES }
    }
}

/// A requested skill execution, matching a workflow `skill` step.
#[derive(Debug, Clone)]
pub struct SkillInvocation {
    pub skill: String,
    pub language: Option<String>,
    pub code: String,
    /// Relative path -> content, materialized under the workspace root
    /// before the container starts.
    pub files: HashMap<String, String>,
}

/// What a skill invocation produced.
#[derive(Debug, Clone)]
pub struct SkillOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration: Duration,
}

impl SkillOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// The container-mediated code executor (spec component I). Cheaply
/// cloneable; one instance is shared by every concurrent skill step
/// across every workflow run.
#[derive(Clone)]
pub struct Sandbox {
    config: SandboxConfig,
    registry: SkillRegistry,
}

impl Sandbox {
    pub fn new(config: SandboxConfig, registry: SkillRegistry) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Runs one skill invocation to completion. The workspace is removed
    /// unconditionally before this returns — success, non-zero exit, or
    /// timeout all take the same cleanup path. The outputs directory is
    /// created if absent but is never removed: files a skill writes under
    /// it persist on the host after the call returns.
    #[instrument(skip(self, invocation), fields(skill = %invocation.skill))]
    pub async fn execute(&self, invocation: SkillInvocation) -> Result<SkillOutcome, SandboxError> {
        let descriptor = self.registry.get(&invocation.skill)?;
        let language = descriptor.resolve_language(invocation.language.as_deref())?;

        std::fs::create_dir_all(&self.config.outputs_dir).map_err(|e| {
            SandboxError::new(SandboxErrorKind::WorkspaceSetup(format!(
                "creating outputs dir {}: {e}",
                self.config.outputs_dir.display()
            )))
        })?;

        let workspace = Workspace::create(&self.config.base_dir, &language, &invocation.code, &invocation.files)?;
        let entry_file = workspace.entry_file(&language);
        let skill_dir = self.config.skills_dir.join(&invocation.skill);

        let runtime = container::container_runtime();
        let result = match runtime {
            Ok(runtime) => {
                let argv = container::build_argv(
                    descriptor,
                    workspace.path(),
                    &self.config.outputs_dir,
                    &skill_dir,
                    &language,
                    &entry_file,
                    &invocation.skill,
                );
                container::run(
                    runtime,
                    argv,
                    Duration::from_secs(descriptor.timeout_secs),
                    self.config.output_cap_bytes,
                    &invocation.skill,
                )
                .await
            }
            Err(e) => Err(e),
        };

        // The workspace is removed on every path, including the one where
        // we never managed to launch a container at all.
        workspace.remove();

        let outcome = result?;
        Ok(SkillOutcome {
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            stdout_truncated: outcome.stdout_truncated,
            stderr_truncated: outcome.stderr_truncated,
            duration: outcome.duration,
        })
    }
}
