//! Configuration discovery and loading (spec §6 "Configuration layout").
//!
//! Everything conduit reads at startup lives under one config directory:
//!
//! ```text
//! <config-dir>/
//!   workflows/*.yaml        -- WorkflowRegistry
//!   providers/*.yaml        -- ProviderRegistry
//!   servers/*.yaml          -- downstream MCP server connections
//!   skills/skill-images.yaml -- SkillRegistry
//!   skills/<name>/SKILL.md  -- descriptive front matter (optional)
//!   settings.yaml           -- skills.outputs_dir and other process settings
//! ```

mod env_interp;
mod providers;
mod servers;
mod settings;
mod skill_docs;

pub use providers::load_provider_registry;
pub use servers::load_server_configs;
pub use settings::Settings;
pub use skill_docs::{load_skill_docs, SkillDoc};

use std::path::{Path, PathBuf};

use conduit_error::ConfigError;
use conduit_sandbox::{Sandbox, SandboxConfig, SkillRegistry};
use conduit_workflow::WorkflowRegistry;

/// Everything loaded from one config directory, ready to build a
/// [`conduit_workflow::WorkflowRuntime`] from.
pub struct LoadedConfig {
    pub workflows: WorkflowRegistry,
    pub providers: conduit_workflow::ProviderRegistry,
    pub servers: Vec<conduit_mcp_client::DownstreamServerConfig>,
    pub sandbox: Sandbox,
}

/// Loads every configuration source rooted at `dir`. A workflow directory
/// is required to exist (there is nothing to serve without it); every
/// other source tolerates a missing directory/file and degrades to empty.
pub fn load(dir: &Path, retry_attempts: u32) -> Result<LoadedConfig, ConfigError> {
    let workflows_dir = dir.join("workflows");
    let workflows = WorkflowRegistry::load_dir(&workflows_dir)
        .map_err(|e| ConfigError::new(format!("loading workflows from {}: {e}", workflows_dir.display())))?;

    let providers = load_provider_registry(dir.join("providers"), retry_attempts)?;
    let servers = load_server_configs(dir.join("servers"))?;
    let settings = Settings::load(dir)?;

    let skills_dir = dir.join("skills");
    let skill_images = skills_dir.join("skill-images.yaml");
    let skill_registry = if skill_images.is_file() {
        SkillRegistry::load_file(&skill_images)
            .map_err(|e| ConfigError::new(format!("loading {}: {e}", skill_images.display())))?
    } else {
        SkillRegistry::default()
    };

    let sandbox_base = std::env::temp_dir().join("conduit-sandbox");
    let sandbox_config = SandboxConfig::new(sandbox_base, settings.skills_outputs_dir, skills_dir);
    let sandbox = Sandbox::new(sandbox_config, skill_registry);

    Ok(LoadedConfig { workflows, providers, servers, sandbox })
}

/// Appends the platform's standard system directories to `PATH` if they're
/// missing, so a container runtime invoked by the skill sandbox can be
/// found even when conduit was launched by a minimal-environment parent
/// (spec §6 "Process environment" — an external OS contract, not internal
/// plumbing, which is why it's handled once here rather than by whichever
/// crate happens to shell out first).
pub fn augment_path() {
    const STANDARD_DIRS: &[&str] = &["/usr/local/sbin", "/usr/local/bin", "/usr/sbin", "/usr/bin", "/sbin", "/bin"];

    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut paths: Vec<PathBuf> = std::env::split_paths(&current).collect();
    let mut changed = false;
    for dir in STANDARD_DIRS {
        let candidate = PathBuf::from(dir);
        if !paths.iter().any(|p| p == &candidate) {
            paths.push(candidate);
            changed = true;
        }
    }
    if changed {
        if let Ok(joined) = std::env::join_paths(paths) {
            std::env::set_var("PATH", joined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augment_path_adds_missing_standard_dirs() {
        std::env::set_var("PATH", "/opt/custom/bin");
        augment_path();
        let joined = std::env::var("PATH").unwrap();
        assert!(joined.split(':').any(|p| p == "/usr/bin"));
        assert!(joined.split(':').any(|p| p == "/opt/custom/bin"));
    }

    #[test]
    fn load_requires_a_workflows_directory_with_valid_workflows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("workflows")).unwrap();
        let loaded = load(dir.path(), 3).unwrap();
        assert!(loaded.workflows.names().next().is_none());
    }
}
