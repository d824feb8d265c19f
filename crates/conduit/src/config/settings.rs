//! `settings.yaml` (spec §6): process-wide settings that aren't specific
//! to any one provider, server, or skill. Currently just the sandbox's
//! shared, host-persistent outputs directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use conduit_error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
struct SkillsSettings {
    outputs_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
struct SettingsDoc {
    skills: SkillsSettings,
}

/// Process-wide settings loaded from `settings.yaml`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub skills_outputs_dir: PathBuf,
}

impl Settings {
    /// Loads `dir/settings.yaml`. When absent, falls back to `dir/outputs`
    /// so a bare config tree (just `workflows/`) still works for
    /// workflows with no skill steps.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let path = dir.join("settings.yaml");
        if !path.exists() {
            return Ok(Self { skills_outputs_dir: dir.join("outputs") });
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::new(format!("{}: {e}", path.display())))?;
        let doc: SettingsDoc = serde_yaml::from_str(&content).map_err(|e| ConfigError::new(format!("{}: {e}", path.display())))?;
        Ok(Self { skills_outputs_dir: doc.skills.outputs_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_when_settings_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.skills_outputs_dir, dir.path().join("outputs"));
    }

    #[test]
    fn reads_outputs_dir_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.yaml"), "skills:\n  outputs_dir: /var/lib/conduit/outputs\n").unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.skills_outputs_dir, PathBuf::from("/var/lib/conduit/outputs"));
    }
}
