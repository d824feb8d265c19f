//! Skill registry entries (spec.md §3 "Skill descriptor"): the container
//! image, resource limits, and mount policy for one named skill, loaded
//! from `skills/skill-images.yaml`.

use std::collections::HashMap;
use std::path::Path;

use conduit_error::{SandboxError, SandboxErrorKind};
use serde::Deserialize;

/// How the container's network is configured. `Bridge`/`Host` require a
/// non-empty `network_justification` on the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    #[default]
    None,
    Bridge,
    Host,
}

fn default_memory() -> String {
    "512m".to_string()
}

fn default_cpus() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    30
}

/// One entry in the skill-images catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_cpus")]
    pub cpus: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub network_mode: NetworkMode,
    #[serde(default)]
    pub network_justification: Option<String>,
    /// Extra `host_path -> container_path` bind mounts beyond the standard
    /// workspace/outputs/skill mounts.
    #[serde(default)]
    pub extra_mounts: HashMap<String, String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Override for the per-skill subdirectory name under the host's
    /// shared outputs root; defaults to the skill name.
    #[serde(default)]
    pub outputs_dir: Option<String>,
}

impl SkillDescriptor {
    /// Enforces the two descriptor invariants serde can't express:
    /// `language`/`languages` are mutually exclusive, and a non-default
    /// network mode must carry a justification.
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.language.is_some() && self.languages.is_some() {
            return Err(SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!(
                "skill '{}' sets both 'language' and 'languages'",
                self.name
            ))));
        }
        if matches!(self.network_mode, NetworkMode::Bridge | NetworkMode::Host)
            && self.network_justification.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!(
                "skill '{}' requests {:?} network without justification",
                self.name, self.network_mode
            ))));
        }
        Ok(())
    }

    /// Resolves the language a call should run under: if the descriptor
    /// has a singleton `language` and the caller didn't name one, it is
    /// auto-populated; otherwise the requested language must be in the
    /// descriptor's allowed set.
    pub fn resolve_language(&self, requested: Option<&str>) -> Result<String, SandboxError> {
        if let Some(langs) = &self.languages {
            return match requested {
                Some(r) if langs.iter().any(|l| l == r) => Ok(r.to_string()),
                Some(r) => Err(SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!(
                    "skill '{}' does not support language '{}' (allowed: {})",
                    self.name,
                    r,
                    langs.join(", ")
                )))),
                None if langs.len() == 1 => Ok(langs[0].clone()),
                None => Err(SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!(
                    "skill '{}' requires an explicit language (allowed: {})",
                    self.name,
                    langs.join(", ")
                )))),
            };
        }
        match (&self.language, requested) {
            (Some(l), None) => Ok(l.clone()),
            (Some(l), Some(r)) if l == r => Ok(r.to_string()),
            (Some(l), Some(r)) => Err(SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!(
                "skill '{}' only supports language '{}', got '{}'",
                self.name, l, r
            )))),
            (None, _) => Err(SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!(
                "skill '{}' has no usable language configuration",
                self.name
            )))),
        }
    }

    /// The per-skill outputs subdirectory name, defaulting to the skill name.
    pub fn outputs_subdir(&self) -> &str {
        self.outputs_dir.as_deref().unwrap_or(&self.name)
    }
}

/// All skills known to this process, indexed by name.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    descriptors: HashMap<String, SkillDescriptor>,
}

/// The on-disk shape of one entry in `skill-images.yaml`. `name` is
/// implied by the map key rather than repeated in the document.
#[derive(Debug, Clone, Deserialize)]
struct SkillDescriptorDoc {
    image: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    languages: Option<Vec<String>>,
    #[serde(default = "default_memory")]
    memory: String,
    #[serde(default = "default_cpus")]
    cpus: f64,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    network_mode: NetworkMode,
    #[serde(default)]
    network_justification: Option<String>,
    #[serde(default)]
    extra_mounts: HashMap<String, String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    outputs_dir: Option<String>,
}

impl SkillRegistry {
    pub fn from_descriptors(descriptors: Vec<SkillDescriptor>) -> Result<Self, SandboxError> {
        let mut map = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            descriptor.validate()?;
            map.insert(descriptor.name.clone(), descriptor);
        }
        Ok(Self { descriptors: map })
    }

    /// Loads `skills/skill-images.yaml`, a mapping of skill name to
    /// container descriptor.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, SandboxError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!("{}: {e}", path.display())))
        })?;
        let raw: HashMap<String, SkillDescriptorDoc> = serde_yaml::from_str(&content).map_err(|e| {
            SandboxError::new(SandboxErrorKind::InvalidDescriptor(format!("{}: {e}", path.display())))
        })?;
        let descriptors = raw
            .into_iter()
            .map(|(name, doc)| SkillDescriptor {
                name,
                image: doc.image,
                language: doc.language,
                languages: doc.languages,
                memory: doc.memory,
                cpus: doc.cpus,
                timeout_secs: doc.timeout_secs,
                network_mode: doc.network_mode,
                network_justification: doc.network_justification,
                extra_mounts: doc.extra_mounts,
                env: doc.env,
                outputs_dir: doc.outputs_dir,
            })
            .collect();
        Self::from_descriptors(descriptors)
    }

    pub fn get(&self, name: &str) -> Result<&SkillDescriptor, SandboxError> {
        self.descriptors
            .get(name)
            .ok_or_else(|| SandboxError::new(SandboxErrorKind::UnknownSkill(name.to_string())))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SkillDescriptor {
        SkillDescriptor {
            name: "pyhello".into(),
            image: "conduit/pyhello:latest".into(),
            language: Some("python".into()),
            languages: None,
            memory: default_memory(),
            cpus: 1.0,
            timeout_secs: 30,
            network_mode: NetworkMode::None,
            network_justification: None,
            extra_mounts: HashMap::new(),
            env: HashMap::new(),
            outputs_dir: None,
        }
    }

    #[test]
    fn rejects_both_language_and_languages() {
        let mut d = base();
        d.languages = Some(vec!["python".into()]);
        assert!(d.validate().is_err());
    }

    #[test]
    fn rejects_bridge_without_justification() {
        let mut d = base();
        d.network_mode = NetworkMode::Bridge;
        assert!(d.validate().is_err());
    }

    #[test]
    fn accepts_bridge_with_justification() {
        let mut d = base();
        d.network_mode = NetworkMode::Bridge;
        d.network_justification = Some("needs to call an internal API".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn auto_populates_singleton_language() {
        let d = base();
        assert_eq!(d.resolve_language(None).unwrap(), "python");
        assert!(d.resolve_language(Some("ruby")).is_err());
    }

    #[test]
    fn rejects_language_outside_allowed_set() {
        let mut d = base();
        d.language = None;
        d.languages = Some(vec!["python".into(), "bash".into()]);
        assert!(d.resolve_language(Some("ruby")).is_err());
        assert_eq!(d.resolve_language(Some("bash")).unwrap(), "bash");
    }

    #[test]
    fn outputs_subdir_defaults_to_name() {
        let d = base();
        assert_eq!(d.outputs_subdir(), "pyhello");
    }
}
