//! Parses `skills/<name>/SKILL.md` front matter (spec §6): just `name` and
//! `description`, used by `conduit validate` to flag a skill directory with
//! no matching `skill-images.yaml` entry (and vice versa). The engine's
//! "active" skill execution mode, where a `workflow.yaml` inside the skill
//! directory would drive its own behavior, is documented upstream as a
//! stub and stays out of scope here: only the descriptor-driven
//! `execute_skill_code` path is implemented.

use std::path::Path;

use serde::Deserialize;

use conduit_error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct SkillDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Extracts the `---`-delimited YAML front matter from a `SKILL.md` body.
fn front_matter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    Some(&rest[..end])
}

/// Reads every `skills/*/SKILL.md` under `dir`, returning the parsed front
/// matter of each. A skill directory with no `SKILL.md`, or one with a
/// body but no front matter, is skipped rather than failing the load:
/// `SKILL.md` is descriptive metadata, not the source of execution truth
/// (that's `skill-images.yaml`).
pub fn load_skill_docs<P: AsRef<Path>>(dir: P) -> Result<Vec<SkillDoc>, ConfigError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut docs = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::new(format!("{}: {e}", dir.display())))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort();

    for skill_dir in entries {
        let skill_md = skill_dir.join("SKILL.md");
        if !skill_md.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&skill_md).map_err(|e| ConfigError::new(format!("{}: {e}", skill_md.display())))?;
        let Some(yaml) = front_matter(&content) else { continue };
        let doc: SkillDoc = serde_yaml::from_str(yaml).map_err(|e| ConfigError::new(format!("{}: {e}", skill_md.display())))?;
        docs.push(doc);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("pyhello");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: pyhello\ndescription: prints hello\n---\n\n# pyhello\n\nDoes stuff.\n",
        )
        .unwrap();

        let docs = load_skill_docs(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "pyhello");
        assert_eq!(docs[0].description, "prints hello");
    }

    #[test]
    fn skips_directories_without_skill_md() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        let docs = load_skill_docs(dir.path()).unwrap();
        assert!(docs.is_empty());
    }
}
