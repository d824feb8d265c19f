//! Per-invocation host-side workspace: a fresh scratch directory holding
//! the canonical entry file for the invocation's language plus any
//! declared input files, unconditionally removed when the invocation ends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use conduit_error::{SandboxError, SandboxErrorKind};
use uuid::Uuid;

fn entry_file_name(language: &str) -> &'static str {
    match language {
        "python" | "python3" => "script.py",
        "bash" | "sh" | "shell" => "script.sh",
        "node" | "javascript" | "js" => "script.js",
        "typescript" | "ts" => "script.ts",
        "ruby" => "script.rb",
        _ => "script.txt",
    }
}

/// A materialized host-side workspace for one sandbox invocation.
///
/// Dropping this value does not remove the directory: removal is an
/// explicit, observable step ([`Workspace::remove`]) that every call path
/// in [`crate::Sandbox::execute`] takes exactly once, success or failure.
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Creates a unique scratch directory under `base_dir`, writes `code`
    /// to the language's canonical entry file, and materializes `files`
    /// relative to the workspace root.
    pub fn create(
        base_dir: &Path,
        language: &str,
        code: &str,
        files: &HashMap<String, String>,
    ) -> Result<Self, SandboxError> {
        std::fs::create_dir_all(base_dir).map_err(|e| {
            SandboxError::new(SandboxErrorKind::WorkspaceSetup(format!(
                "creating sandbox base dir {}: {e}",
                base_dir.display()
            )))
        })?;

        let dir = base_dir.join(format!("conduit-skill-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).map_err(|e| {
            SandboxError::new(SandboxErrorKind::WorkspaceSetup(format!(
                "creating workspace {}: {e}",
                dir.display()
            )))
        })?;

        let entry = dir.join(entry_file_name(language));
        std::fs::write(&entry, code).map_err(|e| {
            SandboxError::new(SandboxErrorKind::WorkspaceSetup(format!(
                "writing entry file {}: {e}",
                entry.display()
            )))
        })?;

        for (relative, content) in files {
            let path = dir.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SandboxError::new(SandboxErrorKind::WorkspaceSetup(format!(
                        "creating {}: {e}",
                        parent.display()
                    )))
                })?;
            }
            std::fs::write(&path, content).map_err(|e| {
                SandboxError::new(SandboxErrorKind::WorkspaceSetup(format!(
                    "writing input file {}: {e}",
                    path.display()
                )))
            })?;
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn entry_file(&self, language: &str) -> PathBuf {
        self.dir.join(entry_file_name(language))
    }

    /// Unconditionally removes the workspace directory.
    pub fn remove(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to remove sandbox workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materializes_entry_file_and_inputs() {
        let base = tempfile::tempdir().unwrap();
        let mut files = HashMap::new();
        files.insert("data/input.txt".to_string(), "hello".to_string());

        let ws = Workspace::create(base.path(), "python", "print('hi')", &files).unwrap();
        assert_eq!(std::fs::read_to_string(ws.entry_file("python")).unwrap(), "print('hi')");
        assert_eq!(std::fs::read_to_string(ws.path().join("data/input.txt")).unwrap(), "hello");
    }

    #[test]
    fn remove_deletes_the_directory() {
        let base = tempfile::tempdir().unwrap();
        let ws = Workspace::create(base.path(), "python", "pass", &HashMap::new()).unwrap();
        let dir = ws.path().to_path_buf();
        assert!(dir.exists());
        ws.remove();
        assert!(!dir.exists());
    }
}
