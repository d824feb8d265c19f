//! Conceptual container launch: argv construction for the host container
//! runtime, process supervision (spawn, capture, timeout, kill), and
//! output truncation.
//!
//! The engine never talks to a container runtime's API directly — it
//! shells out to whichever of `docker`/`podman` is first found on `PATH`,
//! matching spec.md §6's PATH-augmentation contract (the host binary is
//! responsible for augmenting `PATH` before this crate ever runs).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use conduit_error::{SandboxError, SandboxErrorKind};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{instrument, warn};

use crate::descriptor::{NetworkMode, SkillDescriptor};

/// Output byte cap per stream before truncation (spec.md §4.I default).
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 1024 * 1024;

/// Result of one container run: exit status plus captured, possibly
/// truncated, stdout/stderr.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration: Duration,
}

/// Picks the first container runtime binary found on `PATH`.
pub fn container_runtime() -> Result<&'static str, SandboxError> {
    for candidate in ["docker", "podman"] {
        if on_path(candidate) {
            return Ok(candidate);
        }
    }
    Err(SandboxError::new(SandboxErrorKind::LaunchFailed(
        "neither 'docker' nor 'podman' found on PATH".to_string(),
    )))
}

fn on_path(bin: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

/// Builds the conceptual argv for launching `descriptor`'s image against
/// `workspace`, with `outputs_dir` mounted persistently and `skill_dir`
/// mounted read-only. Does not include the runtime binary itself — the
/// caller invokes this as `Command::new(runtime).args(argv)`.
pub fn build_argv(
    descriptor: &SkillDescriptor,
    workspace: &Path,
    outputs_dir: &Path,
    skill_dir: &Path,
    language: &str,
    entry_file: &Path,
    skill_name: &str,
) -> Vec<String> {
    let mut argv = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--read-only".to_string(),
        "--cap-drop=ALL".to_string(),
        "--security-opt".to_string(),
        "no-new-privileges".to_string(),
        format!("--memory={}", descriptor.memory),
        format!("--cpus={}", descriptor.cpus),
        "--pids-limit=256".to_string(),
        "-v".to_string(),
        format!("{}:/workspace:rw", workspace.display()),
        "-v".to_string(),
        format!("{}:/outputs:rw", outputs_dir.display()),
        "-v".to_string(),
        format!("{}:/skill:ro", skill_dir.display()),
        "-w".to_string(),
        "/workspace".to_string(),
        "-e".to_string(),
        "OUTPUTS_DIR=/outputs".to_string(),
        "-e".to_string(),
        format!("SKILL_NAME={skill_name}"),
        "-e".to_string(),
        "WORKSPACE_DIR=/workspace".to_string(),
    ];

    match descriptor.network_mode {
        NetworkMode::None => argv.push("--network=none".to_string()),
        NetworkMode::Bridge => argv.push("--network=bridge".to_string()),
        NetworkMode::Host => argv.push("--network=host".to_string()),
    }

    for (key, value) in &descriptor.env {
        argv.push("-e".to_string());
        argv.push(format!("{key}={value}"));
    }
    for (host_path, container_path) in &descriptor.extra_mounts {
        argv.push("-v".to_string());
        argv.push(format!("{host_path}:{container_path}"));
    }

    argv.push(descriptor.image.clone());

    let file_name = entry_file.file_name().expect("entry file has a name").to_string_lossy();
    let entry_in_container = format!("/workspace/{file_name}");
    argv.extend(interpreter_argv(language, &entry_in_container));

    argv
}

fn interpreter_argv(language: &str, entry: &str) -> Vec<String> {
    match language {
        "python" | "python3" => vec!["python3".to_string(), entry.to_string()],
        "bash" | "sh" | "shell" => vec!["sh".to_string(), entry.to_string()],
        "node" | "javascript" | "js" => vec!["node".to_string(), entry.to_string()],
        "typescript" | "ts" => vec!["ts-node".to_string(), entry.to_string()],
        "ruby" => vec!["ruby".to_string(), entry.to_string()],
        other => vec![other.to_string(), entry.to_string()],
    }
}

/// Spawns `runtime argv...`, enforcing `timeout` as a wall-clock deadline
/// and capturing stdout/stderr up to `output_cap` bytes each. On timeout
/// the container is killed (`--rm` ensures it never lingers) and a
/// `Timeout` error is returned.
#[instrument(skip(argv), fields(skill = skill_name))]
pub async fn run(
    runtime: &str,
    argv: Vec<String>,
    timeout: Duration,
    output_cap: usize,
    skill_name: &str,
) -> Result<ProcessOutcome, SandboxError> {
    let started = std::time::Instant::now();

    let mut child = Command::new(runtime)
        .args(&argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SandboxError::new(SandboxErrorKind::LaunchFailed(e.to_string())))?;

    let mut stdout_pipe = child.stdout.take().expect("stdout is piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr is piped");

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(SandboxError::new(SandboxErrorKind::LaunchFailed(e.to_string()))),
        Err(_) => {
            warn!(skill = skill_name, "skill execution exceeded its timeout, killing container");
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(SandboxError::new(SandboxErrorKind::Timeout));
        }
    };

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();

    let (stdout, stdout_truncated) = truncate(&stdout_bytes, output_cap);
    let (stderr, stderr_truncated) = truncate(&stderr_bytes, output_cap);

    Ok(ProcessOutcome {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        duration: started.elapsed(),
    })
}

fn truncate(bytes: &[u8], cap: usize) -> (String, bool) {
    if bytes.len() <= cap {
        (String::from_utf8_lossy(bytes).into_owned(), false)
    } else {
        let mut text = String::from_utf8_lossy(&bytes[..cap]).into_owned();
        text.push_str("\n...[truncated]");
        (text, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn descriptor() -> SkillDescriptor {
        SkillDescriptor {
            name: "pyhello".into(),
            image: "conduit/pyhello:latest".into(),
            language: Some("python".into()),
            languages: None,
            memory: "512m".into(),
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
    fn truncates_past_cap() {
        let (text, truncated) = truncate(b"hello world", 5);
        assert!(truncated);
        assert!(text.starts_with("hello"));
    }

    #[test]
    fn does_not_truncate_under_cap() {
        let (text, truncated) = truncate(b"hi", 5);
        assert!(!truncated);
        assert_eq!(text, "hi");
    }

    #[test]
    fn interpreter_dispatches_by_language() {
        assert_eq!(interpreter_argv("python", "/workspace/script.py"), vec!["python3", "/workspace/script.py"]);
        assert_eq!(interpreter_argv("bash", "/workspace/script.sh"), vec!["sh", "/workspace/script.sh"]);
    }

    #[test]
    fn argv_mounts_workspace_outputs_and_skill_dir() {
        let argv = build_argv(
            &descriptor(),
            &PathBuf::from("/tmp/ws"),
            &PathBuf::from("/tmp/out"),
            &PathBuf::from("/tmp/skill"),
            "python",
            &PathBuf::from("/tmp/ws/script.py"),
            "pyhello",
        );
        let joined = argv.join(" ");
        assert!(joined.contains("/tmp/ws:/workspace:rw"));
        assert!(joined.contains("/tmp/out:/outputs:rw"));
        assert!(joined.contains("/tmp/skill:/skill:ro"));
        assert!(joined.contains("--network=none"));
        assert!(argv.contains(&"--rm".to_string()));
    }

    #[test]
    fn argv_passes_through_justified_bridge_network() {
        let mut d = descriptor();
        d.network_mode = NetworkMode::Bridge;
        let argv = build_argv(
            &d,
            &PathBuf::from("/tmp/ws"),
            &PathBuf::from("/tmp/out"),
            &PathBuf::from("/tmp/skill"),
            "python",
            &PathBuf::from("/tmp/ws/script.py"),
            "pyhello",
        );
        assert!(argv.contains(&"--network=bridge".to_string()));
    }
}
