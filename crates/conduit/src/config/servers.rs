//! Loads `servers/*.yaml` into the list of [`DownstreamServerConfig`]s a
//! workflow's `tool` steps and `servers:` scopes address by name (spec §6
//! "Configuration layout", spec §4.J).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use conduit_error::ConfigError;
use conduit_mcp_client::DownstreamServerConfig;

use super::env_interp::interpolate;

#[derive(Debug, Clone, Deserialize)]
struct ServerDoc {
    name: String,
    #[serde(default)]
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    socket_path: Option<PathBuf>,
}

/// Walks `dir` for `*.yaml`/`*.yml` downstream-server documents.
pub fn load_server_configs<P: AsRef<Path>>(dir: P) -> Result<Vec<DownstreamServerConfig>, ConfigError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| ConfigError::new(format!("{}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")))
        .collect();
    paths.sort();

    let mut configs = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::new(format!("{}: {e}", path.display())))?;
        let doc: ServerDoc = serde_yaml::from_str(&content).map_err(|e| ConfigError::new(format!("{}: {e}", path.display())))?;
        let env = doc.env.into_iter().map(|(k, v)| (k, interpolate(&v))).collect();
        configs.push(DownstreamServerConfig {
            name: doc.name,
            command: doc.command,
            args: doc.args,
            env,
            socket_path: doc.socket_path,
        });
    }
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_spawned_server() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("search.yaml")).unwrap();
        writeln!(f, "name: search\ncommand: search-mcp-server\nargs: [\"--stdio\"]").unwrap();

        let configs = load_server_configs(dir.path()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "search");
        assert_eq!(configs[0].command, "search-mcp-server");
    }

    #[test]
    fn missing_directory_yields_no_servers() {
        let configs = load_server_configs("/nonexistent/path/conduit-test").unwrap();
        assert!(configs.is_empty());
    }
}
