//! `conduit validate`: loads a config directory and reports problems
//! without serving anything. Exit code communicates success per spec §6
//! ("non-zero on unrecoverable startup failure").

use std::path::Path;

use crate::config::{self, load_skill_docs};

pub fn run(config_dir: &Path) -> anyhow::Result<()> {
    let loaded = config::load(config_dir, 3)?;

    let workflow_count = loaded.workflows.names().count();
    println!("workflows: {workflow_count}");
    for name in loaded.workflows.names() {
        println!("  - {name}");
    }

    println!("servers: {}", loaded.servers.len());
    for server in &loaded.servers {
        println!("  - {}", server.name);
    }

    let registry_names: Vec<&str> = loaded.sandbox.registry().names().collect();
    println!("skills (skill-images.yaml): {}", registry_names.len());

    let docs = load_skill_docs(config_dir.join("skills"))?;
    for doc in &docs {
        if !registry_names.contains(&doc.name.as_str()) {
            println!(
                "  warning: skills/{}/SKILL.md has no matching entry in skill-images.yaml",
                doc.name
            );
        }
    }
    for name in &registry_names {
        if !docs.iter().any(|d| &d.name == name) {
            println!("  warning: skill-images.yaml entry `{name}` has no skills/{name}/SKILL.md");
        }
    }

    println!("configuration OK");
    Ok(())
}
