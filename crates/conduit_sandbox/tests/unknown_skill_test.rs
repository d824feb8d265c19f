//! Invocation-level behavior that doesn't require an actual container
//! runtime: unknown-skill rejection and descriptor validation wiring
//! through `Sandbox::execute`.

use std::collections::HashMap;

use conduit_sandbox::{Sandbox, SandboxConfig, SkillInvocation, SkillRegistry};

#[tokio::test]
async fn unknown_skill_is_rejected_before_touching_the_filesystem() {
    let base = tempfile::tempdir().unwrap();
    let outputs = tempfile::tempdir().unwrap();
    let skills = tempfile::tempdir().unwrap();

    let sandbox = Sandbox::new(
        SandboxConfig::new(base.path().to_path_buf(), outputs.path().to_path_buf(), skills.path().to_path_buf()),
        SkillRegistry::from_descriptors(vec![]).unwrap(),
    );

    let result = sandbox
        .execute(SkillInvocation {
            skill: "does-not-exist".to_string(),
            language: None,
            code: String::new(),
            files: HashMap::new(),
        })
        .await;

    assert!(result.is_err());
    // No workspace should have been created under `base` for a skill that
    // was never found.
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
}
