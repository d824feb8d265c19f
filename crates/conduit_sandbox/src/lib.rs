//! The skill sandbox (spec component I): a container-mediated code
//! executor. Given a skill name, language, code body, and input files, it
//! materializes a disposable host workspace, launches the skill's
//! container image with the workspace and a persistent outputs directory
//! mounted, enforces the descriptor's resource/network limits, and
//! surfaces captured stdout/stderr/exit status back to the caller.
//!
//! The workspace is always removed before [`Sandbox::execute`] returns;
//! the outputs directory is never removed — it is the one piece of state
//! that survives across invocations.

mod container;
mod descriptor;
mod sandbox;
mod workspace;

pub use descriptor::{NetworkMode, SkillDescriptor, SkillRegistry};
pub use sandbox::{Sandbox, SandboxConfig, SkillInvocation, SkillOutcome};
pub use workspace::Workspace;
