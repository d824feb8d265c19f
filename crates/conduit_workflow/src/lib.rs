//! Workflow DAG executor (spec component D/E/F/G/H): parsing, variable
//! interpolation, dependency ordering, step/loop execution, and consensus
//! aggregation for the declarative YAML workflows conduit exposes as MCP
//! tools.

pub mod consensus;
pub mod context;
pub mod dag;
pub mod executor;
pub mod interpolate;
pub mod model;
pub mod providers;
pub mod registry;
pub mod workflow_tool;

pub use context::RunContext;
pub use dag::{build_plan, ExecutionPlan, Node};
pub use executor::WorkflowRuntime;
pub use model::{
    Aggregate, ConsensusRequire, ExecutionDefaults, Loop, OnFailure, Step, StepKind, Workflow,
};
pub use providers::ProviderRegistry;
pub use registry::WorkflowRegistry;
pub use workflow_tool::{build_workflow_tools, WorkflowTool};
