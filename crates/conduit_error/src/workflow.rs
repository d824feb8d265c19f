//! Workflow loading and execution error types.

/// Specific error conditions for workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkflowErrorKind {
    /// Failed to read a workflow file
    FileRead(String),
    /// Failed to parse YAML content
    YamlParse(String),
    /// A workflow defines no steps
    EmptySteps,
    /// A step's `needs` or a variable reference names a step that does not exist
    UndefinedReference(String),
    /// An interpolated `{{var}}` has no binding and no `default:` filter
    UndefinedVariable(String),
    /// The step dependency graph contains a cycle
    CircularDependency(Vec<String>),
    /// A template step references a workflow that is not in the registry
    UnresolvedTemplate(String),
    /// Nested template invocation exceeded the configured recursion depth
    RecursionLimitExceeded(u32),
    /// A step failed during execution
    StepFailed {
        /// Step name
        step: String,
        /// Error message
        message: String,
    },
    /// A consensus step could not reach its required agreement
    ConsensusFailed(String),
    /// A loop step's `until` condition was never satisfied and `max_iterations` was reached
    LoopExhausted {
        /// Step name
        step: String,
        /// Iterations executed
        iterations: u32,
    },
}

impl std::fmt::Display for WorkflowErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowErrorKind::FileRead(msg) => write!(f, "failed to read workflow file: {}", msg),
            WorkflowErrorKind::YamlParse(msg) => write!(f, "failed to parse YAML: {}", msg),
            WorkflowErrorKind::EmptySteps => write!(f, "workflow defines no steps"),
            WorkflowErrorKind::UndefinedReference(name) => {
                write!(f, "reference to undefined step '{}'", name)
            }
            WorkflowErrorKind::UndefinedVariable(name) => {
                write!(f, "undefined variable '{}'", name)
            }
            WorkflowErrorKind::CircularDependency(cycle) => {
                write!(f, "circular dependency: {}", cycle.join(" -> "))
            }
            WorkflowErrorKind::UnresolvedTemplate(name) => {
                write!(f, "template workflow '{}' not found in registry", name)
            }
            WorkflowErrorKind::RecursionLimitExceeded(depth) => {
                write!(f, "nested template recursion exceeded depth {}", depth)
            }
            WorkflowErrorKind::StepFailed { step, message } => {
                write!(f, "step '{}' failed: {}", step, message)
            }
            WorkflowErrorKind::ConsensusFailed(msg) => write!(f, "consensus not reached: {}", msg),
            WorkflowErrorKind::LoopExhausted { step, iterations } => write!(
                f,
                "loop step '{}' exhausted {} iterations without meeting its exit condition",
                step, iterations
            ),
        }
    }
}

/// Error type for workflow loading and execution.
///
/// # Examples
///
/// ```
/// use conduit_error::{WorkflowError, WorkflowErrorKind};
///
/// let err = WorkflowError::new(WorkflowErrorKind::EmptySteps);
/// assert!(format!("{}", err).contains("no steps"));
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowError {
    /// The specific error condition
    pub kind: WorkflowErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl WorkflowError {
    /// Create a new WorkflowError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: WorkflowErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Workflow Error: {} at line {} in {}",
            self.kind, self.line, self.file
        )
    }
}

impl std::error::Error for WorkflowError {}
