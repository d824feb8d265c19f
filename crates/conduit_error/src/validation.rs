//! Structural validation error types, shared by the protocol layer (tool
//! input-schema checks) and the workflow layer (graph/variable checks).

/// A single validation failure location, mirroring where in a YAML document
/// or JSON-RPC payload the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ValidationLocation {
    /// Line number in the source document, if known
    pub line: Option<u32>,
    /// Dotted section path, e.g. `steps.fetch_page.needs`
    pub section: Option<String>,
}

/// Specific error conditions for validation operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A JSON value did not match the expected input schema
    SchemaMismatch(String),
    /// A name reference points nowhere
    UndefinedReference(String),
    /// The step/resource graph is not well-formed independent of cycles (e.g. disconnected root)
    InvalidGraph(String),
    /// A required field was missing
    MissingField(String),
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationErrorKind::SchemaMismatch(msg) => write!(f, "schema mismatch: {}", msg),
            ValidationErrorKind::UndefinedReference(name) => {
                write!(f, "undefined reference '{}'", name)
            }
            ValidationErrorKind::InvalidGraph(msg) => write!(f, "invalid graph: {}", msg),
            ValidationErrorKind::MissingField(name) => write!(f, "missing field '{}'", name),
        }
    }
}

/// Error type for validation operations.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The specific error condition
    pub kind: ValidationErrorKind,
    /// Where in the document the failure was found, if known
    pub location: ValidationLocation,
    /// Line number in `conduit`'s own source where the error was raised
    pub line: u32,
    /// Source file where the error was raised
    pub file: &'static str,
}

impl ValidationError {
    /// Create a new ValidationError with automatic location tracking and no document location.
    #[track_caller]
    pub fn new(kind: ValidationErrorKind) -> Self {
        Self::at(kind, ValidationLocation::default())
    }

    /// Create a new ValidationError carrying a document location.
    #[track_caller]
    pub fn at(kind: ValidationErrorKind, location: ValidationLocation) -> Self {
        let caller = std::panic::Location::caller();
        Self {
            kind,
            location,
            line: caller.line(),
            file: caller.file(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location.section {
            Some(section) => write!(
                f,
                "Validation Error at {}: {} (raised at line {} in {})",
                section, self.kind, self.line, self.file
            ),
            None => write!(
                f,
                "Validation Error: {} at line {} in {}",
                self.kind, self.line, self.file
            ),
        }
    }
}

impl std::error::Error for ValidationError {}
