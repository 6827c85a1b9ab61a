/// Error types for loading tables and compiling the formula search space.
///
/// Every variant here is fatal for a job: they surface before any formula is
/// evaluated against a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// Malformed or inconsistent gematria table
    GematriaError(String),
    /// Malformed production rule or unresolvable nonterminal
    GrammarError(String),
    /// Malformed logical replacement line
    ReplacementError(String),
    /// Malformed n-gram statistics or width mismatch
    NgramError(String),
    /// Malformed document (e.g. a bad `skips` declaration)
    DocumentError(String),
    /// Invalid job settings
    SettingsError(String),
    /// File could not be read or written
    IoError(String),
}

impl std::fmt::Display for DecryptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecryptError::GematriaError(msg) => write!(f, "Gematria error: {}", msg),
            DecryptError::GrammarError(msg) => write!(f, "Grammar error: {}", msg),
            DecryptError::ReplacementError(msg) => write!(f, "Replacement error: {}", msg),
            DecryptError::NgramError(msg) => write!(f, "N-gram error: {}", msg),
            DecryptError::DocumentError(msg) => write!(f, "Document error: {}", msg),
            DecryptError::SettingsError(msg) => write!(f, "Settings error: {}", msg),
            DecryptError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DecryptError {}

/// Result type for load and compile operations
pub type DecryptResult<T> = Result<T, DecryptError>;

/// Failure of a single formula evaluation.
///
/// An evaluation failure disqualifies the formula for the whole document it
/// is being applied to; it never aborts the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// `/` or `%` with a zero right operand
    DivisionByZero,
    /// A token needed more operands than the stack held
    StackUnderflow { token: String },
    /// The scan ended with a stack depth other than one
    UnbalancedStack { depth: usize },
    /// A word that is neither a known token nor an integer literal
    UnknownToken(String),
    /// A special function was applied outside its domain
    OutOfRange { function: String, argument: i32 },
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::StackUnderflow { token } => {
                write!(f, "stack underflow at token '{}'", token)
            }
            EvalError::UnbalancedStack { depth } => {
                write!(f, "expected one value on the stack, found {}", depth)
            }
            EvalError::UnknownToken(token) => write!(f, "unknown token '{}'", token),
            EvalError::OutOfRange { function, argument } => {
                write!(f, "{}({}) is out of range", function, argument)
            }
        }
    }
}

impl std::error::Error for EvalError {}
