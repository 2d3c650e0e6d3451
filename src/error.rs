//! Error types for qdiff.

use thiserror::Error;

/// The main error type for qdiff operations.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The lexer hit a character it cannot classify.
    #[error("Tokenize error at position {position}: {message}")]
    Tokenize { position: usize, message: String },

    /// An `IN`/`BETWEEN` keyword was found but its operands could not be recovered.
    #[error("Malformed {keyword} clause at position {position}: {message}")]
    MalformedClauseShape {
        keyword: &'static str,
        position: usize,
        message: String,
    },

    /// A rule was scheduled before the rules it depends on.
    #[error("Pipeline error: rule '{rule}' requires {missing} which no earlier rule provides")]
    Pipeline { rule: &'static str, missing: String },

    /// One engine rejected or could not run a statement.
    #[error("Execution error on {engine}: {message}")]
    Execution { engine: String, message: String },

    /// A returned value cannot be reconciled for comparison.
    #[error("Type normalization mismatch: {0}")]
    TypeNormalizationMismatch(String),

    /// Generator used before it was ready.
    #[error("Generator error: {0}")]
    Generator(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiffError {
    /// Create a malformed-clause error for the given keyword.
    pub fn malformed(keyword: &'static str, position: usize, message: impl Into<String>) -> Self {
        Self::MalformedClauseShape {
            keyword,
            position,
            message: message.into(),
        }
    }

    /// Create an execution error attributed to an engine.
    pub fn execution(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            engine: engine.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for qdiff operations.
pub type DiffResult<T> = Result<T, DiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiffError::malformed("IN", 12, "missing operand list");
        assert_eq!(
            err.to_string(),
            "Malformed IN clause at position 12: missing operand list"
        );
    }

    #[test]
    fn test_execution_display() {
        let err = DiffError::execution("questdb", "table does not exist");
        assert_eq!(err.to_string(), "Execution error on questdb: table does not exist");
    }
}
