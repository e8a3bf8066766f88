//! Error types for the StarkPass compiler

use crate::parser::Location;
use thiserror::Error;

/// StarkPass compiler and runner errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Front end
    /// Syntax error encountered during parsing
    ///
    /// **Triggered by:** Invalid S-expression syntax (unmatched parentheses, bad tokens)
    /// **Example:** `(func f () (felt)` (missing closing parenthesis)
    #[error("Syntax error at line {line}, column {col}: {message}")]
    SyntaxError {
        /// Line number where error occurred
        line: usize,
        /// Column number where error occurred
        col: usize,
        /// Error description
        message: String,
    },

    /// General parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A module could not be located by the module reader
    #[error("Could not find module '{module}'")]
    ModuleNotFound {
        /// Dotted module name
        module: String,
    },

    // Compilation
    /// Generic user error reported by a base pipeline stage
    ///
    /// **Triggered by:** Unknown identifiers, wrong call arity, unsupported directives
    #[error("{location}: {message}")]
    Preprocessor {
        /// Error description
        message: String,
        /// Where the offending element lives
        location: Location,
    },

    /// Storage variable declaration error
    ///
    /// **Triggered by:** Duplicate storage variables, key arity mismatches, value types that
    /// cannot be laid out as field elements
    /// **Example:** `(balance.read)` when `balance` is declared with one key
    #[error("{location}: {message}")]
    Declaration {
        /// Error description
        message: String,
        /// Where the offending element lives
        location: Location,
    },

    /// Internal invariant violation during code generation
    ///
    /// Unreachable when the declaration stage succeeded; always a compiler bug.
    #[error("Internal compiler error during code generation: {0}")]
    CodeGeneration(String),

    /// Hint rejected by the whitelist gate
    #[error("{location}: Hint is not whitelisted.\nThis may indicate that this library function cannot be used in StarkNet contracts.\nHint:\n{snippet}")]
    SecurityValidation {
        /// The offending hint source
        snippet: String,
        /// Location of the hint
        location: Location,
    },

    /// Pipeline extension defect (missing anchor, reused stage name)
    #[error("Pipeline configuration error: {0}")]
    PipelineConfiguration(String),

    /// Invalid compile options
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Execution
    /// Storage access log misuse (stale or foreign storage pointer)
    #[error("Storage trace error: expected storage_ptr {expected}, got {got}")]
    StorageTrace {
        /// The pointer the trace expected (its current end)
        expected: usize,
        /// The pointer that was supplied
        got: usize,
    },

    /// General runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error in the user's source; fix the input and recompile
    User,
    /// Broken compiler invariant
    Internal,
    /// Broken pipeline or option setup, detected before any source is processed
    Configuration,
}

impl Error {
    /// Create a runtime error with a message
    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::RuntimeError(msg.into())
    }

    /// Create an internal code generation error
    pub fn codegen(msg: impl Into<String>) -> Self {
        Error::CodeGeneration(msg.into())
    }

    /// Create a pipeline configuration error
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Error::PipelineConfiguration(msg.into())
    }

    /// Create a preprocessor error at `location`
    pub fn preprocessor(msg: impl Into<String>, location: &Location) -> Self {
        Error::Preprocessor {
            message: msg.into(),
            location: location.clone(),
        }
    }

    /// Create a storage variable declaration error at `location`
    pub fn declaration(msg: impl Into<String>, location: &Location) -> Self {
        Error::Declaration {
            message: msg.into(),
            location: location.clone(),
        }
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::CodeGeneration(_) => ErrorSeverity::Internal,
            Error::StorageTrace { .. } => ErrorSeverity::Internal,

            Error::PipelineConfiguration(_) => ErrorSeverity::Configuration,
            Error::Configuration(_) => ErrorSeverity::Configuration,

            _ => ErrorSeverity::User,
        }
    }

    /// Location attached to the error, if any
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::Preprocessor { location, .. }
            | Error::Declaration { location, .. }
            | Error::SecurityValidation { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// Result type for StarkPass operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let loc = Location::new("contract.sx", 3, 5);
        assert_eq!(
            Error::declaration("dup", &loc).classify(),
            ErrorSeverity::User
        );
        assert_eq!(Error::codegen("oops").classify(), ErrorSeverity::Internal);
        assert_eq!(
            Error::pipeline("missing anchor").classify(),
            ErrorSeverity::Configuration
        );
    }

    #[test]
    fn test_security_error_names_snippet_and_location() {
        let err = Error::SecurityValidation {
            snippet: "ids.x = 5".to_string(),
            location: Location::new("contract.sx", 7, 3),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("contract.sx:7:3"));
        assert!(msg.contains("ids.x = 5"));
        assert!(err.location().is_some());
    }
}
