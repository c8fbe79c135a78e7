//! Errors produced by the expression compilers and the interpreter.

use crate::error::{ErrorSeverity, SimError};

/// Compile-time failure. Never escapes as a panic; callers keep whatever
/// compiled form they had before.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompileError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("computed member access is not supported (at {position})")]
    UnsupportedComputedAccess { position: usize },

    #[error("accessor `{root}` must be followed by a static property path")]
    InvalidAccessor { root: String },

    #[error("invalid path(s): {}", paths.join(", "))]
    InvalidPaths { paths: Vec<String> },

    #[error("empty expression")]
    Empty,
}

impl SimError for CompileError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Content
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "COMPILE_SYNTAX",
            Self::UnsupportedComputedAccess { .. } => "COMPILE_COMPUTED_ACCESS",
            Self::InvalidAccessor { .. } => "COMPILE_INVALID_ACCESSOR",
            Self::InvalidPaths { .. } => "COMPILE_INVALID_PATHS",
            Self::Empty => "COMPILE_EMPTY",
        }
    }
}

/// Runtime failure while interpreting a compiled expression.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvalError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("unknown stat `{root}.{path}`")]
    UnknownStat { root: String, path: String },

    #[error("`{0}` is not a callable function")]
    UnknownFunction(String),

    #[error("`{function}` expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("no `{0}` member bound in this context")]
    MissingBinding(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("expression produced a {0} value")]
    InvalidResult(String),

    #[error("expression produced a non-finite number")]
    NonFinite,
}

impl SimError for EvalError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Content
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Compile(inner) => inner.error_code(),
            Self::UnknownIdentifier(_) => "EVAL_UNKNOWN_IDENTIFIER",
            Self::UnknownAttribute(_) => "EVAL_UNKNOWN_ATTRIBUTE",
            Self::UnknownStat { .. } => "EVAL_UNKNOWN_STAT",
            Self::UnknownFunction(_) => "EVAL_UNKNOWN_FUNCTION",
            Self::ArgumentCount { .. } => "EVAL_ARGUMENT_COUNT",
            Self::MissingBinding(_) => "EVAL_MISSING_BINDING",
            Self::TypeError(_) => "EVAL_TYPE_ERROR",
            Self::InvalidResult(_) => "EVAL_INVALID_RESULT",
            Self::NonFinite => "EVAL_NON_FINITE",
        }
    }
}
