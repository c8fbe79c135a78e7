use crate::error::{ErrorSeverity, SimError};
use crate::expr::CompileError;

/// Errors from [`super::StatContainer`] mutations.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatError {
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("formula for `{path}` failed to compile: {source}")]
    Compile { path: String, source: CompileError },

    #[error("formula for `{path}` would create a dependency cycle through {}", cycle.join(" -> "))]
    CyclicDependency { path: String, cycle: Vec<String> },

    #[error("`{0}` is formula-driven; its base cannot be adjusted directly")]
    FormulaBase(String),
}

impl SimError for StatError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownAttribute(_) | Self::FormulaBase(_) => ErrorSeverity::Validation,
            Self::Compile { .. } | Self::CyclicDependency { .. } => ErrorSeverity::Content,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAttribute(_) => "STAT_UNKNOWN_ATTRIBUTE",
            Self::Compile { .. } => "STAT_COMPILE",
            Self::CyclicDependency { .. } => "STAT_CYCLIC_DEPENDENCY",
            Self::FormulaBase(_) => "STAT_FORMULA_BASE",
        }
    }
}
