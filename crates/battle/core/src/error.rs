//! Common error infrastructure for battle-core.
//!
//! Domain-specific errors (`CompileError`, `StatError`, `PipelineError`, ...)
//! live next to the subsystem that produces them. This module only provides
//! the shared classification used by the resolver and the engine when they
//! decide whether to log, skip, or surface a failure.
//!
//! # Taxonomy
//!
//! - **Compile** errors come back as `Err(CompileError)` from the compilers
//!   and never escape as panics.
//! - **Evaluation** errors are converted to a fallback value at the call site
//!   that needs a number; the frame loop never stops because of them.
//! - **Intent** errors are recorded per intent as `skipped` and the batch
//!   continues.
//! - **Lifecycle** errors are returned to the caller of [`crate::GameEngine`].

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Data-level problem inside user content (bad formula, unknown path).
    ///
    /// The simulation substitutes a fallback and keeps running.
    Content,

    /// Invalid request that should be rejected without retry.
    ///
    /// Examples: intent for a missing member, unknown pipeline anchor.
    Validation,

    /// Protocol violation by the caller.
    ///
    /// Examples: stepping an engine that is not running.
    Lifecycle,

    /// Unexpected state inconsistency that indicates a bug.
    Internal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Validation => "validation",
            Self::Lifecycle => "lifecycle",
            Self::Internal => "internal",
        }
    }

    /// Returns true if the simulation can continue past this error.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Content | Self::Validation)
    }
}

/// Common trait for all battle-core errors.
///
/// # Implementation Guidelines
///
/// - All error enums should implement this trait
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait SimError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Default implementation uses the error type name.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
