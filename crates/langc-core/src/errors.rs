//! Diagnostics: the error kinds of §7 and the accumulation policy that binds
//! them to strict-mode / IDE-mode compilation.

use crate::source::SourceLocation;
use thiserror::Error;

/// One of the error kinds enumerated in §7.
///
/// Grouped the same way the teacher groups `ExcType`: a flat enum carrying
/// just enough payload to format a useful message, with the heavier context
/// (which class, which variable) folded into the message text rather than
/// typed fields, since this crate has no structured-error consumer the way
/// `monty-python`/`monty-js` consume `ExcType` across an FFI boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileErrorKind {
    #[error("unknown identifier '{0}'")]
    LookupError(String),
    #[error("duplicate declaration of '{0}'")]
    DuplicateDeclaration(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("override error: {0}")]
    OverrideError(String),
    #[error("match error: {0}")]
    MatchError(String),
    #[error("argument error: {0}")]
    ArgError(String),
    #[error("modifier error: {0}")]
    ModifierError(String),
    #[error("'{0}' is referenced in its own initialiser")]
    SelfReferenceError(String),
    #[error("cyclic inheritance involving class '{0}'")]
    CyclicInheritance(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// A single reported diagnostic: a [`CompileErrorKind`] plus the location it
/// was raised at.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{location}: {kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub location: SourceLocation,
}

impl CompileError {
    #[must_use]
    pub fn new(kind: CompileErrorKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

/// Accumulates [`CompileError`]s produced during a single compilation and
/// applies the strict-mode / IDE-mode policy from §7.
///
/// In strict mode (`ide_mode = false` on [`crate::context::CompilationContext`]),
/// the resolver keeps running (so later passes can still be exercised by
/// tests) but [`Diagnostics::into_result`] surfaces only the first error. In
/// IDE-plugin mode all accumulated errors are returned.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
    ide_mode: bool,
}

impl Diagnostics {
    #[must_use]
    pub fn new(ide_mode: bool) -> Self {
        Self { errors: Vec::new(), ide_mode }
    }

    pub fn report(&mut self, kind: CompileErrorKind, location: SourceLocation) {
        self.errors.push(CompileError::new(kind, location));
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Consumes the accumulator, applying the strict/IDE policy.
    ///
    /// * Strict mode: `Err` with only the first error once at least one was
    ///   reported, `Ok(())` otherwise.
    /// * IDE mode: always `Ok(())` — callers are expected to inspect
    ///   [`Diagnostics::errors`] themselves rather than short-circuit on `Err`.
    pub fn into_result(self) -> Result<Vec<CompileError>, CompileError> {
        if self.ide_mode {
            Ok(self.errors)
        } else if let Some(first) = self.errors.into_iter().next() {
            Err(first)
        } else {
            Ok(Vec::new())
        }
    }
}
