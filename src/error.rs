//! The crate's error type (§7 Error Handling Design).
//!
//! `spec.md` distinguishes two taxa: conservative give-up (represented
//! in-band as `Unknown`/`AlwaysExclusive`, never an `Err`) and structural
//! failure (a malformed AST the analysis cannot proceed past at all,
//! returned as `Err`). `AnalysisError` is hand-rolled rather than built on
//! `thiserror` — the teacher crate depends on neither `thiserror` nor
//! `anyhow` anywhere, and instead writes its own `enum` with manual
//! `Display`/`std::error::Error` impls, exactly the shape of
//! `ouros::repl_error::ReplError`.

use crate::ast::Identifier;
use crate::source::SourceSpan;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// A `Var` referred to a name with no binding in scope.
    UnboundIdentifier { name_span: SourceSpan },
    /// An `App`'s callee evaluated to something other than a function
    /// value or `Unknown`.
    NotAFunction { at: SourceSpan },
    /// A `CallProc` named a component that either doesn't exist or isn't a
    /// procedure.
    UnknownProcedure { at: SourceSpan },
    /// A module referenced an external library that was never supplied, or
    /// whose dependency graph contains a cycle.
    UnresolvedLibrary { name: String },
    /// A `Fixpoint` form reached the evaluator. The analysis does not unroll
    /// recursive definitions, so this aborts rather than guessing.
    UnanalyzableFixpoint { at: SourceSpan },
    /// An `App` node carried an empty argument list.
    EmptyApplication { at: SourceSpan },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::UnboundIdentifier { name_span } => {
                write!(f, "unbound identifier at {name_span}")
            }
            AnalysisError::NotAFunction { at } => write!(f, "applied a non-function value at {at}"),
            AnalysisError::UnknownProcedure { at } => write!(f, "call to an unknown procedure at {at}"),
            AnalysisError::UnresolvedLibrary { name } => {
                write!(f, "external library `{name}` could not be resolved (missing or cyclic dependency)")
            }
            AnalysisError::UnanalyzableFixpoint { at } => {
                write!(f, "cannot analyze a fixpoint form at {at}")
            }
            AnalysisError::EmptyApplication { at } => {
                write!(f, "`App` with an empty argument list at {at}")
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

impl AnalysisError {
    #[must_use]
    pub fn unbound_identifier(id: Identifier) -> Self {
        AnalysisError::UnboundIdentifier { name_span: id.span }
    }

    #[must_use]
    pub fn not_a_function(at: SourceSpan) -> Self {
        AnalysisError::NotAFunction { at }
    }

    #[must_use]
    pub fn unknown_procedure(at: SourceSpan) -> Self {
        AnalysisError::UnknownProcedure { at }
    }

    #[must_use]
    pub fn unresolved_library(name: impl Into<String>) -> Self {
        AnalysisError::UnresolvedLibrary { name: name.into() }
    }

    #[must_use]
    pub fn unanalyzable_fixpoint(at: SourceSpan) -> Self {
        AnalysisError::UnanalyzableFixpoint { at }
    }

    #[must_use]
    pub fn empty_application(at: SourceSpan) -> Self {
        AnalysisError::EmptyApplication { at }
    }
}
