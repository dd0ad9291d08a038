//! Compile errors for the specialization core.
//!
//! All three call-protocol failures are reported, never silently
//! recovered, and never retried: compilation is deterministic, so
//! retrying with the same inputs reproduces the same error.

use crate::ast::Span;
use crate::code::Code;
use crate::equivalence::Divergence;
use crate::shape::{format_shape, Shape};

pub type Result<T> = std::result::Result<T, CompilerError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// The body, under the given parameter shape/value, performs an
    /// operation that shape cannot support (structural addressing of a
    /// missing position, applying a non-applicable value, ...).
    /// Fatal for the compilation unit being processed.
    UnresolvedOperation(String, Option<Span>),

    /// Monomorphic call whose argument does not nest under the declared
    /// parameter shape. Local to one call site; the definition and all
    /// other call sites stay valid.
    ArgumentShapeMismatch {
        expected: Shape,
        actual: Shape,
        span: Option<Span>,
    },

    /// Polymorphic call whose regenerated code differs structurally from
    /// the canonical compilation: the body's behavior is not uniform
    /// across the shapes it accepts. Local to one call site.
    SpecializationDivergence {
        canonical: Box<Code>,
        candidate: Box<Code>,
        divergence: Divergence,
        span: Option<Span>,
    },

    /// A chain of nested specializations exceeded the depth bound.
    SpecializationDepthExceeded(usize, Option<Span>),
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CompilerError::UnresolvedOperation(msg, span) => {
                write!(f, "Unresolved operation{}: {}", at(span), msg)
            }
            CompilerError::ArgumentShapeMismatch {
                expected,
                actual,
                span,
            } => {
                write!(
                    f,
                    "Argument shape mismatch{}: a value shaped {} does not nest under the declared parameter shape {}",
                    at(span),
                    format_shape(actual),
                    format_shape(expected)
                )
            }
            CompilerError::SpecializationDivergence {
                divergence, span, ..
            } => {
                write!(
                    f,
                    "Specialization divergence{}: at {} the canonical code is `{}` but this call site regenerated `{}`",
                    at(span),
                    divergence.location(),
                    divergence.canonical_op,
                    divergence.candidate_op
                )
            }
            CompilerError::SpecializationDepthExceeded(depth, span) => {
                write!(
                    f,
                    "Specialization depth exceeded{}: {} nested specializations without reaching a fixed body",
                    at(span),
                    depth
                )
            }
        }
    }
}

impl std::error::Error for CompilerError {}

fn at(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" at {}", span),
        None => String::new(),
    }
}

/// Construct an `UnresolvedOperation` error with a span.
#[macro_export]
macro_rules! err_unresolved_at {
    ($span:expr, $($arg:tt)*) => {
        $crate::error::CompilerError::UnresolvedOperation(format!($($arg)*), Some($span))
    };
}

/// Return early with an `UnresolvedOperation` error.
#[macro_export]
macro_rules! bail_unresolved_at {
    ($span:expr, $($arg:tt)*) => {
        return Err($crate::err_unresolved_at!($span, $($arg)*))
    };
}
