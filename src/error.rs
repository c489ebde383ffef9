//! Crate-wide error types.

use thiserror::Error;

use crate::expr::ExprError;

/// Errors raised by the graph-grammar engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The edge/vertex reciprocity invariant was violated by a mutation
    /// that was not covered by an ignore-set. Signals a rule-authoring or
    /// engine bug; the current derivation cannot continue.
    #[error("incongruent graph state: {0}")]
    IncongruentGraphState(String),

    /// A value of the wrong kind was passed where an element of a specific
    /// kind, or a valid hierarchy level, was required.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// An attribute, condition, or variable expression failed to parse or
    /// evaluate. Aborts the whole derivation run.
    #[error("expression error: {0}")]
    Expr(#[from] ExprError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
