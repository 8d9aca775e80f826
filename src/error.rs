//! Errors raised by the classification and aggregation engine.
//!
//! I/O and CLI edges use `anyhow`; the engine itself reports a closed set of
//! outcomes so callers can decide how to surface each one.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The sheet being aggregated has no `Flag ...` column, i.e. nothing was
    /// classified upstream.
    #[error("no Flag column found in the assignment sheet; run classify first")]
    MissingFlagColumn,

    /// The class/assignment filter matched zero rows.
    #[error("no rows matched {classes} class(es) and {assignments} assignment(s)")]
    NoMatchingData { classes: usize, assignments: usize },

    /// A Custom-mode parameter could not be read as a number and was replaced by 0.
    #[error("custom mode parameter {name} = {raw:?} is not a number, using 0")]
    InvalidModeParams { name: &'static str, raw: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
