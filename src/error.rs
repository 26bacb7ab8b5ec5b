//! Error types for the error-correcting parser.

use crate::symbol::Symbol;
use thiserror::Error;

/// Errors that can occur during grammar construction and parsing.
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("{file}:{line}: malformed production: {reason}")]
    MalformedGrammar {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("no finite ε-derivation exists for {symbol}; the grammar derives no terminal string")]
    CycleWithoutBase { symbol: Symbol },

    #[error("no derivation covers {input:?}; the covering grammar lacks its insertion rules")]
    NoDerivation { input: String },

    #[error("no split of span ({start}, {end}) reproduces cost {errors} for {symbol}")]
    TreeReconstruction {
        symbol: Symbol,
        start: usize,
        end: usize,
        errors: u32,
    },

    #[error("{symbol} has no zero-cost terminal rule to substitute")]
    MissingZeroCostTerminal { symbol: Symbol },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, GrammarError>;
