//! Error kinds surfaced by the scheduling core.
//!
//! Every fatal condition the core can hit is represented here; there is no
//! partial-result variant. Callers of [`crate::Runtime::iterate`] get a
//! single `Err(SpiderError)` with a formatted message and a kind tag.

use thiserror::Error;

/// Result alias used at every fallible boundary of the crate.
pub type SpiderResult<T> = Result<T, SpiderError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpiderError {
    #[error("expression parse error: {message}")]
    ExpressionParse { message: String },

    #[error("balance equation violated on edge {edge}: {message}")]
    BalanceEquation { edge: String, message: String },

    #[error("unable to map vertex `{vertex}` on any processing element")]
    MappingUnsatisfiable { vertex: String },

    #[error("memory allocation failure: requested {requested} bytes, {available} available")]
    MemoryAllocationFailure { requested: u64, available: u64 },

    #[error("double free of buffer at virtual address {address:#x}")]
    DoubleFree { address: u64 },

    #[error("negative deallocate count on buffer at virtual address {address:#x}")]
    NegativeDeallocate { address: u64 },

    #[error("invalid API usage: {message}")]
    InvalidApiUsage { message: String },
}

impl SpiderError {
    /// Short machine-readable tag, mirroring the `kind` field the original
    /// runtime attaches to its exception-style errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SpiderError::ExpressionParse { .. } => "ExpressionParseError",
            SpiderError::BalanceEquation { .. } => "BalanceEquationError",
            SpiderError::MappingUnsatisfiable { .. } => "MappingUnsatisfiable",
            SpiderError::MemoryAllocationFailure { .. } => "MemoryAllocationFailure",
            SpiderError::DoubleFree { .. } => "DoubleFree",
            SpiderError::NegativeDeallocate { .. } => "NegativeDeallocate",
            SpiderError::InvalidApiUsage { .. } => "InvalidAPIUsage",
        }
    }
}
