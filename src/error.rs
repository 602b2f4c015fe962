//! Error types for the memoization layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Memo Error Enum ==
/// Errors raised by the cache itself.
///
/// Producer failures are never wrapped in this type; they reach the caller
/// unchanged. `MemoError` only covers what the cache can get wrong on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoError {
    /// Arguments could not be turned into a cache key
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Wrapper configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, MemoError>;
