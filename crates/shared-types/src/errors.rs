//! # Error Types
//!
//! Parsing errors for the shared primitives.

use thiserror::Error;

/// Errors raised when parsing primitives from their string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Chain ticker is not one of the supported chains.
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// Asset string is not `CHAIN.SYMBOL` or `CHAIN/SYMBOL`.
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// Hex string has the wrong length or alphabet.
    #[error("Invalid hex for {kind}: {value}")]
    InvalidHex { kind: &'static str, value: String },
}
