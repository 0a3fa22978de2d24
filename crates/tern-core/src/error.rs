//! Error types for the backend.
//!
//! Recoverable conditions (unresolved symbols, size-limit violations,
//! missing native bindings) are reported through the diagnostic log and
//! never abort a pass. The types here cover the per-unit encoding
//! results, plus the single fatal wrapper [`CodegenError`] that aborts a
//! whole module-emission call.

use thiserror::Error;

/// Failures while encoding a code unit to its binary form.
///
/// The two size-limit variants are recoverable per unit; everything else
/// indicates an internal inconsistency and is escalated as fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    /// A single method body exceeded the per-method code-size ceiling.
    #[error("method '{function}' is too large: {size} bytes")]
    MethodTooLarge {
        /// Simple name of the offending function.
        function: String,
        /// Encoded size that violated the ceiling.
        size: usize,
    },

    /// A unit's combined constant/member data exceeded the unit ceiling.
    #[error("code unit '{unit}' is too large: {size} bytes")]
    UnitTooLarge {
        /// Name of the offending unit.
        unit: String,
        /// Encoded size that violated the ceiling.
        size: usize,
    },

    /// The encoder hit a malformed construct it cannot recover from.
    #[error("internal encoder failure: {0}")]
    Internal(String),
}

/// Fatal failure of a whole module-emission call.
///
/// No partial artifact is returned when this is raised.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// An unexpected encoder failure, wrapped for escalation.
    #[error("code generation failed: {0}")]
    Encode(#[from] EncodeError),

    /// Internal inconsistency outside the encoder.
    #[error("internal codegen failure: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_error_messages() {
        let err = EncodeError::MethodTooLarge {
            function: "f".into(),
            size: 70_000,
        };
        assert_eq!(err.to_string(), "method 'f' is too large: 70000 bytes");
    }

    #[test]
    fn fatal_wraps_encode() {
        let fatal: CodegenError = EncodeError::Internal("bad IR node".into()).into();
        assert!(fatal.to_string().contains("bad IR node"));
    }
}
