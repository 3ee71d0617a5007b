//! Typed failure kinds for density-matrix construction.
//!
//! Public operations return [`anyhow::Error`]; the variants here can be recovered from it with
//! [`anyhow::Error::downcast_ref`] when callers need to distinguish malformed input from
//! resource exhaustion.

use thiserror::Error;

/// Errors arising from link-table ingestion, parameter validation or scratch allocation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RdmError {
    /// The caller-supplied link tables or coefficient arrays are inconsistent with the declared
    /// string-space dimensions.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A scratch or accumulation buffer could not be reserved.
    #[error("unable to reserve {len} elements for {what}")]
    ResourceExhausted {
        /// Description of the buffer.
        what: &'static str,

        /// Number of `f64` elements requested.
        len: usize,
    },

    /// Control parameters are outside their admissible range.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Reserves a zero-filled `f64` buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_zeroed(what: &'static str, len: usize) -> Result<Vec<f64>, RdmError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| RdmError::ResourceExhausted { what, len })?;
    buf.resize(len, 0.0);
    Ok(buf)
}
