//! Error types for the codec core.

use thiserror::Error;

/// Result type for codec operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for the bind/array codec core.
///
/// Every variant is classified by [`Error::is_broken`] as either a "healthy"
/// error (the current statement fails, the connection stays usable) or a
/// "broken" error (the connection must be discarded).
#[derive(Debug, Error)]
pub enum Error {
    /// The configured buffer capacity is smaller than an atomic header the
    /// writer must emit in one piece. A configuration bug, not a runtime
    /// condition a caller can retry past.
    #[error("buffer capacity {capacity} is smaller than required header size {required}")]
    BufferTooSmall {
        /// Configured buffer capacity.
        capacity: usize,
        /// Size the header needed to be emitted atomically.
        required: usize,
    },

    /// No handler in the registry matches the host value's type for the
    /// requested OID/db-type-hint.
    #[error("no handler for host type {host_type} (oid {oid:?})")]
    InvalidCast {
        /// Name of the host type that failed to bind.
        host_type: &'static str,
        /// Target OID, if one was specified.
        oid: Option<u32>,
    },

    /// An array's element OID did not match the expected element handler.
    #[error("array element oid mismatch: expected {expected}, found {found}")]
    OidMismatch {
        /// OID the element handler was built for.
        expected: u32,
        /// OID actually present on the wire.
        found: u32,
    },

    /// Binary format was requested for a handler that only supports text.
    #[error("oid {oid} has no binary representation")]
    UnsupportedBinaryFormat {
        /// OID of the offending type.
        oid: u32,
    },

    /// The backend is configured in a way this codec cannot speak, e.g.
    /// legacy floating-point timestamps (`integer_datetimes = off`).
    #[error("unsupported backend option: {0}")]
    UnsupportedBackendOption(String),

    /// Feature named by the spec but intentionally not implemented, e.g.
    /// text-format parameter encoding.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A read fully consumed its declared bytes but the bytes did not form
    /// a valid value. Safe to surface to the caller without breaking the
    /// connection. May aggregate more than one inner failure (see
    /// [`crate::array::ArrayCodec`] read path).
    #[error("{} safe read error(s): {}", .0.len(), join_display(.0))]
    SafeReadError(Vec<SafeReadFailure>),

    /// A read or write failed in a way that leaves buffer/cursor state
    /// inconsistent. The connection is no longer trustworthy.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A codec was re-entered (`prepare_*`) before its previous operation
    /// reached a terminal state.
    #[error("concurrent operation on a codec still in progress")]
    ConcurrentOperation,

    /// Portal/statement name failed ASCII/NUL validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A parameter with `is_input_direction = false` was handed to the
    /// `Bind` writer. `Bind` only ever carries input parameters; OUT/INOUT
    /// procedure parameters are a Non-goal.
    #[error("parameter {index} is not input-direction; Bind only carries input parameters")]
    NotInputParameter {
        /// Index of the offending parameter within the `Bind` parameter list.
        index: usize,
    },

    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One element-level failure folded into a [`Error::SafeReadError`].
#[derive(Debug)]
pub struct SafeReadFailure {
    /// Flat row-major index of the offending element.
    pub element_index: usize,
    /// What went wrong decoding that element.
    pub message: String,
}

impl std::fmt::Display for SafeReadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.element_index, self.message)
    }
}

fn join_display(failures: &[SafeReadFailure]) -> String {
    failures
        .iter()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Returns true if the error indicates the connection is broken and
    /// cannot be reused for another statement.
    pub fn is_broken(&self) -> bool {
        matches!(
            self,
            Error::BufferTooSmall { .. }
                | Error::OidMismatch { .. }
                | Error::UnsupportedBackendOption(_)
                | Error::ProtocolError(_)
                | Error::ConcurrentOperation
                | Error::Io(_)
        )
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized> From<zerocopy::error::CastError<Src, Dst>>
    for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::ProtocolError(format!("zerocopy cast error: {err:?}"))
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cast_is_healthy() {
        let err = Error::InvalidCast {
            host_type: "i32",
            oid: Some(25),
        };
        assert!(!err.is_broken());
    }

    #[test]
    fn oid_mismatch_is_broken() {
        let err = Error::OidMismatch {
            expected: 23,
            found: 25,
        };
        assert!(err.is_broken());
    }

    #[test]
    fn not_input_parameter_is_healthy() {
        let err = Error::NotInputParameter { index: 1 };
        assert!(!err.is_broken());
    }

    #[test]
    fn safe_read_error_is_healthy_and_aggregates() {
        let err = Error::SafeReadError(vec![
            SafeReadFailure {
                element_index: 0,
                message: "bad utf8".into(),
            },
            SafeReadFailure {
                element_index: 2,
                message: "overflow".into(),
            },
        ]);
        assert!(!err.is_broken());
        let rendered = err.to_string();
        assert!(rendered.contains("2 safe read error"));
    }
}
