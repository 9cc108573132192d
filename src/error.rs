//! Error types for the SPI bridge.

use std::ffi::NulError;
use thiserror::Error;

use crate::types::ValueError;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bridge operations.
///
/// Every variant except [`Error::Executor`] describes a bad call shape detected
/// locally. `Executor` errors are passed through from the native boundary
/// without interpretation.
#[derive(Error, Debug)]
pub enum Error {
    /// Command text is empty or whitespace.
    #[error("Command text must not be empty")]
    EmptyCommand,

    /// Named and unnamed parameters were combined in one command.
    #[error("Command parameters must be either all named or all positional")]
    MixedParameterStyle,

    /// Type has no native OID mapping.
    #[error("Unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    /// Legacy type tag does not decode to any known type.
    #[error("Unsupported legacy type tag: {tag:#x}")]
    UnsupportedLegacyType { tag: i32 },

    /// Column not found.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Column index out of bounds.
    #[error("Column index {index} out of bounds (columns: {count})")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    /// Value cannot be represented as the requested type.
    #[error("Cannot read column {column} as {target}: {source}")]
    InvalidCast {
        column: String,
        target: &'static str,
        #[source]
        source: ValueError,
    },

    /// Value access before the first successful read.
    #[error("No current row; call read() first")]
    NoCurrentRow,

    /// Reader has already been closed.
    #[error("Reader is closed")]
    ReaderClosed,

    /// Failure reported by the native executor.
    #[error("Executor error {code}: {message}")]
    Executor { code: i32, message: String },

    /// Native value could not be decoded.
    #[error("Cannot decode value of type {oid}: {message}")]
    Decode { oid: u32, message: String },

    /// Malformed connection string.
    #[error("Invalid connection string: {message}")]
    InvalidConnectionString { message: String },

    /// Text passed across the boundary contained an interior NUL byte.
    #[error("Interior NUL byte in native string: {0}")]
    Nul(#[from] NulError),
}

impl Error {
    /// Create an executor error.
    pub fn executor(code: i32, message: impl Into<String>) -> Self {
        Self::Executor {
            code,
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(oid: u32, message: impl Into<String>) -> Self {
        Self::Decode {
            oid,
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Whether the executor rejected the call, as opposed to a local error.
    pub fn is_executor(&self) -> bool {
        matches!(self, Error::Executor { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_errors_are_distinguishable() {
        let err = Error::executor(-6, "syntax error at or near \"selec\"");
        assert!(err.is_executor());
        assert_eq!(
            err.to_string(),
            "Executor error -6: syntax error at or near \"selec\""
        );

        assert!(!Error::EmptyCommand.is_executor());
        assert!(!Error::MixedParameterStyle.is_executor());
    }

    #[test]
    fn test_invalid_cast_keeps_its_cause() {
        use std::error::Error as _;

        let err = Error::InvalidCast {
            column: "score".to_string(),
            target: "i32",
            source: ValueError::Null,
        };
        assert_eq!(err.to_string(), "Cannot read column score as i32: value is NULL");
        assert_eq!(err.source().map(|e| e.to_string()), Some("value is NULL".to_string()));
        assert!(!err.is_executor());
    }

    #[test]
    fn test_display_legacy_tag() {
        let err = Error::UnsupportedLegacyType { tag: 0x4000_0013 };
        assert_eq!(err.to_string(), "Unsupported legacy type tag: 0x40000013");
    }
}
