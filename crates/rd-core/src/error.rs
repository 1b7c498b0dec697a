//! Error types for retrodbg

use thiserror::Error;

/// Main error type for the debugging engine
///
/// Lookups that simply find nothing (unknown breakpoint id, register name,
/// and so on) are reported through `bool`/`Option` returns instead.
#[derive(Error, Debug)]
pub enum DebugError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Result type alias for debugger operations
pub type Result<T> = std::result::Result<T, DebugError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DebugError::UnsupportedArchitecture("SH2".to_string());
        assert_eq!(format!("{}", err), "Unsupported architecture: SH2");

        let err = DebugError::MalformedRecord {
            line: 3,
            reason: "missing fields".to_string(),
        };
        assert_eq!(format!("{}", err), "Malformed record on line 3: missing fields");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DebugError = io_err.into();
        assert!(matches!(err, DebugError::Io(_)));
    }
}
