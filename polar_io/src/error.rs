//! Error types for polar_io operations.

use core::fmt;

use polar_core::PolarCoreError;

/// Errors that can occur while reading or writing prediction files.
#[derive(Debug, Clone, PartialEq)]
pub enum PolarIoError {
    /// I/O error from the operating system.
    Io(String),

    /// A scan path could not be mapped to an output location.
    InvalidPath {
        /// The offending path, lossily converted.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A label file has a size that is not a whole number of codes.
    InvalidFormat {
        /// Description of the format error.
        message: &'static str,
    },

    /// Label count does not match the number of points in the scan.
    LengthMismatch {
        /// Number of points expected.
        expected: usize,
        /// Number of labels found.
        got: usize,
    },

    /// Error bubbled up from polar_core.
    Core(PolarCoreError),
}

impl fmt::Display for PolarIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolarIoError::Io(msg) => write!(f, "I/O error: {}", msg),
            PolarIoError::InvalidPath { path, reason } => {
                write!(f, "invalid scan path '{}': {}", path, reason)
            }
            PolarIoError::InvalidFormat { message } => {
                write!(f, "invalid label file: {}", message)
            }
            PolarIoError::LengthMismatch { expected, got } => {
                write!(
                    f,
                    "label count mismatch: expected {}, got {}",
                    expected, got
                )
            }
            PolarIoError::Core(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PolarIoError {}

impl From<std::io::Error> for PolarIoError {
    fn from(err: std::io::Error) -> Self {
        PolarIoError::Io(err.to_string())
    }
}

impl From<PolarCoreError> for PolarIoError {
    fn from(err: PolarCoreError) -> Self {
        PolarIoError::Core(err)
    }
}

/// Result type alias for polar_io operations.
pub type Result<T> = core::result::Result<T, PolarIoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PolarIoError::InvalidPath {
            path: "/tmp/scan.bin".into(),
            reason: "no 'sequences' component",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("/tmp/scan.bin"));
        assert!(msg.contains("sequences"));

        let err = PolarIoError::LengthMismatch {
            expected: 10,
            got: 7,
        };
        assert!(format!("{}", err).contains("10"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PolarIoError = io.into();
        assert!(matches!(err, PolarIoError::Io(ref m) if m.contains("denied")));
    }
}
