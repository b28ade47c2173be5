//! Error types for lattice-core.

use std::io;

/// Error type for lattice-core operations.
#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Terminal operation failed.
    #[error("terminal error: {0}")]
    Terminal(String),

    /// Invalid configuration (bad numeric conversion, rejected attribute).
    #[error("configuration error: {0}")]
    Config(String),

    /// Layout violation (child exceeding parent, degenerate dimensions).
    #[error("layout error: {0}")]
    Layout(String),

    /// Styling error.
    #[error("style error: {0}")]
    Style(String),

    /// An event or timer handler failed.
    #[error("handler error: {0}")]
    Handler(String),

    /// Rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// Unrecoverable failure; the engine tears down the terminal and exits.
    #[error("fatal error: {0}")]
    Fatal(String),
}

/// Result type alias for lattice-core operations.
pub type Result<T> = std::result::Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LatticeError::Terminal("no tty".into());
        assert_eq!(err.to_string(), "terminal error: no tty");
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: LatticeError = io_err.into();
        assert!(matches!(err, LatticeError::Io(_)));
    }

    #[test]
    fn config_error_display() {
        let err = LatticeError::Config("width < 1".into());
        assert_eq!(err.to_string(), "configuration error: width < 1");
    }
}
