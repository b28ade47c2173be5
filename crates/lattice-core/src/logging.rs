//! File-backed logging.
//!
//! The terminal owns stdout while the engine runs, so log records go to a
//! configured file as newline-delimited entries. Library code emits
//! through `tracing`; installing a subscriber is the host's choice and
//! this helper is the default one.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{LatticeError, Result};

/// Install a global `tracing` subscriber appending newline-delimited
/// records to `path`. Respects `RUST_LOG`; defaults to `info`. Fails if a
/// global subscriber is already installed.
pub fn init_file_logger(path: impl AsRef<Path>) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| LatticeError::Config(format!("logger already installed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_writes_to_file() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(_) => return,
        };
        let path = dir.path().join("engine.log");
        // Only one global subscriber can exist per process; a second init
        // must fail cleanly rather than panic.
        let first = init_file_logger(&path);
        let second = init_file_logger(&path);
        assert!(first.is_ok() || second.is_err());
        if first.is_ok() {
            tracing::info!("logger smoke line");
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            assert!(content.contains("logger smoke line"));
        }
    }
}
