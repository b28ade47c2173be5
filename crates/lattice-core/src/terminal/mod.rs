//! Terminal abstraction for backend-agnostic frame output.
//!
//! The engine produces whole precomposed ANSI frames; a backend only needs
//! to configure the terminal, report its size, and write frames. The
//! crossterm backend drives a real terminal; the test backend records
//! frames for assertions without a TTY.

mod crossterm_backend;
mod test_backend;

pub use crossterm_backend::CrosstermBackend;
pub use test_backend::TestBackend;

use crate::error::Result;
use crate::geometry::Size;

/// Abstraction over terminal backends.
pub trait Terminal: Send {
    /// Current terminal dimensions.
    fn size(&self) -> Result<Size>;

    /// Enter the rendering configuration: raw mode, alternate screen,
    /// hidden cursor, all-motion mouse reporting.
    fn prepare(&mut self) -> Result<()>;

    /// Restore the terminal to its pre-[`Terminal::prepare`] state.
    fn restore(&mut self) -> Result<()>;

    /// Write one complete frame in a single call and flush.
    fn write_frame(&mut self, frame: &str) -> Result<()>;
}
