//! Crossterm-based terminal backend.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, Show},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};

use crate::error::Result;
use crate::geometry::Size;

use super::Terminal;

/// Terminal backend using crossterm for real terminal I/O.
pub struct CrosstermBackend {
    prepared: bool,
}

impl CrosstermBackend {
    /// Create a backend; the terminal is untouched until
    /// [`Terminal::prepare`].
    pub fn new() -> Self {
        Self { prepared: false }
    }
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for CrosstermBackend {
    fn size(&self) -> Result<Size> {
        let (w, h) = terminal::size()?;
        Ok(Size::new(w, h))
    }

    fn prepare(&mut self) -> Result<()> {
        if !self.prepared {
            terminal::enable_raw_mode()?;
            execute!(io::stdout(), EnterAlternateScreen, Hide, EnableMouseCapture)?;
            self.prepared = true;
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        if self.prepared {
            execute!(io::stdout(), DisableMouseCapture, Show, LeaveAlternateScreen)?;
            terminal::disable_raw_mode()?;
            self.prepared = false;
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: &str) -> Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(frame.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        if self.prepared {
            let _ = execute!(io::stdout(), DisableMouseCapture, Show, LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
}
