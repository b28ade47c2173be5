//! In-memory terminal backend for tests.

use crate::error::Result;
use crate::geometry::Size;

use super::Terminal;

/// A fixed-size backend recording every written frame.
#[derive(Debug)]
pub struct TestBackend {
    size: Size,
    /// Every frame written, in order.
    pub frames: Vec<String>,
    /// Whether [`Terminal::prepare`] has run without a matching restore.
    pub prepared: bool,
}

impl TestBackend {
    /// Create a backend reporting the given size.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            frames: Vec::new(),
            prepared: false,
        }
    }

    /// The most recently written frame.
    pub fn last_frame(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }

    /// Simulate a terminal resize.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }
}

impl Terminal for TestBackend {
    fn size(&self) -> Result<Size> {
        Ok(self.size)
    }

    fn prepare(&mut self) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        self.prepared = false;
        Ok(())
    }

    fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.frames.push(frame.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_frames_in_order() {
        let mut backend = TestBackend::new(Size::new(10, 4));
        backend.write_frame("one").ok();
        backend.write_frame("two").ok();
        assert_eq!(backend.last_frame(), Some("two"));
        assert_eq!(backend.frames.len(), 2);
    }

    #[test]
    fn prepare_restore_toggles() {
        let mut backend = TestBackend::new(Size::new(10, 4));
        backend.prepare().ok();
        assert!(backend.prepared);
        backend.restore().ok();
        assert!(!backend.prepared);
    }
}
