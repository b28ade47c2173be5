//! File-stream watching and in-process output capture.
//!
//! [`FileStreamer`] observes named paths — change notifications arrive
//! through a watcher, and every poll also compares file lengths so changes
//! are never missed between events. Handlers receive the bytes appended
//! since the previous poll. [`CaptureStream`] mirrors the same handler
//! model for lines written to an in-process sink instead of a file.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

use crate::error::{LatticeError, Result};

/// Invoked with the path and the newly appended content.
pub type StreamHandler = Box<dyn FnMut(&Path, &str) + Send>;

struct WatchEntry {
    handlers: Vec<StreamHandler>,
    consumed: u64,
}

/// Watches registered paths and notifies handlers on appended content.
pub struct FileStreamer {
    watcher: Option<RecommendedWatcher>,
    events: Option<mpsc::Receiver<notify::Result<notify::Event>>>,
    entries: HashMap<PathBuf, WatchEntry>,
}

impl Default for FileStreamer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStreamer {
    /// Create a streamer with no watched paths.
    pub fn new() -> Self {
        Self {
            watcher: None,
            events: None,
            entries: HashMap::new(),
        }
    }

    /// Watch `path` and call `handler` with content appended after this
    /// call. Missing files are an error; watching the same path again adds
    /// another handler.
    pub fn watch(&mut self, path: impl AsRef<Path>, handler: StreamHandler) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path)?.len();

        if let Some(entry) = self.entries.get_mut(&path) {
            entry.handlers.push(handler);
            return Ok(());
        }

        if self.watcher.is_none() {
            let (tx, rx) = mpsc::channel();
            let watcher = notify::recommended_watcher(move |event| {
                let _ = tx.send(event);
            })
            .map_err(|e| LatticeError::Io(std::io::Error::other(e)))?;
            self.watcher = Some(watcher);
            self.events = Some(rx);
        }
        if let Some(watcher) = self.watcher.as_mut() {
            watcher
                .watch(&path, RecursiveMode::NonRecursive)
                .map_err(|e| LatticeError::Io(std::io::Error::other(e)))?;
        }

        self.entries.insert(
            path,
            WatchEntry {
                handlers: vec![handler],
                consumed: len,
            },
        );
        Ok(())
    }

    /// Number of watched paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain pending notifications and compare every watched file's
    /// length; handlers run for each path with appended content. Returns
    /// how many paths changed.
    pub fn poll(&mut self) -> usize {
        // Drain the event queue; length comparison below decides the work.
        if let Some(rx) = &self.events {
            while rx.try_recv().is_ok() {}
        }

        let mut changed = 0;
        for (path, entry) in &mut self.entries {
            let Ok(metadata) = std::fs::metadata(path) else {
                warn!(path = %path.display(), "watched file unreadable; skipping");
                continue;
            };
            let len = metadata.len();
            if len < entry.consumed {
                // Truncated: start over from the top.
                entry.consumed = 0;
            }
            if len == entry.consumed {
                continue;
            }
            match read_appended(path, entry.consumed) {
                Ok(appended) => {
                    entry.consumed = len;
                    for handler in &mut entry.handlers {
                        handler(path, &appended);
                    }
                    changed += 1;
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to read appended content");
                }
            }
        }
        changed
    }
}

impl std::fmt::Debug for FileStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStreamer")
            .field("paths", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn read_appended(path: &Path, from: u64) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(from))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Invoked with each complete line captured from the sink.
pub type LineHandler = Box<dyn FnMut(&str) + Send>;

/// Captures lines written to an in-process sink, mirroring how standard
/// output would otherwise scroll away under the alternate screen.
pub struct CaptureStream {
    shared: Arc<Mutex<Vec<u8>>>,
    consumed: usize,
    handlers: Vec<LineHandler>,
}

impl Default for CaptureStream {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureStream {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Vec::new())),
            consumed: 0,
            handlers: Vec::new(),
        }
    }

    /// A writable handle feeding this capture. Clones share the buffer.
    pub fn sink(&self) -> CaptureSink {
        CaptureSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register a handler for captured lines.
    pub fn on_line(&mut self, handler: LineHandler) {
        self.handlers.push(handler);
    }

    /// Deliver complete lines written since the previous poll. Returns the
    /// number of lines delivered.
    pub fn poll(&mut self) -> usize {
        let pending: Vec<String> = {
            let Ok(buffer) = self.shared.lock() else {
                return 0;
            };
            let fresh = &buffer[self.consumed..];
            let Some(last_newline) = fresh.iter().rposition(|&b| b == b'\n') else {
                return 0;
            };
            let complete = &fresh[..=last_newline];
            self.consumed += last_newline + 1;
            String::from_utf8_lossy(complete)
                .lines()
                .map(str::to_owned)
                .collect()
        };
        let mut delivered = 0;
        for line in &pending {
            for handler in &mut self.handlers {
                handler(line);
            }
            delivered += 1;
        }
        delivered
    }
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("consumed", &self.consumed)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// The writable end of a [`CaptureStream`].
#[derive(Clone)]
pub struct CaptureSink {
    shared: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.shared.lock() {
            Ok(mut shared) => {
                shared.extend_from_slice(buf);
                Ok(buf.len())
            }
            Err(_) => Err(std::io::Error::other("capture buffer poisoned")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
