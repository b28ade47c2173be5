//! Append-only fragment builder for the serialized frame.
//!
//! The serializer appends many small fragments (escape prefixes, decimal
//! color triples, glyph bytes) per frame. Collecting them first and flushing
//! once lets the final string be allocated at its exact size instead of
//! growing through repeated reallocation.

use std::borrow::Cow;

/// An append-only rope of string fragments, flushed once into the final
/// frame string.
#[derive(Debug, Default)]
pub struct FrameRope {
    parts: Vec<Cow<'static, str>>,
    len: usize,
}

impl FrameRope {
    /// Create an empty rope with room for `fragments` parts.
    pub fn with_capacity(fragments: usize) -> Self {
        Self {
            parts: Vec::with_capacity(fragments),
            len: 0,
        }
    }

    /// Append a static fragment (escape prefixes, separators).
    pub fn push_static(&mut self, s: &'static str) {
        self.len += s.len();
        self.parts.push(Cow::Borrowed(s));
    }

    /// Append an owned fragment.
    pub fn push_owned(&mut self, s: String) {
        self.len += s.len();
        self.parts.push(Cow::Owned(s));
    }

    /// Append the decimal form of a byte (0..=255), avoiding a format call.
    pub fn push_decimal(&mut self, v: u8) {
        let mut buf = String::with_capacity(3);
        if v >= 100 {
            buf.push((b'0' + v / 100) as char);
        }
        if v >= 10 {
            buf.push((b'0' + (v / 10) % 10) as char);
        }
        buf.push((b'0' + v % 10) as char);
        self.len += buf.len();
        self.parts.push(Cow::Owned(buf));
    }

    /// Total byte length of the accumulated fragments.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no fragments were appended.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flush all fragments into a single exactly-sized string.
    pub fn concat(self) -> String {
        let mut out = String::with_capacity(self.len);
        for part in self.parts {
            out.push_str(&part);
        }
        out
    }
}
