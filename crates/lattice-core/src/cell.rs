//! Cell type — a single position of the character grid.
//!
//! A cell carries one glyph (a plain ASCII byte in the common case, a
//! heap-allocated UTF-8 grapheme otherwise), a foreground and background
//! color with alpha, the flags the run encoder stamps onto it, and its
//! display width. Wide graphemes (CJK, emoji) occupy two columns: the
//! primary cell holds the glyph and a continuation cell fills the second
//! column so the grid stays column-accurate.

use unicode_width::UnicodeWidthStr;

use crate::color::{Rgba, named};

/// Flag bits carried by a [`Cell`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellFlags(u8);

impl CellFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The glyph is a multibyte UTF-8 grapheme.
    pub const UNICODE: Self = Self(1);
    /// The cell opens an encoded run (stamped by the encoder).
    pub const ENCODE_START: Self = Self(2);
    /// The cell closes an encoded run (stamped by the encoder).
    pub const ENCODE_END: Self = Self(4);

    /// Check whether all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0 && other.0 != 0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for CellFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The character content of a cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Glyph {
    /// A single ASCII byte.
    Ascii(u8),
    /// A UTF-8 grapheme cluster.
    Grapheme(String),
}

impl Glyph {
    /// The glyph as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            // ASCII bytes are valid single-byte UTF-8 by construction.
            Glyph::Ascii(b) => {
                let bytes = std::slice::from_ref(b);
                std::str::from_utf8(bytes).unwrap_or(" ")
            }
            Glyph::Grapheme(s) => s.as_str(),
        }
    }

    /// Returns true for the default space glyph.
    pub fn is_space(&self) -> bool {
        matches!(self, Glyph::Ascii(b' '))
    }

    /// Display width in columns (1 for most glyphs, 2 for CJK/emoji,
    /// 0 for the empty continuation glyph).
    pub fn display_width(&self) -> u8 {
        match self {
            Glyph::Ascii(_) => 1,
            Glyph::Grapheme(s) => UnicodeWidthStr::width(s.as_str()) as u8,
        }
    }
}

impl From<char> for Glyph {
    fn from(c: char) -> Self {
        if c.is_ascii() {
            Glyph::Ascii(c as u8)
        } else {
            Glyph::Grapheme(c.to_string())
        }
    }
}

impl From<&str> for Glyph {
    fn from(s: &str) -> Self {
        if s.len() == 1 && s.is_ascii() {
            Glyph::Ascii(s.as_bytes()[0])
        } else {
            Glyph::Grapheme(s.to_string())
        }
    }
}

/// A single cell of the frame buffer. Once placed in a buffer a cell is
/// treated as immutable; the pipeline replaces cells rather than editing
/// them in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// The displayed glyph.
    pub glyph: Glyph,
    /// Foreground color.
    pub fg: Rgba,
    /// Background color.
    pub bg: Rgba,
    /// Encoder and content flags.
    pub flags: CellFlags,
    /// Display width (1 for most glyphs, 2 for CJK/emoji, 0 for the
    /// continuation half of a wide glyph).
    pub width: u8,
}

impl Cell {
    /// Create a new cell; the UNICODE flag and display width are derived
    /// from the glyph.
    pub fn new(glyph: impl Into<Glyph>, fg: Rgba, bg: Rgba) -> Self {
        let glyph = glyph.into();
        let mut flags = CellFlags::NONE;
        if matches!(glyph, Glyph::Grapheme(_)) {
            flags.insert(CellFlags::UNICODE);
        }
        let width = glyph.display_width();
        Self {
            glyph,
            fg,
            bg,
            flags,
            width,
        }
    }

    /// A space with white-on-black default colors.
    pub fn blank() -> Self {
        Self::new(' ', named::WHITE.with_alpha(255), named::BLACK.with_alpha(255))
    }

    /// A space over the given background.
    pub fn filled(bg: Rgba) -> Self {
        Self::new(' ', named::WHITE.with_alpha(255), bg)
    }

    /// The placeholder filling the second column of a wide glyph. Carries
    /// the given colors so it joins the wide cell's encoded run.
    pub fn continuation(fg: Rgba, bg: Rgba) -> Self {
        Self {
            glyph: Glyph::Grapheme(String::new()),
            fg,
            bg,
            flags: CellFlags::NONE,
            width: 0,
        }
    }

    /// Returns true if the glyph is the default space.
    pub fn is_space(&self) -> bool {
        self.glyph.is_space()
    }

    /// Returns true for wide glyphs (display width above one column).
    pub fn is_wide(&self) -> bool {
        self.width > 1
    }

    /// Returns true for the continuation half of a wide glyph.
    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// True when this cell and `other` share both colors, making them part
    /// of the same encoded run.
    pub fn same_colors(&self, other: &Cell) -> bool {
        self.fg == other.fg && self.bg == other.bg
    }

    /// Clear encoder flags so a composited cell can be re-encoded.
    pub fn reset_encoding(&mut self) {
        self.flags.remove(CellFlags::ENCODE_START | CellFlags::ENCODE_END);
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::named;

    fn white() -> Rgba {
        named::WHITE.with_alpha(255)
    }

    fn black() -> Rgba {
        named::BLACK.with_alpha(255)
    }

    #[test]
    fn ascii_cell_has_no_unicode_flag() {
        let c = Cell::new('A', white(), black());
        assert!(!c.flags.contains(CellFlags::UNICODE));
        assert_eq!(c.glyph.as_str(), "A");
        assert_eq!(c.width, 1);
    }

    #[test]
    fn grapheme_cell_sets_unicode_flag() {
        let c = Cell::new("┌", white(), black());
        assert!(c.flags.contains(CellFlags::UNICODE));
        assert_eq!(c.glyph.as_str(), "┌");
        assert_eq!(c.width, 1);
    }

    #[test]
    fn cjk_cell_is_wide() {
        let c = Cell::new("\u{4e16}", white(), black()); // 世
        assert_eq!(c.width, 2);
        assert!(c.is_wide());
        assert!(!c.is_continuation());
    }

    #[test]
    fn emoji_cell_is_wide() {
        let c = Cell::new("\u{1f600}", white(), black());
        assert_eq!(c.width, 2);
        assert!(c.is_wide());
    }

    #[test]
    fn combining_mark_grapheme_is_narrow() {
        let c = Cell::new("e\u{301}", white(), black());
        assert_eq!(c.width, 1);
        assert!(!c.is_wide());
    }

    #[test]
    fn continuation_cell_shape() {
        let c = Cell::continuation(white(), black());
        assert_eq!(c.width, 0);
        assert!(c.is_continuation());
        assert!(c.glyph.as_str().is_empty());
        assert_eq!(c.fg, white());
        assert_eq!(c.bg, black());
    }

    #[test]
    fn continuation_joins_its_wide_cells_run() {
        let wide = Cell::new("\u{4e16}", white(), black());
        let cont = Cell::continuation(wide.fg, wide.bg);
        assert!(wide.same_colors(&cont));
    }

    #[test]
    fn blank_is_space() {
        let c = Cell::blank();
        assert!(c.is_space());
        assert_eq!(c.width, 1);
    }

    #[test]
    fn same_colors_ignores_glyph() {
        let a = Cell::new('A', named::RED.with_alpha(255), black());
        let b = Cell::new('B', named::RED.with_alpha(255), black());
        assert!(a.same_colors(&b));
    }

    #[test]
    fn different_backgrounds_break_runs() {
        let a = Cell::new('A', named::RED.with_alpha(255), black());
        let b = Cell::new('A', named::RED.with_alpha(255), named::BLUE.with_alpha(255));
        assert!(!a.same_colors(&b));
    }

    #[test]
    fn reset_encoding_clears_markers() {
        let mut c = Cell::blank();
        c.flags.insert(CellFlags::ENCODE_START | CellFlags::ENCODE_END);
        c.reset_encoding();
        assert!(!c.flags.contains(CellFlags::ENCODE_START));
        assert!(!c.flags.contains(CellFlags::ENCODE_END));
    }

    #[test]
    fn flags_bit_ops() {
        let mut f = CellFlags::NONE;
        f.insert(CellFlags::ENCODE_START);
        assert!(f.contains(CellFlags::ENCODE_START));
        assert!(!f.contains(CellFlags::ENCODE_END));
        f.remove(CellFlags::ENCODE_START);
        assert_eq!(f, CellFlags::NONE);
    }
}
