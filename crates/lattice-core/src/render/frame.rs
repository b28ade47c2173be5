//! Frame serialization: encoded cell grid to a single ANSI string.
//!
//! Each encoded run costs one truecolor foreground command, one background
//! command, the glyph bytes of the run, and a reset. The cursor-home prefix
//! makes the whole frame a single idempotent write.

use crate::cell::{Cell, CellFlags};
use crate::rope::FrameRope;

/// CSI prefix.
const CSI: &str = "\x1b[";
/// Move the cursor to the top-left corner.
const CURSOR_HOME: &str = "\x1b[H";
/// Reset all SGR attributes.
const SGR_RESET: &str = "\x1b[0m";

/// Upper bound of fragments one cell can contribute, used to presize the
/// rope: fg command (8), bg command (8), glyph, reset.
const FRAGMENTS_PER_CELL: usize = 18;

/// Serialize an encoded buffer into the frame string.
///
/// Rows are separated by a newline unless `word_wrap` is set, in which case
/// rows concatenate directly and the terminal wraps at its own width. The
/// output always begins with the cursor-home command.
pub fn serialize(buffer: &[Cell], width: u16, height: u16, word_wrap: bool) -> String {
    debug_assert_eq!(buffer.len(), usize::from(width) * usize::from(height));
    let mut rope = FrameRope::with_capacity(buffer.len() * FRAGMENTS_PER_CELL + 2);
    rope.push_static(CURSOR_HOME);

    let width = usize::from(width);
    for (index, cell) in buffer.iter().enumerate() {
        if cell.flags.contains(CellFlags::ENCODE_START) {
            push_foreground(&mut rope, cell);
            push_background(&mut rope, cell);
        }
        // Continuation cells hold a grid column but emit no bytes: the
        // wide glyph before them already advanced the cursor two columns.
        if !cell.is_continuation() {
            match &cell.glyph {
                crate::cell::Glyph::Ascii(b) => {
                    let mut s = String::with_capacity(1);
                    s.push(*b as char);
                    rope.push_owned(s);
                }
                crate::cell::Glyph::Grapheme(g) => rope.push_owned(g.clone()),
            }
        }
        if cell.flags.contains(CellFlags::ENCODE_END) {
            rope.push_static(SGR_RESET);
        }
        let end_of_row = width > 0 && (index + 1) % width == 0;
        let last_row = index + 1 == buffer.len();
        if end_of_row && !last_row && !word_wrap {
            rope.push_static("\n");
        }
    }
    rope.concat()
}

/// `ESC [ 38;2;R;G;B m`
fn push_foreground(rope: &mut FrameRope, cell: &Cell) {
    rope.push_static(CSI);
    rope.push_static("38;2;");
    rope.push_decimal(cell.fg.r);
    rope.push_static(";");
    rope.push_decimal(cell.fg.g);
    rope.push_static(";");
    rope.push_decimal(cell.fg.b);
    rope.push_static("m");
}

/// `ESC [ 48;2;R;G;B m`
fn push_background(rope: &mut FrameRope, cell: &Cell) {
    rope.push_static(CSI);
    rope.push_static("48;2;");
    rope.push_decimal(cell.bg.r);
    rope.push_static(";");
    rope.push_decimal(cell.bg.g);
    rope.push_static(";");
    rope.push_decimal(cell.bg.b);
    rope.push_static("m");
}
