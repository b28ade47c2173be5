//! Child-into-parent compositing.
//!
//! Children are blitted into the parent's buffer with alpha blending and
//! clipped to the parent's interior rectangle. Where two bordered elements
//! meet, a post pass melts their shared edges together through the border
//! glyph junction table.

use crate::cell::Cell;
use crate::geometry::{Rect, Size};
use crate::style::BorderGlyphs;

/// Composite one source cell over a destination cell.
///
/// Full alpha copies the source; zero alpha keeps the destination; anything
/// between blends per channel. The glyph (and its display width) comes from
/// the source unless the source glyph is the default space or a wide-glyph
/// continuation. Encoder flags are reset for the next encode pass.
pub fn composite_cell(src: &Cell, dst: &mut Cell) {
    if src.fg.a == 255 && src.bg.a == 255 {
        *dst = src.clone();
        dst.reset_encoding();
        return;
    }
    if src.fg.a == 0 && src.bg.a == 0 {
        return;
    }
    let mut merged = dst.clone();
    merged.bg = src.bg.over(dst.bg);
    merged.fg = src.fg.over(dst.fg);
    if !src.is_space() && !src.is_continuation() {
        merged.glyph = src.glyph.clone();
        merged.width = src.width;
    }
    merged.reset_encoding();
    *dst = merged;
}

/// Blit a child buffer into a parent buffer.
///
/// `clip` is the parent-local rectangle the child may touch (the parent's
/// interior when a border is drawn). `child_origin` is the child's top-left
/// in parent-local coordinates — scroll offsets and shadow extents are
/// already folded in by the caller.
///
/// Wide-glyph hygiene: a write that lands on the continuation half of a
/// destination wide glyph blanks the orphaned primary (and the reverse),
/// and a wide source whose second column falls outside the clip degrades
/// to a space, so the grid never holds half a glyph.
pub fn blit(
    parent: &mut [Cell],
    parent_size: Size,
    clip: Rect,
    child: &[Cell],
    child_size: Size,
    child_origin: (i32, i32),
) {
    if clip.is_empty() || child_size.is_empty() {
        return;
    }
    let child_rect = Rect::new(
        child_origin.0,
        child_origin.1,
        child_size.width,
        child_size.height,
    );
    let Some(visible) = child_rect.intersection(clip) else {
        return;
    };

    for row in 0..visible.height {
        let py = visible.y + i32::from(row);
        let cy = py - child_origin.1;
        for col in 0..visible.width {
            let px = visible.x + i32::from(col);
            let cx = px - child_origin.0;
            if px < 0 || py < 0 || px >= i32::from(parent_size.width) || py >= i32::from(parent_size.height) {
                continue;
            }
            let src_idx = cy as usize * usize::from(child_size.width) + cx as usize;
            let dst_idx = py as usize * usize::from(parent_size.width) + px as usize;
            let Some(src) = child.get(src_idx) else {
                continue;
            };

            // A wide glyph whose continuation would be clipped away
            // becomes a space instead of a half-visible glyph.
            let mut write = src.clone();
            if write.is_wide()
                && (px + 1 >= clip.right() || px + 1 >= i32::from(parent_size.width))
            {
                write = Cell::filled(write.bg);
                write.fg = src.fg;
            }

            let replaces_glyph = (write.fg.a == 255 && write.bg.a == 255)
                || (!write.is_space() && !write.is_continuation());
            if replaces_glyph {
                repair_severed_glyph(parent, parent_size, px, dst_idx);
            }

            let Some(dst) = parent.get_mut(dst_idx) else {
                continue;
            };
            composite_cell(&write, dst);
        }
    }
}

/// Blank the stranded half of a destination wide glyph about to be cut by
/// a write at column `px`.
fn repair_severed_glyph(parent: &mut [Cell], parent_size: Size, px: i32, dst_idx: usize) {
    let existing_is_continuation = parent.get(dst_idx).is_some_and(Cell::is_continuation);
    if existing_is_continuation && px > 0 {
        if let Some(primary) = parent.get_mut(dst_idx - 1) {
            if primary.is_wide() {
                let mut repaired = Cell::filled(primary.bg);
                repaired.fg = primary.fg;
                *primary = repaired;
            }
        }
    }
    let existing_is_wide = parent.get(dst_idx).is_some_and(Cell::is_wide);
    if existing_is_wide && px + 1 < i32::from(parent_size.width) {
        if let Some(cont) = parent.get_mut(dst_idx + 1) {
            if cont.is_continuation() {
                let mut repaired = Cell::filled(cont.bg);
                repaired.fg = cont.fg;
                *cont = repaired;
            }
        }
    }
}

/// Directional arm bits used by the junction pass.
const UP: u8 = 1;
const DOWN: u8 = 2;
const LEFT: u8 = 4;
const RIGHT: u8 = 8;

/// The directions a border glyph extends toward, or `None` for glyphs that
/// are not part of the set.
fn arms(glyphs: &BorderGlyphs, glyph: &str) -> Option<u8> {
    if glyph == glyphs.vertical {
        Some(UP | DOWN)
    } else if glyph == glyphs.horizontal {
        Some(LEFT | RIGHT)
    } else if glyph == glyphs.top_left {
        Some(DOWN | RIGHT)
    } else if glyph == glyphs.top_right {
        Some(DOWN | LEFT)
    } else if glyph == glyphs.bottom_left {
        Some(UP | RIGHT)
    } else if glyph == glyphs.bottom_right {
        Some(UP | LEFT)
    } else if glyph == glyphs.t_down {
        Some(DOWN | LEFT | RIGHT)
    } else if glyph == glyphs.t_up {
        Some(UP | LEFT | RIGHT)
    } else if glyph == glyphs.t_right {
        Some(UP | DOWN | RIGHT)
    } else if glyph == glyphs.t_left {
        Some(UP | DOWN | LEFT)
    } else if glyph == glyphs.cross {
        Some(UP | DOWN | LEFT | RIGHT)
    } else {
        None
    }
}

/// Melt overlapping borders: every border cell is re-derived from the
/// directions in which neighboring border cells reach toward it. Masks
/// without a matching glyph leave the cell unchanged.
pub fn merge_border_junctions(buffer: &mut [Cell], size: Size, glyphs: &BorderGlyphs) {
    let width = i32::from(size.width);
    let height = i32::from(size.height);
    let at = |buf: &[Cell], x: i32, y: i32| -> Option<u8> {
        if x < 0 || y < 0 || x >= width || y >= height {
            return None;
        }
        let idx = y as usize * usize::from(size.width) + x as usize;
        buf.get(idx).and_then(|c| arms(glyphs, c.glyph.as_str()))
    };

    let mut replacements: Vec<(usize, String)> = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * usize::from(size.width) + x as usize;
            let Some(own) = buffer.get(idx).and_then(|c| arms(glyphs, c.glyph.as_str())) else {
                continue;
            };
            let mut mask = own;
            if at(buffer, x, y - 1).is_some_and(|a| a & DOWN != 0) {
                mask |= UP;
            }
            if at(buffer, x, y + 1).is_some_and(|a| a & UP != 0) {
                mask |= DOWN;
            }
            if at(buffer, x - 1, y).is_some_and(|a| a & RIGHT != 0) {
                mask |= LEFT;
            }
            if at(buffer, x + 1, y).is_some_and(|a| a & LEFT != 0) {
                mask |= RIGHT;
            }
            if mask != own {
                if let Some(glyph) = glyphs.junction(mask) {
                    replacements.push((idx, glyph.to_string()));
                }
            }
        }
    }
    for (idx, glyph) in replacements {
        if let Some(cell) = buffer.get_mut(idx) {
            cell.glyph = crate::cell::Glyph::from(glyph.as_str());
        }
    }
}
