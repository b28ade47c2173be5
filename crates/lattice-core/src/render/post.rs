//! Post-processing: drop shadow and whole-element opacity.
//!
//! The shadow pass blits darkened copies of the element into a scratch
//! buffer grown by the shadow extent, then overlays the original. The
//! element's reported layout size is unchanged; only the post-processed
//! buffer grows. The opacity pass scales every cell's alpha; opacity 1.0 is
//! skipped entirely.

use crate::cell::Cell;
use crate::color::Rgba;
use crate::geometry::Size;
use crate::render::compose::composite_cell;
use crate::style::Shadow;

/// Result of a post-process pass: the output buffer, its dimensions, and
/// the offset of the original content inside it (negative shadow directions
/// push the content right/down inside the grown buffer).
pub struct PostProcessed {
    /// The processed cells.
    pub buffer: Vec<Cell>,
    /// Dimensions of `buffer`.
    pub size: Size,
    /// Where the original top-left corner sits inside `buffer`.
    pub offset: (i32, i32),
}

/// Run shadow and opacity over an element buffer.
pub fn post_process(
    buffer: &[Cell],
    size: Size,
    shadow: &Shadow,
    opacity: f32,
) -> PostProcessed {
    let mut out = if shadow.enabled && shadow.length > 0 {
        apply_shadow(buffer, size, shadow)
    } else {
        PostProcessed {
            buffer: buffer.to_vec(),
            size,
            offset: (0, 0),
        }
    };

    if opacity < 1.0 {
        for cell in &mut out.buffer {
            cell.fg = cell.fg.scale_alpha(opacity);
            cell.bg = cell.bg.scale_alpha(opacity);
        }
    }
    out
}

/// True for cells that cast a shadow: anything that is not a fully
/// transparent default cell.
fn casts_shadow(cell: &Cell) -> bool {
    !cell.is_space() || cell.bg.a > 0
}

fn apply_shadow(buffer: &[Cell], size: Size, shadow: &Shadow) -> PostProcessed {
    let (dx, dy) = shadow.direction;
    let reach_x = i32::from(dx.unsigned_abs()) * i32::from(shadow.length);
    let reach_y = i32::from(dy.unsigned_abs()) * i32::from(shadow.length);

    let grown = Size::new(
        size.width + reach_x as u16,
        size.height + reach_y as u16,
    );
    // Negative directions push the original content inward.
    let origin = (
        if dx < 0 { reach_x } else { 0 },
        if dy < 0 { reach_y } else { 0 },
    );

    let mut out = vec![
        Cell {
            glyph: crate::cell::Glyph::Ascii(b' '),
            fg: Rgba::transparent(),
            bg: Rgba::transparent(),
            flags: crate::cell::CellFlags::NONE,
            width: 1,
        };
        grown.area()
    ];

    let shadow_color = shadow.color.with_alpha(255);
    // Farther steps fade out.
    for step in 1..=i32::from(shadow.length) {
        let falloff = 1.0 - (step - 1) as f32 / f32::from(shadow.length);
        let alpha = (shadow.opacity * falloff).clamp(0.0, 1.0);
        let offset_x = origin.0 + i32::from(dx) * step;
        let offset_y = origin.1 + i32::from(dy) * step;

        for y in 0..i32::from(size.height) {
            for x in 0..i32::from(size.width) {
                let src = &buffer[y as usize * usize::from(size.width) + x as usize];
                if !casts_shadow(src) {
                    continue;
                }
                let tx = x + offset_x;
                let ty = y + offset_y;
                if tx < 0 || ty < 0 || tx >= i32::from(grown.width) || ty >= i32::from(grown.height)
                {
                    continue;
                }
                let idx = ty as usize * usize::from(grown.width) + tx as usize;
                let mut cast = Cell::filled(shadow_color.scale_alpha(alpha));
                cast.fg = shadow_color.scale_alpha(alpha);
                composite_cell(&cast, &mut out[idx]);
            }
        }
    }

    // Overlay the original content on top of its shadow.
    for y in 0..i32::from(size.height) {
        for x in 0..i32::from(size.width) {
            let src = &buffer[y as usize * usize::from(size.width) + x as usize];
            let idx =
                (y + origin.1) as usize * usize::from(grown.width) + (x + origin.0) as usize;
            out[idx] = src.clone();
        }
    }

    PostProcessed {
        buffer: out,
        size: grown,
        offset: origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::named;

    fn filled_buffer(size: Size) -> Vec<Cell> {
        vec![Cell::filled(named::WHITE.with_alpha(255)); size.area()]
    }

    #[test]
    fn identity_without_shadow_or_opacity() {
        let size = Size::new(3, 2);
        let buf = filled_buffer(size);
        let out = post_process(&buf, size, &Shadow::default(), 1.0);
        assert_eq!(out.size, size);
        assert_eq!(out.offset, (0, 0));
        assert_eq!(out.buffer, buf);
    }

    #[test]
    fn opacity_scales_both_channels() {
        let size = Size::new(2, 1);
        let buf = filled_buffer(size);
        let out = post_process(&buf, size, &Shadow::default(), 0.5);
        assert_eq!(out.buffer[0].bg.a, 127);
        assert_eq!(out.buffer[0].fg.a, 127);
    }

    #[test]
    fn shadow_grows_buffer_down_right() {
        let size = Size::new(2, 2);
        let buf = filled_buffer(size);
        let shadow = Shadow {
            direction: (1, 1),
            color: named::BLACK,
            opacity: 1.0,
            length: 1,
            enabled: true,
        };
        let out = post_process(&buf, size, &shadow, 1.0);
        assert_eq!(out.size, Size::new(3, 3));
        assert_eq!(out.offset, (0, 0));
        // The bottom-right corner holds pure shadow.
        let corner = &out.buffer[2 * 3 + 2];
        assert_eq!(corner.bg.rgb(), named::BLACK);
        assert!(corner.bg.a > 0);
    }

    #[test]
    fn shadow_grows_buffer_up_left() {
        let size = Size::new(2, 2);
        let buf = filled_buffer(size);
        let shadow = Shadow {
            direction: (-1, -1),
            color: named::BLACK,
            opacity: 1.0,
            length: 1,
            enabled: true,
        };
        let out = post_process(&buf, size, &shadow, 1.0);
        assert_eq!(out.size, Size::new(3, 3));
        // The original content is pushed inward.
        assert_eq!(out.offset, (1, 1));
        assert_eq!(out.buffer[1 * 3 + 1].bg.rgb(), named::WHITE);
        // The top-left corner holds shadow.
        assert!(out.buffer[0].bg.a > 0);
    }

    #[test]
    fn original_overlays_its_own_shadow() {
        let size = Size::new(2, 1);
        let buf = filled_buffer(size);
        let shadow = Shadow {
            direction: (1, 0),
            color: named::BLACK,
            opacity: 1.0,
            length: 1,
            enabled: true,
        };
        let out = post_process(&buf, size, &shadow, 1.0);
        // Cell 1 is covered by both the shadow of cell 0 and the original
        // cell 1; the original wins.
        assert_eq!(out.buffer[1].bg.rgb(), named::WHITE);
        // Cell 2 holds only shadow.
        assert_eq!(out.buffer[2].bg.rgb(), named::BLACK);
    }

    #[test]
    fn longer_shadows_fade() {
        let size = Size::new(1, 1);
        let buf = filled_buffer(size);
        let shadow = Shadow {
            direction: (1, 0),
            color: named::BLACK,
            opacity: 1.0,
            length: 2,
            enabled: true,
        };
        let out = post_process(&buf, size, &shadow, 1.0);
        assert_eq!(out.size, Size::new(3, 1));
        let near = out.buffer[1].bg.a;
        let far = out.buffer[2].bg.a;
        assert!(near > far, "shadow should fade with distance: {near} vs {far}");
    }
}
