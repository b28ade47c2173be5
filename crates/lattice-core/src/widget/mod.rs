//! Widget kinds and their content drawing.
//!
//! Widgets are not a type hierarchy: every tree node is an element, and its
//! [`WidgetKind`] selects the per-kind content routine the render pipeline
//! invokes after the interior repaint. Builders in this module return
//! [`ElementSpec`]s that can be chained with styling attributes and spawned
//! into a tree.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::canvas::{PixelSurface, SpriteSurface};
use crate::cell::Cell;
use crate::element::ElementSpec;
use crate::geometry::{Rect, Size};
use crate::style::attribute::{self, StyleChain};
use crate::style::{Align, Flow, ResolvedColors, Styling};

/// The fixed set of widget kinds, with per-kind state carried inline.
#[derive(Clone, Debug, Default)]
pub enum WidgetKind {
    /// A plain container; draws nothing beyond its interior and border.
    #[default]
    Panel,
    /// Renders the style's text into the interior.
    TextField,
    /// A focusable control rendering its text centered.
    Button,
    /// A two-state toggle.
    Switch {
        /// Current state.
        on: bool,
    },
    /// A horizontal fill bar.
    ProgressBar {
        /// Fill fraction in `0.0..=1.0`.
        progress: f32,
    },
    /// A flow container stacking its children along the style's flow axis.
    List,
    /// A clipping container with a scroll index along the flow axis.
    ScrollView {
        /// Scroll offset in cells along the flow axis.
        scroll: u16,
    },
    /// A canvas of plain color cells.
    Canvas(PixelSurface),
    /// A canvas of animated sprite cells.
    SpriteCanvas(SpriteSurface),
}

impl WidgetKind {
    /// Move a scroll view's index by `delta`, saturating at zero. Returns
    /// true if the kind scrolls.
    pub fn scroll_by(&mut self, delta: i32) -> bool {
        match self {
            WidgetKind::ScrollView { scroll } => {
                let next = i64::from(*scroll) + i64::from(delta);
                *scroll = next.clamp(0, i64::from(u16::MAX)) as u16;
                true
            }
            _ => false,
        }
    }

    /// True for kinds whose surfaces animate over time.
    pub fn is_animated(&self) -> bool {
        matches!(self, WidgetKind::SpriteCanvas(s) if s.is_animated())
    }
}

/// Glyphs for the progress bar fill and trough.
const PROGRESS_FILLED: &str = "█";
const PROGRESS_EMPTY: &str = "░";

/// Write one cell into a row-major buffer, ignoring out-of-bounds.
fn put(buf: &mut [Cell], size: Size, x: i32, y: i32, cell: Cell) {
    if x < 0 || y < 0 || x >= i32::from(size.width) || y >= i32::from(size.height) {
        return;
    }
    let idx = y as usize * usize::from(size.width) + x as usize;
    if let Some(slot) = buf.get_mut(idx) {
        *slot = cell;
    }
}

/// Lay text out inside `interior`, honoring newlines, hard-wrapping at the
/// interior width in display columns, and applying the style alignment.
/// Wide graphemes consume two columns: the glyph cell plus a continuation
/// cell, and never straddle a wrap boundary.
fn draw_text(
    text: &str,
    align: Align,
    colors: &ResolvedColors,
    interior: Rect,
    size: Size,
    buf: &mut [Cell],
) {
    if interior.is_empty() {
        return;
    }
    let columns = usize::from(interior.width);

    // Each wrapped line: its graphemes with display widths, plus the
    // total display width for alignment.
    let mut lines: Vec<(Vec<(&str, usize)>, usize)> = Vec::new();
    for raw_line in text.split('\n') {
        let mut current: Vec<(&str, usize)> = Vec::new();
        let mut used = 0usize;
        for grapheme in raw_line.graphemes(true) {
            let gw = UnicodeWidthStr::width(grapheme);
            if gw == 0 {
                // A standalone zero-width cluster has no cell to live in.
                continue;
            }
            let gw = gw.min(2);
            if used + gw > columns {
                lines.push((current, used));
                current = Vec::new();
                used = 0;
            }
            current.push((grapheme, gw));
            used += gw;
        }
        lines.push((current, used));
    }

    let rows = usize::from(interior.height);
    let y_start = match align {
        Align::Down => rows.saturating_sub(lines.len()),
        _ => 0,
    };

    for (row, (line, line_width)) in lines.iter().enumerate() {
        let y = y_start + row;
        if y >= rows {
            break;
        }
        let x_start = match align {
            Align::Right => columns.saturating_sub(*line_width),
            Align::Center => columns.saturating_sub(*line_width) / 2,
            _ => 0,
        };
        let mut x = x_start;
        for (grapheme, gw) in line {
            if x + gw > columns {
                break;
            }
            let cell = Cell::new(*grapheme, colors.text, colors.background);
            let wide = cell.is_wide();
            put(
                buf,
                size,
                interior.x + x as i32,
                interior.y + y as i32,
                cell,
            );
            if wide {
                put(
                    buf,
                    size,
                    interior.x + (x + 1) as i32,
                    interior.y + y as i32,
                    Cell::continuation(colors.text, colors.background),
                );
            }
            x += gw;
        }
    }
}

/// Copy a rendered surface buffer into the interior rectangle.
fn blit_surface(cells: &[Cell], surface_size: Size, interior: Rect, size: Size, buf: &mut [Cell]) {
    let copy_w = interior.width.min(surface_size.width);
    let copy_h = interior.height.min(surface_size.height);
    for y in 0..copy_h {
        for x in 0..copy_w {
            let idx = usize::from(y) * usize::from(surface_size.width) + usize::from(x);
            put(
                buf,
                size,
                interior.x + i32::from(x),
                interior.y + i32::from(y),
                cells[idx].clone(),
            );
        }
    }
}

/// Draw a widget's content into the element buffer. `interior` is the
/// element rectangle shrunk by its border, in local coordinates; `size` is
/// the full buffer size.
pub fn draw_content(
    kind: &WidgetKind,
    style: &Styling,
    colors: &ResolvedColors,
    interior: Rect,
    size: Size,
    buf: &mut [Cell],
) {
    match kind {
        WidgetKind::Panel | WidgetKind::List | WidgetKind::ScrollView { .. } => {}
        WidgetKind::TextField => {
            draw_text(
                &style.text.value,
                style.align.value,
                colors,
                interior,
                size,
                buf,
            );
        }
        WidgetKind::Button => {
            draw_text(&style.text.value, Align::Center, colors, interior, size, buf);
        }
        WidgetKind::Switch { on } => {
            let marker = if *on { "[x] " } else { "[ ] " };
            let label = format!("{marker}{}", style.text.value);
            draw_text(&label, Align::Left, colors, interior, size, buf);
        }
        WidgetKind::ProgressBar { progress } => {
            if interior.is_empty() {
                return;
            }
            let filled = (f32::from(interior.width) * progress.clamp(0.0, 1.0)).round() as u16;
            for y in 0..interior.height {
                for x in 0..interior.width {
                    let glyph = if x < filled {
                        PROGRESS_FILLED
                    } else {
                        PROGRESS_EMPTY
                    };
                    put(
                        buf,
                        size,
                        interior.x + i32::from(x),
                        interior.y + i32::from(y),
                        Cell::new(glyph, colors.text, colors.background),
                    );
                }
            }
        }
        WidgetKind::Canvas(surface) => {
            let mut cells = vec![Cell::blank(); surface.size().area()];
            surface.render_into(&mut cells);
            blit_surface(&cells, surface.size(), interior, size, buf);
        }
        WidgetKind::SpriteCanvas(surface) => {
            let mut cells = vec![Cell::blank(); surface.size().area()];
            surface.render_into(&mut cells);
            blit_surface(&cells, surface.size(), interior, size, buf);
        }
    }
}

// --- builders ---

/// A plain container.
pub fn panel() -> ElementSpec {
    ElementSpec::new(WidgetKind::Panel, StyleChain::new())
}

/// A titled window. A non-empty title without an explicit border gets an
/// invisible one at spawn time so the title has a row to live on.
pub fn window(title: impl Into<String>, w: u16, h: u16) -> ElementSpec {
    ElementSpec::new(
        WidgetKind::Panel,
        attribute::title(title) | attribute::width(w) | attribute::height(h),
    )
}

/// A text field showing `content`.
pub fn text_field(content: impl Into<String>) -> ElementSpec {
    ElementSpec::new(WidgetKind::TextField, StyleChain::from(attribute::text(content)))
}

/// A button labeled `label`.
pub fn button(label: impl Into<String>) -> ElementSpec {
    ElementSpec::new(WidgetKind::Button, StyleChain::from(attribute::text(label)))
}

/// A two-state switch labeled `label`, initially off.
pub fn switch(label: impl Into<String>) -> ElementSpec {
    ElementSpec::new(
        WidgetKind::Switch { on: false },
        StyleChain::from(attribute::text(label)),
    )
}

/// A progress bar at `progress` (clamped to `0.0..=1.0`).
pub fn progress_bar(progress: f32) -> ElementSpec {
    ElementSpec::new(
        WidgetKind::ProgressBar {
            progress: progress.clamp(0.0, 1.0),
        },
        StyleChain::new(),
    )
}

/// A flow container stacking children along `direction`.
pub fn list_view(direction: Flow) -> ElementSpec {
    ElementSpec::new(WidgetKind::List, StyleChain::from(attribute::flow(direction)))
}

/// A scrolling flow container.
pub fn scroll_view(direction: Flow) -> ElementSpec {
    ElementSpec::new(
        WidgetKind::ScrollView { scroll: 0 },
        attribute::flow(direction) | attribute::allow_scrolling(true),
    )
}

/// A color-cell canvas of the given interior size.
pub fn canvas(size: Size) -> ElementSpec {
    ElementSpec::new(
        WidgetKind::Canvas(PixelSurface::new(size)),
        attribute::width(size.width.max(1)) | attribute::height(size.height.max(1)),
    )
}

/// An animated sprite canvas of the given interior size.
pub fn sprite_canvas(size: Size) -> ElementSpec {
    ElementSpec::new(
        WidgetKind::SpriteCanvas(SpriteSurface::new(size)),
        attribute::width(size.width.max(1)) | attribute::height(size.height.max(1)),
    )
}
