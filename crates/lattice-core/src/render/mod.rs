//! The render pipeline.
//!
//! Rendering walks the element tree re-running only the stages each
//! element's stain mask marks dirty: class resolution, size realloc,
//! absolute-position propagation, interior repaint, border drawing, child
//! composition, and post-processing. A fully clean element returns its
//! cached buffer untouched.

pub mod compose;
pub mod encode;
pub mod frame;
pub mod post;

use tracing::warn;

use crate::cell::Cell;
use crate::element::{ElementId, Tree};
use crate::geometry::{Rect, Size};
use crate::stain::Stain;
use crate::style::classes::ClassRegistry;
use crate::style::Flow;
use crate::widget::{self, WidgetKind};

/// Render the whole tree and serialize the root into a frame string.
/// Returns `None` when the tree has no root.
pub fn compose_frame(tree: &mut Tree, classes: &ClassRegistry, word_wrap: bool) -> Option<String> {
    let root = tree.root()?;
    render_element(tree, classes, root);
    let element = tree.get(root)?;
    let mut buffer = element.post_buffer.clone();
    let size = element.post_size;
    encode::encode(&mut buffer);
    Some(frame::serialize(&buffer, size.width, size.height, word_wrap))
}

/// Re-render one element (and, through its DEEP stage, any dirty
/// descendants). Hidden elements are skipped entirely.
pub fn render_element(tree: &mut Tree, classes: &ClassRegistry, id: ElementId) {
    let Some(element) = tree.get(id) else {
        return;
    };
    if !element.is_displayed() {
        return;
    }
    if element.dirty.is_clean() {
        return;
    }

    resolve_classes(tree, classes, id);
    fold_state(tree, id);
    resolve_size(tree, id);
    reallocate(tree, id);
    propagate_position(tree, id);
    repaint(tree, id);
    draw_border(tree, id);
    compose_children(tree, classes, id);
    finalize(tree, id);
}

/// CLASS: apply the element's class list in id order under status-wins.
fn resolve_classes(tree: &mut Tree, classes: &ClassRegistry, id: ElementId) {
    let Some(element) = tree.get(id) else {
        return;
    };
    if !element.dirty.has(Stain::CLASS) {
        return;
    }
    let mut class_ids = element.classes.clone();
    class_ids.sort_unstable();
    let mut gained = Stain::CLEAN;
    for class_id in class_ids {
        let Some(class_style) = classes.get(class_id).cloned() else {
            warn!(class_id, "unknown class id on element");
            continue;
        };
        if let Some(element) = tree.get_mut(id) {
            gained = gained | element.style.merge_from(&class_style);
        }
    }
    if let Some(element) = tree.get_mut(id) {
        element.dirty.clean(Stain::CLASS);
        element.dirty.mark(gained);
    }
}

/// STATE: a focus/hover flip invalidates the color and border paint.
fn fold_state(tree: &mut Tree, id: ElementId) {
    if let Some(element) = tree.get_mut(id) {
        if element.dirty.has(Stain::STATE) {
            element.dirty.clean(Stain::STATE);
            element.dirty.mark(Stain::COLOR | Stain::EDGE);
        }
    }
}

/// Evaluate the size specification against the parent (or viewport for the
/// root), then grow to the children's bounding box for dynamic elements.
/// A changed size raises STRETCH.
fn resolve_size(tree: &mut Tree, id: ElementId) {
    let viewport = tree.viewport;
    let Some(element) = tree.get(id) else {
        return;
    };
    let parent_size = element
        .parent
        .and_then(|p| tree.get(p))
        .map(|p| p.size)
        .unwrap_or(viewport);

    let style = &element.style;
    let mut width = style.width.value.evaluate(parent_size.width, viewport).max(1);
    let mut height = style
        .height
        .value
        .evaluate(parent_size.height, viewport)
        .max(1);

    if style.allow_dynamic_size.value {
        let border = u16::from(style.border_enabled.value);
        let mut extent = Size::new(0, 0);
        for &child in &element.children {
            let Some(child_element) = tree.get(child) else {
                continue;
            };
            if !child_element.is_displayed() {
                continue;
            }
            let spec = child_element.style.position.value;
            let cx = spec.x.evaluate_signed(i32::from(width), viewport).max(0) as u16;
            let cy = spec.y.evaluate_signed(i32::from(height), viewport).max(0) as u16;
            let cw = child_element
                .style
                .width
                .value
                .evaluate(width, viewport)
                .max(1);
            let ch = child_element
                .style
                .height
                .value
                .evaluate(height, viewport)
                .max(1);
            extent.width = extent.width.max(cx + cw);
            extent.height = extent.height.max(cy + ch);
        }
        if extent.width > 0 {
            // Styled dimensions act as floors; dynamic sizing only grows.
            width = width.max(extent.width + border * 2);
            height = height.max(extent.height + border * 2);
        }
    }

    let new_size = Size::new(width, height);
    if let Some(element) = tree.get_mut(id) {
        if element.size != new_size {
            element.size = new_size;
            element.dirty.mark(Stain::STRETCH);
        }
    }
}

/// STRETCH: reallocate the buffer at the resolved size, filled with the
/// current background, and force the downstream stages.
fn reallocate(tree: &mut Tree, id: ElementId) {
    let Some(element) = tree.get_mut(id) else {
        return;
    };
    if !element.dirty.has(Stain::STRETCH) {
        return;
    }
    let colors = element.style.colors(element.state());
    element.render_buffer.clear();
    element
        .render_buffer
        .resize(element.size.area(), Cell::filled(colors.background));
    element.dirty.clean(Stain::STRETCH);
    element
        .dirty
        .mark(Stain::COLOR | Stain::EDGE | Stain::DEEP | Stain::MOVE | Stain::FINALIZE);
}

/// MOVE: refresh the absolute-position cache through the subtree.
fn propagate_position(tree: &mut Tree, id: ElementId) {
    let needs_move = tree.get(id).is_some_and(|e| e.dirty.has(Stain::MOVE));
    if !needs_move {
        return;
    }
    tree.update_absolute(id);
    if let Some(element) = tree.get_mut(id) {
        element.dirty.clean(Stain::MOVE);
        element.dirty.mark(Stain::FINALIZE);
    }
}

/// COLOR: repaint every cell with the state-selected colors, then run the
/// widget content routine over the interior.
fn repaint(tree: &mut Tree, id: ElementId) {
    let Some(element) = tree.get_mut(id) else {
        return;
    };
    if !element.dirty.has(Stain::COLOR) {
        return;
    }
    let colors = element.style.colors(element.state());
    let size = element.size;
    for cell in &mut element.render_buffer {
        *cell = Cell::filled(colors.background);
    }

    let border = u16::from(element.style.border_enabled.value);
    let interior = Rect::new(0, 0, size.width, size.height).shrink(border);
    let kind = element.kind.clone();
    let style = element.style.clone();
    widget::draw_content(
        &kind,
        &style,
        &colors,
        interior,
        size,
        &mut element.render_buffer,
    );

    element.dirty.clean(Stain::COLOR);
    element.dirty.mark(Stain::FINALIZE);
    if element.style.border_enabled.value {
        element.dirty.mark(Stain::EDGE);
    }
    // The repaint filled every cell, so composited children must be
    // blitted again.
    if !element.children.is_empty() {
        element.dirty.mark(Stain::DEEP);
    }
}

/// EDGE: draw the border ring and overlay the title, or defer to the
/// element's custom draw callback when one is registered.
fn draw_border(tree: &mut Tree, id: ElementId) {
    let Some(element) = tree.get_mut(id) else {
        return;
    };
    if !element.dirty.has(Stain::EDGE) {
        return;
    }
    element.dirty.clean(Stain::EDGE);
    element.dirty.mark(Stain::FINALIZE);
    if !element.style.border_enabled.value {
        return;
    }
    let size = element.size;
    if size.width < 2 || size.height < 2 {
        return;
    }

    if let Some(custom) = element.style.callbacks.on_draw.clone() {
        let style = element.style.clone();
        custom(&style, size, &mut element.render_buffer);
        return;
    }

    let colors = element.style.colors(element.state());
    let glyphs = element.style.border_glyphs.value.clone();
    let w = usize::from(size.width);
    let h = usize::from(size.height);
    let buf = &mut element.render_buffer;
    let border_cell =
        |glyph: &str| Cell::new(glyph, colors.border, colors.border_background);

    for x in 0..w {
        buf[x] = border_cell(&glyphs.horizontal);
        buf[(h - 1) * w + x] = border_cell(&glyphs.horizontal);
    }
    for y in 0..h {
        buf[y * w] = border_cell(&glyphs.vertical);
        buf[y * w + w - 1] = border_cell(&glyphs.vertical);
    }
    buf[0] = border_cell(&glyphs.top_left);
    buf[w - 1] = border_cell(&glyphs.top_right);
    buf[(h - 1) * w] = border_cell(&glyphs.bottom_left);
    buf[h * w - 1] = border_cell(&glyphs.bottom_right);

    // Title: overlaid one cell right of the top-left corner, truncated
    // before the top-right corner. Wide glyphs take two columns with a
    // continuation cell.
    let title = element.style.title.value.clone();
    if !title.is_empty() {
        use unicode_segmentation::UnicodeSegmentation;
        let mut x = 1usize;
        for grapheme in title.graphemes(true) {
            let cell = Cell::new(grapheme, colors.border, colors.border_background);
            let gw = usize::from(cell.width);
            if gw == 0 {
                continue;
            }
            if x + gw > w - 1 {
                break;
            }
            let wide = cell.is_wide();
            buf[x] = cell;
            if wide {
                buf[x + 1] = Cell::continuation(colors.border, colors.border_background);
            }
            x += gw;
        }
    }
}

/// DEEP: lay out flow children, then composite every displayed child into
/// this element in ascending z order.
fn compose_children(tree: &mut Tree, classes: &ClassRegistry, id: ElementId) {
    let Some(element) = tree.get(id) else {
        return;
    };
    if !element.dirty.has(Stain::DEEP) {
        return;
    }
    let children = element.children.clone();
    let is_flow_container = matches!(
        element.kind,
        WidgetKind::List | WidgetKind::ScrollView { .. }
    );

    // Render children first so their sizes are resolved for layout.
    for &child in &children {
        render_element(tree, classes, child);
    }

    if is_flow_container {
        layout_flow(tree, id, &children);
    }

    let Some(element) = tree.get(id) else {
        return;
    };
    let size = element.size;
    let own_rect = element.rect();
    let absolute = element.absolute;
    let border = u16::from(element.style.border_enabled.value);
    let allow_overflow = element.style.allow_overflow.value;
    let own_border = element.style.border_enabled.value;
    let glyphs = element.style.border_glyphs.value.clone();
    let clip = Rect::new(0, 0, size.width, size.height).shrink(border);
    let scroll_offset = match (&element.kind, element.style.flow.value) {
        (WidgetKind::ScrollView { scroll }, Flow::Row) => (-i32::from(*scroll), 0),
        (WidgetKind::ScrollView { scroll }, Flow::Column) => (0, -i32::from(*scroll)),
        _ => (0, 0),
    };

    // Ascending z: higher layers composite later and win overlaps.
    let mut ordered = children.clone();
    ordered.sort_by_key(|&c| {
        tree.get(c)
            .map(|e| e.style.position.value.z)
            .unwrap_or(i32::MIN)
    });

    let mut any_child_border = false;
    let mut buffer = {
        let Some(element) = tree.get_mut(id) else {
            return;
        };
        std::mem::take(&mut element.render_buffer)
    };

    for child in ordered {
        let Some(child_element) = tree.get(child) else {
            continue;
        };
        if !child_element.is_displayed() {
            continue;
        }
        if !child_element.rect().intersects(own_rect) && scroll_offset == (0, 0) {
            continue;
        }
        any_child_border |= child_element.style.border_enabled.value;

        let local = (
            child_element.absolute.x - absolute.x + scroll_offset.0,
            child_element.absolute.y - absolute.y + scroll_offset.1,
        );
        let child_size = child_element.rendered_size();
        let origin = (
            local.0 - child_element.post_offset.0,
            local.1 - child_element.post_offset.1,
        );

        let exceeds = origin.0 < clip.x
            || origin.1 < clip.y
            || origin.0 + i32::from(child_size.width) > clip.right()
            || origin.1 + i32::from(child_size.height) > clip.bottom();
        if exceeds && !allow_overflow {
            warn!(
                child = ?child,
                origin = ?origin,
                size = ?child_size,
                "child exceeds parent interior; clipping"
            );
        }

        let child_buffer = child_element.post_buffer.clone();
        compose::blit(&mut buffer, size, clip, &child_buffer, child_size, origin);
    }

    if own_border && any_child_border {
        compose::merge_border_junctions(&mut buffer, size, &glyphs);
    }

    if let Some(element) = tree.get_mut(id) {
        element.render_buffer = buffer;
        element.dirty.clean(Stain::DEEP);
        element.dirty.mark(Stain::FINALIZE);
    }
}

/// Stack displayed children along the flow axis, starting inside the
/// border. Positions are written directly: the container is the layout
/// authority for its children.
fn layout_flow(tree: &mut Tree, id: ElementId, children: &[ElementId]) {
    let Some(element) = tree.get(id) else {
        return;
    };
    let flow = element.style.flow.value;
    let border = i32::from(u16::from(element.style.border_enabled.value));
    let mut offset = border;

    for &child in children {
        let advance = {
            let Some(child_element) = tree.get_mut(child) else {
                continue;
            };
            if !child_element.is_displayed() {
                continue;
            }
            let z = child_element.style.position.value.z;
            let (x, y) = match flow {
                Flow::Row => (offset, border),
                Flow::Column => (border, offset),
            };
            child_element.style.position = crate::style::Tracked::initialized(
                crate::style::PositionSpec {
                    x: crate::style::Scalar {
                        value: x as f32,
                        unit: crate::style::Unit::Cells,
                    },
                    y: crate::style::Scalar {
                        value: y as f32,
                        unit: crate::style::Unit::Cells,
                    },
                    z,
                },
            );
            match flow {
                Flow::Row => i32::from(child_element.size.width),
                Flow::Column => i32::from(child_element.size.height),
            }
        };
        offset += advance;
    }
    tree.update_absolute(id);
}

/// Post-process into the cached output buffer.
fn finalize(tree: &mut Tree, id: ElementId) {
    let Some(element) = tree.get_mut(id) else {
        return;
    };
    if !element.dirty.has(Stain::FINALIZE) {
        return;
    }
    let shadow = element.style.shadow.value;
    let opacity = element.style.opacity.value;
    let processed = post::post_process(&element.render_buffer, element.size, &shadow, opacity);
    element.post_buffer = processed.buffer;
    element.post_size = processed.size;
    element.post_offset = processed.offset;
    element.dirty.clean(Stain::FINALIZE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::named;
    use crate::style::attribute::{self};
    use crate::widget;

    fn setup(viewport: Size) -> (Tree, ClassRegistry) {
        (Tree::new(viewport), ClassRegistry::new())
    }

    fn row_glyphs(buffer: &[Cell], width: u16, y: u16) -> String {
        (0..width)
            .map(|x| buffer[usize::from(y) * usize::from(width) + usize::from(x)].glyph.as_str())
            .collect()
    }

    #[test]
    fn single_window_border_and_title() {
        let (mut tree, classes) = setup(Size::new(20, 5));
        let root = tree.spawn_root(
            widget::panel().with(
                attribute::width(20)
                    | attribute::height(5)
                    | attribute::border(true)
                    | attribute::border_color(named::WHITE)
                    | attribute::background_color(named::BLACK)
                    | attribute::title("Hi"),
            ),
        );
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        assert!(element.is_some());
        match element {
            Some(e) => {
                let top = row_glyphs(e.rendered(), 20, 0);
                assert_eq!(top, "┌Hi────────────────┐");
                let middle = row_glyphs(e.rendered(), 20, 2);
                assert_eq!(middle, format!("│{}│", " ".repeat(18)));
                let bottom = row_glyphs(e.rendered(), 20, 4);
                assert_eq!(bottom, format!("└{}┘", "─".repeat(18)));
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn clean_element_render_is_stable() {
        let (mut tree, classes) = setup(Size::new(10, 3));
        let root = tree.spawn_root(widget::panel());
        render_element(&mut tree, &classes, root);
        let first = tree.get(root).map(|e| e.rendered().to_vec());
        render_element(&mut tree, &classes, root);
        let second = tree.get(root).map(|e| e.rendered().to_vec());
        assert_eq!(first, second);
        assert!(tree.get(root).is_some_and(|e| e.dirty.is_clean()));
    }

    #[test]
    fn alpha_composite_blends_child() {
        let (mut tree, classes) = setup(Size::new(3, 1));
        let root = tree.spawn_root(
            widget::panel().with(attribute::width(3) | attribute::height(1) | attribute::background_color(named::BLACK)),
        );
        let child = tree.spawn(widget::panel().with(
            attribute::width(1)
                | attribute::height(1)
                | attribute::position(1, 0)
                | attribute::background_color(named::WHITE)
                | attribute::opacity(0.5),
        ));
        tree.attach(root, child);
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        assert!(element.is_some());
        match element {
            Some(e) => {
                let row: Vec<_> = e.rendered().iter().map(|c| c.bg.rgb()).collect();
                assert_eq!(
                    row,
                    vec![
                        named::BLACK,
                        crate::color::Rgb::new(127, 127, 127),
                        named::BLACK
                    ]
                );
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn hidden_child_contributes_nothing() {
        let (mut tree, classes) = setup(Size::new(4, 1));
        let root = tree.spawn_root(
            widget::panel().with(attribute::width(4) | attribute::height(1)),
        );
        let child = tree.spawn(widget::panel().with(
            attribute::width(2)
                | attribute::height(1)
                | attribute::background_color(named::RED)
                | attribute::display(false),
        ));
        tree.attach(root, child);
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        match element {
            Some(e) => {
                assert!(e.rendered().iter().all(|c| c.bg.rgb() != named::RED));
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn child_clipped_to_parent_interior() {
        let (mut tree, classes) = setup(Size::new(6, 3));
        let root = tree.spawn_root(widget::panel().with(
            attribute::width(6) | attribute::height(3) | attribute::border(true),
        ));
        let child = tree.spawn(widget::panel().with(
            attribute::width(10)
                | attribute::height(3)
                | attribute::position(1, 1)
                | attribute::background_color(named::RED),
        ));
        tree.attach(root, child);
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        match element {
            Some(e) => {
                // Red never escapes the interior ring.
                for y in 0..3u16 {
                    for x in 0..6u16 {
                        let cell = &e.rendered()[usize::from(y) * 6 + usize::from(x)];
                        let inside = (1..5).contains(&x) && y == 1;
                        if !inside {
                            assert!(
                                cell.bg.rgb() != named::RED,
                                "leaked at ({x},{y})"
                            );
                        }
                    }
                }
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn flow_column_stacks_children() {
        let (mut tree, classes) = setup(Size::new(10, 6));
        let root = tree.spawn_root(
            widget::list_view(Flow::Column).with(attribute::width(10) | attribute::height(6)),
        );
        let a = tree.spawn(widget::text_field("aa").with(attribute::width(10) | attribute::height(1)));
        let b = tree.spawn(widget::text_field("bb").with(attribute::width(10) | attribute::height(1)));
        tree.attach(root, a);
        tree.attach(root, b);
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        match element {
            Some(e) => {
                assert_eq!(row_glyphs(e.rendered(), 10, 0), "aa        ");
                assert_eq!(row_glyphs(e.rendered(), 10, 1), "bb        ");
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn scroll_view_offsets_children() {
        let (mut tree, classes) = setup(Size::new(10, 2));
        let root = tree.spawn_root(
            widget::scroll_view(Flow::Column).with(attribute::width(10) | attribute::height(2)),
        );
        for label in ["l0", "l1", "l2"] {
            let line =
                tree.spawn(widget::text_field(label).with(attribute::width(10) | attribute::height(1)));
            tree.attach(root, line);
        }
        render_element(&mut tree, &classes, root);
        // Scroll one row down.
        if let Some(e) = tree.get_mut(root) {
            e.kind.scroll_by(1);
        }
        tree.mark(root, Stain::DEEP | Stain::COLOR);
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        match element {
            Some(e) => {
                assert_eq!(row_glyphs(e.rendered(), 10, 0), "l1        ");
                assert_eq!(row_glyphs(e.rendered(), 10, 1), "l2        ");
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn dynamic_size_grows_to_children() {
        let (mut tree, classes) = setup(Size::new(40, 20));
        let root = tree.spawn_root(widget::panel());
        let dynamic = tree.spawn(
            widget::panel().with(attribute::allow_dynamic_size(true) | attribute::width(2) | attribute::height(2)),
        );
        let child = tree.spawn(widget::panel().with(
            attribute::width(8) | attribute::height(3) | attribute::position(1, 1),
        ));
        tree.attach(root, dynamic);
        tree.attach(dynamic, child);
        render_element(&mut tree, &classes, root);
        let element = tree.get(dynamic);
        match element {
            Some(e) => {
                assert_eq!(e.size, Size::new(9, 4));
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn focused_element_uses_focus_colors() {
        let (mut tree, classes) = setup(Size::new(4, 1));
        let root = tree.spawn_root(widget::panel().with(attribute::width(4) | attribute::height(1)));
        render_element(&mut tree, &classes, root);
        tree.set_focus_flag(root, true);
        render_element(&mut tree, &classes, root);
        let element = tree.get(root);
        match element {
            Some(e) => {
                // Focus defaults invert to white background.
                assert_eq!(e.rendered()[0].bg.rgb(), named::WHITE);
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn compose_frame_produces_ansi() {
        let (mut tree, classes) = setup(Size::new(4, 2));
        tree.spawn_root(widget::panel());
        let frame = compose_frame(&mut tree, &classes, false);
        assert!(frame.is_some());
        match frame {
            Some(f) => {
                assert!(f.starts_with("\x1b[H"));
                assert!(f.contains("48;2;0;0;0m"));
            }
            None => unreachable!(),
        }
    }
}
