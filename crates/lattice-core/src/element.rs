//! The element tree.
//!
//! Elements live in an arena and reference each other through [`ElementId`]
//! handles; the parent's child list owns the subtree and the root is owned
//! by the engine. Every mutation marks the affected pipeline stages dirty so
//! the next render cycle recomputes only what changed.

use std::collections::HashMap;

use crate::cell::Cell;
use crate::geometry::{Position, Rect, Size};
use crate::stain::Stain;
use crate::style::attribute::{Scalar, StyleChain};
use crate::style::classes::ClassId;
use crate::style::{AttrStatus, HandlerFn, StyleState, Styling, Tracked};
use crate::error::{LatticeError, Result};
use crate::widget::WidgetKind;

/// Handle to an element slot in the tree arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32);

/// A widget kind plus the styling chain to build it from. Specs nest:
/// chained `child` attributes carry the specs of the subtree.
#[derive(Clone, Debug)]
pub struct ElementSpec {
    /// The widget kind of the element to spawn.
    pub kind: WidgetKind,
    /// The styling chain embedded at spawn time.
    pub chain: StyleChain,
}

impl ElementSpec {
    /// Create a spec.
    pub fn new(kind: WidgetKind, chain: StyleChain) -> Self {
        Self { kind, chain }
    }

    /// Append further styling attributes.
    #[must_use]
    pub fn with(mut self, chain: impl Into<StyleChain>) -> Self {
        self.chain = self.chain | chain.into();
        self
    }
}

/// One node of the UI tree.
#[derive(Debug)]
pub struct Element {
    /// The resolved style.
    pub style: Styling,
    /// Widget kind and per-kind state.
    pub kind: WidgetKind,
    /// Pipeline stages that must rerun.
    pub dirty: Stain,
    /// Classes applied (in id order) when the CLASS stage runs.
    pub classes: Vec<ClassId>,
    /// Parent handle; `None` only for the root.
    pub parent: Option<ElementId>,
    /// Child handles in insertion order.
    pub children: Vec<ElementId>,
    /// Whether this element holds input focus.
    pub focused: bool,
    /// Whether the pointer rests on this element.
    pub hovered: bool,
    /// Cached absolute position (parent's absolute plus own position).
    pub absolute: Position,
    /// Resolved size in cells.
    pub size: Size,
    pub(crate) render_buffer: Vec<Cell>,
    pub(crate) post_buffer: Vec<Cell>,
    pub(crate) post_size: Size,
    pub(crate) post_offset: (i32, i32),
}

impl Element {
    fn new(kind: WidgetKind) -> Self {
        Self {
            style: Styling::base(),
            kind,
            dirty: Stain::ALL,
            classes: vec![0],
            parent: None,
            children: Vec::new(),
            focused: false,
            hovered: false,
            absolute: Position::default(),
            size: Size::default(),
            render_buffer: Vec::new(),
            post_buffer: Vec::new(),
            post_size: Size::default(),
            post_offset: (0, 0),
        }
    }

    /// Whether the element participates in rendering and dispatch.
    pub fn is_displayed(&self) -> bool {
        self.style.display.value
    }

    /// The color state in effect: focus beats hover beats normal.
    pub fn state(&self) -> StyleState {
        if self.focused {
            StyleState::Focus
        } else if self.hovered {
            StyleState::Hover
        } else {
            StyleState::Normal
        }
    }

    /// Whether the border ring is drawn.
    pub fn has_border(&self) -> bool {
        self.style.border_enabled.value
    }

    /// The absolute rectangle covered by this element.
    pub fn rect(&self) -> Rect {
        Rect::new(self.absolute.x, self.absolute.y, self.size.width, self.size.height)
    }

    /// The rendered buffer after post-processing. Empty until the first
    /// render cycle.
    pub fn rendered(&self) -> &[Cell] {
        &self.post_buffer
    }

    /// Size of the post-processed buffer (may exceed [`Self::size`] by the
    /// shadow extent).
    pub fn rendered_size(&self) -> Size {
        self.post_size
    }
}

/// The arena of elements plus the bookkeeping around it.
#[derive(Debug)]
pub struct Tree {
    slots: Vec<Option<Element>>,
    free: Vec<u32>,
    root: Option<ElementId>,
    names: HashMap<String, ElementId>,
    /// Terminal dimensions used to resolve viewport units and size the root.
    pub viewport: Size,
}

impl Tree {
    /// Create an empty tree for the given viewport.
    pub fn new(viewport: Size) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            names: HashMap::new(),
            viewport,
        }
    }

    /// The root element, if one was spawned.
    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    /// Borrow an element.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Borrow an element mutably. Marking stains is the caller's job; use
    /// [`Self::mark`] so parents get re-composited.
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns true when the tree holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate(&mut self, element: Element) -> ElementId {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(element);
            ElementId(index)
        } else {
            self.slots.push(Some(element));
            ElementId((self.slots.len() - 1) as u32)
        }
    }

    /// Spawn a detached element from a spec, recursively spawning and
    /// attaching the chained children, then firing `on_init` hooks.
    pub fn spawn(&mut self, spec: ElementSpec) -> ElementId {
        let ElementSpec { kind, chain } = spec;
        let mut element = Element::new(kind);
        let (stain, children) = chain.embed_into(&mut element.style);
        element.dirty.mark(stain | Stain::ALL);

        // A titled element without an explicit border gets an invisible
        // one so the title has a row to live on.
        if !element.style.title.value.is_empty()
            && element.style.border_enabled.status == AttrStatus::Uninitialized
        {
            element.style.border_enabled = Tracked::initialized(true);
            let bg = element.style.normal.background;
            element.style.normal.border = bg;
            element.style.normal.border_background = bg;
        }

        let name = element.style.name.value.clone();
        let on_init = element.style.callbacks.on_init.clone();
        let id = self.allocate(element);

        if !name.is_empty() {
            self.names.insert(name, id);
        }

        for child_spec in children {
            let child = self.spawn(child_spec);
            self.attach(id, child);
        }

        if let Some(hook) = on_init {
            hook(self, id);
        }
        id
    }

    /// Spawn the root element; its size follows the viewport.
    pub fn spawn_root(&mut self, spec: ElementSpec) -> ElementId {
        let id = self.spawn(spec);
        self.root = Some(id);
        let viewport_width = self.viewport.width;
        let viewport_height = self.viewport.height;
        if let Some(root) = self.get_mut(id) {
            if root.style.width.status == AttrStatus::Uninitialized {
                root.style.width = Tracked::initialized(Scalar::cells(viewport_width));
            }
            if root.style.height.status == AttrStatus::Uninitialized {
                root.style.height = Tracked::initialized(Scalar::cells(viewport_height));
            }
        }
        self.mark(id, Stain::ALL);
        id
    }

    /// Attach `child` under `parent`. A child already parented elsewhere is
    /// detached first; the parent's child list contains it exactly once.
    pub fn attach(&mut self, parent: ElementId, child: ElementId) {
        if parent == child || self.get(parent).is_none() || self.get(child).is_none() {
            tracing::warn!(?parent, ?child, "refusing to attach element");
            return;
        }
        if let Some(old_parent) = self.get(child).and_then(|c| c.parent) {
            if let Some(p) = self.get_mut(old_parent) {
                p.children.retain(|&c| c != child);
                p.dirty.mark(Stain::DEEP);
            }
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
            c.dirty.mark(Stain::MOVE | Stain::COLOR | Stain::EDGE);
        }
        if let Some(p) = self.get_mut(parent) {
            if !p.children.contains(&child) {
                p.children.push(child);
            }
        }
        self.mark(parent, Stain::DEEP);
    }

    /// Remove an element and its whole subtree, firing `on_destroy` hooks
    /// bottom-up.
    pub fn remove(&mut self, id: ElementId) {
        let Some(element) = self.get(id) else {
            return;
        };
        let children = element.children.clone();
        let parent = element.parent;
        for child in children {
            self.remove(child);
        }

        let hook = self.get(id).and_then(|e| e.style.callbacks.on_destroy.clone());
        if let Some(hook) = hook {
            hook(self, id);
        }

        if let Some(parent) = parent {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
            self.mark(parent, Stain::DEEP);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        if let Some(Some(element)) = self.slots.get(id.0 as usize) {
            let name = element.style.name.value.clone();
            if !name.is_empty() {
                self.names.remove(&name);
            }
        }
        self.slots[id.0 as usize] = None;
        self.free.push(id.0);
    }

    /// Mark stages dirty on an element and re-composite its ancestors.
    pub fn mark(&mut self, id: ElementId, stain: Stain) {
        if let Some(element) = self.get_mut(id) {
            element.dirty.mark(stain);
        } else {
            return;
        }
        let mut cursor = self.get(id).and_then(|e| e.parent);
        while let Some(ancestor) = cursor {
            let Some(element) = self.get_mut(ancestor) else {
                break;
            };
            element.dirty.mark(Stain::DEEP | Stain::FINALIZE);
            cursor = element.parent;
        }
    }

    /// Show or hide an element, firing the matching lifecycle hook.
    pub fn set_display(&mut self, id: ElementId, show: bool) {
        let Some(element) = self.get_mut(id) else {
            return;
        };
        if element.style.display.value == show {
            return;
        }
        element.style.display = Tracked::value(show);
        let hook = if show {
            element.style.callbacks.on_show.clone()
        } else {
            element.style.callbacks.on_hide.clone()
        };
        self.mark(id, Stain::STATE | Stain::COLOR);
        if let Some(parent) = self.get(id).and_then(|e| e.parent) {
            self.mark(parent, Stain::DEEP);
        }
        if let Some(hook) = hook {
            hook(self, id);
        }
    }

    /// Set the focus flag of a single element (dispatch-level bookkeeping
    /// lives in the dispatcher; this only flips the element state).
    pub fn set_focus_flag(&mut self, id: ElementId, focused: bool) {
        if let Some(element) = self.get_mut(id) {
            if element.focused != focused {
                element.focused = focused;
            } else {
                return;
            }
        } else {
            return;
        }
        self.mark(id, Stain::STATE | Stain::COLOR | Stain::EDGE);
    }

    /// Set the hover flag of a single element.
    pub fn set_hover_flag(&mut self, id: ElementId, hovered: bool) {
        if let Some(element) = self.get_mut(id) {
            if element.hovered != hovered {
                element.hovered = hovered;
            } else {
                return;
            }
        } else {
            return;
        }
        self.mark(id, Stain::STATE | Stain::COLOR | Stain::EDGE);
    }

    /// Set a literal width in cells. Degenerate widths are rejected.
    pub fn set_width(&mut self, id: ElementId, width: u16) -> Result<()> {
        if width < 1 {
            return Err(LatticeError::Config("width below one cell".into()));
        }
        if let Some(element) = self.get_mut(id) {
            element.style.width = Tracked::value(Scalar::cells(width));
        }
        self.mark(id, Stain::STRETCH);
        Ok(())
    }

    /// Set a literal height in cells. Degenerate heights are rejected.
    pub fn set_height(&mut self, id: ElementId, height: u16) -> Result<()> {
        if height < 1 {
            return Err(LatticeError::Config("height below one cell".into()));
        }
        if let Some(element) = self.get_mut(id) {
            element.style.height = Tracked::value(Scalar::cells(height));
        }
        self.mark(id, Stain::STRETCH);
        Ok(())
    }

    /// Move an element relative to its parent.
    pub fn set_position(&mut self, id: ElementId, position: Position) {
        if let Some(element) = self.get_mut(id) {
            element.style.position = Tracked::value(crate::style::PositionSpec {
                x: Scalar {
                    value: position.x as f32,
                    unit: crate::style::Unit::Cells,
                },
                y: Scalar {
                    value: position.y as f32,
                    unit: crate::style::Unit::Cells,
                },
                z: position.z,
            });
        }
        self.mark(id, Stain::MOVE);
    }

    /// Replace the text content of a text-bearing element.
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) {
        if let Some(element) = self.get_mut(id) {
            element.style.text = Tracked::value(text.into());
        }
        self.mark(id, Stain::COLOR);
    }

    /// Look up an element registered under `name`.
    pub fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    /// Pre-order traversal of a subtree.
    pub fn pre_order(&self, id: ElementId) -> Vec<ElementId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.get(current).is_none() {
                continue;
            }
            order.push(current);
            if let Some(element) = self.get(current) {
                for &child in element.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        order
    }

    /// Recompute the absolute-position cache of an element from its parent
    /// and propagate through the subtree.
    pub fn update_absolute(&mut self, id: ElementId) {
        let Some(element) = self.get(id) else {
            return;
        };
        let parent_info = element
            .parent
            .and_then(|p| self.get(p))
            .map(|p| (p.absolute, p.size));
        let (parent_abs, parent_size) = match parent_info {
            Some((abs, size)) => (abs, size),
            None => (Position::default(), self.viewport),
        };
        let viewport = self.viewport;

        let children = {
            let Some(element) = self.get_mut(id) else {
                return;
            };
            let spec = element.style.position.value;
            let margin = element.style.margin.value;
            let local = Position::with_z(
                spec.x.evaluate_signed(i32::from(parent_size.width), viewport)
                    + i32::from(margin.left),
                spec.y.evaluate_signed(i32::from(parent_size.height), viewport)
                    + i32::from(margin.top),
                spec.z,
            );
            element.absolute = parent_abs.offset(local);
            element.children.clone()
        };
        for child in children {
            self.update_absolute(child);
        }
    }

    /// Find the deepest displayed element containing the point, preferring
    /// higher z layers among overlapping siblings.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<ElementId> {
        let root = self.root?;
        self.hit_test_from(root, x, y)
    }

    fn hit_test_from(&self, id: ElementId, x: i32, y: i32) -> Option<ElementId> {
        let element = self.get(id)?;
        if !element.is_displayed() || !element.rect().contains(x, y) {
            return None;
        }
        // Visit higher z first so the topmost overlapping child wins.
        let mut children: Vec<ElementId> = element.children.clone();
        children.sort_by_key(|&c| {
            self.get(c)
                .map(|e| std::cmp::Reverse(e.style.position.value.z))
                .unwrap_or(std::cmp::Reverse(i32::MIN))
        });
        for child in children {
            if let Some(hit) = self.hit_test_from(child, x, y) {
                return Some(hit);
            }
        }
        Some(id)
    }

    /// The nearest scroll-accepting element at or above `start`.
    pub fn scroll_target(&self, start: ElementId) -> Option<ElementId> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let element = self.get(id)?;
            if element.style.allow_scrolling.value {
                return Some(id);
            }
            cursor = element.parent;
        }
        None
    }

    /// Collect the activation handlers registered through styling chains,
    /// for the engine to wire into the dispatcher at mount time.
    pub fn click_handlers(&self, from: ElementId) -> Vec<(ElementId, HandlerFn)> {
        let mut out = Vec::new();
        for id in self.pre_order(from) {
            if let Some(element) = self.get(id) {
                if let Some(handler) = element.style.callbacks.on_click.clone() {
                    out.push((id, handler));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::attribute::{self};
    use crate::widget;

    fn tree() -> Tree {
        Tree::new(Size::new(80, 24))
    }

    #[test]
    fn spawn_and_lookup() {
        let mut t = tree();
        let id = t.spawn(widget::panel().with(attribute::name("main")));
        assert_eq!(t.find_by_name("main"), Some(id));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn spawn_root_takes_viewport_size() {
        let mut t = tree();
        let root = t.spawn_root(widget::panel());
        let element = t.get(root);
        assert!(element.is_some());
        match element {
            Some(e) => {
                assert!((e.style.width.value.value - 80.0).abs() < f32::EPSILON);
                assert!((e.style.height.value.value - 24.0).abs() < f32::EPSILON);
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn attach_sets_links_both_ways() {
        let mut t = tree();
        let parent = t.spawn_root(widget::panel());
        let child = t.spawn(widget::panel());
        t.attach(parent, child);
        assert_eq!(t.get(child).and_then(|c| c.parent), Some(parent));
        assert_eq!(t.get(parent).map(|p| p.children.clone()), Some(vec![child]));
    }

    #[test]
    fn attach_twice_keeps_single_entry() {
        let mut t = tree();
        let parent = t.spawn_root(widget::panel());
        let child = t.spawn(widget::panel());
        t.attach(parent, child);
        t.attach(parent, child);
        assert_eq!(t.get(parent).map(|p| p.children.len()), Some(1));
    }

    #[test]
    fn reattach_detaches_from_old_parent() {
        let mut t = tree();
        let a = t.spawn_root(widget::panel());
        let b = t.spawn(widget::panel());
        let child = t.spawn(widget::panel());
        t.attach(a, child);
        t.attach(b, child);
        assert_eq!(t.get(a).map(|p| p.children.len()), Some(0));
        assert_eq!(t.get(child).and_then(|c| c.parent), Some(b));
    }

    #[test]
    fn chained_children_are_spawned() {
        let mut t = tree();
        let root = t.spawn_root(
            widget::panel().with(attribute::child(widget::text_field("hello").with(attribute::name("greeting")))),
        );
        let child = t.find_by_name("greeting");
        assert!(child.is_some());
        match child {
            Some(c) => assert_eq!(t.get(c).and_then(|e| e.parent), Some(root)),
            None => unreachable!(),
        }
    }

    #[test]
    fn remove_drops_subtree_and_names() {
        let mut t = tree();
        let root = t.spawn_root(widget::panel());
        let child = t.spawn(widget::panel().with(attribute::name("inner")));
        t.attach(root, child);
        t.remove(child);
        assert!(t.get(child).is_none());
        assert_eq!(t.find_by_name("inner"), None);
        assert_eq!(t.get(root).map(|p| p.children.len()), Some(0));
    }

    #[test]
    fn marking_child_recomposites_ancestors() {
        let mut t = tree();
        let root = t.spawn_root(widget::panel());
        let mid = t.spawn(widget::panel());
        let leaf = t.spawn(widget::panel());
        t.attach(root, mid);
        t.attach(mid, leaf);
        // Settle all stains first.
        for id in [root, mid, leaf] {
            if let Some(e) = t.get_mut(id) {
                e.dirty = Stain::CLEAN;
            }
        }
        t.mark(leaf, Stain::COLOR);
        assert!(t.get(mid).is_some_and(|e| e.dirty.has(Stain::DEEP)));
        assert!(t.get(root).is_some_and(|e| e.dirty.has(Stain::DEEP)));
    }

    #[test]
    fn absolute_position_is_sum_of_ancestors() {
        let mut t = tree();
        let root = t.spawn_root(widget::panel());
        let mid = t.spawn(widget::panel().with(attribute::position(5, 3)));
        let leaf = t.spawn(widget::panel().with(attribute::position(2, 1)));
        t.attach(root, mid);
        t.attach(mid, leaf);
        t.update_absolute(root);
        assert_eq!(t.get(mid).map(|e| e.absolute), Some(Position::new(5, 3)));
        assert_eq!(t.get(leaf).map(|e| e.absolute), Some(Position::new(7, 4)));
    }

    #[test]
    fn degenerate_sizes_rejected() {
        let mut t = tree();
        let id = t.spawn_root(widget::panel());
        assert!(t.set_width(id, 0).is_err());
        assert!(t.set_height(id, 0).is_err());
        assert!(t.set_width(id, 1).is_ok());
    }

    #[test]
    fn hidden_elements_not_hit() {
        let mut t = tree();
        let root = t.spawn_root(widget::panel());
        if let Some(e) = t.get_mut(root) {
            e.size = Size::new(80, 24);
        }
        let child = t.spawn(widget::panel().with(attribute::position(0, 0)));
        t.attach(root, child);
        if let Some(e) = t.get_mut(child) {
            e.size = Size::new(10, 10);
        }
        t.update_absolute(root);
        assert_eq!(t.hit_test(5, 5), Some(child));
        t.set_display(child, false);
        assert_eq!(t.hit_test(5, 5), Some(root));
    }

    #[test]
    fn titled_element_gets_hidden_border() {
        let mut t = tree();
        let id = t.spawn(widget::window("Log", 10, 5));
        let element = t.get(id);
        assert!(element.is_some());
        match element {
            Some(e) => {
                assert!(e.has_border());
                assert_eq!(e.style.normal.border.value, e.style.normal.background.value);
            }
            None => unreachable!(),
        }
    }

    #[test]
    fn scroll_target_walks_upward() {
        let mut t = tree();
        let root = t.spawn_root(widget::scroll_view(crate::style::Flow::Column));
        let inner = t.spawn(widget::panel());
        t.attach(root, inner);
        assert_eq!(t.scroll_target(inner), Some(root));
    }

    #[test]
    fn display_toggle_fires_hooks() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let shows = Arc::new(AtomicU32::new(0));
        let hides = Arc::new(AtomicU32::new(0));
        let s = Arc::clone(&shows);
        let h = Arc::clone(&hides);

        let mut t = tree();
        let id = t.spawn(
            widget::panel().with(
                attribute::on_show(Arc::new(move |_, _| {
                    s.fetch_add(1, Ordering::SeqCst);
                })) | attribute::on_hide(Arc::new(move |_, _| {
                    h.fetch_add(1, Ordering::SeqCst);
                })),
            ),
        );
        t.set_display(id, false);
        t.set_display(id, false); // no transition, no hook
        t.set_display(id, true);
        assert_eq!(hides.load(Ordering::SeqCst), 1);
        assert_eq!(shows.load(Ordering::SeqCst), 1);
    }
}
