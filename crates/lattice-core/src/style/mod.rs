//! Styling system: resolved style aggregates and their building blocks.
//!
//! An element owns exactly one [`Styling`] — the fully resolved, numeric
//! style. Styles are built from attribute chains (see [`attribute`]) or
//! copied in from registered classes (see [`classes`]); in both cases the
//! merge rule is *higher status wins*, with later assignments winning ties.

pub mod attribute;
pub mod classes;

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::cell::Cell;
use crate::color::{Rgb, Rgba, named};
use crate::element::{ElementId, Tree};
use crate::error::Result;
use crate::geometry::{Margin, Size};
use crate::input::Input;

pub use attribute::{Attribute, Scalar, StyleChain, Unit};

/// How strongly a style value is held. Higher wins when merging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttrStatus {
    /// The value was never touched; any merge overwrites it.
    #[default]
    Uninitialized,
    /// A default was installed (e.g. from the default class).
    Initialized,
    /// The value was set explicitly.
    Value,
}

/// A style field together with the status it was assigned at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tracked<T> {
    /// The held value.
    pub value: T,
    /// Assignment strength.
    pub status: AttrStatus,
}

impl<T> Tracked<T> {
    /// A field holding an explicit value.
    pub fn value(value: T) -> Self {
        Self {
            value,
            status: AttrStatus::Value,
        }
    }

    /// A field holding an installed default.
    pub fn initialized(value: T) -> Self {
        Self {
            value,
            status: AttrStatus::Initialized,
        }
    }

    /// Overwrite from `other` under the status-wins rule. Equal non-empty
    /// status means the incoming (later) assignment wins. Returns true if
    /// the value was replaced.
    pub fn merge_from(&mut self, other: &Self) -> bool
    where
        T: Clone,
    {
        if other.status == AttrStatus::Uninitialized || other.status < self.status {
            return false;
        }
        self.value = other.value.clone();
        self.status = other.status;
        true
    }
}

/// Growth axis for list containers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Flow {
    /// Children stack left to right.
    #[default]
    Row,
    /// Children stack top to bottom.
    Column,
}

/// Content alignment inside an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    /// Align to the left edge.
    #[default]
    Left,
    /// Align to the right edge.
    Right,
    /// Center horizontally.
    Center,
    /// Align to the top edge.
    Up,
    /// Align to the bottom edge.
    Down,
}

/// Color selection state of an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StyleState {
    /// Neither hovered nor focused.
    #[default]
    Normal,
    /// The pointer rests on the element.
    Hover,
    /// The element holds input focus.
    Focus,
}

/// The eleven glyphs a border is drawn from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BorderGlyphs {
    /// Top-left corner.
    pub top_left: String,
    /// Top-right corner.
    pub top_right: String,
    /// Bottom-left corner.
    pub bottom_left: String,
    /// Bottom-right corner.
    pub bottom_right: String,
    /// Horizontal line.
    pub horizontal: String,
    /// Vertical line.
    pub vertical: String,
    /// T-junction opening downward.
    pub t_down: String,
    /// T-junction opening upward.
    pub t_up: String,
    /// T-junction opening rightward.
    pub t_right: String,
    /// T-junction opening leftward.
    pub t_left: String,
    /// Four-way crossing.
    pub cross: String,
}

impl Default for BorderGlyphs {
    fn default() -> Self {
        Self {
            top_left: "┌".into(),
            top_right: "┐".into(),
            bottom_left: "└".into(),
            bottom_right: "┘".into(),
            horizontal: "─".into(),
            vertical: "│".into(),
            t_down: "┬".into(),
            t_up: "┴".into(),
            t_right: "├".into(),
            t_left: "┤".into(),
            cross: "┼".into(),
        }
    }
}

impl BorderGlyphs {
    /// Double-line variant.
    pub fn double() -> Self {
        Self {
            top_left: "╔".into(),
            top_right: "╗".into(),
            bottom_left: "╚".into(),
            bottom_right: "╝".into(),
            horizontal: "═".into(),
            vertical: "║".into(),
            t_down: "╦".into(),
            t_up: "╩".into(),
            t_right: "╠".into(),
            t_left: "╣".into(),
            cross: "╬".into(),
        }
    }

    /// Look up the junction glyph for a 4-bit direction mask. Bits: 1 = a
    /// border continues upward, 2 = downward, 4 = leftward, 8 = rightward.
    /// Masks with fewer than two continuations have no junction glyph.
    pub fn junction(&self, mask: u8) -> Option<&str> {
        const UP: u8 = 1;
        const DOWN: u8 = 2;
        const LEFT: u8 = 4;
        const RIGHT: u8 = 8;
        let glyph = match mask {
            m if m == UP | DOWN => &self.vertical,
            m if m == LEFT | RIGHT => &self.horizontal,
            m if m == DOWN | RIGHT => &self.top_left,
            m if m == DOWN | LEFT => &self.top_right,
            m if m == UP | RIGHT => &self.bottom_left,
            m if m == UP | LEFT => &self.bottom_right,
            m if m == UP | DOWN | RIGHT => &self.t_right,
            m if m == UP | DOWN | LEFT => &self.t_left,
            m if m == DOWN | LEFT | RIGHT => &self.t_down,
            m if m == UP | LEFT | RIGHT => &self.t_up,
            m if m == UP | DOWN | LEFT | RIGHT => &self.cross,
            _ => return None,
        };
        Some(glyph.as_str())
    }
}

/// Drop-shadow parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    /// Cell offset of the shadow per falloff step.
    pub direction: (i16, i16),
    /// Shadow color.
    pub color: Rgb,
    /// Base opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Number of falloff steps.
    pub length: u16,
    /// Whether the shadow is drawn at all.
    pub enabled: bool,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            direction: (1, 1),
            color: named::BLACK,
            opacity: 0.5,
            length: 1,
            enabled: false,
        }
    }
}

/// The four color roles of one style state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorSet {
    /// Text (foreground) color.
    pub text: Tracked<Rgba>,
    /// Interior background color.
    pub background: Tracked<Rgba>,
    /// Border foreground color.
    pub border: Tracked<Rgba>,
    /// Border background color.
    pub border_background: Tracked<Rgba>,
}

impl ColorSet {
    fn merge_from(&mut self, other: &ColorSet) -> bool {
        let mut changed = false;
        changed |= self.text.merge_from(&other.text);
        changed |= self.background.merge_from(&other.background);
        changed |= self.border.merge_from(&other.border);
        changed |= self.border_background.merge_from(&other.border_background);
        changed
    }
}

/// Position specification: x/y carry units, z is always literal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PositionSpec {
    /// Horizontal coordinate.
    pub x: Scalar,
    /// Vertical coordinate.
    pub y: Scalar,
    /// Stacking layer.
    pub z: i32,
}

/// Lifecycle hook invoked with the tree and the element it fires for.
pub type LifecycleFn = Arc<dyn Fn(&mut Tree, ElementId) + Send + Sync>;

/// Custom border/content draw hook: `(style, size, buffer)`.
pub type DrawFn = Arc<dyn Fn(&Styling, Size, &mut Vec<Cell>) + Send + Sync>;

/// Event handler closure. Returning `Ok(true)` consumes the input; an error
/// is logged and treated as not consumed.
pub type HandlerFn = Arc<Mutex<dyn FnMut(&Input, &mut Tree) -> Result<bool> + Send>>;

/// The lifecycle and drawing callbacks an element may register.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Fired once when the element enters a tree.
    pub on_init: Option<LifecycleFn>,
    /// Fired when the element is removed.
    pub on_destroy: Option<LifecycleFn>,
    /// Fired when the element becomes hidden.
    pub on_hide: Option<LifecycleFn>,
    /// Fired when the element becomes shown.
    pub on_show: Option<LifecycleFn>,
    /// Activation handler, wired into the dispatcher at mount time.
    pub on_click: Option<HandlerFn>,
    /// Custom draw pass, replacing the default border drawing.
    pub on_draw: Option<DrawFn>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_init", &self.on_init.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .field("on_hide", &self.on_hide.is_some())
            .field("on_show", &self.on_show.is_some())
            .field("on_click", &self.on_click.is_some())
            .field("on_draw", &self.on_draw.is_some())
            .finish()
    }
}

/// The resolved style bound to an element.
#[derive(Clone, Debug, Default)]
pub struct Styling {
    /// Position relative to the parent.
    pub position: Tracked<PositionSpec>,
    /// Width specification.
    pub width: Tracked<Scalar>,
    /// Height specification.
    pub height: Tracked<Scalar>,
    /// Whether the border ring is drawn.
    pub border_enabled: Tracked<bool>,
    /// The glyph set the border is drawn from.
    pub border_glyphs: Tracked<BorderGlyphs>,
    /// Colors when neither hovered nor focused.
    pub normal: ColorSet,
    /// Colors while hovered.
    pub hover: ColorSet,
    /// Colors while focused.
    pub focus: ColorSet,
    /// Growth axis for child stacking.
    pub flow: Tracked<Flow>,
    /// Suppress row separators in the serialized frame.
    pub wrap: Tracked<bool>,
    /// Children may extend past this element without clipping errors.
    pub allow_overflow: Tracked<bool>,
    /// Size follows the bounding box of the children.
    pub allow_dynamic_size: Tracked<bool>,
    /// The element reacts to scroll inputs.
    pub allow_scrolling: Tracked<bool>,
    /// Outer spacing.
    pub margin: Tracked<Margin>,
    /// Drop shadow.
    pub shadow: Tracked<Shadow>,
    /// Whole-element opacity in `0.0..=1.0`.
    pub opacity: Tracked<f32>,
    /// Content alignment.
    pub align: Tracked<Align>,
    /// Shown / hidden.
    pub display: Tracked<bool>,
    /// Lookup name.
    pub name: Tracked<String>,
    /// Title drawn into the top border.
    pub title: Tracked<String>,
    /// Text content for text-bearing widgets.
    pub text: Tracked<String>,
    /// Registered callbacks.
    pub callbacks: Callbacks,
}

impl Styling {
    /// A style with sensible visible defaults: white on black, shown,
    /// fully opaque, default border glyph set.
    pub fn base() -> Self {
        Self {
            border_glyphs: Tracked::initialized(BorderGlyphs::default()),
            normal: ColorSet {
                text: Tracked::initialized(named::WHITE.with_alpha(255)),
                background: Tracked::initialized(named::BLACK.with_alpha(255)),
                border: Tracked::initialized(named::WHITE.with_alpha(255)),
                border_background: Tracked::initialized(named::BLACK.with_alpha(255)),
            },
            hover: ColorSet {
                text: Tracked::initialized(named::WHITE.with_alpha(255)),
                background: Tracked::initialized(named::DARK_GRAY.with_alpha(255)),
                border: Tracked::initialized(named::WHITE.with_alpha(255)),
                border_background: Tracked::initialized(named::BLACK.with_alpha(255)),
            },
            focus: ColorSet {
                text: Tracked::initialized(named::BLACK.with_alpha(255)),
                background: Tracked::initialized(named::WHITE.with_alpha(255)),
                border: Tracked::initialized(named::WHITE.with_alpha(255)),
                border_background: Tracked::initialized(named::BLACK.with_alpha(255)),
            },
            opacity: Tracked::initialized(1.0),
            display: Tracked::initialized(true),
            ..Self::default()
        }
    }

    /// The color set for a given state, falling back to normal colors for
    /// roles the state never initialized.
    pub fn colors(&self, state: StyleState) -> ResolvedColors {
        let pick = |specific: &Tracked<Rgba>, normal: &Tracked<Rgba>| -> Rgba {
            if specific.status == AttrStatus::Uninitialized {
                normal.value
            } else {
                specific.value
            }
        };
        let set = match state {
            StyleState::Normal => &self.normal,
            StyleState::Hover => &self.hover,
            StyleState::Focus => &self.focus,
        };
        ResolvedColors {
            text: pick(&set.text, &self.normal.text),
            background: pick(&set.background, &self.normal.background),
            border: pick(&set.border, &self.normal.border),
            border_background: pick(&set.border_background, &self.normal.border_background),
        }
    }

    /// Copy initialized fields of `other` into this style under the
    /// status-wins rule, returning the stains raised by the fields that
    /// actually changed. Used by class application.
    pub fn merge_from(&mut self, other: &Styling) -> crate::stain::Stain {
        use crate::stain::Stain;
        let mut stain = Stain::CLEAN;

        if self.position.merge_from(&other.position) {
            stain.mark(Stain::MOVE);
        }
        if self.width.merge_from(&other.width) | self.height.merge_from(&other.height) {
            stain.mark(Stain::STRETCH);
        }
        if self.border_enabled.merge_from(&other.border_enabled)
            | self.border_glyphs.merge_from(&other.border_glyphs)
        {
            stain.mark(Stain::EDGE);
        }
        if self.normal.merge_from(&other.normal)
            | self.hover.merge_from(&other.hover)
            | self.focus.merge_from(&other.focus)
            | self.shadow.merge_from(&other.shadow)
            | self.opacity.merge_from(&other.opacity)
        {
            stain.mark(Stain::COLOR);
        }
        if self.flow.merge_from(&other.flow)
            | self.wrap.merge_from(&other.wrap)
            | self.allow_overflow.merge_from(&other.allow_overflow)
            | self.allow_dynamic_size.merge_from(&other.allow_dynamic_size)
            | self.allow_scrolling.merge_from(&other.allow_scrolling)
            | self.align.merge_from(&other.align)
            | self.display.merge_from(&other.display)
        {
            stain.mark(Stain::DEEP);
        }
        if self.margin.merge_from(&other.margin) {
            stain.mark(Stain::MOVE);
        }
        if self.name.merge_from(&other.name) | self.title.merge_from(&other.title) {
            stain.mark(Stain::EDGE);
        }
        if self.text.merge_from(&other.text) {
            stain.mark(Stain::COLOR);
        }
        stain
    }
}

/// The four colors in effect for one element state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedColors {
    /// Text (foreground) color.
    pub text: Rgba,
    /// Interior background color.
    pub background: Rgba,
    /// Border foreground color.
    pub border: Rgba,
    /// Border background color.
    pub border_background: Rgba,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering() {
        assert!(AttrStatus::Uninitialized < AttrStatus::Initialized);
        assert!(AttrStatus::Initialized < AttrStatus::Value);
    }

    #[test]
    fn merge_higher_status_wins() {
        let mut field = Tracked::value(1u16);
        let incoming = Tracked::initialized(2u16);
        assert!(!field.merge_from(&incoming));
        assert_eq!(field.value, 1);
    }

    #[test]
    fn merge_equal_status_later_wins() {
        let mut field = Tracked::value(1u16);
        let incoming = Tracked::value(2u16);
        assert!(field.merge_from(&incoming));
        assert_eq!(field.value, 2);
    }

    #[test]
    fn merge_ignores_uninitialized() {
        let mut field = Tracked::initialized(1u16);
        let incoming = Tracked::<u16>::default();
        assert!(!field.merge_from(&incoming));
        assert_eq!(field.value, 1);
    }

    #[test]
    fn base_style_defaults() {
        let style = Styling::base();
        assert!(style.display.value);
        assert!((style.opacity.value - 1.0).abs() < f32::EPSILON);
        let colors = style.colors(StyleState::Normal);
        assert_eq!(colors.text, named::WHITE.with_alpha(255));
        assert_eq!(colors.background, named::BLACK.with_alpha(255));
    }

    #[test]
    fn state_colors_fall_back_to_normal() {
        let mut style = Styling::base();
        // The hover set only overrides the background.
        style.hover.border = Tracked::default();
        let colors = style.colors(StyleState::Hover);
        assert_eq!(colors.border, style.normal.border.value);
        assert_eq!(colors.background, named::DARK_GRAY.with_alpha(255));
    }

    #[test]
    fn class_merge_raises_specific_stains() {
        use crate::stain::Stain;
        let mut style = Styling::base();
        let mut class = Styling::default();
        class.width = Tracked::value(Scalar::cells(10));
        class.normal.background = Tracked::value(named::RED.with_alpha(255));
        let stain = style.merge_from(&class);
        assert!(stain.has(Stain::STRETCH));
        assert!(stain.has(Stain::COLOR));
        assert!(!stain.has(Stain::MOVE));
    }

    #[test]
    fn junction_lookup() {
        let glyphs = BorderGlyphs::default();
        assert_eq!(glyphs.junction(1 | 2), Some("│"));
        assert_eq!(glyphs.junction(4 | 8), Some("─"));
        assert_eq!(glyphs.junction(2 | 8), Some("┌"));
        assert_eq!(glyphs.junction(1 | 2 | 4 | 8), Some("┼"));
        assert_eq!(glyphs.junction(1), None);
        assert_eq!(glyphs.junction(0), None);
    }
}
