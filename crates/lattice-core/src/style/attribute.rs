//! Styling attributes and the fluent `|` chain they compose into.
//!
//! Attributes are owned tagged values. Chaining with `|` appends to a
//! [`StyleChain`]; embedding a chain imprints each attribute into a
//! [`Styling`] aggregate and collects the stain bits the attributes raise.
//! Imprinting runs in two passes: instant attributes first, then delayed
//! ones (child wiring), which need the rest of the style already present.

use std::fmt;

use tracing::warn;

use super::{
    Align, AttrStatus, BorderGlyphs, DrawFn, Flow, HandlerFn, LifecycleFn, PositionSpec, Shadow,
    StyleState, Styling, Tracked,
};
use crate::color::Rgb;
use crate::element::ElementSpec;
use crate::geometry::{Margin, Size};
use crate::stain::Stain;

/// The unit system a numeric attribute carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Unit {
    /// Literal cell count.
    #[default]
    Cells,
    /// Percentage of the referenced parent dimension.
    Percent,
    /// Percentage of the viewport width.
    Vw,
    /// Percentage of the viewport height.
    Vh,
    /// Percentage of the smaller viewport dimension.
    Vmin,
    /// Percentage of the larger viewport dimension.
    Vmax,
    /// Em; collapses to the cell size in terminal mode.
    Em,
    /// Rem; collapses to the cell size in terminal mode.
    Rem,
    /// Character width; collapses to the cell size.
    Ch,
    /// x-height; collapses to the cell size.
    Ex,
    /// Fraction of the referenced parent dimension (0.0..=1.0).
    Fraction,
    /// Physical units; 1:1 in terminal mode.
    Physical,
}

/// A numeric value together with its unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scalar {
    /// The raw value, interpreted through `unit`.
    pub value: f32,
    /// The unit system.
    pub unit: Unit,
}

impl Default for Scalar {
    fn default() -> Self {
        Self {
            value: 0.0,
            unit: Unit::Cells,
        }
    }
}

impl Scalar {
    /// A literal cell count.
    pub fn cells(n: u16) -> Self {
        Self {
            value: f32::from(n),
            unit: Unit::Cells,
        }
    }

    /// A percentage of the parent dimension.
    pub fn percent(p: f32) -> Self {
        Self {
            value: p,
            unit: Unit::Percent,
        }
    }

    /// Returns true for units that need no reference to evaluate.
    pub fn is_literal(&self) -> bool {
        matches!(
            self.unit,
            Unit::Cells | Unit::Em | Unit::Rem | Unit::Ch | Unit::Ex | Unit::Physical
        )
    }

    /// Resolve to a cell count against a parent dimension and the viewport.
    /// A result with a fractional part logs a configuration warning and
    /// truncates.
    pub fn evaluate(&self, reference: u16, viewport: Size) -> u16 {
        let raw = match self.unit {
            Unit::Cells | Unit::Em | Unit::Rem | Unit::Ch | Unit::Ex | Unit::Physical => self.value,
            Unit::Percent => f32::from(reference) * self.value / 100.0,
            Unit::Vw => f32::from(viewport.width) * self.value / 100.0,
            Unit::Vh => f32::from(viewport.height) * self.value / 100.0,
            Unit::Vmin => {
                f32::from(viewport.width.min(viewport.height)) * self.value / 100.0
            }
            Unit::Vmax => {
                f32::from(viewport.width.max(viewport.height)) * self.value / 100.0
            }
            Unit::Fraction => f32::from(reference) * self.value,
        };
        if raw.fract().abs() > f32::EPSILON {
            warn!(
                value = self.value,
                unit = ?self.unit,
                result = raw,
                "non-discriminant scalar: fractional cell count truncated"
            );
        }
        raw.max(0.0) as u16
    }

    /// Resolve a (possibly negative) coordinate against a parent dimension.
    pub fn evaluate_signed(&self, reference: i32, viewport: Size) -> i32 {
        let raw = match self.unit {
            Unit::Cells | Unit::Em | Unit::Rem | Unit::Ch | Unit::Ex | Unit::Physical => self.value,
            Unit::Percent => reference as f32 * self.value / 100.0,
            Unit::Vw => f32::from(viewport.width) * self.value / 100.0,
            Unit::Vh => f32::from(viewport.height) * self.value / 100.0,
            Unit::Vmin => {
                f32::from(viewport.width.min(viewport.height)) * self.value / 100.0
            }
            Unit::Vmax => {
                f32::from(viewport.width.max(viewport.height)) * self.value / 100.0
            }
            Unit::Fraction => reference as f32 * self.value,
        };
        if raw.fract().abs() > f32::EPSILON {
            warn!(
                value = self.value,
                unit = ?self.unit,
                result = raw,
                "non-discriminant scalar: fractional coordinate truncated"
            );
        }
        raw as i32
    }
}

/// Which color field a color attribute targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorRole {
    /// Text (foreground).
    Text,
    /// Interior background.
    Background,
    /// Border foreground.
    Border,
    /// Border background.
    BorderBackground,
}

/// Application order of an attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrOrder {
    /// Applied in the first embedding pass.
    Instant,
    /// Applied after the rest of the style is present (child wiring).
    Delayed,
}

/// The value a single attribute carries.
#[derive(Clone)]
pub enum AttrKind {
    /// Element position relative to its parent.
    Position(PositionSpec),
    /// Element width.
    Width(Scalar),
    /// Element height.
    Height(Scalar),
    /// Toggle the border ring.
    EnableBorder(bool),
    /// One color field of one state.
    Color {
        /// The state variant the color belongs to.
        state: StyleState,
        /// The color field within that state.
        role: ColorRole,
        /// The color value.
        color: Rgb,
    },
    /// Replace the border glyph set.
    StyledBorder(BorderGlyphs),
    /// Child stacking axis.
    Flow(Flow),
    /// Suppress row separators when serializing.
    Wrap(bool),
    /// Allow children to extend past this element.
    AllowOverflow(bool),
    /// Grow to the bounding box of the children.
    AllowDynamicSize(bool),
    /// React to scroll inputs.
    AllowScrolling(bool),
    /// Outer spacing.
    Margin(Margin),
    /// Drop shadow.
    Shadow(Shadow),
    /// Whole-element opacity.
    Opacity(f32),
    /// Content alignment.
    Align(Align),
    /// Shown / hidden.
    Display(bool),
    /// Lookup name.
    Name(String),
    /// Border title.
    Title(String),
    /// Text content.
    Text(String),
    /// Mount hook.
    OnInit(LifecycleFn),
    /// Removal hook.
    OnDestroy(LifecycleFn),
    /// Hide hook.
    OnHide(LifecycleFn),
    /// Show hook.
    OnShow(LifecycleFn),
    /// Activation handler.
    OnClick(HandlerFn),
    /// Custom draw pass.
    OnDraw(DrawFn),
    /// Delayed child wiring.
    Child(Box<ElementSpec>),
}

impl fmt::Debug for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttrKind::Position(_) => "Position",
            AttrKind::Width(_) => "Width",
            AttrKind::Height(_) => "Height",
            AttrKind::EnableBorder(_) => "EnableBorder",
            AttrKind::Color { .. } => "Color",
            AttrKind::StyledBorder(_) => "StyledBorder",
            AttrKind::Flow(_) => "Flow",
            AttrKind::Wrap(_) => "Wrap",
            AttrKind::AllowOverflow(_) => "AllowOverflow",
            AttrKind::AllowDynamicSize(_) => "AllowDynamicSize",
            AttrKind::AllowScrolling(_) => "AllowScrolling",
            AttrKind::Margin(_) => "Margin",
            AttrKind::Shadow(_) => "Shadow",
            AttrKind::Opacity(_) => "Opacity",
            AttrKind::Align(_) => "Align",
            AttrKind::Display(_) => "Display",
            AttrKind::Name(_) => "Name",
            AttrKind::Title(_) => "Title",
            AttrKind::Text(_) => "Text",
            AttrKind::OnInit(_) => "OnInit",
            AttrKind::OnDestroy(_) => "OnDestroy",
            AttrKind::OnHide(_) => "OnHide",
            AttrKind::OnShow(_) => "OnShow",
            AttrKind::OnClick(_) => "OnClick",
            AttrKind::OnDraw(_) => "OnDraw",
            AttrKind::Child(_) => "Child",
        };
        f.write_str(label)
    }
}

/// A single styling attribute: a tagged value plus its assignment status.
#[derive(Clone, Debug)]
pub struct Attribute {
    /// The carried value.
    pub kind: AttrKind,
    /// Assignment strength used by the status-wins merge.
    pub status: AttrStatus,
}

impl Attribute {
    /// Wrap a kind as an explicitly-set attribute.
    pub fn new(kind: AttrKind) -> Self {
        Self {
            kind,
            status: AttrStatus::Value,
        }
    }

    /// The embedding pass this attribute belongs to.
    pub fn order(&self) -> AttrOrder {
        match self.kind {
            AttrKind::Child(_) => AttrOrder::Delayed,
            _ => AttrOrder::Instant,
        }
    }

    /// Write this attribute into `style`, returning the stain it raises.
    /// Invalid values (degenerate dimensions, out-of-range opacity) log a
    /// configuration error and leave the style untouched.
    pub fn imprint(self, style: &mut Styling) -> Stain {
        let status = self.status;
        fn tracked_with<T>(value: T, status: AttrStatus) -> Tracked<T> {
            Tracked { value, status }
        }

        match self.kind {
            AttrKind::Position(p) => {
                style.position = tracked_with(p, status);
                Stain::MOVE
            }
            AttrKind::Width(s) => {
                if s.is_literal() && s.value < 1.0 {
                    warn!(value = s.value, "rejected width below one cell");
                    return Stain::CLEAN;
                }
                style.width = tracked_with(s, status);
                Stain::STRETCH
            }
            AttrKind::Height(s) => {
                if s.is_literal() && s.value < 1.0 {
                    warn!(value = s.value, "rejected height below one cell");
                    return Stain::CLEAN;
                }
                style.height = tracked_with(s, status);
                Stain::STRETCH
            }
            AttrKind::EnableBorder(b) => {
                style.border_enabled = tracked_with(b, status);
                Stain::EDGE
            }
            AttrKind::Color { state, role, color } => {
                let set = match state {
                    StyleState::Normal => &mut style.normal,
                    StyleState::Hover => &mut style.hover,
                    StyleState::Focus => &mut style.focus,
                };
                let slot = match role {
                    ColorRole::Text => &mut set.text,
                    ColorRole::Background => &mut set.background,
                    ColorRole::Border => &mut set.border,
                    ColorRole::BorderBackground => &mut set.border_background,
                };
                *slot = tracked_with(color.with_alpha(255), status);
                Stain::COLOR
            }
            AttrKind::StyledBorder(glyphs) => {
                style.border_glyphs = tracked_with(glyphs, status);
                Stain::EDGE
            }
            AttrKind::Flow(f) => {
                style.flow = tracked_with(f, status);
                Stain::DEEP
            }
            AttrKind::Wrap(b) => {
                style.wrap = tracked_with(b, status);
                Stain::DEEP
            }
            AttrKind::AllowOverflow(b) => {
                style.allow_overflow = tracked_with(b, status);
                Stain::DEEP
            }
            AttrKind::AllowDynamicSize(b) => {
                style.allow_dynamic_size = tracked_with(b, status);
                Stain::DEEP
            }
            AttrKind::AllowScrolling(b) => {
                style.allow_scrolling = tracked_with(b, status);
                Stain::DEEP
            }
            AttrKind::Margin(m) => {
                style.margin = tracked_with(m, status);
                Stain::MOVE
            }
            AttrKind::Shadow(s) => {
                style.shadow = tracked_with(s, status);
                Stain::COLOR
            }
            AttrKind::Opacity(o) => {
                if !(0.0..=1.0).contains(&o) {
                    warn!(value = o, "rejected opacity outside 0..=1");
                    return Stain::CLEAN;
                }
                style.opacity = tracked_with(o, status);
                Stain::COLOR
            }
            AttrKind::Align(a) => {
                style.align = tracked_with(a, status);
                Stain::DEEP
            }
            AttrKind::Display(b) => {
                style.display = tracked_with(b, status);
                Stain::DEEP
            }
            AttrKind::Name(s) => {
                style.name = tracked_with(s, status);
                Stain::EDGE
            }
            AttrKind::Title(s) => {
                style.title = tracked_with(s, status);
                Stain::EDGE
            }
            AttrKind::Text(s) => {
                style.text = tracked_with(s, status);
                Stain::COLOR
            }
            AttrKind::OnInit(f) => {
                style.callbacks.on_init = Some(f);
                Stain::CLEAN
            }
            AttrKind::OnDestroy(f) => {
                style.callbacks.on_destroy = Some(f);
                Stain::CLEAN
            }
            AttrKind::OnHide(f) => {
                style.callbacks.on_hide = Some(f);
                Stain::CLEAN
            }
            AttrKind::OnShow(f) => {
                style.callbacks.on_show = Some(f);
                Stain::CLEAN
            }
            AttrKind::OnClick(f) => {
                style.callbacks.on_click = Some(f);
                Stain::CLEAN
            }
            AttrKind::OnDraw(f) => {
                style.callbacks.on_draw = Some(f);
                Stain::CLEAN
            }
            // Children are embedded by the delayed pass of the tree spawner.
            AttrKind::Child(_) => Stain::DEEP,
        }
    }
}

/// An owned chain of attributes built with the `|` combinator.
#[derive(Clone, Debug, Default)]
pub struct StyleChain {
    attrs: Vec<Attribute>,
}

impl StyleChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute.
    pub fn push(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    /// Number of attributes in the chain.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Returns true when no attributes were chained.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Imprint the chain into `style` in two passes (instant, then
    /// delayed), returning the combined stain and the child specifications
    /// for the tree spawner to instantiate.
    pub fn embed_into(self, style: &mut Styling) -> (Stain, Vec<ElementSpec>) {
        let mut stain = Stain::CLEAN;
        let mut delayed = Vec::new();
        let mut children = Vec::new();

        for attr in self.attrs {
            match attr.order() {
                AttrOrder::Instant => stain.mark(attr.imprint(style)),
                AttrOrder::Delayed => delayed.push(attr),
            }
        }
        for attr in delayed {
            if let AttrKind::Child(spec) = attr.kind {
                children.push(*spec);
                stain.mark(Stain::DEEP);
            }
        }
        (stain, children)
    }
}

impl From<Attribute> for StyleChain {
    fn from(attr: Attribute) -> Self {
        Self { attrs: vec![attr] }
    }
}

impl std::ops::BitOr for Attribute {
    type Output = StyleChain;
    fn bitor(self, rhs: Attribute) -> StyleChain {
        StyleChain {
            attrs: vec![self, rhs],
        }
    }
}

impl std::ops::BitOr<Attribute> for StyleChain {
    type Output = StyleChain;
    fn bitor(mut self, rhs: Attribute) -> StyleChain {
        self.attrs.push(rhs);
        self
    }
}

impl std::ops::BitOr<StyleChain> for Attribute {
    type Output = StyleChain;
    fn bitor(self, mut rhs: StyleChain) -> StyleChain {
        let mut attrs = vec![self];
        attrs.append(&mut rhs.attrs);
        StyleChain { attrs }
    }
}

impl std::ops::BitOr for StyleChain {
    type Output = StyleChain;
    fn bitor(mut self, mut rhs: StyleChain) -> StyleChain {
        self.attrs.append(&mut rhs.attrs);
        self
    }
}

// --- fluent constructors ---

/// Position relative to the parent, z = 0.
pub fn position(x: i32, y: i32) -> Attribute {
    Attribute::new(AttrKind::Position(PositionSpec {
        x: Scalar {
            value: x as f32,
            unit: Unit::Cells,
        },
        y: Scalar {
            value: y as f32,
            unit: Unit::Cells,
        },
        z: 0,
    }))
}

/// Position with an explicit stacking layer.
pub fn position_z(x: i32, y: i32, z: i32) -> Attribute {
    Attribute::new(AttrKind::Position(PositionSpec {
        x: Scalar {
            value: x as f32,
            unit: Unit::Cells,
        },
        y: Scalar {
            value: y as f32,
            unit: Unit::Cells,
        },
        z,
    }))
}

/// Literal width in cells.
pub fn width(n: u16) -> Attribute {
    Attribute::new(AttrKind::Width(Scalar::cells(n)))
}

/// Width as a percentage of the parent width.
pub fn width_percent(p: f32) -> Attribute {
    Attribute::new(AttrKind::Width(Scalar::percent(p)))
}

/// Literal height in cells.
pub fn height(n: u16) -> Attribute {
    Attribute::new(AttrKind::Height(Scalar::cells(n)))
}

/// Height as a percentage of the parent height.
pub fn height_percent(p: f32) -> Attribute {
    Attribute::new(AttrKind::Height(Scalar::percent(p)))
}

/// Toggle the border ring.
pub fn border(enabled: bool) -> Attribute {
    Attribute::new(AttrKind::EnableBorder(enabled))
}

/// Replace the border glyph set.
pub fn styled_border(glyphs: BorderGlyphs) -> Attribute {
    Attribute::new(AttrKind::StyledBorder(glyphs))
}

fn color(state: StyleState, role: ColorRole, c: Rgb) -> Attribute {
    Attribute::new(AttrKind::Color {
        state,
        role,
        color: c,
    })
}

/// Text color in the normal state.
pub fn text_color(c: Rgb) -> Attribute {
    color(StyleState::Normal, ColorRole::Text, c)
}

/// Background color in the normal state.
pub fn background_color(c: Rgb) -> Attribute {
    color(StyleState::Normal, ColorRole::Background, c)
}

/// Border color in the normal state.
pub fn border_color(c: Rgb) -> Attribute {
    color(StyleState::Normal, ColorRole::Border, c)
}

/// Border background color in the normal state.
pub fn border_background_color(c: Rgb) -> Attribute {
    color(StyleState::Normal, ColorRole::BorderBackground, c)
}

/// Text color while hovered.
pub fn hover_text_color(c: Rgb) -> Attribute {
    color(StyleState::Hover, ColorRole::Text, c)
}

/// Background color while hovered.
pub fn hover_background_color(c: Rgb) -> Attribute {
    color(StyleState::Hover, ColorRole::Background, c)
}

/// Border color while hovered.
pub fn hover_border_color(c: Rgb) -> Attribute {
    color(StyleState::Hover, ColorRole::Border, c)
}

/// Border background color while hovered.
pub fn hover_border_background_color(c: Rgb) -> Attribute {
    color(StyleState::Hover, ColorRole::BorderBackground, c)
}

/// Text color while focused.
pub fn focus_text_color(c: Rgb) -> Attribute {
    color(StyleState::Focus, ColorRole::Text, c)
}

/// Background color while focused.
pub fn focus_background_color(c: Rgb) -> Attribute {
    color(StyleState::Focus, ColorRole::Background, c)
}

/// Border color while focused.
pub fn focus_border_color(c: Rgb) -> Attribute {
    color(StyleState::Focus, ColorRole::Border, c)
}

/// Border background color while focused.
pub fn focus_border_background_color(c: Rgb) -> Attribute {
    color(StyleState::Focus, ColorRole::BorderBackground, c)
}

/// Child stacking axis.
pub fn flow(f: Flow) -> Attribute {
    Attribute::new(AttrKind::Flow(f))
}

/// Suppress row separators when serializing.
pub fn wrap(b: bool) -> Attribute {
    Attribute::new(AttrKind::Wrap(b))
}

/// Allow children to extend past this element.
pub fn allow_overflow(b: bool) -> Attribute {
    Attribute::new(AttrKind::AllowOverflow(b))
}

/// Grow to the bounding box of the children.
pub fn allow_dynamic_size(b: bool) -> Attribute {
    Attribute::new(AttrKind::AllowDynamicSize(b))
}

/// React to scroll inputs.
pub fn allow_scrolling(b: bool) -> Attribute {
    Attribute::new(AttrKind::AllowScrolling(b))
}

/// Outer spacing.
pub fn margin(m: Margin) -> Attribute {
    Attribute::new(AttrKind::Margin(m))
}

/// Drop shadow.
pub fn shadow(s: Shadow) -> Attribute {
    Attribute::new(AttrKind::Shadow(s))
}

/// Whole-element opacity.
pub fn opacity(o: f32) -> Attribute {
    Attribute::new(AttrKind::Opacity(o))
}

/// Content alignment.
pub fn align(a: Align) -> Attribute {
    Attribute::new(AttrKind::Align(a))
}

/// Shown / hidden.
pub fn display(b: bool) -> Attribute {
    Attribute::new(AttrKind::Display(b))
}

/// Lookup name.
pub fn name(s: impl Into<String>) -> Attribute {
    Attribute::new(AttrKind::Name(s.into()))
}

/// Border title.
pub fn title(s: impl Into<String>) -> Attribute {
    Attribute::new(AttrKind::Title(s.into()))
}

/// Text content.
pub fn text(s: impl Into<String>) -> Attribute {
    Attribute::new(AttrKind::Text(s.into()))
}

/// Mount hook.
pub fn on_init(f: LifecycleFn) -> Attribute {
    Attribute::new(AttrKind::OnInit(f))
}

/// Removal hook.
pub fn on_destroy(f: LifecycleFn) -> Attribute {
    Attribute::new(AttrKind::OnDestroy(f))
}

/// Hide hook.
pub fn on_hide(f: LifecycleFn) -> Attribute {
    Attribute::new(AttrKind::OnHide(f))
}

/// Show hook.
pub fn on_show(f: LifecycleFn) -> Attribute {
    Attribute::new(AttrKind::OnShow(f))
}

/// Activation handler, wired into the dispatcher at mount time.
pub fn on_click(f: HandlerFn) -> Attribute {
    Attribute::new(AttrKind::OnClick(f))
}

/// Custom draw pass.
pub fn on_draw(f: DrawFn) -> Attribute {
    Attribute::new(AttrKind::OnDraw(f))
}

/// Delayed child wiring.
pub fn child(spec: ElementSpec) -> Attribute {
    Attribute::new(AttrKind::Child(Box::new(spec)))
}
