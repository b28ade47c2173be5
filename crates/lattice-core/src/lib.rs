//! lattice-core: a retained-mode terminal UI engine.
//!
//! This crate composes a tree of styled elements into a single character
//! grid, serializes it as ANSI-escaped output, and drives it from raw
//! keyboard and mouse bytes. Rendering is dirty-region based: each element
//! carries a stain mask and only marked pipeline stages rerun. Three
//! threads (render, passive scheduler, input) cooperate around one engine
//! state behind a pause lock.

pub mod canvas;
pub mod cell;
pub mod color;
pub mod dispatch;
pub mod element;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod render;
pub mod rope;
pub mod simd;
pub mod stain;
pub mod style;
pub mod terminal;
pub mod timer;
pub mod watch;
pub mod widget;

pub use canvas::{PixelSurface, Sprite, SpriteSurface};
pub use cell::{Cell, CellFlags, Glyph};
pub use color::{Rgb, Rgba, named};
pub use dispatch::{Action, Dispatcher};
pub use element::{Element, ElementId, ElementSpec, Tree};
pub use engine::{Engine, EngineState, PauseGuard, Settings, MAX_Z};
pub use error::{LatticeError, Result};
pub use geometry::{Margin, Position, Rect, Size};
pub use input::keyboard::{Button, KeyboardState};
pub use input::translate::Translator;
pub use input::{Criteria, Input};
pub use render::{compose_frame, render_element};
pub use rope::FrameRope;
pub use stain::Stain;
pub use style::attribute::{
    align, allow_dynamic_size, allow_overflow, allow_scrolling, background_color, border,
    border_background_color, border_color, child, display, flow, focus_background_color,
    focus_border_background_color, focus_border_color, focus_text_color, height, height_percent,
    hover_background_color, hover_border_background_color, hover_border_color, hover_text_color,
    margin, name, on_click, on_destroy, on_draw, on_hide, on_init, on_show, opacity, position,
    position_z, shadow, styled_border, text, text_color, title, width, width_percent, wrap,
};
pub use style::classes::{ClassId, ClassRegistry};
pub use style::{
    Align, AttrStatus, Attribute, BorderGlyphs, ColorSet, Flow, ResolvedColors, Scalar, Shadow,
    StyleChain, StyleState, Styling, Tracked, Unit,
};
pub use terminal::{CrosstermBackend, Terminal, TestBackend};
pub use timer::{JobFlags, TimerJob, TimerList};
pub use watch::{CaptureSink, CaptureStream, FileStreamer};
pub use widget::{
    WidgetKind, button, canvas, list_view, panel, progress_bar, scroll_view, sprite_canvas,
    switch, text_field, window,
};
