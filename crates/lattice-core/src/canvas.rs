//! Pixel-style rendering surfaces.
//!
//! [`PixelSurface`] backs the plain canvas: one RGB value per cell.
//! [`SpriteSurface`] backs the animated terminal canvas: each slot holds a
//! [`Sprite`] whose frames are interpolated per tick. Contiguous runs of
//! multi-frame sprites are grouped into power-of-two blocks so the frame
//! arithmetic can run through the lane-batched helpers in [`crate::simd`].

use crate::cell::Cell;
use crate::color::{Rgb, Rgba};
use crate::geometry::Size;
use crate::simd::{MAX_LANES, batch_div, batch_modulo};

/// Smallest slot run worth batching.
const MIN_GROUP: usize = 2;

/// An animated cell: an ordered list of frames plus playback parameters.
#[derive(Clone, Debug)]
pub struct Sprite {
    /// The animation frames. Never empty.
    pub frames: Vec<Cell>,
    /// Tick offset, staggering sprites that share a speed.
    pub offset: u8,
    /// Tick multiplier.
    pub speed: u8,
    /// `256 / frames.len()`: the tick span covered by one frame.
    pub frame_distance: f32,
    /// Whether the frame count is a power of two.
    pub power_of_two: bool,
}

impl Sprite {
    /// Create a sprite from its frames. An empty frame list is replaced by
    /// a single blank frame.
    pub fn new(frames: Vec<Cell>, offset: u8, speed: u8) -> Self {
        let frames = if frames.is_empty() {
            vec![Cell::blank()]
        } else {
            frames
        };
        let count = frames.len();
        Self {
            frames,
            offset,
            speed,
            frame_distance: 256.0 / count as f32,
            power_of_two: count.is_power_of_two(),
        }
    }

    /// A static sprite showing a single cell.
    pub fn still(cell: Cell) -> Self {
        Self::new(vec![cell], 0, 1)
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// True when the sprite animates.
    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// The local animation clock at a global tick, wrapped to a byte.
    fn clock(&self, tick: u8) -> u8 {
        tick.wrapping_add(self.offset).wrapping_mul(self.speed)
    }

    /// Render the sprite at a global tick: the frame below the clock with
    /// its colors interpolated toward the next frame.
    pub fn render(&self, tick: u8) -> Cell {
        let count = self.frames.len();
        if count < 2 {
            return self.frames[count - 1].clone();
        }

        let t = f32::from(self.clock(tick));
        let below = ((t / self.frame_distance).floor() as usize) % count;
        let above = (below + 1) % count;
        let mix = (t - below as f32 * self.frame_distance) / self.frame_distance;

        lerp_frames(&self.frames[below], &self.frames[above], mix)
    }
}

impl Default for Sprite {
    fn default() -> Self {
        Self::still(Cell::blank())
    }
}

/// Interpolate the colors of `below` toward `above` by `mix`, keeping the
/// glyph of the lower frame.
fn lerp_frames(below: &Cell, above: &Cell, mix: f32) -> Cell {
    let fg = below.fg.rgb().lerp(above.fg.rgb(), mix).with_alpha(below.fg.a);
    let bg = below.bg.rgb().lerp(above.bg.rgb(), mix).with_alpha(below.bg.a);
    let mut out = below.clone();
    out.fg = fg;
    out.bg = bg;
    out
}

/// A canvas of plain RGB cells.
#[derive(Clone, Debug)]
pub struct PixelSurface {
    size: Size,
    pixels: Vec<Rgb>,
}

impl PixelSurface {
    /// Create a surface filled with black.
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: vec![Rgb::default(); size.area()],
        }
    }

    /// Surface dimensions.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Set one pixel. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u16, y: u16, color: Rgb) {
        if x < self.size.width && y < self.size.height {
            self.pixels[usize::from(y) * usize::from(self.size.width) + usize::from(x)] = color;
        }
    }

    /// Read one pixel.
    pub fn get(&self, x: u16, y: u16) -> Option<Rgb> {
        if x < self.size.width && y < self.size.height {
            Some(self.pixels[usize::from(y) * usize::from(self.size.width) + usize::from(x)])
        } else {
            None
        }
    }

    /// Write the surface into a cell buffer of the same dimensions: each
    /// pixel becomes a space over its color.
    pub fn render_into(&self, out: &mut [Cell]) {
        for (cell, pixel) in out.iter_mut().zip(&self.pixels) {
            *cell = Cell::filled(Rgba::from(*pixel));
        }
    }
}

/// A canvas of sprite slots with grouped, batched frame interpolation.
#[derive(Clone, Debug)]
pub struct SpriteSurface {
    size: Size,
    sprites: Vec<Sprite>,
    /// Batch length recorded at the starting slot of each group.
    groups: Vec<u16>,
    /// Global animation tick.
    pub tick: u8,
}

impl SpriteSurface {
    /// Create a surface of still blank sprites.
    pub fn new(size: Size) -> Self {
        let len = size.area();
        Self {
            size,
            sprites: vec![Sprite::default(); len],
            groups: vec![1; len],
            tick: 0,
        }
    }

    /// Surface dimensions.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Place a sprite. Returns true when the surface now animates.
    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u16, y: u16, sprite: Sprite) -> bool {
        if x < self.size.width && y < self.size.height {
            let idx = usize::from(y) * usize::from(self.size.width) + usize::from(x);
            self.sprites[idx] = sprite;
            self.group_heuristics();
        }
        self.is_animated()
    }

    /// Read a sprite slot.
    pub fn get(&self, x: u16, y: u16) -> Option<&Sprite> {
        if x < self.size.width && y < self.size.height {
            self.sprites
                .get(usize::from(y) * usize::from(self.size.width) + usize::from(x))
        } else {
            None
        }
    }

    /// True when any slot holds a multi-frame sprite.
    pub fn is_animated(&self) -> bool {
        self.sprites.iter().any(Sprite::is_animated)
    }

    /// Advance the global animation clock.
    pub fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Recompute batch groups: walk from the end toward the start in
    /// [`MAX_LANES`] steps; a window where every sprite animates is
    /// recorded whole, otherwise it is split in halves down to
    /// [`MIN_GROUP`]. Slots outside any group keep length 1.
    pub fn group_heuristics(&mut self) {
        for g in &mut self.groups {
            *g = 1;
        }
        if MAX_LANES < MIN_GROUP || self.sprites.len() < MAX_LANES {
            return;
        }
        let mut start = (self.sprites.len() / MAX_LANES) * MAX_LANES;
        while start >= MAX_LANES {
            start -= MAX_LANES;
            self.group(start, MAX_LANES);
        }
    }

    fn group(&mut self, start: usize, length: usize) {
        if length < MIN_GROUP || start + length > self.sprites.len() {
            return;
        }
        let all_multi_frame = self.sprites[start..start + length]
            .iter()
            .all(Sprite::is_animated);
        if all_multi_frame {
            self.groups[start] = length as u16;
        } else {
            // Power-of-two lengths halve cleanly.
            let half = length >> 1;
            self.group(start, half);
            self.group(start + half, half);
        }
    }

    /// Render every slot at the current tick into `out`, batching grouped
    /// slots through the lane helpers and dropping to the scalar sprite
    /// path for singleton slots.
    pub fn render_into(&self, out: &mut [Cell]) {
        let mut clock = [0.0f32; MAX_LANES];
        let mut distance = [1.0f32; MAX_LANES];
        let mut quotient = [0.0f32; MAX_LANES];
        let mut above_dividend = [0.0f32; MAX_LANES];
        let mut counts = [1.0f32; MAX_LANES];
        let mut above = [0.0f32; MAX_LANES];
        let mut remainder = [0.0f32; MAX_LANES];
        let mut mix = [0.0f32; MAX_LANES];

        let mut i = 0;
        while i < self.sprites.len() {
            let group_len = usize::from(self.groups[i]).max(1);

            if group_len == 1 {
                if let Some(slot) = out.get_mut(i) {
                    *slot = self.sprites[i].render(self.tick);
                }
                i += 1;
                continue;
            }

            for j in 0..group_len {
                let sprite = &self.sprites[i + j];
                clock[j] = f32::from(sprite.clock(self.tick));
                distance[j] = sprite.frame_distance;
                counts[j] = sprite.frame_count() as f32;
            }

            // below = floor(clock / distance) mod count; the mod collapses
            // because the clock is already wrapped to a byte.
            batch_div(&clock, &distance, &mut quotient, group_len);
            for j in 0..group_len {
                let below = quotient[j].floor() % counts[j];
                above_dividend[j] = below + 1.0;
                remainder[j] = clock[j] - below * distance[j];
                quotient[j] = below;
            }
            batch_modulo(&above_dividend, &counts, &mut above, group_len);
            batch_div(&remainder, &distance, &mut mix, group_len);

            for j in 0..group_len {
                let sprite = &self.sprites[i + j];
                let below = quotient[j] as usize % sprite.frame_count();
                let above = above[j] as usize % sprite.frame_count();
                if let Some(slot) = out.get_mut(i + j) {
                    *slot = lerp_frames(&sprite.frames[below], &sprite.frames[above], mix[j]);
                }
            }
            i += group_len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::named;

    fn frame(fg: Rgb) -> Cell {
        Cell::new('o', fg.with_alpha(255), named::BLACK.with_alpha(255))
    }

    fn four_frame_sprite() -> Sprite {
        Sprite::new(
            vec![
                frame(Rgb::new(0, 0, 0)),
                frame(Rgb::new(100, 100, 100)),
                frame(Rgb::new(200, 200, 200)),
                frame(Rgb::new(50, 50, 50)),
            ],
            0,
            1,
        )
    }

    #[test]
    fn frame_distance_from_count() {
        let sprite = four_frame_sprite();
        assert!((sprite.frame_distance - 64.0).abs() < f32::EPSILON);
        assert!(sprite.power_of_two);
    }

    #[test]
    fn tick_zero_is_frame_zero() {
        let sprite = four_frame_sprite();
        let cell = sprite.render(0);
        assert_eq!(cell.fg.rgb(), Rgb::new(0, 0, 0));
    }

    #[test]
    fn halfway_tick_lerps_halfway() {
        let sprite = four_frame_sprite();
        let cell = sprite.render(32);
        // Halfway between frame 0 (0,0,0) and frame 1 (100,100,100).
        assert_eq!(cell.fg.rgb(), Rgb::new(50, 50, 50));
    }

    #[test]
    fn full_distance_tick_is_next_frame() {
        let sprite = four_frame_sprite();
        let cell = sprite.render(64);
        assert_eq!(cell.fg.rgb(), Rgb::new(100, 100, 100));
    }

    #[test]
    fn last_frame_wraps_to_first() {
        let sprite = four_frame_sprite();
        // t = 224 is frame 3 at mix 0.5 toward frame 0.
        let cell = sprite.render(224);
        assert_eq!(cell.fg.rgb(), Rgb::new(50, 50, 50).lerp(Rgb::new(0, 0, 0), 0.5));
    }

    #[test]
    fn still_sprite_ignores_tick() {
        let sprite = Sprite::still(frame(Rgb::new(9, 9, 9)));
        assert_eq!(sprite.render(0), sprite.render(123));
    }

    #[test]
    fn offset_shifts_clock() {
        let sprite = Sprite::new(four_frame_sprite().frames, 64, 1);
        let cell = sprite.render(0);
        assert_eq!(cell.fg.rgb(), Rgb::new(100, 100, 100));
    }

    #[test]
    fn pixel_surface_set_get() {
        let mut surface = PixelSurface::new(Size::new(4, 2));
        surface.set(1, 1, named::RED);
        assert_eq!(surface.get(1, 1), Some(named::RED));
        assert_eq!(surface.get(4, 0), None);
    }

    #[test]
    fn pixel_surface_renders_backgrounds() {
        let mut surface = PixelSurface::new(Size::new(2, 1));
        surface.set(0, 0, named::BLUE);
        let mut cells = vec![Cell::blank(); 2];
        surface.render_into(&mut cells);
        assert_eq!(cells[0].bg.rgb(), named::BLUE);
        assert!(cells[0].is_space());
    }

    #[test]
    fn sprite_surface_detects_animation() {
        let mut surface = SpriteSurface::new(Size::new(4, 1));
        assert!(!surface.is_animated());
        surface.set(0, 0, four_frame_sprite());
        assert!(surface.is_animated());
    }

    #[test]
    fn grouping_records_full_windows() {
        if MAX_LANES < MIN_GROUP {
            return; // No batching on scalar-only builds.
        }
        let mut surface = SpriteSurface::new(Size::new(MAX_LANES as u16, 1));
        for x in 0..MAX_LANES as u16 {
            surface.set(x, 0, four_frame_sprite());
        }
        assert_eq!(surface.groups[0], MAX_LANES as u16);
    }

    #[test]
    fn grouping_halves_mixed_windows() {
        if MAX_LANES < 4 {
            return;
        }
        let mut surface = SpriteSurface::new(Size::new(MAX_LANES as u16, 1));
        for x in 0..MAX_LANES as u16 {
            surface.set(x, 0, four_frame_sprite());
        }
        // Break the second half of the window with a still sprite.
        surface.set((MAX_LANES - 1) as u16, 0, Sprite::default());
        assert_eq!(surface.groups[0] as usize, MAX_LANES / 2);
    }

    #[test]
    fn batched_render_matches_scalar() {
        let mut surface = SpriteSurface::new(Size::new(MAX_LANES.max(2) as u16, 1));
        for x in 0..surface.size().width {
            surface.set(x, 0, four_frame_sprite());
        }
        surface.tick = 32;
        let mut batched = vec![Cell::blank(); surface.size().area()];
        surface.render_into(&mut batched);
        for (i, cell) in batched.iter().enumerate() {
            let scalar = surface.sprites[i].render(32);
            assert_eq!(cell.fg, scalar.fg, "slot {i}");
            assert_eq!(cell.bg, scalar.bg, "slot {i}");
        }
    }

    #[test]
    fn advance_wraps() {
        let mut surface = SpriteSurface::new(Size::new(1, 1));
        surface.tick = 255;
        surface.advance();
        assert_eq!(surface.tick, 0);
    }
}
