//! Property tests over the render pipeline primitives.

use proptest::prelude::*;

use lattice_core::render::compose::composite_cell;
use lattice_core::render::encode::{decode_runs, encode};
use lattice_core::{Cell, Rgba, Size, Tree, position};

fn arb_rgba() -> impl Strategy<Value = Rgba> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
        .prop_map(|(r, g, b, a)| Rgba { r, g, b, a })
}

fn arb_cell() -> impl Strategy<Value = Cell> {
    // A small glyph alphabet keeps failures readable; colors draw from a
    // limited palette so runs actually form. 世 covers the wide path.
    let glyph = prop::sample::select(vec!["a", "b", " ", "┌", "─", "\u{4e16}"]);
    let color = prop::sample::select(vec![
        Rgba::opaque(0, 0, 0),
        Rgba::opaque(255, 255, 255),
        Rgba::opaque(255, 0, 0),
    ]);
    (glyph, color.clone(), color).prop_map(|(g, fg, bg)| Cell::new(g, fg, bg))
}

proptest! {
    /// Encoding never changes cell content, and decoding the run markers
    /// reproduces the original sequence: runs are contiguous, cover every
    /// cell exactly once, and never span a color change.
    #[test]
    fn encode_round_trips(cells in prop::collection::vec(arb_cell(), 1..64)) {
        let original = cells.clone();
        let mut buffer = cells;
        encode(&mut buffer);

        // Content is untouched.
        for (before, after) in original.iter().zip(&buffer) {
            prop_assert_eq!(&before.glyph, &after.glyph);
            prop_assert_eq!(before.fg, after.fg);
            prop_assert_eq!(before.bg, after.bg);
        }

        let runs = decode_runs(&buffer);
        let mut cursor = 0usize;
        for (start, end) in &runs {
            prop_assert_eq!(*start, cursor, "runs must tile the buffer");
            prop_assert!(end >= start);
            for index in *start..=*end {
                prop_assert!(buffer[index].same_colors(&buffer[*start]));
            }
            cursor = end + 1;
        }
        prop_assert_eq!(cursor, buffer.len());

        // Adjacent runs differ in at least one color.
        for pair in runs.windows(2) {
            let (_, first_end) = pair[0];
            let (second_start, _) = pair[1];
            prop_assert!(!buffer[first_end].same_colors(&buffer[second_start]));
        }
    }

    /// Fully opaque sources replace the destination; fully transparent
    /// sources leave it untouched.
    #[test]
    fn composite_alpha_identities(fg in arb_rgba(), bg in arb_rgba(), dst_fg in arb_rgba(), dst_bg in arb_rgba()) {
        let mut src = Cell::new('x', fg, bg);
        let dst = Cell::new('d', dst_fg, dst_bg);

        src.fg.a = 255;
        src.bg.a = 255;
        let mut out = dst.clone();
        composite_cell(&src, &mut out);
        prop_assert_eq!(out.fg, src.fg);
        prop_assert_eq!(out.bg, src.bg);
        prop_assert_eq!(&out.glyph, &src.glyph);

        src.fg.a = 0;
        src.bg.a = 0;
        let mut out = dst.clone();
        composite_cell(&src, &mut out);
        prop_assert_eq!(out, dst);
    }

    /// Absolute positions are the running sum of ancestor offsets.
    #[test]
    fn absolute_position_additivity(offsets in prop::collection::vec((-8i32..8, -8i32..8), 1..6)) {
        let mut tree = Tree::new(Size::new(100, 100));
        let root = tree.spawn_root(lattice_core::panel());
        let mut parent = root;
        let mut expected = (0i32, 0i32);
        let mut chain = Vec::new();
        for (x, y) in &offsets {
            let child = tree.spawn(lattice_core::panel().with(position(*x, *y)));
            tree.attach(parent, child);
            expected = (expected.0 + x, expected.1 + y);
            chain.push((child, expected));
            parent = child;
        }
        tree.update_absolute(root);
        for (id, (x, y)) in chain {
            let element = tree.get(id);
            prop_assert!(element.is_some());
            if let Some(e) = element {
                prop_assert_eq!((e.absolute.x, e.absolute.y), (x, y));
            }
        }
    }
}
