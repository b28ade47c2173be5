//! Render pipeline benchmarks: full-frame composition versus incremental
//! repaint of a single dirtied child.

use criterion::{Criterion, criterion_group, criterion_main};

use lattice_core::{
    self as lattice, ClassRegistry, Size, Stain, Tree, background_color, border, height, position,
    title, width,
};

fn build_dashboard(viewport: Size) -> (Tree, ClassRegistry, Vec<lattice::ElementId>) {
    let mut tree = Tree::new(viewport);
    let classes = ClassRegistry::new();
    let root = tree.spawn_root(lattice::panel().with(border(true) | title("bench")));
    let mut panels = Vec::new();
    for row in 0..4i32 {
        for col in 0..4i32 {
            let panel = tree.spawn(lattice::text_field("panel content").with(
                width(18)
                    | height(5)
                    | position(col * 19 + 1, row * 5 + 1)
                    | border(true)
                    | background_color(lattice::named::DARK_GRAY),
            ));
            tree.attach(root, panel);
            panels.push(panel);
        }
    }
    (tree, classes, panels)
}

fn bench_full_compose(c: &mut Criterion) {
    c.bench_function("compose_full_frame_80x24", |b| {
        let (mut tree, classes, _) = build_dashboard(Size::new(80, 24));
        b.iter(|| {
            if let Some(root) = tree.root() {
                tree.mark(root, Stain::ALL);
            }
            lattice::compose_frame(&mut tree, &classes, false)
        });
    });
}

fn bench_incremental_repaint(c: &mut Criterion) {
    c.bench_function("repaint_single_child_80x24", |b| {
        let (mut tree, classes, panels) = build_dashboard(Size::new(80, 24));
        // Settle the tree first; the loop dirties one panel per frame.
        lattice::compose_frame(&mut tree, &classes, false);
        let mut index = 0usize;
        b.iter(|| {
            let panel = panels[index % panels.len()];
            index += 1;
            tree.set_text(panel, "updated");
            lattice::compose_frame(&mut tree, &classes, false)
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_80x24_buffer", |b| {
        let mut cells = Vec::with_capacity(80 * 24);
        for index in 0..80 * 24 {
            let color = if (index / 40) % 2 == 0 {
                lattice::named::BLACK
            } else {
                lattice::named::DARK_GRAY
            };
            cells.push(lattice::Cell::filled(color.with_alpha(255)));
        }
        b.iter(|| {
            let mut buffer = cells.clone();
            lattice_core::render::encode::encode(&mut buffer);
            buffer
        });
    });
}

criterion_group!(
    benches,
    bench_full_compose,
    bench_incremental_repaint,
    bench_encode
);
criterion_main!(benches);
