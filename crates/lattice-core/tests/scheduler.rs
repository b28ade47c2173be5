//! Scheduler-facing behavior: timer coalescing, retrigger cadence, sprite
//! animation refresh, and the threaded engine against a test backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use lattice_core::{
    self as lattice, Cell, EngineState, JobFlags, Size, Sprite, TimerJob, TimerList, Tree,
    WidgetKind, height, width,
};

fn tree() -> Tree {
    Tree::new(Size::new(20, 6))
}

#[test]
fn identical_prolong_jobs_coalesce_to_the_later_registration() {
    let mut list = TimerList::new();
    let fired = Arc::new(AtomicU32::new(0));
    let start = Instant::now();
    let later = start + Duration::from_millis(100);

    for registered_at in [start, later] {
        let fired_in = Arc::clone(&fired);
        list.add(TimerJob::starting_at(
            "auto-dismiss",
            registered_at,
            Duration::from_millis(500),
            JobFlags::PROLONG,
            Box::new(move |_| {
                fired_in.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }),
        ));
    }

    let mut t = tree();
    list.tick(&mut t, later + Duration::from_millis(1));
    assert_eq!(list.len(), 1, "only one job survives the tick");
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // Counting from the later registration: not due at +500 from the
    // first registration, due at +500 from the second.
    list.tick(&mut t, start + Duration::from_millis(550));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    list.tick(&mut t, later + Duration::from_millis(550));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn retrigger_period_bounded_by_duration_plus_tick() {
    let mut list = TimerList::new();
    let fires = Arc::new(std::sync::Mutex::new(Vec::new()));
    let fires_in = Arc::clone(&fires);
    let start = Instant::now();
    let period = Duration::from_millis(100);
    let scheduler_tick = Duration::from_millis(20);

    list.add(TimerJob::starting_at(
        "heartbeat",
        start,
        period,
        JobFlags::RETRIGGER,
        Box::new(move |_| {
            if let Ok(mut f) = fires_in.lock() {
                f.push(());
            }
            Ok(true)
        }),
    ));

    // Simulate the passive scheduler polling every 20 ms for one second.
    let mut t = tree();
    let mut fire_times = Vec::new();
    let mut now = start;
    for _ in 0..50 {
        now += scheduler_tick;
        let before = match fires.lock() {
            Ok(f) => f.len(),
            Err(_) => unreachable!(),
        };
        list.tick(&mut t, now);
        let after = match fires.lock() {
            Ok(f) => f.len(),
            Err(_) => unreachable!(),
        };
        if after > before {
            fire_times.push(now);
        }
    }

    assert!(fire_times.len() >= 2);
    for pair in fire_times.windows(2) {
        let gap = pair[1].saturating_duration_since(pair[0]);
        assert!(gap >= period, "fired too early: {gap:?}");
        assert!(gap <= period + scheduler_tick, "fired too late: {gap:?}");
    }
}

#[test]
fn four_frame_sprite_interpolates_on_schedule() {
    let black = lattice::named::BLACK.with_alpha(255);
    let frame = |level: u8| {
        Cell::new(
            'o',
            lattice::Rgb::new(level, level, level).with_alpha(255),
            black,
        )
    };
    // Four frames at distance 64: 0, 100, 200, 50.
    let sprite = Sprite::new(
        vec![frame(0), frame(100), frame(200), frame(50)],
        0,
        1,
    );
    assert!((sprite.frame_distance - 64.0).abs() < f32::EPSILON);

    // Tick 0: frame 0 exactly.
    assert_eq!(sprite.render(0).fg.rgb(), lattice::Rgb::new(0, 0, 0));
    // Tick 32: halfway toward frame 1.
    assert_eq!(sprite.render(32).fg.rgb(), lattice::Rgb::new(50, 50, 50));
    // Tick 64: frame 1 exactly.
    assert_eq!(sprite.render(64).fg.rgb(), lattice::Rgb::new(100, 100, 100));
}

#[test]
fn animated_canvas_is_refreshed_by_the_passive_pass() {
    let mut state = EngineState::new(Size::new(20, 6));
    let root = state.mount_root(lattice::panel());
    let canvas = state.mount(
        root,
        lattice::sprite_canvas(Size::new(4, 1)).with(width(4) | height(1)),
    );
    if let Some(element) = state.tree.get_mut(canvas) {
        if let WidgetKind::SpriteCanvas(surface) = &mut element.kind {
            surface.set(
                0,
                0,
                Sprite::new(vec![Cell::blank(), Cell::blank(), Cell::blank()], 0, 1),
            );
        }
    }
    state.render_frame();
    assert!(!state.is_dirty());

    let sleep = state.tick_passive(Instant::now());
    assert!(state.is_dirty(), "animation marks the tree dirty");
    // An animated canvas keeps the scheduler near its fastest cadence.
    assert!(sleep <= state.settings.min_update + Duration::from_millis(1));

    let tick = match state.tree.get(canvas).map(|e| &e.kind) {
        Some(WidgetKind::SpriteCanvas(surface)) => surface.tick,
        _ => unreachable!(),
    };
    assert_eq!(tick, 1);
}

#[test]
fn engine_threads_render_and_shut_down_cleanly() {
    let backend = lattice::TestBackend::new(Size::new(24, 6));
    let script = std::io::Cursor::new(b"\t\t".to_vec());
    let engine = match lattice::Engine::start_with_input(
        backend,
        lattice::panel().with(lattice::title("Demo")),
        script,
    ) {
        Ok(engine) => engine,
        Err(_) => unreachable!(),
    };

    std::thread::sleep(Duration::from_millis(120));
    {
        let mut paused = engine.pause();
        // Mutating under the pause guard is the threading contract.
        paused.report("synthetic problem");
        assert!(paused.get_element(lattice::engine::ERROR_CONSOLE).is_some());
    }
    std::thread::sleep(Duration::from_millis(60));
    engine.join();
}

#[test]
fn watched_file_changes_surface_through_the_passive_pass() {
    let dir = match tempfile::tempdir() {
        Ok(d) => d,
        Err(_) => return,
    };
    let path = dir.path().join("status.txt");
    std::fs::write(&path, "ready\n").ok();

    let mut state = EngineState::new(Size::new(20, 6));
    state.mount_root(lattice::panel());
    let seen = Arc::new(AtomicU32::new(0));
    let seen_in = Arc::clone(&seen);
    let watched = state.streams.watch(
        &path,
        Box::new(move |_, _| {
            seen_in.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(watched.is_ok());

    std::fs::write(&path, "ready\nupdated\n").ok();
    state.tick_passive(Instant::now());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
