//! The engine: owned state, pause discipline, and the three threads.
//!
//! All previously-free-floating state (tree, classes, dispatcher, timers,
//! keyboard, watchers) lives in one [`EngineState`] behind a mutex.
//! Holding the lock *is* the pause primitive: the render, passive, and
//! input threads take it for their critical sections, so a host holding a
//! [`PauseGuard`] has all three quiescent. A dirty channel wakes the
//! render thread; a shared terminate flag ends every loop at its next
//! suspension point, and the render thread restores the terminal on its
//! way out.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::dispatch::{Action, Dispatcher};
use crate::element::{ElementId, ElementSpec, Tree};
use crate::error::Result;
use crate::geometry::Size;
use crate::input::keyboard::Button;
use crate::input::translate::Translator;
use crate::input::{Criteria, Input};
use crate::render;
use crate::stain::Stain;
use crate::style::attribute;
use crate::style::classes::ClassRegistry;
use crate::style::{Flow, HandlerFn, Scalar, Tracked};
use crate::terminal::Terminal;
use crate::timer::{self, JobFlags, TimerJob, TimerList};
use crate::watch::FileStreamer;
use crate::widget::{self, WidgetKind};

/// Stacking layer for prioritized overlays (the error console uses it).
pub const MAX_Z: i32 = i32::MAX;

/// Name of the auto-created error console element.
pub const ERROR_CONSOLE: &str = "__error_console__";
/// Name of the error console's scrolling history.
const ERROR_HISTORY: &str = "__error_history__";
/// How long the error console stays up after the latest report.
const ERROR_CONSOLE_LINGER: Duration = Duration::from_secs(30);

/// Tunable engine timings and behavior.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Shortest passive-scheduler sleep (full load).
    pub min_update: Duration,
    /// Longest passive-scheduler sleep (idle).
    pub max_update: Duration,
    /// Render-thread wait timeout; a frame's worth of milliseconds.
    pub frame_timeout: Duration,
    /// Suppress row separators in serialized frames.
    pub word_wrap: bool,
    /// Staleness bound for undispatched inputs.
    pub input_clear_interval: Duration,
    /// Whether pointer motion updates hover state.
    pub mouse_movement: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_update: Duration::from_millis(16),
            max_update: Duration::from_millis(1000),
            frame_timeout: Duration::from_millis(16),
            word_wrap: false,
            input_clear_interval: Duration::from_millis(500),
            mouse_movement: true,
        }
    }
}

/// Everything the engine owns, guarded by the state lock.
pub struct EngineState {
    /// The element tree.
    pub tree: Tree,
    /// The style class registry.
    pub classes: ClassRegistry,
    /// Action handlers and focus/hover.
    pub dispatcher: Dispatcher,
    /// Deferred and repeating jobs.
    pub timers: TimerList,
    /// Byte decoding and button state.
    pub translator: Translator,
    /// Watched file streams.
    pub streams: FileStreamer,
    /// Engine configuration.
    pub settings: Settings,
    pending: Vec<Input>,
    last_feed: Instant,
    last_error: Option<(String, u32)>,
    emitted_frames: u64,
}

impl EngineState {
    /// Create engine state for the given viewport.
    pub fn new(viewport: Size) -> Self {
        Self {
            tree: Tree::new(viewport),
            classes: ClassRegistry::new(),
            dispatcher: Dispatcher::new(),
            timers: TimerList::new(),
            translator: Translator::new(),
            streams: FileStreamer::new(),
            settings: Settings::default(),
            pending: Vec::new(),
            last_feed: Instant::now(),
            last_error: None,
            emitted_frames: 0,
        }
    }

    /// Spawn the root element and wire the activation handlers registered
    /// through its styling chains.
    pub fn mount_root(&mut self, spec: ElementSpec) -> ElementId {
        let root = self.tree.spawn_root(spec);
        self.wire_activation(root);
        root
    }

    /// Attach a spawned subtree and wire its activation handlers.
    pub fn mount(&mut self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let id = self.tree.spawn(spec);
        self.tree.attach(parent, id);
        self.wire_activation(id);
        id
    }

    /// Register dispatcher actions for every `on_click` in a subtree: one
    /// for mouse activation and one for Enter activation.
    fn wire_activation(&mut self, from: ElementId) {
        for (id, handler) in self.tree.click_handlers(from) {
            let label = self
                .tree
                .get(id)
                .map(|e| e.style.name.value.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("element-{id:?}"));
            self.dispatcher.register(Action::new(
                Criteria::MOUSE_LEFT_CLICKED,
                Some(id),
                format!("click:{label}"),
                Arc::clone(&handler),
            ));
            self.dispatcher.register(Action::new(
                Criteria::ENTER,
                Some(id),
                format!("activate:{label}"),
                handler,
            ));
        }
    }

    /// Register an event handler directly.
    pub fn on(
        &mut self,
        criteria: Criteria,
        host: Option<ElementId>,
        id: impl Into<String>,
        job: HandlerFn,
    ) {
        self.dispatcher.register(Action::new(criteria, host, id, job));
    }

    /// Look up an element anywhere in the tree by name.
    pub fn get_element(&self, name: &str) -> Option<ElementId> {
        self.tree.find_by_name(name)
    }

    /// Feed raw terminal bytes through the translator into the pending
    /// input queue. Stale queued inputs are dropped first.
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        let now = Instant::now();
        if now.saturating_duration_since(self.last_feed) > self.settings.input_clear_interval {
            self.pending.clear();
        }
        self.last_feed = now;
        self.translator.translate(bytes, &mut self.pending);
    }

    /// Queue a semantic input directly (tests and synthetic events).
    pub fn push_input(&mut self, input: Input) {
        self.pending.push(input);
    }

    /// Run one dispatch cycle: scroll routing, held-key reposting, then
    /// action matching. The pending queue is empty afterwards.
    pub fn drive_cycle(&mut self) {
        // With pointer tracking disabled, hover sees an off-screen pointer.
        let mouse = if self.settings.mouse_movement {
            self.translator.mouse
        } else {
            crate::geometry::Position::new(-1, -1)
        };

        for input in self.pending.clone() {
            if input.criteria.contains(Criteria::SCROLL_UP) {
                self.dispatcher.route_scroll(&mut self.tree, -1);
            } else if input.criteria.contains(Criteria::SCROLL_DOWN) {
                self.dispatcher.route_scroll(&mut self.tree, 1);
            }
        }

        self.translator.keyboard.repost_held(&mut self.pending, mouse);
        let shift = self.translator.keyboard.is_pressed(Button::Shift);
        self.dispatcher
            .dispatch(&mut self.tree, &mut self.pending, mouse, shift);
    }

    /// Produce the next frame string, or `None` when nothing changed since
    /// the last one.
    pub fn render_frame(&mut self) -> Option<String> {
        let root = self.tree.root()?;
        let clean = self.tree.get(root).is_some_and(|e| e.dirty.is_clean());
        if clean && self.emitted_frames > 0 {
            return None;
        }
        let frame = render::compose_frame(&mut self.tree, &self.classes, self.settings.word_wrap)?;
        self.emitted_frames += 1;
        Some(frame)
    }

    /// Adopt a new terminal size: the root is restretched and everything
    /// repaints.
    pub fn resize_viewport(&mut self, size: Size) {
        if size == self.tree.viewport || size.is_empty() {
            return;
        }
        self.tree.viewport = size;
        if let Some(root) = self.tree.root() {
            if let Some(element) = self.tree.get_mut(root) {
                element.style.width = Tracked::initialized(Scalar::cells(size.width));
                element.style.height = Tracked::initialized(Scalar::cells(size.height));
            }
            self.tree.mark(root, Stain::ALL);
        }
    }

    /// One passive-scheduler pass: timers, file streams, canvas
    /// animation. Returns how long to sleep before the next pass.
    pub fn tick_passive(&mut self, now: Instant) -> Duration {
        let nearest = self.timers.tick(&mut self.tree, now);
        self.streams.poll();
        let animated = self.refresh_canvases();

        let mut load = nearest
            .map(|shortest| {
                timer::load_factor(self.settings.min_update, self.settings.max_update, shortest)
            })
            .unwrap_or(0.0);
        if animated > 0 {
            // Animation wants roughly frame-rate ticks.
            load = load.max(timer::load_factor(
                self.settings.min_update,
                self.settings.max_update,
                self.settings.min_update,
            ));
        }
        timer::sleep_for(self.settings.min_update, self.settings.max_update, load)
    }

    /// Advance every animated sprite canvas one tick. Returns how many
    /// canvases animate.
    pub fn refresh_canvases(&mut self) -> usize {
        let Some(root) = self.tree.root() else {
            return 0;
        };
        let ids = self.tree.pre_order(root);
        let mut animated = Vec::new();
        for id in ids {
            let Some(element) = self.tree.get_mut(id) else {
                continue;
            };
            if let WidgetKind::SpriteCanvas(surface) = &mut element.kind {
                if surface.is_animated() {
                    surface.advance();
                    animated.push(id);
                }
            }
        }
        for &id in &animated {
            self.tree.mark(id, Stain::COLOR);
        }
        animated.len()
    }

    /// Whether the next render cycle has work.
    pub fn is_dirty(&self) -> bool {
        self.tree
            .root()
            .and_then(|r| self.tree.get(r))
            .is_some_and(|e| !e.dirty.is_clean())
    }

    /// Report a non-fatal problem: logged, then surfaced in the in-UI
    /// error console. Identical consecutive messages coalesce into a
    /// repetition counter; the console dismisses itself after thirty
    /// seconds of quiet.
    pub fn report(&mut self, message: &str) {
        error!(message, "reported problem");
        let Some(root) = self.tree.root() else {
            return;
        };
        let viewport = self.tree.viewport;
        if viewport.is_empty() {
            return;
        }

        let console = match self.tree.find_by_name(ERROR_CONSOLE) {
            Some(id) => id,
            None => self.build_error_console(root, viewport),
        };
        let Some(history) = self.tree.find_by_name(ERROR_HISTORY) else {
            return;
        };

        let repeated = matches!(&self.last_error, Some((last, _)) if last == message);
        if repeated {
            if let Some((_, count)) = &mut self.last_error {
                *count += 1;
                let text = format!("{message} (x{count})");
                let last_row = self
                    .tree
                    .get(history)
                    .and_then(|h| h.children.last().copied());
                if let Some(row) = last_row {
                    self.tree.set_text(row, text);
                }
            }
        } else {
            self.last_error = Some((message.to_owned(), 1));
            let width = self.tree.get(history).map(|h| h.size.width.max(1)).unwrap_or(1);
            let row = self.tree.spawn(
                widget::text_field(message)
                    .with(attribute::width(width.max(2)) | attribute::height(1)),
            );
            self.tree.attach(history, row);

            // Keep the newest row visible once the history fills up.
            let rows = self.tree.get(history).map(|h| h.children.len()).unwrap_or(0);
            let visible = self
                .tree
                .get(history)
                .map(|h| usize::from(h.size.height.max(1)))
                .unwrap_or(1);
            if rows > visible {
                if let Some(element) = self.tree.get_mut(history) {
                    element.kind.scroll_by(1);
                }
            }
        }

        self.tree.set_display(console, true);
        self.tree.mark(console, Stain::DEEP | Stain::COLOR);

        self.timers.add(TimerJob::new(
            "error-console-dismiss",
            ERROR_CONSOLE_LINGER,
            JobFlags::PROLONG,
            Box::new(move |tree: &mut Tree| {
                tree.set_display(console, false);
                Ok(true)
            }),
        ));
    }

    fn build_error_console(&mut self, root: ElementId, viewport: Size) -> ElementId {
        let width = (viewport.width / 4).max(12).min(viewport.width.max(1));
        let height = (viewport.height / 2).max(4).min(viewport.height.max(1));
        let x = i32::from(viewport.width.saturating_sub(width) / 2);
        let y = i32::from(viewport.height.saturating_sub(height) / 2);

        let console = self.tree.spawn(
            widget::window("LOG", width, height).with(
                attribute::name(ERROR_CONSOLE)
                    | attribute::border(true)
                    | attribute::border_color(crate::color::named::RED)
                    | attribute::background_color(crate::color::named::BLACK)
                    | attribute::text_color(crate::color::named::RED)
                    | attribute::position_z(x, y, MAX_Z)
                    | attribute::allow_overflow(true),
            ),
        );
        let history = self.tree.spawn(
            widget::scroll_view(Flow::Column).with(
                attribute::name(ERROR_HISTORY)
                    | attribute::width(width.saturating_sub(2).max(1))
                    | attribute::height(height.saturating_sub(2).max(1))
                    | attribute::text_color(crate::color::named::RED),
            ),
        );
        self.tree.attach(console, history);
        self.tree.attach(root, console);
        console
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("elements", &self.tree.len())
            .field("actions", &self.dispatcher.action_count())
            .field("timers", &self.timers.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

struct Shared {
    state: Mutex<EngineState>,
    terminate: AtomicBool,
}

/// A running engine: three threads around one shared state.
pub struct Engine {
    shared: Arc<Shared>,
    dirty_tx: mpsc::Sender<()>,
    render_thread: Option<JoinHandle<()>>,
    passive_thread: Option<JoinHandle<()>>,
    input_thread: Option<JoinHandle<()>>,
}

/// Holding this guard pauses the engine: all three threads block on the
/// state lock until it drops. Dropping requests a render.
pub struct PauseGuard<'a> {
    guard: MutexGuard<'a, EngineState>,
    dirty_tx: &'a mpsc::Sender<()>,
}

impl std::ops::Deref for PauseGuard<'_> {
    type Target = EngineState;
    fn deref(&self) -> &EngineState {
        &self.guard
    }
}

impl std::ops::DerefMut for PauseGuard<'_> {
    fn deref_mut(&mut self) -> &mut EngineState {
        &mut self.guard
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        let _ = self.dirty_tx.send(());
    }
}

impl Engine {
    /// Start the engine on a backend with terminal input from stdin.
    pub fn start<B: Terminal + 'static>(backend: B, root: ElementSpec) -> Result<Engine> {
        Self::start_with_input(backend, root, StdinBytes)
    }

    /// Start the engine reading raw input bytes from `input`; the input
    /// thread exits when the source reports end of input.
    pub fn start_with_input<B, R>(mut backend: B, root: ElementSpec, input: R) -> Result<Engine>
    where
        B: Terminal + 'static,
        R: Read + Send + 'static,
    {
        backend.prepare()?;
        let viewport = backend.size()?;
        if viewport.is_empty() {
            let _ = backend.restore();
            return Err(crate::error::LatticeError::Fatal(
                "terminal reports zero dimensions".into(),
            ));
        }

        let mut state = EngineState::new(viewport);
        state.mount_root(root);
        let settings = state.settings;

        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            terminate: AtomicBool::new(false),
        });
        let (dirty_tx, dirty_rx) = mpsc::channel::<()>();

        let render_thread = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("lattice-render".into())
                .spawn(move || {
                    render_loop(&shared, &mut backend, &dirty_rx, settings.frame_timeout);
                    let _ = backend.restore();
                })?
        };

        let passive_thread = {
            let shared = Arc::clone(&shared);
            let dirty = dirty_tx.clone();
            std::thread::Builder::new()
                .name("lattice-passive".into())
                .spawn(move || passive_loop(&shared, &dirty))?
        };

        let input_thread = {
            let shared = Arc::clone(&shared);
            let dirty = dirty_tx.clone();
            std::thread::Builder::new()
                .name("lattice-input".into())
                .spawn(move || input_loop(&shared, &dirty, input))?
        };

        // Kick the first frame.
        let _ = dirty_tx.send(());

        Ok(Engine {
            shared,
            dirty_tx,
            render_thread: Some(render_thread),
            passive_thread: Some(passive_thread),
            input_thread: Some(input_thread),
        })
    }

    /// Pause the engine and borrow its state. All tree mutation from the
    /// host goes through this guard.
    pub fn pause(&self) -> PauseGuard<'_> {
        let guard = match self.shared.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        PauseGuard {
            guard,
            dirty_tx: &self.dirty_tx,
        }
    }

    /// Ask the render thread for a frame.
    pub fn request_render(&self) {
        let _ = self.dirty_tx.send(());
    }

    /// Raise the terminate flag; every thread exits at its next
    /// suspension point.
    pub fn terminate(&self) {
        self.shared.terminate.store(true, Ordering::SeqCst);
        let _ = self.dirty_tx.send(());
    }

    /// Whether terminate was requested.
    pub fn is_terminated(&self) -> bool {
        self.shared.terminate.load(Ordering::SeqCst)
    }

    /// Terminate and wait for the render and passive threads (the input
    /// thread may stay blocked in its read; it is detached on drop).
    pub fn join(mut self) {
        self.terminate();
        if let Some(handle) = self.render_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.passive_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.input_thread.take() {
            drop(handle);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shared.terminate.store(true, Ordering::SeqCst);
        let _ = self.dirty_tx.send(());
        if let Some(handle) = self.render_thread.take() {
            let _ = handle.join();
        }
    }
}

fn render_loop<B: Terminal>(
    shared: &Shared,
    backend: &mut B,
    dirty_rx: &mpsc::Receiver<()>,
    frame_timeout: Duration,
) {
    loop {
        if shared.terminate.load(Ordering::SeqCst) {
            break;
        }
        match dirty_rx.recv_timeout(frame_timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        if shared.terminate.load(Ordering::SeqCst) {
            break;
        }

        let frame = {
            let mut state = match shared.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Ok(size) = backend.size() {
                state.resize_viewport(size);
            }
            state.render_frame()
        };
        if let Some(frame) = frame {
            if let Err(error) = backend.write_frame(&frame) {
                warn!(%error, "frame write failed");
            }
        }
    }
}

fn passive_loop(shared: &Shared, dirty: &mpsc::Sender<()>) {
    loop {
        if shared.terminate.load(Ordering::SeqCst) {
            break;
        }
        let sleep = {
            let mut state = match shared.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            let sleep = state.tick_passive(Instant::now());
            if state.is_dirty() {
                let _ = dirty.send(());
            }
            sleep
        };
        std::thread::sleep(sleep);
    }
}

fn input_loop<R: Read>(shared: &Shared, dirty: &mpsc::Sender<()>, mut input: R) {
    let mut buffer = [0u8; 256];
    loop {
        if shared.terminate.load(Ordering::SeqCst) {
            break;
        }
        let read = match input.read(&mut buffer) {
            Ok(0) => break, // end of input stream
            Ok(n) => n,
            Err(error) => {
                warn!(%error, "input read failed; input thread degrading to idle");
                break;
            }
        };
        {
            let mut state = match shared.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.feed_bytes(&buffer[..read]);
            state.drive_cycle();
        }
        let _ = dirty.send(());
    }
}

/// Blocking stdin byte source for the input thread.
struct StdinBytes;

impl Read for StdinBytes {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::stdin().lock().read(buf)
    }
}
