//! Event dispatch: action matching, focus and hover tracking.
//!
//! Each cycle the dispatcher matches the queued inputs against the
//! registered actions, updates hover from the pointer position, focuses on
//! click-select, cycles focus on Tab, and unwinds on Escape. Handler
//! closures return `Result<bool>`; an error counts as "not consumed" and is
//! logged, never unregistered.

use tracing::warn;

use crate::element::{ElementId, Tree};
use crate::input::keyboard::Button;
use crate::input::{Criteria, Input};
use crate::style::HandlerFn;

/// Criteria treated as click-select: they focus the element under the
/// pointer.
const SELECT: Criteria = Criteria::MOUSE_LEFT_CLICKED.union(Criteria::ENTER);

/// Criteria whose hosted actions require the pointer inside the host.
const POINTER_GATED: Criteria = Criteria::MOUSE_LEFT_CLICKED
    .union(Criteria::MOUSE_MIDDLE_CLICKED)
    .union(Criteria::MOUSE_RIGHT_CLICKED)
    .union(Criteria::MOUSE_LEFT_PRESSED)
    .union(Criteria::MOUSE_MIDDLE_PRESSED)
    .union(Criteria::MOUSE_RIGHT_PRESSED);

/// A registered event handler.
pub struct Action {
    /// The criteria bits this action fires on.
    pub criteria: Criteria,
    /// Anchoring element; hosted actions are skipped while hidden.
    pub host: Option<ElementId>,
    /// Identifier used in handler-failure logs.
    pub id: String,
    job: HandlerFn,
}

impl Action {
    /// Create an action.
    pub fn new(
        criteria: Criteria,
        host: Option<ElementId>,
        id: impl Into<String>,
        job: HandlerFn,
    ) -> Self {
        Self {
            criteria,
            host,
            id: id.into(),
            job,
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("criteria", &self.criteria)
            .field("host", &self.host)
            .field("id", &self.id)
            .finish()
    }
}

/// Matches inputs to actions and owns focus/hover state.
#[derive(Debug, Default)]
pub struct Dispatcher {
    actions: Vec<Action>,
    /// The element holding input focus.
    pub focused: Option<ElementId>,
    /// The element under the pointer.
    pub hovered: Option<ElementId>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. Registration order defines the Tab cycle.
    pub fn register(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Drop every action anchored to `host`.
    pub fn unregister_host(&mut self, host: ElementId) {
        self.actions.retain(|a| a.host != Some(host));
        if self.focused == Some(host) {
            self.focused = None;
        }
        if self.hovered == Some(host) {
            self.hovered = None;
        }
    }

    /// Number of registered actions.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Distinct action hosts in registration order — the Tab cycle.
    pub fn hosts(&self) -> Vec<ElementId> {
        let mut hosts = Vec::new();
        for action in &self.actions {
            if let Some(host) = action.host {
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
        }
        hosts
    }

    /// Run one dispatch cycle over the queued inputs. The queue is always
    /// empty afterwards; `shift_held` selects the Tab direction.
    pub fn dispatch(
        &mut self,
        tree: &mut Tree,
        inputs: &mut Vec<Input>,
        mouse: crate::geometry::Position,
        shift_held: bool,
    ) {
        // Hover expires as soon as the pointer leaves the element.
        if let Some(hovered) = self.hovered {
            let still_over = tree
                .get(hovered)
                .is_some_and(|e| e.is_displayed() && e.rect().contains(mouse.x, mouse.y));
            if !still_over {
                self.unhover(tree);
            }
        }

        // Hover candidates and click-select.
        let select = inputs.iter().any(|i| i.criteria.intersects(SELECT));
        if let Some(candidate) = self.topmost_host_at(tree, mouse) {
            if select {
                self.focus_element(tree, candidate);
                self.unhover(tree);
            } else {
                self.hover_element(tree, candidate);
            }
        }

        // Exact criteria matches.
        for index in 0..self.actions.len() {
            let (criteria, host, id, job) = {
                let action = &self.actions[index];
                (
                    action.criteria,
                    action.host,
                    action.id.clone(),
                    action.job.clone(),
                )
            };
            if let Some(host) = host {
                let displayed = tree.get(host).is_some_and(|e| e.is_displayed());
                if !displayed {
                    continue;
                }
            }

            let mut i = 0;
            while i < inputs.len() {
                let input = inputs[i];
                if input.criteria != criteria {
                    i += 1;
                    continue;
                }
                if let Some(host) = host {
                    if !self.hosted_gate(tree, host, criteria, &input) {
                        i += 1;
                        continue;
                    }
                }
                match job.lock() {
                    Ok(mut handler) => match handler(&input, tree) {
                        Ok(true) => {
                            inputs.remove(i);
                            continue;
                        }
                        Ok(false) => {
                            i += 1;
                        }
                        Err(error) => {
                            warn!(action = %id, %error, "handler failed; input not consumed");
                            i += 1;
                        }
                    },
                    Err(_) => {
                        warn!(action = %id, "handler mutex poisoned; skipping");
                        i += 1;
                    }
                }
            }

            // Compound criteria: collect inputs whose bits are subsets of
            // the remaining requirement; fire with the largest data byte.
            if inputs.len() > 1 {
                self.match_compound(tree, inputs, criteria, host, &id, &job);
            }
        }

        // Tab and Escape unwind after handlers had their chance.
        let tabs = inputs
            .iter()
            .filter(|i| i.criteria.contains(Criteria::TAB))
            .count();
        for _ in 0..tabs {
            self.cycle_focus(tree, shift_held);
        }
        if inputs.iter().any(|i| i.criteria.contains(Criteria::ESCAPE)) {
            self.escape(tree);
        }

        inputs.clear();
    }

    /// Route a scroll input to the focused (else hovered) scrollable.
    pub fn route_scroll(&mut self, tree: &mut Tree, delta: i32) {
        let Some(start) = self.focused.or(self.hovered) else {
            return;
        };
        let Some(target) = tree.scroll_target(start) else {
            return;
        };
        let scrolled = tree
            .get_mut(target)
            .is_some_and(|e| e.kind.scroll_by(delta));
        if scrolled {
            tree.mark(target, crate::stain::Stain::DEEP | crate::stain::Stain::COLOR);
        }
    }

    /// Gate a hosted action for one input: pointer-borne criteria need the
    /// pointer inside the host; Enter activation needs the host focused.
    fn hosted_gate(&self, tree: &Tree, host: ElementId, criteria: Criteria, input: &Input) -> bool {
        let Some(element) = tree.get(host) else {
            return false;
        };
        if criteria.intersects(POINTER_GATED) {
            return element.rect().contains(input.x, input.y);
        }
        if criteria.contains(Criteria::ENTER) {
            return self.focused == Some(host);
        }
        true
    }

    fn match_compound(
        &mut self,
        tree: &mut Tree,
        inputs: &mut Vec<Input>,
        criteria: Criteria,
        host: Option<ElementId>,
        id: &str,
        job: &HandlerFn,
    ) {
        let mut remaining = criteria;
        let mut accepted: Vec<usize> = Vec::new();
        for (index, input) in inputs.iter().enumerate() {
            if remaining.is_empty() {
                break;
            }
            if !input.criteria.is_empty() && remaining.contains(input.criteria) {
                remaining = remaining.without(input.criteria);
                accepted.push(index);
            }
        }
        if !remaining.is_empty() || accepted.len() < 2 {
            return;
        }
        if let Some(host) = host {
            if !tree.get(host).is_some_and(|e| e.is_displayed()) {
                return;
            }
        }
        // The carrying input is the one with the largest data byte.
        let best = accepted
            .iter()
            .copied()
            .max_by_key(|&i| inputs[i].data)
            .unwrap_or(accepted[0]);
        let input = inputs[best];
        match job.lock() {
            Ok(mut handler) => match handler(&input, tree) {
                Ok(true) => {
                    inputs.remove(best);
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(action = %id, %error, "compound handler failed");
                }
            },
            Err(_) => warn!(action = %id, "compound handler mutex poisoned"),
        }
    }

    /// The topmost displayed action host containing the pointer.
    fn topmost_host_at(
        &self,
        tree: &Tree,
        mouse: crate::geometry::Position,
    ) -> Option<ElementId> {
        let mut best: Option<(i32, ElementId)> = None;
        for host in self.hosts() {
            let Some(element) = tree.get(host) else {
                continue;
            };
            if !element.is_displayed() || !element.rect().contains(mouse.x, mouse.y) {
                continue;
            }
            let z = element.absolute.z;
            if best.map_or(true, |(bz, _)| z >= bz) {
                best = Some((z, host));
            }
        }
        best.map(|(_, host)| host)
    }

    /// Focus an element, clearing the previous focus. Focusing the root is
    /// a no-op.
    pub fn focus_element(&mut self, tree: &mut Tree, id: ElementId) {
        if self.focused == Some(id) || tree.root() == Some(id) {
            return;
        }
        self.unfocus(tree);
        self.focused = Some(id);
        tree.set_focus_flag(id, true);
        let hosts = self.hosts();
        apply_state_recursive(tree, &hosts, id, id, StateKind::Focus, true);
    }

    /// Hover an element, clearing the previous hover. Hovering the root is
    /// a no-op.
    pub fn hover_element(&mut self, tree: &mut Tree, id: ElementId) {
        if self.hovered == Some(id) || tree.root() == Some(id) {
            return;
        }
        self.unhover(tree);
        self.hovered = Some(id);
        tree.set_hover_flag(id, true);
        let hosts = self.hosts();
        apply_state_recursive(tree, &hosts, id, id, StateKind::Hover, true);
    }

    /// Drop focus entirely.
    pub fn unfocus(&mut self, tree: &mut Tree) {
        if let Some(old) = self.focused.take() {
            tree.set_focus_flag(old, false);
            let hosts = self.hosts();
            apply_state_recursive(tree, &hosts, old, old, StateKind::Focus, false);
        }
    }

    /// Drop hover entirely.
    pub fn unhover(&mut self, tree: &mut Tree) {
        if let Some(old) = self.hovered.take() {
            tree.set_hover_flag(old, false);
            let hosts = self.hosts();
            apply_state_recursive(tree, &hosts, old, old, StateKind::Hover, false);
        }
    }

    /// Tab: advance focus through the distinct hosts, wrapping; Shift
    /// reverses. Starts from the focused (else hovered) element.
    pub fn cycle_focus(&mut self, tree: &mut Tree, backward: bool) {
        let hosts = self.hosts();
        if hosts.is_empty() {
            return;
        }
        let current = self
            .focused
            .or(self.hovered)
            .and_then(|id| hosts.iter().position(|&h| h == id));
        let next = match current {
            Some(index) => {
                if backward {
                    (index + hosts.len() - 1) % hosts.len()
                } else {
                    (index + 1) % hosts.len()
                }
            }
            None => {
                if backward {
                    hosts.len() - 1
                } else {
                    0
                }
            }
        };
        self.focus_element(tree, hosts[next]);
    }

    /// Escape: focus unwinds to the parent as hover; a parent that is the
    /// root (or missing) leaves nothing hovered. A bare hover just drops.
    pub fn escape(&mut self, tree: &mut Tree) {
        if let Some(focused) = self.focused {
            self.unfocus(tree);
            let parent = tree.get(focused).and_then(|e| e.parent);
            match parent {
                Some(parent) if tree.root() != Some(parent) => {
                    self.hover_element(tree, parent);
                }
                _ => self.unhover(tree),
            }
        } else if self.hovered.is_some() {
            self.unhover(tree);
        }
    }

    /// Convenience: was the shift button held in this keyboard state.
    pub fn shift_held(keyboard: &crate::input::keyboard::KeyboardState) -> bool {
        keyboard.is_pressed(Button::Shift)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StateKind {
    Focus,
    Hover,
}

/// Depth-first state propagation: descendants inherit the focus/hover
/// style unless they are themselves action hosts with a differing state.
fn apply_state_recursive(
    tree: &mut Tree,
    hosts: &[ElementId],
    origin: ElementId,
    id: ElementId,
    kind: StateKind,
    value: bool,
) {
    let Some(element) = tree.get(id) else {
        return;
    };
    let current = match kind {
        StateKind::Focus => element.focused,
        StateKind::Hover => element.hovered,
    };
    if id != origin && hosts.contains(&id) && current != value {
        return;
    }
    match kind {
        StateKind::Focus => tree.set_focus_flag(id, value),
        StateKind::Hover => tree.set_hover_flag(id, value),
    }
    let children = tree.get(id).map(|e| e.children.clone()).unwrap_or_default();
    for child in children {
        apply_state_recursive(tree, hosts, origin, child, kind, value);
    }
}
