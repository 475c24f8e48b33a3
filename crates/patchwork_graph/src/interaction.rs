// SPDX-License-Identifier: MIT OR Apache-2.0
//! Mouse and keyboard handling: drag-to-patch, node dragging, focus and
//! deletion.
//!
//! Positions passed in are in root space. Events a patcher does not
//! consume bubble up the scene tree, converted into each parent's space.

use crate::connection::CordId;
use crate::graph::Patchbay;
use crate::node::NodeId;
use crate::picking::Target;
use crate::port::{PortDirection, PortId};
use crate::scene::SceneId;
use egui::{Key, PointerButton, Pos2, Vec2};

/// What receives keyboard input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// A patcher
    Patcher(NodeId),
    /// A patch cord
    Cord(CordId),
}

/// Patcher being moved with the mouse
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NodeDrag {
    node: NodeId,
    /// Cursor position relative to the patcher origin at press time
    grab: Vec2,
}

/// State of the current gesture
#[derive(Debug, Clone, Default)]
pub(crate) struct Interaction {
    /// Port a pending cord starts from
    pub(crate) patching: Option<PortId>,
    pub(crate) focus: Option<Focus>,
    pub(crate) hover: Option<Target>,
    pub(crate) cursor: Pos2,
    pub(crate) dragging: Option<NodeDrag>,
}

impl Interaction {
    /// Drop every reference to a destroyed patcher
    pub(crate) fn forget(&mut self, node: NodeId) {
        if self.patching.is_some_and(|p| p.node == node) {
            self.patching = None;
        }
        if self.focus == Some(Focus::Patcher(node)) {
            self.focus = None;
        }
        if self.hover.and_then(|t| t.node()) == Some(node) {
            self.hover = None;
        }
        if self.dragging.is_some_and(|d| d.node == node) {
            self.dragging = None;
        }
    }
}

/// Outcome of a mouse event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventResponse {
    /// A scene node consumed the event
    Handled {
        /// Scene node that consumed it
        scene: SceneId,
        /// Event position in that node's space
        local: Pos2,
    },
    /// The event bubbled past the root
    Unhandled {
        /// Event position in root space
        local: Pos2,
    },
}

impl EventResponse {
    /// Whether some node consumed the event
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// Order two ports as (upstream, downstream), if their directions allow it
fn order_ports(a: PortId, b: PortId) -> Option<(PortId, PortId)> {
    if a.direction.opposite() != b.direction {
        return None;
    }
    match a.direction {
        PortDirection::Output => Some((a, b)),
        PortDirection::Input => Some((b, a)),
    }
}

impl Patchbay {
    /// Port a pending cord is being dragged from
    pub fn patching(&self) -> Option<PortId> {
        self.interaction.patching
    }

    /// Focused patcher or cord
    pub fn focus(&self) -> Option<Focus> {
        self.interaction.focus
    }

    /// Target under the cursor as of the last mouse event
    pub fn hover(&self) -> Option<Target> {
        self.interaction.hover
    }

    /// Last known cursor position
    pub fn cursor(&self) -> Pos2 {
        self.interaction.cursor
    }

    fn scene_of(&self, node: NodeId) -> SceneId {
        self.patchers
            .get(node)
            .map_or(self.scene.root(), |p| p.scene())
    }

    fn handled_by(&self, scene: SceneId, global: Pos2) -> EventResponse {
        EventResponse::Handled {
            scene,
            local: self.scene.global_to_local(scene, global),
        }
    }

    /// Offer an event to `start` and then to each ancestor, converting the
    /// position into every node's space, until `handler` accepts it.
    fn bubble(
        &mut self,
        start: SceneId,
        global: Pos2,
        mut handler: impl FnMut(&mut Self, SceneId, Pos2) -> bool,
    ) -> EventResponse {
        let mut current = start;
        let mut local = self.scene.global_to_local(start, global);
        loop {
            if handler(self, current, local) {
                return EventResponse::Handled {
                    scene: current,
                    local,
                };
            }
            match self.scene.get(current).and_then(|s| s.parent()) {
                Some(parent) => {
                    let g = self.scene.local_to_global(current, local);
                    local = self.scene.global_to_local(parent, g);
                    current = parent;
                }
                None => return EventResponse::Unhandled { local },
            }
        }
    }

    fn start_scene(&self, hit: Option<Target>) -> SceneId {
        hit.and_then(|t| t.node())
            .map_or(self.scene.root(), |node| self.scene_of(node))
    }

    /// Pointer moved without a button held
    pub fn mouse_moved(&mut self, pos: Pos2) -> Option<Target> {
        self.interaction.cursor = pos;
        self.interaction.hover = self.pick(pos);
        self.interaction.hover
    }

    /// Pointer button went down
    pub fn mouse_pressed(&mut self, pos: Pos2, button: PointerButton) -> EventResponse {
        self.interaction.cursor = pos;
        let hit = self.pick(pos);
        self.interaction.hover = hit;

        if let (Some(Target::Cord(cord)), PointerButton::Primary) = (hit, button) {
            self.interaction.focus = Some(Focus::Cord(cord));
            return self.handled_by(self.scene.root(), pos);
        }

        let response = self.bubble(self.start_scene(hit), pos, |bay, scene, local| {
            bay.patcher_pressed(scene, local, button)
        });
        if !response.is_handled() && button == PointerButton::Primary {
            self.interaction.focus = None;
        }
        response
    }

    fn patcher_pressed(&mut self, scene: SceneId, local: Pos2, button: PointerButton) -> bool {
        if button != PointerButton::Primary {
            return false;
        }
        let Some(node) = self.scene.get(scene).and_then(|s| s.patcher()) else {
            return false;
        };
        let Some(patcher) = self.patchers.get(node) else {
            return false;
        };

        if let Some(port) = patcher.ports().find(|p| p.rect().contains(local)) {
            let port = port.id(node);
            tracing::debug!("Patching from {port:?}");
            self.interaction.patching = Some(port);
            self.interaction.focus = Some(Focus::Patcher(node));
            return true;
        }

        if patcher.content_rect().contains(local) {
            self.interaction.focus = Some(Focus::Patcher(node));
            self.interaction.dragging = Some(NodeDrag {
                node,
                grab: local.to_vec2(),
            });
            return true;
        }
        false
    }

    /// Pointer moved with a button held
    pub fn mouse_dragged(&mut self, pos: Pos2, _button: PointerButton) -> EventResponse {
        self.interaction.cursor = pos;

        if let Some(port) = self.interaction.patching {
            // Rubber band: only the cursor moves
            self.interaction.hover = self.pick(pos);
            return self.handled_by(self.scene_of(port.node), pos);
        }

        if let Some(drag) = self.interaction.dragging {
            let scene = self.scene_of(drag.node);
            let parent = self
                .scene
                .get(scene)
                .and_then(|s| s.parent())
                .unwrap_or(self.scene.root());
            let position = self.scene.global_to_local(parent, pos) - drag.grab;
            if self.set_position(drag.node, position).is_ok() {
                return self.handled_by(scene, pos);
            }
            self.interaction.dragging = None;
        }

        let hit = self.pick(pos);
        self.interaction.hover = hit;
        self.bubble(self.start_scene(hit), pos, |_, _, _| false)
    }

    /// Pointer button went up.
    ///
    /// Ends a pending cord: over a port of the opposite direction a cord is
    /// created, anywhere else the gesture is cancelled. The pending port is
    /// cleared either way.
    pub fn mouse_released(&mut self, pos: Pos2, _button: PointerButton) -> EventResponse {
        self.interaction.cursor = pos;
        let hit = self.pick(pos);
        self.interaction.hover = hit;

        if let Some(from) = self.interaction.patching.take() {
            match hit {
                Some(Target::Port(to)) => match order_ports(from, to) {
                    Some((upstream, downstream)) => {
                        // Failures are logged and kept as the status line
                        let _ = self.create_patch_cord(upstream, downstream);
                    }
                    None => {
                        tracing::debug!("Patching cancelled: {from:?} and {to:?} face the same way")
                    }
                },
                _ => tracing::debug!("Patching cancelled"),
            }
            return self.handled_by(self.scene_of(from.node), pos);
        }

        if let Some(drag) = self.interaction.dragging.take() {
            return self.handled_by(self.scene_of(drag.node), pos);
        }

        self.bubble(self.start_scene(hit), pos, |_, _, _| false)
    }

    /// Key went down. Delete or Backspace removes the focused patcher or
    /// cord. Returns whether the key was used.
    pub fn key_pressed(&mut self, key: Key) -> bool {
        if !matches!(key, Key::Delete | Key::Backspace) {
            return false;
        }
        match self.interaction.focus {
            Some(Focus::Patcher(node)) => {
                self.dispose_patch_cords(node);
                self.delayed_delete(node)
            }
            Some(Focus::Cord(cord)) => self.disconnect(cord).is_some(),
            None => false,
        }
    }

    /// Key went up. No patcher reacts to key releases.
    pub fn key_released(&mut self, _key: Key) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Constant, Print, Vec3};

    /// Constant at (0, 0) above a Print at (0, 100)
    fn patch() -> (Patchbay, NodeId, NodeId) {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let b = bay.spawn(Print::<Vec3>::new());
        bay.set_position(b, Pos2::new(0.0, 100.0)).unwrap();
        (bay, a, b)
    }

    fn drag(bay: &mut Patchbay, from: Pos2, to: Pos2) {
        bay.mouse_pressed(from, PointerButton::Primary);
        bay.mouse_dragged(to, PointerButton::Primary);
        bay.mouse_released(to, PointerButton::Primary);
    }

    #[test]
    fn test_drag_output_to_input() {
        let (mut bay, a, b) = patch();
        let out = bay.port_position(PortId::output(a, 0)).unwrap();
        let inp = bay.port_position(PortId::input(b, 0)).unwrap();

        bay.mouse_pressed(out, PointerButton::Primary);
        assert_eq!(bay.patching(), Some(PortId::output(a, 0)));
        bay.mouse_dragged(inp, PointerButton::Primary);
        assert_eq!(bay.cursor(), inp);
        bay.mouse_released(inp, PointerButton::Primary);

        assert_eq!(bay.patching(), None);
        assert!(bay.has_connection(PortId::output(a, 0), PortId::input(b, 0)));
        assert_eq!(bay.patcher(b).unwrap().text(), "(0.00, 0.00, 0.00)");
    }

    #[test]
    fn test_drag_input_to_output() {
        let (mut bay, a, b) = patch();
        let out = bay.port_position(PortId::output(a, 0)).unwrap();
        let inp = bay.port_position(PortId::input(b, 0)).unwrap();

        drag(&mut bay, inp, out);

        assert!(bay.has_connection(PortId::output(a, 0), PortId::input(b, 0)));
    }

    #[test]
    fn test_release_elsewhere_cancels() {
        let (mut bay, a, _) = patch();
        let out = bay.port_position(PortId::output(a, 0)).unwrap();

        drag(&mut bay, out, Pos2::new(500.0, 500.0));

        assert_eq!(bay.patching(), None);
        assert_eq!(bay.cord_count(), 0);
    }

    #[test]
    fn test_release_on_same_direction_cancels() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let c = bay.spawn(Constant::new(Vec3::ZERO));
        bay.set_position(c, Pos2::new(200.0, 0.0)).unwrap();

        let from = bay.port_position(PortId::output(a, 0)).unwrap();
        let to = bay.port_position(PortId::output(c, 0)).unwrap();
        drag(&mut bay, from, to);

        assert_eq!(bay.patching(), None);
        assert_eq!(bay.cord_count(), 0);
    }

    #[test]
    fn test_rejected_gesture_sets_status() {
        let (mut bay, a, b) = patch();
        let out = bay.port_position(PortId::output(a, 0)).unwrap();
        let inp = bay.port_position(PortId::input(b, 0)).unwrap();

        drag(&mut bay, out, inp);
        drag(&mut bay, out, inp);

        assert_eq!(bay.cord_count(), 1);
        assert_eq!(bay.status(), Some("patching failed: already connected"));
        assert_eq!(bay.patching(), None);
    }

    #[test]
    fn test_drag_body_moves_patcher() {
        let (mut bay, a, _) = patch();
        bay.mouse_pressed(Pos2::new(5.0, 5.0), PointerButton::Primary);
        assert_eq!(bay.focus(), Some(Focus::Patcher(a)));

        let response = bay.mouse_dragged(Pos2::new(55.0, 25.0), PointerButton::Primary);
        assert_eq!(bay.patcher(a).unwrap().position(), Pos2::new(50.0, 20.0));
        assert_eq!(
            response,
            EventResponse::Handled {
                scene: bay.patcher(a).unwrap().scene(),
                local: Pos2::new(5.0, 5.0),
            }
        );

        bay.mouse_released(Pos2::new(55.0, 25.0), PointerButton::Primary);
        bay.mouse_dragged(Pos2::new(300.0, 300.0), PointerButton::Primary);
        assert_eq!(bay.patcher(a).unwrap().position(), Pos2::new(50.0, 20.0));
    }

    #[test]
    fn test_delete_key_marks_patcher() {
        let (mut bay, a, b) = patch();
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();
        bay.mouse_pressed(Pos2::new(5.0, 5.0), PointerButton::Primary);

        assert!(bay.key_pressed(Key::Delete));

        assert!(bay.is_pending_delete(a));
        assert_eq!(bay.cord_count(), 0);
        // Still pickable until the drain
        assert_eq!(bay.pick(Pos2::new(5.0, 5.0)), Some(Target::Body(a)));

        assert!(!bay.key_pressed(Key::Backspace));
        bay.delete_queue();
        assert_eq!(bay.focus(), None);
        assert_eq!(bay.pick(Pos2::new(5.0, 5.0)), None);
    }

    #[test]
    fn test_delete_key_removes_focused_cord() {
        let (mut bay, a, b) = patch();
        let cord = bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();
        let from = bay.port_position(PortId::output(a, 0)).unwrap();
        let to = bay.port_position(PortId::input(b, 0)).unwrap();

        bay.mouse_pressed(from + (to - from) * 0.5, PointerButton::Primary);
        assert_eq!(bay.focus(), Some(Focus::Cord(cord)));

        assert!(bay.key_pressed(Key::Delete));
        assert_eq!(bay.cord_count(), 0);
        assert_eq!(bay.focus(), None);
        assert!(bay.patcher(a).is_some());
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let (mut bay, a, _) = patch();
        bay.mouse_pressed(Pos2::new(5.0, 5.0), PointerButton::Primary);
        assert!(!bay.key_pressed(Key::A));
        assert!(!bay.key_released(Key::Delete));
        assert!(!bay.is_pending_delete(a));
    }

    #[test]
    fn test_unhandled_events_bubble_to_root() {
        let mut bay = Patchbay::default();
        let root = bay.scene().root();
        let group = bay.add_group(root, Pos2::new(100.0, 100.0)).unwrap();
        let kind: std::rc::Rc<dyn crate::kind::ErasedKind> = std::rc::Rc::new(Print::<Vec3>::new());
        let print = bay.spawn_at(kind, group, Pos2::new(10.0, 10.0)).unwrap();

        let response = bay.mouse_pressed(Pos2::new(115.0, 115.0), PointerButton::Primary);
        assert_eq!(
            response,
            EventResponse::Handled {
                scene: bay.patcher(print).unwrap().scene(),
                local: Pos2::new(5.0, 5.0),
            }
        );
        bay.mouse_released(Pos2::new(115.0, 115.0), PointerButton::Primary);

        let response = bay.mouse_pressed(Pos2::new(115.0, 115.0), PointerButton::Secondary);
        assert_eq!(response, EventResponse::Unhandled { local: Pos2::new(115.0, 115.0) });
    }

    #[test]
    fn test_click_on_empty_space_clears_focus() {
        let (mut bay, a, _) = patch();
        bay.mouse_pressed(Pos2::new(5.0, 5.0), PointerButton::Primary);
        bay.mouse_released(Pos2::new(5.0, 5.0), PointerButton::Primary);
        assert_eq!(bay.focus(), Some(Focus::Patcher(a)));

        bay.mouse_pressed(Pos2::new(400.0, 400.0), PointerButton::Primary);
        assert_eq!(bay.focus(), None);
        assert_eq!(bay.mouse_moved(Pos2::new(5.0, 5.0)), Some(Target::Body(a)));
        assert_eq!(bay.hover(), Some(Target::Body(a)));
    }
}
