// SPDX-License-Identifier: MIT OR Apache-2.0
//! The patchbay: patchers, cords, the scene tree and per-session state.

use crate::config::PatchbayConfig;
use crate::connection::{CordId, PatchCord, PatchError};
use crate::interaction::{Focus, Interaction};
use crate::kind::{ErasedKind, KindRegistry, PatcherKind, UpdateAction};
use crate::lifecycle::DeleteQueue;
use crate::node::{NodeId, Patcher};
use crate::port::{Port, PortDirection, PortId};
use crate::scene::{SceneId, SceneTree};
use egui::Pos2;
use slotmap::SlotMap;
use std::collections::HashSet;
use std::rc::Rc;

/// A patch session.
///
/// Owns every patcher and cord, the scene tree they hang from, the set of
/// patchers waiting for deletion and the state of the current mouse
/// gesture. Everything runs on the thread driving the frame loop.
pub struct Patchbay {
    pub(crate) config: PatchbayConfig,
    pub(crate) patchers: SlotMap<NodeId, Patcher>,
    pub(crate) cords: SlotMap<CordId, PatchCord>,
    pub(crate) scene: SceneTree,
    pub(crate) delete_queue: DeleteQueue<NodeId>,
    pub(crate) interaction: Interaction,
    pub(crate) status: Option<String>,
}

impl Patchbay {
    /// Create an empty patchbay
    pub fn new(config: PatchbayConfig) -> Self {
        Self {
            config,
            patchers: SlotMap::with_key(),
            cords: SlotMap::with_key(),
            scene: SceneTree::new(),
            delete_queue: DeleteQueue::new(),
            interaction: Interaction::default(),
            status: None,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &PatchbayConfig {
        &self.config
    }

    /// Mutable configuration. Layout changes apply on the next re-layout.
    pub fn config_mut(&mut self) -> &mut PatchbayConfig {
        &mut self.config
    }

    /// Scene tree
    pub fn scene(&self) -> &SceneTree {
        &self.scene
    }

    /// Add a group node to the scene, for moving several patchers together
    pub fn add_group(&mut self, parent: SceneId, position: Pos2) -> Result<SceneId, GraphError> {
        self.scene
            .add_child(parent, position)
            .ok_or(GraphError::StaleScene(parent))
    }

    /// Last rejected gesture or execution failure, for display
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Spawn a patcher of `kind` at the root's origin
    pub fn spawn<K: PatcherKind>(&mut self, kind: K) -> NodeId {
        self.insert(Rc::new(kind), self.scene.root(), Pos2::ZERO)
    }

    /// Spawn a patcher of `kind` under `parent`
    pub fn spawn_at(
        &mut self,
        kind: Rc<dyn ErasedKind>,
        parent: SceneId,
        position: Pos2,
    ) -> Result<NodeId, GraphError> {
        if !self.scene.contains(parent) {
            return Err(GraphError::StaleScene(parent));
        }
        Ok(self.insert(kind, parent, position))
    }

    /// Spawn a registered kind by name
    pub fn spawn_named(
        &mut self,
        registry: &KindRegistry,
        name: &str,
        parent: SceneId,
        position: Pos2,
    ) -> Result<NodeId, GraphError> {
        let kind = registry
            .get(name)
            .ok_or_else(|| GraphError::UnknownKind(name.to_string()))?;
        self.spawn_at(kind, parent, position)
    }

    fn insert(&mut self, kind: Rc<dyn ErasedKind>, parent: SceneId, position: Pos2) -> NodeId {
        let Some(scene) = self.scene.add_child(parent, position) else {
            unreachable!("parent scene node checked by caller");
        };
        let patcher = Patcher::new(kind, scene, position, &self.config);
        let id = self.patchers.insert(patcher);
        self.scene.attach_patcher(scene, id);
        tracing::debug!("Spawned '{}' as {id:?}", self.patchers[id].kind_name());
        id
    }

    /// Look up a patcher
    pub fn patcher(&self, id: NodeId) -> Option<&Patcher> {
        self.patchers.get(id)
    }

    /// All live patchers, pending ones included
    pub fn patchers(&self) -> impl Iterator<Item = (NodeId, &Patcher)> {
        self.patchers.iter()
    }

    /// Number of patchers, pending ones included
    pub fn patcher_count(&self) -> usize {
        self.patchers.len()
    }

    /// Look up a port
    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.patchers.get(id.node)?.port(id)
    }

    /// Look up a cord
    pub fn cord(&self, id: CordId) -> Option<&PatchCord> {
        self.cords.get(id)
    }

    /// All cords
    pub fn cords(&self) -> impl Iterator<Item = (CordId, &PatchCord)> {
        self.cords.iter()
    }

    /// Number of cords
    pub fn cord_count(&self) -> usize {
        self.cords.len()
    }

    /// Move a patcher within its parent's space
    pub fn set_position(&mut self, id: NodeId, position: Pos2) -> Result<(), GraphError> {
        let patcher = self.patchers.get_mut(id).ok_or(GraphError::StaleNode(id))?;
        patcher.set_position(position);
        self.scene.set_position(patcher.scene(), position);
        Ok(())
    }

    /// Copy a scene node's offset into the patcher attached to it
    fn sync_position(&mut self, scene: SceneId) {
        let Some(node) = self.scene.get(scene).and_then(|s| s.patcher()) else {
            return;
        };
        let position = self.scene.position(scene);
        if let (Some(patcher), Some(position)) = (self.patchers.get_mut(node), position) {
            patcher.set_position(position);
        }
    }

    /// Center of a port in root space
    pub fn port_position(&self, id: PortId) -> Option<Pos2> {
        let patcher = self.patchers.get(id.node)?;
        let port = patcher.port(id)?;
        Some(self.scene.local_to_global(patcher.scene(), port.center()))
    }

    /// Whether `upstream` already has a cord to `downstream`
    pub fn has_connection(&self, upstream: PortId, downstream: PortId) -> bool {
        self.port(upstream)
            .is_some_and(|port| port.has_connection_to(downstream, &self.cords))
    }

    /// Connect an output port to an input port.
    ///
    /// On success the upstream port's current message, if any, is delivered
    /// downstream at once. On failure the graph is left untouched.
    pub fn create_patch_cord(
        &mut self,
        upstream: PortId,
        downstream: PortId,
    ) -> Result<CordId, PatchError> {
        if let Err(e) = self.validate_patch(upstream, downstream) {
            tracing::warn!(target: "patcher", "patching failed: {e}");
            self.status = Some(format!("patching failed: {e}"));
            return Err(e);
        }

        let id = self.cords.insert(PatchCord::new(upstream, downstream));
        for end in [upstream, downstream] {
            if let Some(port) = self.patchers.get_mut(end.node).and_then(|p| p.port_mut(end)) {
                port.add_cord(id);
            }
        }
        tracing::debug!("Connected {upstream:?} -> {downstream:?}");

        if let Some(message) = self.port(upstream).and_then(Port::message).cloned() {
            self.deliver_at(downstream, message, 0);
        }
        Ok(id)
    }

    fn validate_patch(&self, upstream: PortId, downstream: PortId) -> Result<(), PatchError> {
        let (up, down) = match (self.port(upstream), self.port(downstream)) {
            (Some(up), Some(down)) => (up, down),
            (None, _) => return Err(PatchError::InvalidPort(upstream)),
            (_, None) => return Err(PatchError::InvalidPort(downstream)),
        };
        for end in [upstream, downstream] {
            if self.delete_queue.contains(end.node) {
                return Err(PatchError::InvalidPort(end));
            }
        }

        if upstream.direction != PortDirection::Output {
            return Err(PatchError::DirectionMismatch(upstream));
        }
        if downstream.direction != PortDirection::Input {
            return Err(PatchError::DirectionMismatch(downstream));
        }

        if up.has_connection_to(downstream, &self.cords) {
            return Err(PatchError::DuplicateConnection);
        }

        if upstream.node == downstream.node {
            return Err(PatchError::SelfConnection);
        }

        if up.tag() != down.tag() {
            return Err(PatchError::IncompatibleTypes {
                upstream: up.tag(),
                downstream: down.tag(),
            });
        }

        if self.config.reject_cycles && self.reaches(downstream.node, upstream.node) {
            return Err(PatchError::Cycle);
        }

        Ok(())
    }

    /// Whether following cords downstream from `from` arrives at `to`
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            let Some(patcher) = self.patchers.get(node) else {
                continue;
            };
            for port in (0..patcher.num_outputs()).filter_map(|i| patcher.output(i)) {
                stack.extend(
                    port.cords()
                        .filter_map(|id| self.cords.get(id))
                        .map(|cord| cord.downstream().node),
                );
            }
        }
        false
    }

    /// Remove a cord from both of its ports. Nothing is executed.
    pub fn disconnect(&mut self, id: CordId) -> Option<PatchCord> {
        let cord = self.cords.remove(id)?;
        for end in [cord.upstream(), cord.downstream()] {
            if let Some(port) = self.patchers.get_mut(end.node).and_then(|p| p.port_mut(end)) {
                port.remove_cord(id);
            }
        }
        if self.interaction.focus == Some(Focus::Cord(id)) {
            self.interaction.focus = None;
        }
        tracing::debug!("Disconnected {:?} -> {:?}", cord.upstream(), cord.downstream());
        Some(cord)
    }

    /// Remove every cord of a port. Returns how many were removed.
    pub fn disconnect_all(&mut self, port: PortId) -> usize {
        let Some(snapshot) = self.port(port).map(Port::cord_snapshot) else {
            return 0;
        };
        snapshot
            .into_iter()
            .filter(|id| self.disconnect(*id).is_some())
            .count()
    }

    /// Remove every cord of every port of a patcher
    pub fn dispose_patch_cords(&mut self, node: NodeId) -> usize {
        let attached: Vec<CordId> = self
            .cords
            .iter()
            .filter(|(_, cord)| cord.involves_node(node))
            .map(|(id, _)| id)
            .collect();
        attached
            .into_iter()
            .filter(|id| self.disconnect(*id).is_some())
            .count()
    }

    /// Mark a patcher for deletion at the next [`Self::delete_queue`].
    ///
    /// The patcher stops executing at once but stays drawn and pickable
    /// until the drain. Returns `false` if it was already marked or is gone.
    pub fn delayed_delete(&mut self, node: NodeId) -> bool {
        if !self.patchers.contains_key(node) {
            return false;
        }
        let marked = self.delete_queue.mark(node);
        if marked {
            tracing::debug!("Marked {node:?} for deletion");
        }
        marked
    }

    /// Whether a patcher is waiting for deletion
    pub fn is_pending_delete(&self, node: NodeId) -> bool {
        self.delete_queue.contains(node)
    }

    /// Destroy every patcher marked for deletion.
    ///
    /// Call once per frame, after event handling and before `update()`.
    /// Returns the number of patchers destroyed.
    pub fn delete_queue(&mut self) -> usize {
        let pending = self.delete_queue.drain();
        let mut destroyed = 0;
        for node in pending {
            self.dispose_patch_cords(node);
            let Some(patcher) = self.patchers.remove(node) else {
                continue;
            };
            if let Some(removed) = self.scene.remove(patcher.scene()) {
                // Re-parented children keep their global position, so their
                // local position changed.
                for child in removed.children() {
                    self.sync_position(*child);
                }
            }
            self.interaction.forget(node);
            tracing::debug!("Destroyed '{}' ({node:?})", patcher.kind_name());
            destroyed += 1;
        }
        destroyed
    }

    /// Run per-frame hooks of every patcher below the root
    pub fn update(&mut self) {
        self.update_subtree(self.scene.root());
    }

    /// Run per-frame hooks of the patchers in `from`'s subtree, in pre-order
    pub fn update_subtree(&mut self, from: SceneId) {
        for scene in self.scene.walk(from) {
            let Some(node) = self.scene.get(scene).and_then(|s| s.patcher()) else {
                continue;
            };
            if self.delete_queue.contains(node) {
                continue;
            }
            let Some(patcher) = self.patchers.get_mut(node) else {
                continue;
            };
            if patcher.update(&self.config) == UpdateAction::Execute {
                self.execute_at(node, 0);
            }
        }
    }
}

impl Default for Patchbay {
    fn default() -> Self {
        Self::new(PatchbayConfig::default())
    }
}

/// Errors from patchbay operations other than patching
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No kind registered under this name
    #[error("Unknown patcher kind: {0}")]
    UnknownKind(String),

    /// The patcher no longer exists
    #[error("Patcher not found: {0:?}")]
    StaleNode(NodeId),

    /// The port's patcher no longer exists or the index is out of range
    #[error("Port not found: {0:?}")]
    StalePort(PortId),

    /// The scene node no longer exists
    #[error("Scene node not found: {0:?}")]
    StaleScene(SceneId),
}
