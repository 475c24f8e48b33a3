// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene hierarchy used for transforms, traversal order and event bubbling.
//!
//! The tree is independent of the patch-cord graph. Transforms are plain
//! translations relative to the parent.

use crate::node::NodeId;
use egui::{Pos2, Vec2};
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational handle to a scene node
    pub struct SceneId;
}

/// One node of the scene tree
#[derive(Debug, Clone)]
pub struct SceneNode {
    parent: Option<SceneId>,
    children: Vec<SceneId>,
    offset: Vec2,
    patcher: Option<NodeId>,
}

impl SceneNode {
    /// Parent node, `None` for the root
    pub fn parent(&self) -> Option<SceneId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[SceneId] {
        &self.children
    }

    /// Translation relative to the parent
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Patcher attached to this node, if any
    pub fn patcher(&self) -> Option<NodeId> {
        self.patcher
    }
}

/// Root plus a tree of children
#[derive(Debug, Clone)]
pub struct SceneTree {
    nodes: SlotMap<SceneId, SceneNode>,
    root: SceneId,
}

impl SceneTree {
    /// Create a tree holding only the root
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode {
            parent: None,
            children: Vec::new(),
            offset: Vec2::ZERO,
            patcher: None,
        });
        Self { nodes, root }
    }

    /// Root node
    pub fn root(&self) -> SceneId {
        self.root
    }

    /// Look up a node
    pub fn get(&self, id: SceneId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Whether `id` is alive
    pub fn contains(&self, id: SceneId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root cannot be removed
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a child at `position` in the parent's space
    pub fn add_child(&mut self, parent: SceneId, position: Pos2) -> Option<SceneId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        let id = self.nodes.insert(SceneNode {
            parent: Some(parent),
            children: Vec::new(),
            offset: position.to_vec2(),
            patcher: None,
        });
        self.nodes[parent].children.push(id);
        Some(id)
    }

    pub(crate) fn attach_patcher(&mut self, id: SceneId, patcher: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.patcher = Some(patcher);
        }
    }

    /// Position in the parent's space
    pub fn position(&self, id: SceneId) -> Option<Pos2> {
        self.nodes.get(id).map(|n| n.offset.to_pos2())
    }

    /// Move a node within its parent's space
    pub fn set_position(&mut self, id: SceneId, position: Pos2) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.offset = position.to_vec2();
                true
            }
            None => false,
        }
    }

    /// Translation from `id`'s space to root space
    fn global_offset(&self, id: SceneId) -> Vec2 {
        let mut offset = Vec2::ZERO;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(c)) {
            offset += node.offset;
            current = node.parent;
        }
        offset
    }

    /// Convert a point from `id`'s space to root space
    pub fn local_to_global(&self, id: SceneId, local: Pos2) -> Pos2 {
        local + self.global_offset(id)
    }

    /// Convert a point from root space to `id`'s space
    pub fn global_to_local(&self, id: SceneId, global: Pos2) -> Pos2 {
        global - self.global_offset(id)
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    pub fn is_ancestor(&self, ancestor: SceneId, id: SceneId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.nodes.get(c).and_then(|n| n.parent);
        }
        false
    }

    /// Move `id` under `parent`, keeping its global position.
    ///
    /// Fails for the root, for unknown nodes, and when `parent` lies inside
    /// `id`'s own subtree.
    pub fn set_parent(&mut self, id: SceneId, parent: SceneId) -> bool {
        if id == self.root
            || !self.nodes.contains_key(id)
            || !self.nodes.contains_key(parent)
            || self.is_ancestor(id, parent)
        {
            return false;
        }

        let global = self.local_to_global(id, Pos2::ZERO);
        self.detach(id);
        let offset = self.global_to_local(parent, global).to_vec2();

        let node = &mut self.nodes[id];
        node.parent = Some(parent);
        node.offset = offset;
        self.nodes[parent].children.push(id);
        true
    }

    fn detach(&mut self, id: SceneId) {
        if let Some(parent) = self.nodes.get(id).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
    }

    /// Remove a node. Its children move to its parent, keeping their
    /// global positions. The root cannot be removed.
    pub fn remove(&mut self, id: SceneId) -> Option<SceneNode> {
        if id == self.root {
            return None;
        }
        let parent = self.nodes.get(id)?.parent.unwrap_or(self.root);
        let children = self.nodes[id].children.clone();
        for child in children {
            self.set_parent(child, parent);
        }
        self.detach(id);
        self.nodes.remove(id)
    }

    /// Pre-order traversal of `from` and its subtree
    pub fn walk(&self, from: SceneId) -> Vec<SceneId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}
