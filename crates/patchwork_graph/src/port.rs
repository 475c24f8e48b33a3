// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for patcher inputs/outputs.

use crate::connection::{CordId, PatchCord};
use crate::message::Message;
use crate::node::NodeId;
use crate::type_tag::TypeTag;
use egui::{Pos2, Rect};
use indexmap::IndexSet;
use slotmap::SlotMap;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The other direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// Handle to a port: owning patcher, side and slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    /// Owning patcher
    pub node: NodeId,
    /// Input or output side
    pub direction: PortDirection,
    /// Slot index on that side
    pub index: usize,
}

impl PortId {
    /// Input slot `index` of `node`
    pub fn input(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: PortDirection::Input,
            index,
        }
    }

    /// Output slot `index` of `node`
    pub fn output(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: PortDirection::Output,
            index,
        }
    }
}

/// A connection point on a patcher.
///
/// The direction and declared type are fixed at construction. The cord set
/// never holds the same cord twice.
#[derive(Debug, Clone)]
pub struct Port {
    index: usize,
    direction: PortDirection,
    tag: TypeTag,
    cords: IndexSet<CordId>,
    data: Option<Message>,
    rect: Rect,
}

impl Port {
    /// Create an unconnected port
    pub fn new(index: usize, direction: PortDirection, tag: TypeTag) -> Self {
        Self {
            index,
            direction,
            tag,
            cords: IndexSet::new(),
            data: None,
            rect: Rect::NOTHING,
        }
    }

    /// Slot index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Direction
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    /// Declared value type
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Handle of this port given its owner
    pub fn id(&self, owner: NodeId) -> PortId {
        PortId {
            node: owner,
            direction: self.direction,
            index: self.index,
        }
    }

    /// Register a cord. Returns `false` if it was already registered.
    pub(crate) fn add_cord(&mut self, cord: CordId) -> bool {
        self.cords.insert(cord)
    }

    /// Unregister a cord. Returns `false` if it was not registered.
    pub(crate) fn remove_cord(&mut self, cord: CordId) -> bool {
        self.cords.shift_remove(&cord)
    }

    /// Whether `cord` is registered here
    pub fn has_cord(&self, cord: CordId) -> bool {
        self.cords.contains(&cord)
    }

    /// Registered cords, in connection order
    pub fn cords(&self) -> impl Iterator<Item = CordId> + '_ {
        self.cords.iter().copied()
    }

    /// Copy of the cord set, safe to hold while cords are being removed
    pub fn cord_snapshot(&self) -> Vec<CordId> {
        self.cords.iter().copied().collect()
    }

    /// Number of registered cords
    pub fn cord_count(&self) -> usize {
        self.cords.len()
    }

    /// Whether any registered cord ends at `other`
    pub fn has_connection_to(&self, other: PortId, cords: &SlotMap<CordId, PatchCord>) -> bool {
        self.cords
            .iter()
            .filter_map(|id| cords.get(*id))
            .any(|cord| cord.involves_port(other))
    }

    /// Last message that went through this port
    pub fn message(&self) -> Option<&Message> {
        self.data.as_ref()
    }

    pub(crate) fn set_message(&mut self, message: Message) {
        self.data = Some(message);
    }

    /// Hit area, in the owning patcher's local space
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub(crate) fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// Cord anchor, in the owning patcher's local space
    pub fn center(&self) -> Pos2 {
        self.rect.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::CordId;
    use slotmap::KeyData;

    fn cord(n: u64) -> CordId {
        CordId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn test_cord_registration_is_idempotent() {
        let mut port = Port::new(0, PortDirection::Output, TypeTag::of::<f32>());
        assert!(port.add_cord(cord(1)));
        assert!(!port.add_cord(cord(1)));
        assert!(port.add_cord(cord(2)));
        assert_eq!(port.cord_count(), 2);

        assert!(port.remove_cord(cord(1)));
        assert!(!port.remove_cord(cord(1)));
        assert_eq!(port.cord_snapshot(), vec![cord(2)]);
    }

    #[test]
    fn test_direction_is_fixed() {
        let port = Port::new(3, PortDirection::Input, TypeTag::of::<i32>());
        assert_eq!(port.direction(), PortDirection::Input);
        assert_eq!(port.direction().opposite(), PortDirection::Output);
        assert_eq!(port.index(), 3);
        assert!(port.message().is_none());
    }

    #[test]
    fn test_port_id_constructors() {
        let node = NodeId::default();
        let id = PortId::output(node, 2);
        assert_eq!(id.direction, PortDirection::Output);
        assert_eq!(id.index, 2);
        assert_eq!(PortId::input(node, 0).direction, PortDirection::Input);
    }
}
