// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hit-testing: which patcher part or cord lies under a point.
//!
//! `hittest()` lists pickable regions in draw order, so the last region
//! containing a point is the one drawn on top.

use crate::connection::CordId;
use crate::graph::Patchbay;
use crate::node::NodeId;
use crate::port::PortId;
use egui::{Pos2, Rect};

/// Something the pointer can be over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A patcher's label box
    Body(NodeId),
    /// A port
    Port(PortId),
    /// A patch cord
    Cord(CordId),
}

impl Target {
    /// Patcher owning the target, if it is a patcher part
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Body(node) => Some(*node),
            Self::Port(port) => Some(port.node),
            Self::Cord(_) => None,
        }
    }
}

/// Pickable area, in root space
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickShape {
    /// Axis-aligned rectangle
    Rect(Rect),
    /// Line segment with a pick tolerance
    Segment {
        /// Start point
        from: Pos2,
        /// End point
        to: Pos2,
        /// Maximum distance from the segment
        tolerance: f32,
    },
}

impl PickShape {
    /// Whether `pos` falls inside the shape
    pub fn contains(&self, pos: Pos2) -> bool {
        match *self {
            Self::Rect(rect) => rect.contains(pos),
            Self::Segment { from, to, tolerance } => distance_to_segment(pos, from, to) <= tolerance,
        }
    }
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// One pickable region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRegion {
    /// What is picked
    pub target: Target,
    /// Where
    pub shape: PickShape,
}

/// Result of a hit-test pass
#[derive(Debug, Clone, Default)]
pub struct PickBuffer {
    regions: Vec<PickRegion>,
}

impl PickBuffer {
    /// Regions in draw order
    pub fn regions(&self) -> &[PickRegion] {
        &self.regions
    }

    /// Topmost target containing `pos`
    pub fn pick(&self, pos: Pos2) -> Option<Target> {
        self.regions
            .iter()
            .rev()
            .find(|r| r.shape.contains(pos))
            .map(|r| r.target)
    }

    fn push(&mut self, target: Target, shape: PickShape) {
        self.regions.push(PickRegion { target, shape });
    }
}

impl Patchbay {
    /// Collect every pickable region: cords, then each patcher's body and
    /// ports in scene order.
    pub fn hittest(&self) -> PickBuffer {
        let mut buffer = PickBuffer::default();

        for (id, cord) in &self.cords {
            if let (Some(from), Some(to)) = (
                self.port_position(cord.upstream()),
                self.port_position(cord.downstream()),
            ) {
                buffer.push(
                    Target::Cord(id),
                    PickShape::Segment {
                        from,
                        to,
                        tolerance: self.config.cord_pick_tolerance,
                    },
                );
            }
        }

        for scene in self.scene.walk(self.scene.root()) {
            let Some(node) = self.scene.get(scene).and_then(|s| s.patcher()) else {
                continue;
            };
            let Some(patcher) = self.patchers.get(node) else {
                continue;
            };
            let offset = self.scene.local_to_global(scene, Pos2::ZERO).to_vec2();

            buffer.push(
                Target::Body(node),
                PickShape::Rect(patcher.content_rect().translate(offset)),
            );
            for port in patcher.ports() {
                buffer.push(
                    Target::Port(port.id(node)),
                    PickShape::Rect(port.rect().translate(offset)),
                );
            }
        }

        buffer
    }

    /// Topmost target under `pos` (root space)
    pub fn pick(&self, pos: Pos2) -> Option<Target> {
        self.hittest().pick(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{Constant, Print, Vec3};

    #[test]
    fn test_segment_distance() {
        let a = Pos2::new(0.0, 0.0);
        let b = Pos2::new(10.0, 0.0);
        assert_eq!(distance_to_segment(Pos2::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(distance_to_segment(Pos2::new(-4.0, 3.0), a, b), 5.0);
        assert_eq!(distance_to_segment(Pos2::new(1.0, 0.0), a, a), 1.0);
    }

    #[test]
    fn test_pick_ports_and_body() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        bay.set_position(a, Pos2::new(100.0, 100.0)).unwrap();

        let out = bay.port_position(PortId::output(a, 0)).unwrap();
        assert_eq!(bay.pick(out), Some(Target::Port(PortId::output(a, 0))));
        assert_eq!(bay.pick(Pos2::new(102.0, 102.0)), Some(Target::Body(a)));
        assert_eq!(bay.pick(Pos2::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_later_patchers_are_on_top() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let b = bay.spawn(Constant::new(Vec3::ZERO));
        assert_eq!(bay.pick(Pos2::new(2.0, 2.0)), Some(Target::Body(b)));
        assert_eq!(Target::Body(a).node(), Some(a));
    }

    #[test]
    fn test_pick_cord() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let b = bay.spawn(Print::<Vec3>::new());
        bay.set_position(b, Pos2::new(0.0, 200.0)).unwrap();
        let cord = bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();

        let from = bay.port_position(PortId::output(a, 0)).unwrap();
        let to = bay.port_position(PortId::input(b, 0)).unwrap();
        let mid = from + (to - from) * 0.5;

        assert_eq!(bay.pick(mid), Some(Target::Cord(cord)));
        assert_eq!(bay.hittest().regions().len(), 1 + 2 + 2);
        assert_eq!(Target::Cord(cord).node(), None);
    }
}
