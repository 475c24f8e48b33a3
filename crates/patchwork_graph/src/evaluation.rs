// SPDX-License-Identifier: MIT OR Apache-2.0
//! Patcher execution and message propagation.
//!
//! Execution is synchronous and depth-first: delivering a message to an
//! input port runs the owning patcher, whose outputs are delivered along
//! every cord before the call returns.

use crate::graph::{GraphError, Patchbay};
use crate::message::{Message, MessageError};
use crate::node::NodeId;
use crate::port::{PortDirection, PortId};
use std::any::Any;

/// Fixed-size set of message slots, one per declared port
#[derive(Debug, Clone, Default)]
pub struct MessageBuffer {
    slots: Vec<Option<Message>>,
}

impl MessageBuffer {
    /// Create `len` empty slots
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the buffer has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.slots.len(),
            "slot {index} out of range for a buffer of {} slots",
            self.slots.len()
        );
    }

    /// Message in slot `index`, if any
    pub fn message(&self, index: usize) -> Option<&Message> {
        self.check(index);
        self.slots[index].as_ref()
    }

    /// Value in slot `index` as `T`
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, MessageError> {
        self.message(index).ok_or(MessageError::Empty(index))?.get::<T>()
    }

    /// Store a value in slot `index`
    pub fn set<T: Any>(&mut self, index: usize, value: T) {
        self.set_message(index, Message::new(value));
    }

    /// Store a message in slot `index`
    pub fn set_message(&mut self, index: usize, message: Message) {
        self.check(index);
        self.slots[index] = Some(message);
    }

    /// Empty slot `index`
    pub fn clear(&mut self, index: usize) {
        self.check(index);
        self.slots[index] = None;
    }

    pub(crate) fn load(&mut self, index: usize, message: Option<Message>) {
        self.check(index);
        self.slots[index] = message;
    }

    /// Populated slots with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|m| (i, m)))
    }
}

/// Error raised by a patcher kind while executing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecuteError {
    /// An input could not be read
    #[error(transparent)]
    Message(#[from] MessageError),

    /// The per-instance context is not the kind's context type
    #[error("context of kind '{0}' has the wrong type")]
    ContextMismatch(String),

    /// Kind-specific failure
    #[error("{0}")]
    Custom(String),
}

impl Patchbay {
    /// Run a patcher now and push its outputs downstream
    pub fn execute(&mut self, node: NodeId) -> Result<(), GraphError> {
        if !self.patchers.contains_key(node) {
            return Err(GraphError::StaleNode(node));
        }
        self.execute_at(node, 0);
        Ok(())
    }

    /// Store `message` on a port and propagate it.
    ///
    /// On an input port the owning patcher executes; on an output port the
    /// message travels along every cord.
    pub fn deliver(&mut self, port: PortId, message: Message) -> Result<(), GraphError> {
        if self.port(port).is_none() {
            return Err(GraphError::StalePort(port));
        }
        self.deliver_at(port, message, 0);
        Ok(())
    }

    pub(crate) fn execute_at(&mut self, node: NodeId, depth: usize) {
        if depth > self.config.max_cascade_depth {
            tracing::warn!(
                "Cascade stopped at depth {depth} (max {})",
                self.config.max_cascade_depth
            );
            return;
        }
        if self.delete_queue.contains(node) {
            tracing::trace!("Skipping execution of {node:?}: pending deletion");
            return;
        }

        let Some(patcher) = self.patchers.get_mut(node) else {
            return;
        };

        let outgoing = match patcher.run(&self.config) {
            Ok(outgoing) => outgoing,
            Err(e) => {
                tracing::warn!("Patcher '{}' failed to execute: {}", patcher.kind_name(), e);
                self.status = Some(format!("{}: {e}", patcher.kind_name()));
                return;
            }
        };

        for (index, message) in outgoing {
            self.deliver_at(PortId::output(node, index), message, depth);
        }
    }

    pub(crate) fn deliver_at(&mut self, port: PortId, message: Message, depth: usize) {
        let Some(target) = self.patchers.get_mut(port.node).and_then(|p| p.port_mut(port)) else {
            return;
        };

        match port.direction {
            PortDirection::Input => {
                if target.tag() != message.tag() {
                    let e = MessageError::TypeMismatch {
                        expected: target.tag(),
                        found: message.tag(),
                    };
                    tracing::warn!("Dropped message for {port:?}: {e}");
                    self.status = Some(e.to_string());
                    return;
                }
                target.set_message(message);
                self.execute_at(port.node, depth + 1);
            }
            PortDirection::Output => {
                target.set_message(message.clone());
                let downstream: Vec<PortId> = target
                    .cords()
                    .filter_map(|id| self.cords.get(id))
                    .map(|cord| cord.downstream())
                    .collect();
                for down in downstream {
                    self.deliver_at(down, message.clone(), depth);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{PatcherKind, PatcherUi};
    use crate::kinds::{Constant, Print, Relay, Vec3};
    use crate::type_tag::TypeTag;

    /// Two outputs; writes only the first, and only on its first run
    struct FirstOnly;

    impl PatcherKind for FirstOnly {
        type Context = u32;

        fn name(&self) -> &str {
            "FirstOnly"
        }

        fn num_outputs(&self) -> usize {
            2
        }

        fn output_type(&self, _index: usize) -> TypeTag {
            TypeTag::of::<i32>()
        }

        fn create(&self, _inputs: &mut MessageBuffer, _outputs: &mut MessageBuffer) -> u32 {
            0
        }

        fn execute(
            &self,
            _ui: &mut PatcherUi,
            runs: &mut u32,
            _inputs: &MessageBuffer,
            outputs: &mut MessageBuffer,
        ) -> Result<(), ExecuteError> {
            *runs += 1;
            if *runs == 1 {
                outputs.set(0, 1_i32);
            }
            Ok(())
        }
    }

    #[test]
    fn test_buffer_access() {
        let mut buffer = MessageBuffer::new(2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get::<i32>(0), Err(MessageError::Empty(0)));

        buffer.set(0, 5_i32);
        assert_eq!(*buffer.get::<i32>(0).unwrap(), 5);
        assert!(matches!(
            buffer.get::<f32>(0),
            Err(MessageError::TypeMismatch { .. })
        ));

        buffer.clear(0);
        assert!(buffer.message(0).is_none());
        assert_eq!(buffer.iter().count(), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_buffer_index_is_checked() {
        let buffer = MessageBuffer::new(1);
        let _ = buffer.message(1);
    }

    #[test]
    fn test_delivery_executes_once_and_cascades() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::new(1.0, 2.0, 3.0)));
        let b = bay.spawn(Print::<Vec3>::new());
        let c = bay.spawn(Print::<Vec3>::new());
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(c, 0)).unwrap();

        let before_b = bay.patcher(b).unwrap().execution_count();
        let before_c = bay.patcher(c).unwrap().execution_count();

        bay.deliver(PortId::output(a, 0), Message::new(Vec3::new(4.0, 5.0, 6.0)))
            .unwrap();

        assert_eq!(bay.patcher(b).unwrap().execution_count(), before_b + 1);
        assert_eq!(bay.patcher(c).unwrap().execution_count(), before_c + 1);
        assert_eq!(bay.patcher(c).unwrap().text(), "(4.00, 5.00, 6.00)");
    }

    #[test]
    fn test_execute_pushes_every_output() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let b = bay.spawn(Print::<Vec3>::new());
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();
        let before = bay.patcher(b).unwrap().execution_count();

        bay.execute(a).unwrap();

        assert_eq!(bay.patcher(a).unwrap().execution_count(), 1);
        assert_eq!(bay.patcher(b).unwrap().execution_count(), before + 1);
    }

    #[test]
    fn test_mismatched_message_is_dropped() {
        let mut bay = Patchbay::default();
        let b = bay.spawn(Print::<Vec3>::new());

        bay.deliver(PortId::input(b, 0), Message::new(42_i32)).unwrap();

        let patcher = bay.patcher(b).unwrap();
        assert_eq!(patcher.execution_count(), 0);
        assert!(patcher.input(0).unwrap().message().is_none());
        assert!(bay.status().unwrap().contains("type mismatch"));
        assert_eq!(patcher.input(0).unwrap().tag(), TypeTag::of::<Vec3>());
    }

    #[test]
    fn test_stale_handles_are_reported() {
        let mut bay = Patchbay::default();
        let a = bay.spawn(Constant::new(1_i32));
        bay.delayed_delete(a);
        bay.delete_queue();

        assert_eq!(bay.execute(a), Err(GraphError::StaleNode(a)));
        assert_eq!(
            bay.deliver(PortId::output(a, 0), Message::new(1_i32)),
            Err(GraphError::StalePort(PortId::output(a, 0)))
        );
    }

    #[test]
    fn test_cascade_depth_is_bounded() {
        let mut bay = Patchbay::default();
        bay.config_mut().max_cascade_depth = 1;
        let a = bay.spawn(Constant::new(Vec3::ZERO));
        let b = bay.spawn(Relay::<Vec3>::new());
        let c = bay.spawn(Print::<Vec3>::new());
        bay.create_patch_cord(PortId::output(b, 0), PortId::input(c, 0)).unwrap();
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();

        // a -> b runs at depth 1, b -> c would run at depth 2
        assert_eq!(bay.patcher(b).unwrap().execution_count(), 1);
        assert_eq!(bay.patcher(c).unwrap().execution_count(), 0);
    }

    #[test]
    fn test_untouched_outputs_are_delivered_again() {
        let mut bay = Patchbay::default();
        let source = bay.spawn(FirstOnly);
        let first = bay.spawn(Print::<i32>::new());
        let second = bay.spawn(Print::<i32>::new());
        bay.create_patch_cord(PortId::output(source, 0), PortId::input(first, 0)).unwrap();
        bay.create_patch_cord(PortId::output(source, 1), PortId::input(second, 0)).unwrap();
        assert_eq!(bay.patcher(first).unwrap().execution_count(), 0);

        bay.execute(source).unwrap();
        bay.execute(source).unwrap();

        // Slot 0 was written once and goes out again on every run
        let first = bay.patcher(first).unwrap();
        assert_eq!(first.execution_count(), 2);
        assert_eq!(first.text(), "1");

        // Slot 1 was never written
        let second = bay.patcher(second).unwrap();
        assert_eq!(second.execution_count(), 0);
        assert_eq!(second.text(), "Print");
        assert!(bay.port(PortId::output(source, 1)).unwrap().message().is_none());
    }

    #[test]
    fn test_failed_execution_stops_the_cascade() {
        let mut bay = Patchbay::default();
        let relay = bay.spawn(Relay::<Vec3>::new());
        let print = bay.spawn(Print::<Vec3>::new());
        bay.create_patch_cord(PortId::output(relay, 0), PortId::input(print, 0)).unwrap();

        // The relay has nothing on its input yet
        bay.execute(relay).unwrap();

        assert_eq!(bay.patcher(relay).unwrap().execution_count(), 1);
        assert_eq!(
            bay.patcher(relay).unwrap().last_error(),
            Some(&ExecuteError::Message(MessageError::Empty(0)))
        );
        assert_eq!(bay.status(), Some("Relay: no message in slot 0"));
        assert_eq!(bay.patcher(print).unwrap().execution_count(), 0);

        let source = bay.spawn(Constant::new(Vec3::new(1.0, 1.0, 1.0)));
        bay.create_patch_cord(PortId::output(source, 0), PortId::input(relay, 0)).unwrap();

        assert!(bay.patcher(relay).unwrap().last_error().is_none());
        assert_eq!(bay.patcher(print).unwrap().text(), "(1.00, 1.00, 1.00)");
    }

    #[test]
    fn test_unchecked_cycle_stops_at_depth_limit() {
        let mut bay = Patchbay::default();
        bay.config_mut().reject_cycles = false;
        bay.config_mut().max_cascade_depth = 8;
        let a = bay.spawn(Relay::<Vec3>::new());
        let b = bay.spawn(Relay::<Vec3>::new());
        bay.create_patch_cord(PortId::output(a, 0), PortId::input(b, 0)).unwrap();
        bay.create_patch_cord(PortId::output(b, 0), PortId::input(a, 0)).unwrap();
        assert!(bay.reaches(a, a));

        bay.deliver(PortId::input(a, 0), Message::new(Vec3::ZERO)).unwrap();

        // Depths 1 to 8 alternate between the two relays
        assert_eq!(bay.patcher(a).unwrap().execution_count(), 4);
        assert_eq!(bay.patcher(b).unwrap().execution_count(), 4);
    }
}
