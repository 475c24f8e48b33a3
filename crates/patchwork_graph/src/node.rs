// SPDX-License-Identifier: MIT OR Apache-2.0
//! Patcher instances: a kind bound to concrete ports, buffers and a label box.

use crate::config::PatchbayConfig;
use crate::evaluation::{ExecuteError, MessageBuffer};
use crate::kind::{ErasedKind, PatcherUi, UpdateAction};
use crate::message::Message;
use crate::port::{Port, PortDirection, PortId};
use crate::scene::SceneId;
use egui::{Pos2, Rect, Vec2};
use std::any::Any;
use std::fmt;
use std::rc::Rc;

slotmap::new_key_type! {
    /// Generational handle to a patcher
    pub struct NodeId;
}

/// A graph node.
///
/// Port counts come from the kind and never change after construction.
pub struct Patcher {
    kind: Rc<dyn ErasedKind>,
    scene: SceneId,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    context: Box<dyn Any>,
    input_data: MessageBuffer,
    output_data: MessageBuffer,
    ui: PatcherUi,
    content: Vec2,
    executions: u64,
    last_error: Option<ExecuteError>,
}

impl Patcher {
    pub(crate) fn new(
        kind: Rc<dyn ErasedKind>,
        scene: SceneId,
        position: Pos2,
        config: &PatchbayConfig,
    ) -> Self {
        let mut input_data = MessageBuffer::new(kind.num_inputs());
        let mut output_data = MessageBuffer::new(kind.num_outputs());
        let mut context = kind.create(&mut input_data, &mut output_data);

        let mut inputs: Vec<Port> = (0..kind.num_inputs())
            .map(|i| Port::new(i, PortDirection::Input, kind.input_type(i)))
            .collect();
        let mut outputs: Vec<Port> = (0..kind.num_outputs())
            .map(|i| Port::new(i, PortDirection::Output, kind.output_type(i)))
            .collect();

        // Defaults written by `create` become the ports' initial messages.
        for (index, message) in input_data.iter() {
            inputs[index].set_message(message.clone());
        }
        for (index, message) in output_data.iter() {
            outputs[index].set_message(message.clone());
        }

        let mut ui = PatcherUi::new(position);
        kind.layout(&mut ui, context.as_mut());

        let mut patcher = Self {
            kind,
            scene,
            inputs,
            outputs,
            context,
            input_data,
            output_data,
            ui,
            content: Vec2::ZERO,
            executions: 0,
            last_error: None,
        };
        patcher.align_ports(config);
        patcher
    }

    /// Kind name
    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }

    /// Shared kind
    pub fn kind(&self) -> &Rc<dyn ErasedKind> {
        &self.kind
    }

    /// Scene node carrying this patcher's transform
    pub fn scene(&self) -> SceneId {
        self.scene
    }

    /// Current label
    pub fn text(&self) -> &str {
        self.ui.text()
    }

    /// Position in the parent's space
    pub fn position(&self) -> Pos2 {
        self.ui.position()
    }

    pub(crate) fn set_position(&mut self, position: Pos2) {
        self.ui.set_position(position);
    }

    /// Number of input ports
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Input port `index`
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Output port `index`
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Port addressed by `id`, ignoring its node part
    pub fn port(&self, id: PortId) -> Option<&Port> {
        match id.direction {
            PortDirection::Input => self.inputs.get(id.index),
            PortDirection::Output => self.outputs.get(id.index),
        }
    }

    pub(crate) fn port_mut(&mut self, id: PortId) -> Option<&mut Port> {
        match id.direction {
            PortDirection::Input => self.inputs.get_mut(id.index),
            PortDirection::Output => self.outputs.get_mut(id.index),
        }
    }

    /// All ports, inputs first
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// How many times the kind's `execute` has run
    pub fn execution_count(&self) -> u64 {
        self.executions
    }

    /// Error of the most recent execution, if it failed
    pub fn last_error(&self) -> Option<&ExecuteError> {
        self.last_error.as_ref()
    }

    /// Label box in local space
    pub fn content_rect(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.content)
    }

    /// Label box grown to include the port strips
    pub fn bounds(&self) -> Rect {
        self.ports()
            .fold(self.content_rect(), |acc, port| acc.union(port.rect()))
    }

    /// Run the kind once. Returns the output slots to deliver.
    pub(crate) fn run(&mut self, config: &PatchbayConfig) -> Result<Vec<(usize, Message)>, ExecuteError> {
        for port in &self.inputs {
            self.input_data.load(port.index(), port.message().cloned());
        }

        self.executions += 1;
        let result = self.kind.execute(
            &mut self.ui,
            self.context.as_mut(),
            &self.input_data,
            &mut self.output_data,
        );
        self.align_ports(config);

        match result {
            Ok(()) => {
                self.last_error = None;
                Ok(self
                    .output_data
                    .iter()
                    .map(|(index, message)| (index, message.clone()))
                    .collect())
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub(crate) fn update(&mut self, config: &PatchbayConfig) -> UpdateAction {
        let action = self.kind.update(&mut self.ui, self.context.as_mut());
        self.align_ports(config);
        action
    }

    /// Size the label box from the text and lay the ports along its edges
    pub(crate) fn align_ports(&mut self, config: &PatchbayConfig) {
        let chars = self.ui.text().chars().count().max(1) as f32;
        self.content = Vec2::new(
            chars * config.char_width + 2.0 * config.text_padding,
            config.line_height + 2.0 * config.text_padding,
        );

        let size = Vec2::new(config.port_width, config.port_height);
        for (i, port) in self.inputs.iter_mut().enumerate() {
            let min = Pos2::new(config.port_spacing * i as f32, -config.port_height - 1.0);
            port.set_rect(Rect::from_min_size(min, size));
        }
        for (i, port) in self.outputs.iter_mut().enumerate() {
            let min = Pos2::new(config.port_spacing * i as f32, self.content.y);
            port.set_rect(Rect::from_min_size(min, size));
        }
    }
}

impl fmt::Debug for Patcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patcher")
            .field("kind", &self.kind_name())
            .field("text", &self.ui.text())
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("executions", &self.executions)
            .finish_non_exhaustive()
    }
}
