// SPDX-License-Identifier: MIT OR Apache-2.0
//! Patcher kinds: the contract a processing type implements to become a
//! graph node.
//!
//! A kind describes everything that is shared by its instances: port arity
//! and types, how to build the per-instance context, and the hooks the
//! patcher calls. [`ErasedKind`] is the object-safe form stored by patchers
//! and by the [`KindRegistry`].

use crate::evaluation::{ExecuteError, MessageBuffer};
use crate::type_tag::TypeTag;
use egui::Pos2;
use indexmap::IndexMap;
use std::any::Any;
use std::rc::Rc;

/// What a patcher should do after its per-frame update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateAction {
    /// Nothing to do
    #[default]
    Idle,
    /// Execute the patcher and push its outputs
    Execute,
}

/// The part of a patcher a kind may look at and change
#[derive(Debug, Clone, PartialEq)]
pub struct PatcherUi {
    text: String,
    position: Pos2,
}

impl PatcherUi {
    pub(crate) fn new(position: Pos2) -> Self {
        Self {
            text: String::new(),
            position,
        }
    }

    /// Label shown in the patcher box
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the label
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Position of the patcher in its parent's space
    pub fn position(&self) -> Pos2 {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Pos2) {
        self.position = position;
    }
}

/// A kind of patcher.
///
/// Every method except `name`, `create` and `execute` has a default that
/// describes a kind with no ports and no per-frame behavior.
pub trait PatcherKind: 'static {
    /// Per-instance state
    type Context: 'static;

    /// Kind name, used by the registry and as the default label
    fn name(&self) -> &str;

    /// Number of input ports
    fn num_inputs(&self) -> usize {
        0
    }

    /// Declared type of input `index`
    fn input_type(&self, _index: usize) -> TypeTag {
        TypeTag::none()
    }

    /// Number of output ports
    fn num_outputs(&self) -> usize {
        0
    }

    /// Declared type of output `index`
    fn output_type(&self, _index: usize) -> TypeTag {
        TypeTag::none()
    }

    /// Build the context of a new instance.
    ///
    /// Messages left in either buffer become the initial messages of the
    /// matching ports.
    fn create(&self, inputs: &mut MessageBuffer, outputs: &mut MessageBuffer) -> Self::Context;

    /// Read `inputs` and write `outputs`.
    ///
    /// The output buffer keeps its contents between calls: a slot left
    /// untouched is delivered again with its previous message.
    fn execute(
        &self,
        ui: &mut PatcherUi,
        context: &mut Self::Context,
        inputs: &MessageBuffer,
        outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError>;

    /// Arrange the patcher once after creation
    fn layout(&self, ui: &mut PatcherUi, _context: &mut Self::Context) {
        ui.set_text(self.name());
    }

    /// Per-frame hook, independent of message flow
    fn update(&self, _ui: &mut PatcherUi, _context: &mut Self::Context) -> UpdateAction {
        UpdateAction::Idle
    }
}

/// Object-safe view of a [`PatcherKind`], implemented for every kind
pub trait ErasedKind {
    /// Kind name
    fn name(&self) -> &str;
    /// Number of input ports
    fn num_inputs(&self) -> usize;
    /// Declared type of input `index`
    fn input_type(&self, index: usize) -> TypeTag;
    /// Number of output ports
    fn num_outputs(&self) -> usize;
    /// Declared type of output `index`
    fn output_type(&self, index: usize) -> TypeTag;
    /// Build a boxed context
    fn create(&self, inputs: &mut MessageBuffer, outputs: &mut MessageBuffer) -> Box<dyn Any>;
    /// Execute against a boxed context
    fn execute(
        &self,
        ui: &mut PatcherUi,
        context: &mut dyn Any,
        inputs: &MessageBuffer,
        outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError>;
    /// Layout against a boxed context
    fn layout(&self, ui: &mut PatcherUi, context: &mut dyn Any);
    /// Update against a boxed context
    fn update(&self, ui: &mut PatcherUi, context: &mut dyn Any) -> UpdateAction;
}

impl<K: PatcherKind> ErasedKind for K {
    fn name(&self) -> &str {
        PatcherKind::name(self)
    }

    fn num_inputs(&self) -> usize {
        PatcherKind::num_inputs(self)
    }

    fn input_type(&self, index: usize) -> TypeTag {
        PatcherKind::input_type(self, index)
    }

    fn num_outputs(&self) -> usize {
        PatcherKind::num_outputs(self)
    }

    fn output_type(&self, index: usize) -> TypeTag {
        PatcherKind::output_type(self, index)
    }

    fn create(&self, inputs: &mut MessageBuffer, outputs: &mut MessageBuffer) -> Box<dyn Any> {
        Box::new(PatcherKind::create(self, inputs, outputs))
    }

    fn execute(
        &self,
        ui: &mut PatcherUi,
        context: &mut dyn Any,
        inputs: &MessageBuffer,
        outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError> {
        let context = context
            .downcast_mut::<K::Context>()
            .ok_or_else(|| ExecuteError::ContextMismatch(PatcherKind::name(self).to_string()))?;
        PatcherKind::execute(self, ui, context, inputs, outputs)
    }

    fn layout(&self, ui: &mut PatcherUi, context: &mut dyn Any) {
        match context.downcast_mut::<K::Context>() {
            Some(context) => PatcherKind::layout(self, ui, context),
            None => tracing::error!("Layout skipped for '{}': context type mismatch", PatcherKind::name(self)),
        }
    }

    fn update(&self, ui: &mut PatcherUi, context: &mut dyn Any) -> UpdateAction {
        match context.downcast_mut::<K::Context>() {
            Some(context) => PatcherKind::update(self, ui, context),
            None => UpdateAction::Idle,
        }
    }
}

/// Registry of available patcher kinds
pub struct KindRegistry {
    /// Registered kinds by name, in registration order
    kinds: IndexMap<String, Rc<dyn ErasedKind>>,
}

impl KindRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            kinds: IndexMap::new(),
        }
    }

    /// Register a kind under its own name, replacing any previous one
    pub fn register<K: PatcherKind>(&mut self, kind: K) {
        let name = PatcherKind::name(&kind).to_string();
        self.kinds.insert(name, Rc::new(kind));
    }

    /// Get a kind by name
    pub fn get(&self, name: &str) -> Option<Rc<dyn ErasedKind>> {
        self.kinds.get(name).cloned()
    }

    /// Whether a kind is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Registered kind names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether no kind is registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}
