// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in patcher kinds.

use crate::evaluation::{ExecuteError, MessageBuffer};
use crate::kind::{KindRegistry, PatcherKind, PatcherUi, UpdateAction};
use crate::type_tag::TypeTag;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Three-component vector carried between patchers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X
    pub x: f32,
    /// Y
    pub y: f32,
    /// Z
    pub z: f32,
}

impl Vec3 {
    /// All zeros
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Emits a fixed value
#[derive(Debug, Clone)]
pub struct Constant<T> {
    name: String,
    value: T,
}

impl<T: Clone + 'static> Constant<T> {
    /// Constant emitting `value`
    pub fn new(value: T) -> Self {
        Self {
            name: "Constant".to_string(),
            value,
        }
    }

    /// Register under a different name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Clone + 'static> PatcherKind for Constant<T> {
    type Context = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn output_type(&self, _index: usize) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn create(&self, _inputs: &mut MessageBuffer, outputs: &mut MessageBuffer) {
        outputs.set(0, self.value.clone());
    }

    fn execute(
        &self,
        _ui: &mut PatcherUi,
        _context: &mut (),
        _inputs: &MessageBuffer,
        outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError> {
        outputs.set(0, self.value.clone());
        Ok(())
    }
}

/// Shows the last received value as its label
pub struct Print<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: fmt::Display + Any> Print<T> {
    /// Printer for values of `T`
    pub fn new() -> Self {
        Self {
            name: "Print".to_string(),
            _marker: PhantomData,
        }
    }

    /// Register under a different name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: fmt::Display + Any> Default for Print<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Display + Any> PatcherKind for Print<T> {
    type Context = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn input_type(&self, _index: usize) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn create(&self, _inputs: &mut MessageBuffer, _outputs: &mut MessageBuffer) {}

    fn execute(
        &self,
        ui: &mut PatcherUi,
        _context: &mut (),
        inputs: &MessageBuffer,
        _outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError> {
        let value = inputs.get::<T>(0)?;
        ui.set_text(value.to_string());
        Ok(())
    }
}

/// Forwards its input unchanged
pub struct Relay<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Any> Relay<T> {
    /// Relay for values of `T`
    pub fn new() -> Self {
        Self {
            name: "Relay".to_string(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + Any> Default for Relay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Any> PatcherKind for Relay<T> {
    type Context = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn num_inputs(&self) -> usize {
        1
    }

    fn input_type(&self, _index: usize) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn output_type(&self, _index: usize) -> TypeTag {
        TypeTag::of::<T>()
    }

    fn create(&self, _inputs: &mut MessageBuffer, _outputs: &mut MessageBuffer) {}

    fn execute(
        &self,
        _ui: &mut PatcherUi,
        _context: &mut (),
        inputs: &MessageBuffer,
        outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError> {
        let value = inputs.get::<T>(0)?.clone();
        outputs.set(0, value);
        Ok(())
    }
}

/// Emits its own position every frame
#[derive(Debug, Clone, Copy, Default)]
pub struct Position;

impl PatcherKind for Position {
    type Context = ();

    fn name(&self) -> &str {
        "Position"
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn output_type(&self, _index: usize) -> TypeTag {
        TypeTag::of::<Vec3>()
    }

    fn create(&self, _inputs: &mut MessageBuffer, outputs: &mut MessageBuffer) {
        outputs.set(0, Vec3::ZERO);
    }

    fn execute(
        &self,
        ui: &mut PatcherUi,
        _context: &mut (),
        _inputs: &MessageBuffer,
        outputs: &mut MessageBuffer,
    ) -> Result<(), ExecuteError> {
        let p = ui.position();
        outputs.set(0, Vec3::new(p.x, p.y, 0.0));
        Ok(())
    }

    fn update(&self, _ui: &mut PatcherUi, _context: &mut ()) -> UpdateAction {
        UpdateAction::Execute
    }
}

/// Registry with every built-in kind, for [`Vec3`] values
pub fn create_builtin_registry() -> KindRegistry {
    let mut registry = KindRegistry::new();
    registry.register(Position);
    registry.register(Constant::new(Vec3::ZERO));
    registry.register(Print::<Vec3>::new());
    registry.register(Relay::<Vec3>::new());
    registry
}
