// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type-erased values carried by ports.

use crate::type_tag::TypeTag;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A single typed value travelling along patch cords.
///
/// Cloning a message is cheap: fan-out delivers the same value to every
/// downstream port. Reading it back requires naming the exact type it was
/// created with.
#[derive(Clone)]
pub struct Message {
    tag: TypeTag,
    value: Rc<dyn Any>,
}

impl Message {
    /// Wrap a value
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            value: Rc::new(value),
        }
    }

    /// Message holding `T::default()`
    pub fn default_of<T: Any + Default>() -> Self {
        Self::new(T::default())
    }

    /// Tag of the carried value
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Whether the carried value is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.tag.is::<T>()
    }

    /// Borrow the value as `T`
    pub fn get<T: Any>(&self) -> Result<&T, MessageError> {
        self.value
            .downcast_ref::<T>()
            .ok_or_else(|| MessageError::TypeMismatch {
                expected: TypeTag::of::<T>(),
                found: self.tag,
            })
    }

    /// Replace the value, keeping the message's type
    pub fn set<T: Any>(&mut self, value: T) -> Result<(), MessageError> {
        if !self.is::<T>() {
            return Err(MessageError::TypeMismatch {
                expected: self.tag,
                found: TypeTag::of::<T>(),
            });
        }
        self.value = Rc::new(value);
        Ok(())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message").field("tag", &self.tag).finish_non_exhaustive()
    }
}

/// Error reading a message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The value is not of the requested type
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type
        expected: TypeTag,
        /// Type actually carried
        found: TypeTag,
    },

    /// The slot holds no message yet
    #[error("no message in slot {0}")]
    Empty(usize),
}
