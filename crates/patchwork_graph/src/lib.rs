// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive patcher graph.
//!
//! Patchers are on-screen nodes with typed input and output ports. Patch
//! cords connect an output to an input; whenever an output receives a
//! message it is pushed along every cord and the downstream patchers run
//! again, synchronously and depth-first.
//!
//! ## Architecture
//!
//! - [`PatcherKind`] binds user processing code to a node shape
//! - [`Patchbay`] owns patchers, cords and the scene tree of one session
//! - Messages are type-tagged and checked when read
//! - Deleting a patcher from an event handler is deferred to
//!   [`Patchbay::delete_queue`], called once per frame
//! - The host forwards mouse and key events and paints [`Patchbay::draw`]

pub mod type_tag;
pub mod message;
pub mod lifecycle;
pub mod port;
pub mod connection;
pub mod kind;
pub mod node;
pub mod evaluation;
pub mod graph;
pub mod scene;
pub mod picking;
pub mod interaction;
pub mod ui;
pub mod config;
pub mod kinds;

pub use type_tag::TypeTag;
pub use message::{Message, MessageError};
pub use port::{Port, PortDirection, PortId};
pub use connection::{CordId, PatchCord, PatchError};
pub use kind::{KindRegistry, PatcherKind, PatcherUi, UpdateAction};
pub use node::{NodeId, Patcher};
pub use evaluation::{ExecuteError, MessageBuffer};
pub use graph::{GraphError, Patchbay};
pub use scene::{SceneId, SceneTree};
pub use picking::Target;
pub use interaction::{EventResponse, Focus};
pub use ui::{DrawCommand, DrawList};
pub use config::{ConfigError, PatchbayConfig};
