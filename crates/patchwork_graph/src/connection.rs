// SPDX-License-Identifier: MIT OR Apache-2.0
//! Patch cord (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PortId;
use crate::type_tag::TypeTag;

slotmap::new_key_type! {
    /// Generational handle to a patch cord
    pub struct CordId;
}

/// A directed connection from an output port to an input port.
///
/// A cord carries no data of its own; it exists only while both ports hold
/// it in their cord sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchCord {
    upstream: PortId,
    downstream: PortId,
}

impl PatchCord {
    pub(crate) fn new(upstream: PortId, downstream: PortId) -> Self {
        Self {
            upstream,
            downstream,
        }
    }

    /// Output side
    pub fn upstream(&self) -> PortId {
        self.upstream
    }

    /// Input side
    pub fn downstream(&self) -> PortId {
        self.downstream
    }

    /// Whether either end belongs to `node`
    pub fn involves_node(&self, node: NodeId) -> bool {
        self.upstream.node == node || self.downstream.node == node
    }

    /// Whether either end is `port`
    pub fn involves_port(&self, port: PortId) -> bool {
        self.upstream == port || self.downstream == port
    }
}

/// Why a patch cord could not be created.
///
/// A rejected gesture leaves the graph exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// An endpoint does not exist, is stale, or is about to be deleted
    #[error("port is invalid: {0:?}")]
    InvalidPort(PortId),

    /// Upstream must be an output and downstream an input
    #[error("wrong port direction: {0:?}")]
    DirectionMismatch(PortId),

    /// The two ports are already connected
    #[error("already connected")]
    DuplicateConnection,

    /// Both ports belong to the same patcher
    #[error("patching oneself")]
    SelfConnection,

    /// Declared port types differ
    #[error("incompatible port types: {upstream} -> {downstream}")]
    IncompatibleTypes {
        /// Type produced upstream
        upstream: TypeTag,
        /// Type expected downstream
        downstream: TypeTag,
    },

    /// The cord would close a loop
    #[error("connection would create a cycle")]
    Cycle,
}
