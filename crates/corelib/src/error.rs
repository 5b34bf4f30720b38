//! Core shared errors (renderer-agnostic).

use thiserror::Error;

use crate::scene::NodeId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown scene node {0:?}")]
    UnknownNode(NodeId),
    #[error("Scene node {0:?} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("Attaching scene node {0:?} would create a cycle")]
    WouldCycle(NodeId),
    #[error("Slot '{0}' is already populated")]
    SlotOccupied(&'static str),
}

pub type CoreResult<T> = Result<T, CoreError>;
