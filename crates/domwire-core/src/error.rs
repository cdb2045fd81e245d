//! Error handling for DOMWire
//!
//! Provides the error types for the document layer and a crate-wide
//! [`Error`] that higher layers convert into.
//!
//! The event bus itself never fails: malformed bindings degrade to missing
//! data and duplicate subscriptions are legal. Errors only arise when a caller
//! hands the document a node that does not exist or asks for an impossible
//! tree mutation.
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::dom::NodeId;
use thiserror::Error;

/// Document error type
///
/// Represents programmer errors against the arena document: stale node ids
/// and mutations that would break the tree shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node id does not refer to a live node
    #[error("Unknown node {node}")]
    UnknownNode {
        /// The stale or foreign node id.
        node: NodeId,
    },

    /// Appending would make a node its own ancestor
    #[error("Cannot append {child} to {parent}: would create a cycle")]
    HierarchyCycle {
        /// The requested parent.
        parent: NodeId,
        /// The node being appended.
        child: NodeId,
    },

    /// The document root cannot be detached or removed
    #[error("The document root cannot be detached or removed")]
    RootMutation,
}

/// Main error type for DOMWire
///
/// Aggregates all error types into a single enum for convenient error handling.
#[derive(Error, Debug)]
pub enum Error {
    /// Document error
    #[error(transparent)]
    Dom(#[from] DomError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a document error
    pub fn is_dom_error(&self) -> bool {
        matches!(self, Error::Dom(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
