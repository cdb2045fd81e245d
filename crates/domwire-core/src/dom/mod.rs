//! # Document Module
//!
//! A small arena document standing in for the host DOM: elements with
//! attributes, stable [`NodeId`]s that survive detach and re-attach, and
//! synchronous native event dispatch that bubbles from the target through
//! its ancestors to the window.
//!
//! The event bus binder and the frame throttler attach their native
//! listeners here.

mod document;
mod event;
mod node;

pub use document::Document;
pub use event::{EventTarget, ListenerId, ListenerOptions, NativeEvent};
pub use node::NodeId;
