//! # DOMWire Core
//!
//! Core types for DOMWire.
//! Provides the arena document and its native event dispatch, the named
//! event bus, and the declarative `on:` attribute binder.

pub mod dom;
pub mod error;
pub mod event_bus;
pub mod types;

pub use dom::{Document, EventTarget, ListenerId, ListenerOptions, NativeEvent, NodeId};

pub use error::{DomError, Error, Result};

// Re-export event bus for convenience
pub use event_bus::{
    Binder, BindingSpec, BusEvent, Detail, EventBus, EventBusConfig, EventName, Modifier,
    SubscriptionId,
};

// Re-export type aliases for convenience
pub use types::{
    thread_safe, thread_safe_map, thread_safe_rw, BusCallback, NativeCallback, ThreadSafe,
    ThreadSafeMap, ThreadSafeRw,
};
