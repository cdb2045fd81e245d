//! # Event Bus Module
//!
//! Provides the named publish/subscribe bus that components use to announce
//! state transitions, plus the declarative binder that turns markup
//! attributes into bus triggers.
//!
//! ## Overview
//!
//! - Publishers trigger named events (`modal[newsletter]::open`) without
//!   knowing who listens
//! - Listeners receive `(raw event, data, current target)` synchronously, in
//!   registration order
//! - `on:click.prevent="modal::open(intro)"` attributes are collected by
//!   [`Binder::scan`] and delegated from the document root
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use domwire_core::dom::Document;
//! use domwire_core::event_bus::{Binder, EventBus};
//!
//! let document = Document::new();
//! let bus = Arc::new(EventBus::new());
//!
//! bus.on("modal::open", |_event, data, target| {
//!     println!("open {:?} from {:?}", data, target);
//! });
//!
//! let binder = Binder::new(document.clone(), bus.clone());
//! binder.scan(document.root())?;
//!
//! bus.trigger("modal::open", Some(serde_json::json!({"id": "x"})), None);
//! ```

mod binder;
mod binding;
mod bus;
mod events;

pub use binder::Binder;
pub use binding::{
    parse_binding, parse_data_literal, BindingSpec, Modifier, DEFAULT_ATTRIBUTE_PREFIX,
};
pub use bus::*;
pub use events::*;
