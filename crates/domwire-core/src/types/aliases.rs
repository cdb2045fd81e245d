//! Type aliases for commonly used complex types.
//!
//! The document, the event bus and the throttler all share state behind
//! `Arc` + `parking_lot` locks and store callbacks as reference-counted trait
//! objects so a dispatch can snapshot them and release its lock before any
//! user code runs. These aliases give those shapes a name.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use domwire_core::types::*;
//!
//! let table: ThreadSafeMap<String, usize> = thread_safe_map();
//! table.lock().insert("scroll.header".into(), 1);
//! ```

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dom::{NativeEvent, NodeId};
use crate::event_bus::BusEvent;

// =============================================================================
// THREAD-SAFE SHARED TYPES (Arc<Mutex<T>> / Arc<RwLock<T>>)
// =============================================================================

/// A thread-safe, mutex-protected wrapper for shared state.
///
/// Uses `parking_lot::Mutex` for better performance than `std::sync::Mutex`.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// A thread-safe hash map for key-value storage.
pub type ThreadSafeMap<K, V> = Arc<Mutex<HashMap<K, V>>>;

/// A thread-safe reader-writer lock wrapper for read-heavy workloads.
///
/// Dispatch reads far outnumber subscription writes on the event bus.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

// =============================================================================
// CALLBACK TYPES
// =============================================================================

/// A bus listener receiving `(raw event, data, current target)`.
///
/// `data` and `current target` are `None` when the trigger did not supply
/// them.
pub type BusCallback = Arc<dyn Fn(&BusEvent, Option<&Value>, Option<NodeId>) + Send + Sync>;

/// A native document event listener.
///
/// Receives the event mutably so it can prevent default or stop propagation.
pub type NativeCallback = Arc<dyn Fn(&mut NativeEvent) + Send + Sync>;

// =============================================================================
// CONSTRUCTOR HELPERS
// =============================================================================

/// Create a new `ThreadSafe<T>` from a value.
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new empty `ThreadSafeMap<K, V>`.
pub fn thread_safe_map<K, V>() -> ThreadSafeMap<K, V> {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Create a new `ThreadSafeRw<T>` from a value.
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}
