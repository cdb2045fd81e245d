//! Namespaced animation-frame throttler.
//!
//! Each registration is keyed by `event.namespace`. Native events on the
//! registration's target are coalesced so the callback runs at most once per
//! animation frame, with the most recent event. An optional delay debounces
//! the events before a frame is requested.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domwire_core::{
    thread_safe_map, DomError, Document, EventTarget, ListenerId, ListenerOptions, NativeEvent,
    ThreadSafeMap,
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::host::{FrameHost, TimerId};

/// Callback invoked with the latest triggering event
pub type ThrottledCallback = Arc<dyn Fn(&NativeEvent) + Send + Sync>;

/// Throttler error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// The registration target cannot carry a listener
    #[error("Cannot register {key}: {source}")]
    InvalidTarget {
        /// Key of the rejected registration.
        key: ThrottleKey,
        /// Underlying document error.
        source: DomError,
    },
}

/// Result type for throttler operations
pub type Result<T> = std::result::Result<T, ThrottleError>;

/// Identity of a registration: `event.namespace`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThrottleKey(String);

impl ThrottleKey {
    /// Build the key for a native event and namespace
    pub fn new(event: &str, namespace: &str) -> Self {
        Self(format!("{}.{}", event, namespace))
    }

    /// The key as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A throttled listener registration
#[derive(Clone)]
pub struct Registration {
    /// Element or window to listen on
    pub target: EventTarget,
    /// Native event kind (`scroll`, `resize`, `pointermove`, ...)
    pub event: String,
    /// Caller-chosen namespace separating independent registrations
    pub namespace: String,
    /// Work to run at most once per frame
    pub callback: ThrottledCallback,
    /// Quiet period required before a frame is requested
    pub delay: Option<Duration>,
}

impl Registration {
    /// Create a registration without delay
    pub fn new<F>(target: impl Into<EventTarget>, event: &str, namespace: &str, callback: F) -> Self
    where
        F: Fn(&NativeEvent) + Send + Sync + 'static,
    {
        Self {
            target: target.into(),
            event: event.to_string(),
            namespace: namespace.to_string(),
            callback: Arc::new(callback),
            delay: None,
        }
    }

    /// Debounce by `delay` before requesting a frame
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Key of this registration
    pub fn key(&self) -> ThrottleKey {
        ThrottleKey::new(&self.event, &self.namespace)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("target", &self.target)
            .field("event", &self.event)
            .field("namespace", &self.namespace)
            .field("delay", &self.delay)
            .finish()
    }
}

/// Per-key dispatch state shared with the native listener and host callbacks
struct SlotState {
    key: ThrottleKey,
    callback: ThrottledCallback,
    delay: Option<Duration>,
    frame_scheduled: AtomicBool,
    latest: Mutex<Option<NativeEvent>>,
    pending_timer: Mutex<Option<TimerId>>,
}

struct Slot {
    listener: ListenerId,
    generation: u64,
    state: Arc<SlotState>,
}

struct Inner {
    document: Document,
    host: FrameHost,
    slots: ThreadSafeMap<ThrottleKey, Slot>,
    generation: AtomicU64,
}

impl Inner {
    fn detach(&self, slot: Slot) {
        self.document.remove_event_listener(slot.listener);
        if let Some(timer) = slot.state.pending_timer.lock().take() {
            self.host.clear_timeout(timer);
        }
    }
}

/// Namespaced registry of frame-throttled native listeners.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone)]
pub struct FrameThrottler {
    inner: Arc<Inner>,
}

impl FrameThrottler {
    /// Create a throttler attaching listeners to `document` and scheduling
    /// on `host`
    pub fn new(document: Document, host: FrameHost) -> Self {
        Self {
            inner: Arc::new(Inner {
                document,
                host,
                slots: thread_safe_map(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Install registrations, replacing any existing one with the same key.
    ///
    /// Fails on the first registration whose target is not a live node;
    /// earlier registrations stay installed.
    pub fn set(&self, registrations: impl IntoIterator<Item = Registration>) -> Result<()> {
        for registration in registrations {
            self.install(registration)?;
        }
        Ok(())
    }

    /// Install one registration and return a guard that removes it on drop.
    pub fn set_scoped(&self, registration: Registration) -> Result<ThrottleGuard> {
        let key = registration.key();
        let generation = self.install(registration)?;
        Ok(ThrottleGuard {
            throttler: self.clone(),
            key,
            generation,
            disposed: false,
        })
    }

    /// Remove registrations by key. Unknown keys are ignored.
    ///
    /// A frame already requested for a removed key still runs once.
    pub fn remove<'a>(&self, keys: impl IntoIterator<Item = &'a ThrottleKey>) {
        for key in keys {
            let slot = self.inner.slots.lock().remove(key);
            if let Some(slot) = slot {
                self.inner.detach(slot);
                debug!(key = %key, "Throttle registration removed");
            }
        }
    }

    /// Remove every registration
    pub fn clear(&self) {
        let slots: Vec<(ThrottleKey, Slot)> = self.inner.slots.lock().drain().collect();
        for (_, slot) in slots {
            self.inner.detach(slot);
        }
    }

    /// Whether a registration with this key is installed
    pub fn contains(&self, key: &ThrottleKey) -> bool {
        self.inner.slots.lock().contains_key(key)
    }

    /// Number of installed registrations
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Whether no registrations are installed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The host frames are scheduled on
    pub fn host(&self) -> &FrameHost {
        &self.inner.host
    }

    fn install(&self, registration: Registration) -> Result<u64> {
        let key = registration.key();
        if let EventTarget::Node(node) = registration.target {
            if !self.inner.document.contains(node) {
                return Err(ThrottleError::InvalidTarget {
                    key,
                    source: DomError::UnknownNode { node },
                });
            }
        }

        let previous = self.inner.slots.lock().remove(&key);
        if let Some(previous) = previous {
            self.inner.detach(previous);
            debug!(key = %key, "Replacing throttle registration");
        }

        let state = Arc::new(SlotState {
            key: key.clone(),
            callback: registration.callback,
            delay: registration.delay,
            frame_scheduled: AtomicBool::new(false),
            latest: Mutex::new(None),
            pending_timer: Mutex::new(None),
        });

        let listener_state = Arc::clone(&state);
        let host = self.inner.host.clone();
        let listener = self
            .inner
            .document
            .add_event_listener(
                registration.target,
                &registration.event,
                ListenerOptions::passive(),
                move |event| on_native_event(&listener_state, &host, event),
            )
            .map_err(|source| ThrottleError::InvalidTarget {
                key: key.clone(),
                source,
            })?;

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.slots.lock().insert(
            key.clone(),
            Slot {
                listener,
                generation,
                state,
            },
        );
        debug!(key = %key, target = %registration.target, delay = ?registration.delay, "Throttle registration set");
        Ok(generation)
    }

    fn remove_generation(&self, key: &ThrottleKey, generation: u64) -> bool {
        let slot = {
            let mut slots = self.inner.slots.lock();
            match slots.get(key) {
                Some(slot) if slot.generation == generation => slots.remove(key),
                _ => None,
            }
        };
        match slot {
            Some(slot) => {
                self.inner.detach(slot);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for FrameThrottler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<ThrottleKey> = self.inner.slots.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("FrameThrottler")
            .field("keys", &keys)
            .field("host", &self.inner.host)
            .finish()
    }
}

/// Removes its registration when dropped or disposed.
///
/// If the key has been re-`set` since the guard was created, the newer
/// registration is left alone.
pub struct ThrottleGuard {
    throttler: FrameThrottler,
    key: ThrottleKey,
    generation: u64,
    disposed: bool,
}

impl ThrottleGuard {
    /// Key guarded by this handle
    pub fn key(&self) -> &ThrottleKey {
        &self.key
    }

    /// Remove the registration now. Returns whether it was still installed.
    pub fn dispose(mut self) -> bool {
        self.disposed = true;
        self.throttler.remove_generation(&self.key, self.generation)
    }
}

impl Drop for ThrottleGuard {
    fn drop(&mut self) {
        if !self.disposed {
            self.throttler.remove_generation(&self.key, self.generation);
        }
    }
}

impl fmt::Debug for ThrottleGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleGuard")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish()
    }
}

fn on_native_event(state: &Arc<SlotState>, host: &FrameHost, event: &NativeEvent) {
    *state.latest.lock() = Some(event.clone());

    match state.delay {
        Some(delay) => {
            let mut pending = state.pending_timer.lock();
            if let Some(timer) = pending.take() {
                host.clear_timeout(timer);
            }
            let timer_state = Arc::clone(state);
            let timer_host = host.clone();
            *pending = Some(host.set_timeout(
                delay,
                Box::new(move || {
                    timer_state.pending_timer.lock().take();
                    schedule_frame(&timer_state, &timer_host);
                }),
            ));
        }
        None => schedule_frame(state, host),
    }
}

fn schedule_frame(state: &Arc<SlotState>, host: &FrameHost) {
    if state.frame_scheduled.swap(true, Ordering::AcqRel) {
        trace!(key = %state.key, "Frame already scheduled, coalescing");
        return;
    }

    let callback = Arc::clone(&state.callback);
    let frame_state = Arc::clone(state);
    host.request_animation_frame(Box::new(move |_timestamp| {
        let latest = frame_state.latest.lock().clone();
        if let Some(event) = latest {
            callback(&event);
        }
        frame_state.frame_scheduled.store(false, Ordering::Release);
    }));
}
