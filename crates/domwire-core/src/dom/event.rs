//! Native document events and listener handles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodeId;

/// Where a native event is dispatched or a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    /// The window, outermost hop of every bubbling path from a connected node.
    Window,
    /// A document node.
    Node(NodeId),
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        EventTarget::Node(node)
    }
}

impl std::fmt::Display for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventTarget::Window => write!(f, "window"),
            EventTarget::Node(node) => write!(f, "{}", node),
        }
    }
}

/// Handle returned by [`Document::add_event_listener`](super::Document::add_event_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

/// Options for a native listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// `prevent_default` is ignored while this listener runs.
    pub passive: bool,
    /// The listener is removed before its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    /// Options for a passive listener.
    pub fn passive() -> Self {
        Self {
            passive: true,
            once: false,
        }
    }
}

/// A native event travelling through the document.
#[derive(Debug, Clone)]
pub struct NativeEvent {
    pub(crate) kind: String,
    pub(crate) target: EventTarget,
    pub(crate) current_target: Option<EventTarget>,
    pub(crate) path: Vec<NodeId>,
    pub(crate) data: Option<Value>,
    pub(crate) cancelable: bool,
    pub(crate) default_prevented: bool,
    pub(crate) propagation_stopped: bool,
    pub(crate) in_passive_listener: bool,
    pub(crate) timestamp: DateTime<Utc>,
}

impl NativeEvent {
    /// Create a cancelable event of the given kind (`click`, `scroll`, ...).
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: EventTarget::Window,
            current_target: None,
            path: Vec::new(),
            data: None,
            cancelable: true,
            default_prevented: false,
            propagation_stopped: false,
            in_passive_listener: false,
            timestamp: Utc::now(),
        }
    }

    /// Attach host data (scroll offset, pointer position, ...).
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Mark the event as not cancelable.
    pub fn non_cancelable(mut self) -> Self {
        self.cancelable = false;
        self
    }

    /// Event kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The node (or window) the event was dispatched on
    pub fn target(&self) -> EventTarget {
        self.target
    }

    /// The hop whose listeners are currently running, `None` outside dispatch
    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target
    }

    /// Nodes from the target up to the topmost ancestor, target first.
    pub fn composed_path(&self) -> &[NodeId] {
        &self.path
    }

    /// Host data attached to the event
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Creation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Cancel the default action.
    ///
    /// Has no effect on non-cancelable events or inside a passive listener.
    pub fn prevent_default(&mut self) {
        if !self.cancelable {
            return;
        }
        if self.in_passive_listener {
            tracing::debug!(kind = %self.kind, "prevent_default ignored in passive listener");
            return;
        }
        self.default_prevented = true;
    }

    /// Whether the default action was cancelled
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop bubbling after the current hop's listeners.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether bubbling was stopped
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}
