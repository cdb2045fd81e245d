//! Event Bus implementation.
//!
//! Provides the [`EventBus`] struct: named publish/subscribe with synchronous
//! delivery in registration order. The bus is an ordinary value owned by the
//! application's composition root and shared by `Arc`.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::BusEvent;
use crate::dom::NodeId;
use crate::types::{thread_safe_rw, BusCallback, ThreadSafeRw};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for broadcast.
    pub channel_capacity: usize,
    /// Initial state of the logging toggle.
    pub logging: bool,
    /// Whether to keep event history.
    pub enable_history: bool,
    /// Maximum number of events to retain in history.
    pub max_history_size: usize,
    /// How long to retain events in history.
    pub history_retention: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            logging: false,
            enable_history: false,
            max_history_size: 1000,
            history_retention: Duration::from_secs(300),
        }
    }
}

/// Event with timestamp for history
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: BusEvent,
    timestamp: Instant,
}

#[derive(Default)]
struct ListenerTable {
    by_name: HashMap<String, Vec<(SubscriptionId, BusCallback)>>,
    names: HashMap<SubscriptionId, String>,
}

/// Central event bus for named component events
pub struct EventBus {
    /// Broadcast channel sender
    sender: broadcast::Sender<BusEvent>,
    /// Registered listeners, per event name in registration order
    listeners: ThreadSafeRw<ListenerTable>,
    /// Event history (optional)
    history: Arc<RwLock<VecDeque<TimestampedEvent>>>,
    /// Runtime logging toggle
    logging: AtomicBool,
    /// Configuration
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            listeners: thread_safe_rw(ListenerTable::default()),
            history: Arc::new(RwLock::new(VecDeque::new())),
            logging: AtomicBool::new(config.logging),
            config,
        }
    }

    /// Register `callback` for every trigger of `event_name`.
    ///
    /// Registering the same callback twice yields two invocations per
    /// trigger. A name that is never triggered simply never fires.
    pub fn on<F>(&self, event_name: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&BusEvent, Option<&Value>, Option<NodeId>) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        {
            let mut listeners = self.listeners.write();
            listeners
                .by_name
                .entry(event_name.to_string())
                .or_default()
                .push((id, Arc::new(callback)));
            listeners.names.insert(id, event_name.to_string());
        }

        if self.is_logging() {
            tracing::info!(
                event = event_name,
                subscription = %id,
                callback = std::any::type_name::<F>(),
                "on"
            );
        }
        tracing::debug!("Subscription {} added for {}", id, event_name);
        id
    }

    /// Unsubscribe a listener
    ///
    /// Returns true if the subscription was found and removed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(name) = listeners.names.remove(&id) else {
            return false;
        };
        if let Some(list) = listeners.by_name.get_mut(&name) {
            list.retain(|(sub, _)| *sub != id);
            if list.is_empty() {
                listeners.by_name.remove(&name);
            }
        }
        tracing::debug!("Subscription {} removed from {}", id, name);
        true
    }

    /// Dispatch `event_name` to every listener registered for it.
    ///
    /// With a `current_target` the listeners see an envelope holding both the
    /// target and `data`; without one they see `data` as is. Delivery is
    /// synchronous and in registration order; listeners added while this
    /// dispatch runs are not called by it.
    ///
    /// Returns the number of listeners invoked.
    pub fn trigger(
        &self,
        event_name: &str,
        data: Option<Value>,
        current_target: Option<NodeId>,
    ) -> usize {
        let event = BusEvent::new(event_name, data, current_target);

        if self.is_logging() {
            tracing::info!(
                event = event_name,
                payload = ?event.detail,
                "trigger"
            );
        }

        if self.config.enable_history {
            self.add_to_history(&event);
        }

        let snapshot: Vec<(SubscriptionId, BusCallback)> = self
            .listeners
            .read()
            .by_name
            .get(event_name)
            .cloned()
            .unwrap_or_default();

        for (id, callback) in &snapshot {
            tracing::trace!(event = event_name, subscription = %id, "delivering");
            callback(&event, event.detail.data(), event.detail.current_target());
        }

        // Async receivers are optional; a send error only means none exist.
        let _ = self.sender.send(event);

        snapshot.len()
    }

    /// Get a receiver for manual event polling
    ///
    /// This is useful for async contexts where you want to receive events
    /// in a tokio task.
    pub fn receiver(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Toggle logging of every `on` and `trigger` call
    pub fn set_logging(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::Relaxed);
    }

    /// Whether logging is on
    pub fn is_logging(&self) -> bool {
        self.logging.load(Ordering::Relaxed)
    }

    /// Number of listeners registered for `event_name`
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners
            .read()
            .by_name
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().names.len()
    }

    /// Get recent event history (if enabled)
    ///
    /// Returns events since the given instant, or all history if None.
    pub fn history(&self, since: Option<Instant>) -> Vec<BusEvent> {
        if !self.config.enable_history {
            return Vec::new();
        }

        let history = self.history.read();
        match since {
            Some(since) => history
                .iter()
                .filter(|e| e.timestamp >= since)
                .map(|e| e.event.clone())
                .collect(),
            None => history.iter().map(|e| e.event.clone()).collect(),
        }
    }

    /// Clear event history
    pub fn clear_history(&self) {
        let mut history = self.history.write();
        history.clear();
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// Add an event to history, maintaining size and age limits
    fn add_to_history(&self, event: &BusEvent) {
        let mut history = self.history.write();
        let now = Instant::now();

        history.push_back(TimestampedEvent {
            event: event.clone(),
            timestamp: now,
        });

        let retention = self.config.history_retention;
        while history
            .front()
            .is_some_and(|e| now.duration_since(e.timestamp) > retention)
        {
            history.pop_front();
        }

        while history.len() > self.config.max_history_size {
            history.pop_front();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("logging", &self.is_logging())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::events::Detail;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.is_logging());
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();

        let id = bus.on("tooltip::show", |_, _, _| {});
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.listener_count("tooltip::show"), 1);

        assert!(bus.off(id));
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.listener_count("tooltip::show"), 0);

        // Double unsubscribe should return false
        assert!(!bus.off(id));
    }

    #[test]
    fn test_delivery_is_synchronous_with_data() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        bus.on("modal::open", move |event, data, target| {
            *seen_clone.lock() = Some((event.name.clone(), data.cloned(), target));
        });

        let delivered = bus.trigger("modal::open", Some(json!({"id": "x"})), None);
        assert_eq!(delivered, 1);
        assert_eq!(
            *seen.lock(),
            Some(("modal::open".to_string(), Some(json!({"id": "x"})), None))
        );
    }

    #[test]
    fn test_duplicate_registration_fires_twice_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            let order = order.clone();
            bus.on("accordion::toggle", move |_, _, _| order.lock().push(label));
        }

        bus.trigger("accordion::toggle", None, None);
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_current_target_wraps_payload() {
        let bus = EventBus::new();
        let detail = Arc::new(Mutex::new(None));
        let detail_clone = detail.clone();

        bus.on("tabs::select", move |event, data, target| {
            assert_eq!(data, Some(&json!(2)));
            assert_eq!(target, Some(NodeId(5)));
            *detail_clone.lock() = Some(event.detail.clone());
        });

        bus.trigger("tabs::select", Some(json!(2)), Some(NodeId(5)));
        assert_eq!(
            *detail.lock(),
            Some(Detail::Envelope {
                current_target: NodeId(5),
                data: Some(json!(2))
            })
        );
    }

    #[test]
    fn test_names_do_not_cross() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        bus.on("modal[a]::open", move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.trigger("modal[b]::open", None, None), 0);
        assert_eq!(bus.trigger("", None, None), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reentrant_listener() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_bus = Arc::downgrade(&bus);
        let c = counter.clone();
        bus.on("outer", move |_, _, _| {
            if let Some(bus) = inner_bus.upgrade() {
                let c = c.clone();
                // Added during dispatch: must not run for this trigger.
                bus.on("outer", move |_, _, _| {
                    c.fetch_add(100, Ordering::SeqCst);
                });
                bus.trigger("inner", None, None);
            }
        });
        let c = counter.clone();
        bus.on("inner", move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.trigger("outer", None, None), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("outer"), 2);
    }

    #[test]
    fn test_logging_toggle_has_no_behavioural_effect() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        bus.set_logging(true);
        bus.on("video::play", move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.trigger("video::play", Some(json!("intro")), None);
        bus.set_logging(false);
        bus.trigger("video::play", None, None);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }

        fn clear(&self) {
            self.0.lock().clear();
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_logging_toggle_emits_records() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let bus = EventBus::new();

            bus.on("modal::open", |_, _, _| {});
            bus.trigger("modal::open", Some(json!("quiet")), None);
            assert_eq!(logs.text(), "", "nothing is logged while the toggle is off");

            bus.set_logging(true);
            bus.on("modal::open", |_, _, _| {});
            let on_record = logs.text();
            assert!(on_record.contains("modal::open"));
            assert!(on_record.contains("subscription="));
            assert!(on_record.contains("callback="));

            logs.clear();
            bus.trigger("modal::open", Some(json!("loud")), None);
            let trigger_record = logs.text();
            assert!(trigger_record.contains("trigger"));
            assert!(trigger_record.contains("modal::open"));
            assert!(trigger_record.contains("loud"));

            logs.clear();
            bus.set_logging(false);
            bus.trigger("modal::open", None, None);
            assert_eq!(logs.text(), "");
        });
    }

    #[test]
    fn test_event_history() {
        let config = EventBusConfig {
            enable_history: true,
            max_history_size: 10,
            ..Default::default()
        };
        let bus = EventBus::with_config(config);

        for i in 0..5 {
            bus.trigger("carousel::slide", Some(json!(i)), None);
        }

        let history = bus.history(None);
        assert_eq!(history.len(), 5);
        assert_eq!(history[4].detail.data(), Some(&json!(4)));

        bus.clear_history();
        assert_eq!(bus.history(None).len(), 0);
    }

    #[test]
    fn test_history_max_size() {
        let config = EventBusConfig {
            enable_history: true,
            max_history_size: 5,
            ..Default::default()
        };
        let bus = EventBus::with_config(config);

        for i in 0..10 {
            bus.trigger("carousel::slide", Some(json!(i)), None);
        }

        let history = bus.history(None);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].detail.data(), Some(&json!(5)));
    }

    #[test]
    fn test_history_disabled_by_default() {
        let bus = EventBus::new();
        bus.trigger("carousel::slide", None, None);
        assert!(bus.history(None).is_empty());
    }

    #[tokio::test]
    async fn test_async_receiver() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        bus.trigger("form[signup]::invalid", Some(json!(["email"])), None);

        let received = receiver.try_recv().expect("event should be buffered");
        assert_eq!(received.name, "form[signup]::invalid");
        assert_eq!(received.detail.data(), Some(&json!(["email"])));
    }
}
