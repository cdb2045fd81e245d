//! Declarative binder: wires `on:` attributes to bus events.
//!
//! [`Binder::scan`] walks a subtree and records every binding in an index
//! keyed by [`NodeId`]. One native listener per event kind is attached at the
//! document root; when it fires, the event's composed path is looked up in the
//! index, so moved elements keep working and newly inserted ones only need a
//! scan of their own subtree.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::binding::{parse_binding, BindingSpec, Modifier, DEFAULT_ATTRIBUTE_PREFIX};
use super::bus::EventBus;
use crate::dom::{Document, EventTarget, ListenerId, ListenerOptions, NativeEvent, NodeId};
use crate::error::DomError;
use crate::types::{thread_safe, ThreadSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct BindingId(u64);

#[derive(Debug, Clone)]
struct Binding {
    node: NodeId,
    spec: BindingSpec,
}

#[derive(Default)]
struct BinderState {
    next_id: u64,
    bindings: BTreeMap<BindingId, Binding>,
    by_node: HashMap<NodeId, Vec<BindingId>>,
    root_listeners: HashMap<String, ListenerId>,
}

impl BinderState {
    fn insert(&mut self, node: NodeId, spec: BindingSpec) {
        self.next_id += 1;
        let id = BindingId(self.next_id);
        self.bindings.insert(id, Binding { node, spec });
        self.by_node.entry(node).or_default().push(id);
    }

    fn drop_node(&mut self, node: NodeId) -> usize {
        let ids = self.by_node.remove(&node).unwrap_or_default();
        for id in &ids {
            self.bindings.remove(id);
        }
        ids.len()
    }

    fn drop_binding(&mut self, id: BindingId) {
        if let Some(binding) = self.bindings.remove(&id) {
            if let Some(ids) = self.by_node.get_mut(&binding.node) {
                ids.retain(|b| *b != id);
                if ids.is_empty() {
                    self.by_node.remove(&binding.node);
                }
            }
        }
    }
}

/// Registry of declarative bindings for one document and one bus
pub struct Binder {
    document: Document,
    bus: Arc<EventBus>,
    prefix: String,
    state: ThreadSafe<BinderState>,
}

impl Binder {
    /// Create a binder using the default `on:` prefix
    pub fn new(document: Document, bus: Arc<EventBus>) -> Self {
        Self::with_prefix(document, bus, DEFAULT_ATTRIBUTE_PREFIX)
    }

    /// Create a binder recognising attributes that start with `prefix`
    pub fn with_prefix(document: Document, bus: Arc<EventBus>, prefix: &str) -> Self {
        Self {
            document,
            bus,
            prefix: prefix.to_string(),
            state: thread_safe(BinderState::default()),
        }
    }

    /// Attribute prefix in use
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scan `root` and its descendants for bindings.
    ///
    /// Any bindings previously recorded for nodes in the subtree are replaced,
    /// so re-scanning is idempotent. Bindings of nodes that no longer exist
    /// are pruned. Returns the number of bindings recorded.
    pub fn scan(&self, root: NodeId) -> Result<usize, DomError> {
        let nodes = self.document.descendants(root)?;

        let mut found = Vec::new();
        for node in &nodes {
            for (name, value) in self.document.attributes(*node) {
                if !name.starts_with(&self.prefix) {
                    continue;
                }
                match parse_binding(&self.prefix, &name, &value) {
                    Some(spec) => found.push((*node, spec)),
                    None => warn!(node = %node, attribute = %name, "Skipping malformed binding"),
                }
            }
        }

        let kinds: BTreeSet<String> = {
            let mut state = self.state.lock();
            self.prune(&mut state);
            for node in &nodes {
                state.drop_node(*node);
            }
            for (node, spec) in &found {
                state.insert(*node, spec.clone());
            }
            found
                .iter()
                .map(|(_, spec)| spec.native_event.clone())
                .filter(|kind| !state.root_listeners.contains_key(kind))
                .collect()
        };

        for kind in kinds {
            self.ensure_root_listener(&kind)?;
        }

        debug!(root = %root, bindings = found.len(), "Scanned subtree");
        Ok(found.len())
    }

    /// Drop every binding recorded for `root` and its descendants.
    pub fn unbind(&self, root: NodeId) -> Result<usize, DomError> {
        let nodes = self.document.descendants(root)?;
        let mut state = self.state.lock();
        Ok(nodes.iter().map(|node| state.drop_node(*node)).sum())
    }

    /// Bindings recorded for a node, in attribute order
    pub fn bindings_for(&self, node: NodeId) -> Vec<BindingSpec> {
        let state = self.state.lock();
        state
            .by_node
            .get(&node)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.bindings.get(id))
                    .map(|b| b.spec.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of recorded bindings
    pub fn len(&self) -> usize {
        self.state.lock().bindings.len()
    }

    /// Whether no bindings are recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native event kinds with a delegated root listener
    pub fn delegated_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.state.lock().root_listeners.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    fn prune(&self, state: &mut BinderState) {
        let dead: Vec<NodeId> = state
            .by_node
            .keys()
            .filter(|node| !self.document.contains(**node))
            .copied()
            .collect();
        for node in dead {
            state.drop_node(node);
        }
    }

    fn ensure_root_listener(&self, kind: &str) -> Result<(), DomError> {
        if self.state.lock().root_listeners.contains_key(kind) {
            return Ok(());
        }
        let state = Arc::clone(&self.state);
        let bus = Arc::clone(&self.bus);
        let listener = self.document.add_event_listener(
            EventTarget::Node(self.document.root()),
            kind,
            ListenerOptions::default(),
            move |event| deliver(&state, &bus, event),
        )?;
        self.state
            .lock()
            .root_listeners
            .insert(kind.to_string(), listener);
        debug!(kind, "Delegated listener installed at root");
        Ok(())
    }
}

impl Drop for Binder {
    fn drop(&mut self) {
        let listeners: Vec<ListenerId> = self
            .state
            .lock()
            .root_listeners
            .drain()
            .map(|(_, id)| id)
            .collect();
        for id in listeners {
            self.document.remove_event_listener(id);
        }
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder")
            .field("prefix", &self.prefix)
            .field("bindings", &self.len())
            .field("delegated_kinds", &self.delegated_kinds())
            .finish()
    }
}

/// Run the bindings along the event's path, innermost first.
fn deliver(state: &ThreadSafe<BinderState>, bus: &EventBus, event: &mut NativeEvent) {
    let matched: Vec<(BindingId, Binding)> = {
        let state = state.lock();
        event
            .composed_path()
            .iter()
            .filter_map(|node| state.by_node.get(node))
            .flatten()
            .filter_map(|id| state.bindings.get(id).map(|b| (*id, b.clone())))
            .filter(|(_, b)| b.spec.native_event == event.kind())
            .collect()
    };

    let target = event.target();
    for (id, binding) in matched {
        let spec = &binding.spec;
        if spec.has(Modifier::SelfOnly) && target != EventTarget::Node(binding.node) {
            continue;
        }
        if spec.has(Modifier::Prevent) {
            event.prevent_default();
        }
        if spec.has(Modifier::Stop) {
            event.stop_propagation();
        }
        if spec.has(Modifier::Once) {
            state.lock().drop_binding(id);
        }

        bus.trigger(&spec.event_name, spec.data.clone(), Some(binding.node));

        if spec.has(Modifier::Stop) {
            break;
        }
    }
}
