//! Arena document with synchronous bubbling dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use super::event::{EventTarget, ListenerId, ListenerOptions, NativeEvent};
use super::node::{Node, NodeId};
use crate::error::DomError;
use crate::types::{thread_safe, thread_safe_rw, NativeCallback, ThreadSafe, ThreadSafeRw};

struct Tree {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Tree {
    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(DomError::UnknownNode { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(DomError::UnknownNode { node: id })
    }

    /// Target first, topmost ancestor last.
    fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.node(current).ok().and_then(|n| n.parent) {
            path.push(parent);
            current = parent;
        }
        path
    }

    fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>, DomError> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Ok(node) = self.node(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self.node_mut(id)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        Ok(())
    }
}

struct ListenerEntry {
    target: EventTarget,
    kind: String,
    options: ListenerOptions,
    callback: NativeCallback,
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: BTreeMap<ListenerId, ListenerEntry>,
}

/// A shared handle to an arena document.
///
/// Cloning is cheap; clones observe the same tree and listener table. No lock
/// is held while listeners run, so listeners may mutate the document or
/// register further listeners.
#[derive(Clone)]
pub struct Document {
    tree: ThreadSafeRw<Tree>,
    listeners: ThreadSafe<ListenerTable>,
}

impl Document {
    /// Create a document holding only its root node
    pub fn new() -> Self {
        let tree = Tree {
            nodes: vec![Some(Node::new("#document"))],
            root: NodeId(0),
        };
        Self {
            tree: thread_safe_rw(tree),
            listeners: thread_safe(ListenerTable::default()),
        }
    }

    /// The document root, the conventional dispatch element
    pub fn root(&self) -> NodeId {
        self.tree.read().root
    }

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        let mut tree = self.tree.write();
        let id = NodeId(tree.nodes.len());
        tree.nodes.push(Some(Node::new(tag)));
        id
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first. The child keeps its id.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        tree.node(parent)?;
        tree.node(child)?;
        if child == tree.root {
            return Err(DomError::RootMutation);
        }
        if tree.path_to_root(parent).contains(&child) {
            return Err(DomError::HierarchyCycle { parent, child });
        }
        tree.detach(child)?;
        tree.node_mut(parent)?.children.push(child);
        tree.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(
        &self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        let id = self.create_element(tag);
        {
            let mut tree = self.tree.write();
            let node = tree.node_mut(id)?;
            for (name, value) in attributes {
                node.set_attribute(name, value);
            }
        }
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Detach a node (and its subtree) from its parent without destroying it.
    pub fn detach(&self, node: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.write();
        if node == tree.root {
            return Err(DomError::RootMutation);
        }
        tree.detach(node)
    }

    /// Destroy a node and its subtree, dropping their listeners.
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let removed = {
            let mut tree = self.tree.write();
            if node == tree.root {
                return Err(DomError::RootMutation);
            }
            tree.detach(node)?;
            let subtree = tree.subtree(node)?;
            for id in &subtree {
                tree.nodes[id.0] = None;
            }
            subtree
        };

        let mut listeners = self.listeners.lock();
        listeners.entries.retain(|_, entry| match entry.target {
            EventTarget::Node(id) => !removed.contains(&id),
            EventTarget::Window => true,
        });
        debug!(node = %node, count = removed.len(), "Removed subtree");
        Ok(())
    }

    /// Whether the id refers to a live node
    pub fn contains(&self, node: NodeId) -> bool {
        self.tree.read().node(node).is_ok()
    }

    /// Whether the node's ancestor chain reaches the root
    pub fn is_connected(&self, node: NodeId) -> bool {
        let tree = self.tree.read();
        tree.node(node).is_ok() && tree.path_to_root(node).last() == Some(&tree.root)
    }

    /// Lower-case tag name
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.read().node(node).ok().map(|n| n.tag.clone())
    }

    /// Parent node, `None` for the root or detached nodes
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().node(node).ok().and_then(|n| n.parent)
    }

    /// Children in document order
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .read()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Depth-first, pre-order list of `root` and its descendants.
    pub fn descendants(&self, root: NodeId) -> Result<Vec<NodeId>, DomError> {
        self.tree.read().subtree(root)
    }

    /// Set an attribute
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.tree.write().node_mut(node)?.set_attribute(name, value);
        Ok(())
    }

    /// Read an attribute
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .read()
            .node(node)
            .ok()
            .and_then(|n| n.attribute(name).map(str::to_string))
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<bool, DomError> {
        Ok(self.tree.write().node_mut(node)?.remove_attribute(name))
    }

    /// All attributes in insertion order
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.tree
            .read()
            .node(node)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    /// Attach a native listener.
    ///
    /// Fails with [`DomError::UnknownNode`] when the target is not a live
    /// node.
    pub fn add_event_listener<F>(
        &self,
        target: EventTarget,
        kind: &str,
        options: ListenerOptions,
        callback: F,
    ) -> Result<ListenerId, DomError>
    where
        F: Fn(&mut NativeEvent) + Send + Sync + 'static,
    {
        if let EventTarget::Node(node) = target {
            self.tree.read().node(node)?;
        }

        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = ListenerId(listeners.next_id);
        listeners.entries.insert(
            id,
            ListenerEntry {
                target,
                kind: kind.to_string(),
                options,
                callback: Arc::new(callback),
            },
        );
        debug!(listener = %id, target = %target, kind, passive = options.passive, "Listener added");
        Ok(id)
    }

    /// Detach a native listener, returning whether it existed
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let removed = self.listeners.lock().entries.remove(&id).is_some();
        if removed {
            debug!(listener = %id, "Listener removed");
        }
        removed
    }

    /// Number of listeners attached to `target` for `kind`
    pub fn listener_count(&self, target: EventTarget, kind: &str) -> usize {
        self.listeners
            .lock()
            .entries
            .values()
            .filter(|e| e.target == target && e.kind == kind)
            .count()
    }

    /// Dispatch an event on `target` and bubble it to the window.
    ///
    /// Returns the event after dispatch so callers can inspect
    /// `default_prevented`. A detached node's event bubbles through its
    /// detached ancestors but never reaches the window.
    pub fn dispatch(
        &self,
        target: EventTarget,
        mut event: NativeEvent,
    ) -> Result<NativeEvent, DomError> {
        let (path, reaches_window) = match target {
            EventTarget::Window => (Vec::new(), true),
            EventTarget::Node(node) => {
                let tree = self.tree.read();
                tree.node(node)?;
                let path = tree.path_to_root(node);
                let connected = path.last() == Some(&tree.root);
                (path, connected)
            }
        };

        event.target = target;
        event.path = path.clone();

        let mut hops: Vec<EventTarget> = path.into_iter().map(EventTarget::Node).collect();
        if reaches_window {
            hops.push(EventTarget::Window);
        }
        trace!(kind = %event.kind, target = %target, hops = hops.len(), "Dispatching");

        for hop in hops {
            event.current_target = Some(hop);
            for (options, callback) in self.take_listeners(hop, &event.kind) {
                event.in_passive_listener = options.passive;
                callback(&mut event);
            }
            event.in_passive_listener = false;
            if event.propagation_stopped {
                break;
            }
        }

        event.current_target = None;
        Ok(event)
    }

    /// Dispatch a fresh event of `kind` on `target`.
    pub fn fire(&self, target: EventTarget, kind: &str) -> Result<NativeEvent, DomError> {
        self.dispatch(target, NativeEvent::new(kind))
    }

    /// Snapshot the listeners for one hop, removing `once` listeners.
    fn take_listeners(
        &self,
        target: EventTarget,
        kind: &str,
    ) -> Vec<(ListenerOptions, NativeCallback)> {
        let mut listeners = self.listeners.lock();
        let matching: Vec<ListenerId> = listeners
            .entries
            .iter()
            .filter(|(_, e)| e.target == target && e.kind == kind)
            .map(|(id, _)| *id)
            .collect();

        let mut out = Vec::with_capacity(matching.len());
        for id in matching {
            let once = listeners.entries[&id].options.once;
            if once {
                if let Some(entry) = listeners.entries.remove(&id) {
                    out.push((entry.options, entry.callback));
                }
            } else {
                let entry = &listeners.entries[&id];
                out.push((entry.options, Arc::clone(&entry.callback)));
            }
        }
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes = self.tree.read().nodes.iter().flatten().count();
        f.debug_struct("Document")
            .field("nodes", &nodes)
            .field("listeners", &self.listeners.lock().entries.len())
            .finish()
    }
}
