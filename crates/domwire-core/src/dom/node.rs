//! Arena node storage.

use serde::{Deserialize, Serialize};

/// Stable identifier of a node in a [`Document`](super::Document) arena.
///
/// Ids are never reused: a removed node leaves a tombstone, so a stale id can
/// only ever resolve to "unknown", never to some other element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) tag: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or overwrite an attribute, keeping first-insertion order.
    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub(crate) fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(n, _)| n != name);
        self.attributes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(12).to_string(), "#12");
    }

    #[test]
    fn test_attribute_overwrite_keeps_order() {
        let mut node = Node::new("BUTTON");
        assert_eq!(node.tag, "button");

        node.set_attribute("class", "a");
        node.set_attribute("on:click", "x");
        node.set_attribute("class", "b");

        assert_eq!(node.attribute("class"), Some("b"));
        assert_eq!(node.attributes[0].0, "class");
        assert!(node.remove_attribute("class"));
        assert!(!node.remove_attribute("class"));
    }
}
