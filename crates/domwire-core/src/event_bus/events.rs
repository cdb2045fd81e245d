//! Event type definitions for the event bus.
//!
//! Bus events are cloneable and serializable for logging and history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::NodeId;

/// Payload delivered with a bus event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Detail {
    /// The raw payload passed to `trigger`.
    Data(Option<Value>),
    /// The payload wrapped together with the element that caused the trigger.
    Envelope {
        /// The element the trigger originated from.
        current_target: NodeId,
        /// The raw payload.
        data: Option<Value>,
    },
}

impl Detail {
    /// The payload, regardless of shape
    pub fn data(&self) -> Option<&Value> {
        match self {
            Detail::Data(data) => data.as_ref(),
            Detail::Envelope { data, .. } => data.as_ref(),
        }
    }

    /// The originating element, if the trigger supplied one
    pub fn current_target(&self) -> Option<NodeId> {
        match self {
            Detail::Data(_) => None,
            Detail::Envelope { current_target, .. } => Some(*current_target),
        }
    }
}

/// A dispatched bus event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Event name exactly as triggered
    pub name: String,
    /// Payload
    pub detail: Detail,
    /// Trigger time
    pub timestamp: DateTime<Utc>,
}

impl BusEvent {
    /// Build the event for `trigger(name, data, current_target)`.
    pub fn new(name: impl Into<String>, data: Option<Value>, current_target: Option<NodeId>) -> Self {
        let detail = match current_target {
            Some(current_target) => Detail::Envelope {
                current_target,
                data,
            },
            None => Detail::Data(data),
        };
        Self {
            name: name.into(),
            detail,
            timestamp: Utc::now(),
        }
    }

    /// Structured view of the name
    pub fn parsed_name(&self) -> EventName {
        EventName::parse(&self.name)
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        match self.detail.data() {
            Some(data) => format!("{} ({})", self.name, data),
            None => self.name.clone(),
        }
    }
}

/// A parsed `component[id]::action` event name.
///
/// Names without the structure parse as a bare component, so parsing never
/// fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventName {
    /// Leading component, e.g. `modal`
    pub component: String,
    /// Embedded identifier between brackets
    pub id: Option<String>,
    /// Action after `::`
    pub action: Option<String>,
}

impl EventName {
    /// Split a raw event name.
    pub fn parse(raw: &str) -> Self {
        let (head, action) = match raw.split_once("::") {
            Some((head, action)) => (head, Some(action.to_string())),
            None => (raw, None),
        };

        let (component, id) = match (head.find('['), head.ends_with(']')) {
            (Some(open), true) => (
                head[..open].to_string(),
                Some(head[open + 1..head.len() - 1].to_string()),
            ),
            _ => (head.to_string(), None),
        };

        Self {
            component,
            id,
            action,
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.component)?;
        if let Some(id) = &self.id {
            write!(f, "[{}]", id)?;
        }
        if let Some(action) = &self.action {
            write!(f, "::{}", action)?;
        }
        Ok(())
    }
}
